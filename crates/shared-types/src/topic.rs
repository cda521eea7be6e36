//! # Topic Naming
//!
//! Validation and fully qualified names.
//!
//! A fully qualified name has the shape `@/<partition>@/<namespace>/<topic>`.
//! Discovery and the buses key on it, so endpoints in different partitions
//! never match each other.

/// Longest accepted name, in bytes.
pub const MAX_NAME_LENGTH: usize = 65535;

fn has_forbidden_sequence(name: &str) -> bool {
    name.chars().any(char::is_whitespace)
        || name.contains('@')
        || name.contains('~')
        || name.contains(":=")
        || name.contains("//")
}

/// Namespaces may be empty.
#[must_use]
pub fn is_valid_namespace(namespace: &str) -> bool {
    namespace.len() <= MAX_NAME_LENGTH && !has_forbidden_sequence(namespace)
}

/// Partitions follow the namespace rules.
#[must_use]
pub fn is_valid_partition(partition: &str) -> bool {
    is_valid_namespace(partition)
}

/// Topic and service names: non-empty, not just `/`, no forbidden sequences.
#[must_use]
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty() && topic != "/" && is_valid_namespace(topic)
}

/// Build the fully qualified name, or `None` if any part is invalid.
#[must_use]
pub fn fully_qualified_name(partition: &str, namespace: &str, topic: &str) -> Option<String> {
    if !is_valid_partition(partition) || !is_valid_namespace(namespace) || !is_valid_topic(topic) {
        return None;
    }

    let mut name = if topic.starts_with('/') {
        topic.to_string()
    } else {
        let ns = namespace.trim_matches('/');
        if ns.is_empty() {
            format!("/{topic}")
        } else {
            format!("/{ns}/{topic}")
        }
    };
    while name.len() > 1 && name.ends_with('/') {
        name.pop();
    }

    let part = partition.trim_matches('/');
    let fq = format!("@/{part}@{name}");
    (fq.len() <= MAX_NAME_LENGTH).then_some(fq)
}

/// Split a fully qualified name into `(partition, name)`.
#[must_use]
pub fn decompose(fully_qualified: &str) -> Option<(&str, &str)> {
    let rest = fully_qualified.strip_prefix("@/")?;
    let split = rest.find('@')?;
    let (partition, name) = rest.split_at(split);
    Some((partition, &name[1..]))
}

/// Fully qualified prefix shared by every name in a partition.
#[must_use]
pub fn partition_prefix(partition: &str) -> String {
    format!("@/{}@", partition.trim_matches('/'))
}
