//! Resource and blob name rules.
//!
//! Table, queue and container names follow the rules of the hosted storage
//! services so a configuration that works locally also works against them.

use super::StorageError;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 63;
const MAX_BLOB_NAME_LEN: usize = 1024;

/// Table names: an ASCII letter followed by letters or digits, 3-63 characters.
pub fn validate_table_name(name: &str) -> Result<(), StorageError> {
    check_length("table", name)?;
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(
            "table",
            name,
            "must start with a letter and contain only letters and digits",
        ));
    }
    Ok(())
}

/// Queue names share the lowercase-and-hyphen rules of container names.
pub fn validate_queue_name(name: &str) -> Result<(), StorageError> {
    validate_dns_like("queue", name)
}

pub fn validate_container_name(name: &str) -> Result<(), StorageError> {
    validate_dns_like("container", name)
}

fn validate_dns_like(kind: &'static str, name: &str) -> Result<(), StorageError> {
    check_length(kind, name)?;
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(invalid(kind, name, "only lowercase letters, digits and '-' are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return Err(invalid(kind, name, "'-' must not lead, trail or repeat"));
    }
    Ok(())
}

fn check_length(kind: &'static str, name: &str) -> Result<(), StorageError> {
    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return Err(invalid(
            kind,
            name,
            &format!("length must be {}-{} characters", MIN_NAME_LEN, MAX_NAME_LEN),
        ));
    }
    Ok(())
}

fn invalid(kind: &'static str, name: &str, reason: &str) -> StorageError {
    StorageError::InvalidName { kind, name: name.to_string(), reason: reason.to_string() }
}

/// Derives a blob name from a client-supplied upload file name.
///
/// Browsers may send a full client path (`C:\Users\me\cat.png`); only the
/// last component is kept.
pub fn blob_name_from_upload(file_name: &str) -> Result<String, StorageError> {
    let last = file_name.rsplit(&['/', '\\'][..]).next().unwrap_or(file_name).trim();
    validate_blob_name(last)?;
    Ok(last.to_string())
}

/// A blob name is a single path component: no separators, no leading `.`
/// (which also rules out `.` and `..`). Dot-prefixed paths are reserved for
/// the store itself and are not served.
pub fn validate_blob_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(invalid("blob", name, "name is empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("blob", name, "name must not start with '.'"));
    }
    if name.len() > MAX_BLOB_NAME_LEN {
        return Err(invalid("blob", name, "name is longer than 1024 bytes"));
    }
    if name.contains(&['/', '\\', '\0'][..]) {
        return Err(invalid("blob", name, "name must not contain separators or NUL"));
    }
    Ok(())
}
