//! Deterministic resource naming.
//!
//! Workspaces, threads and knowledge files are named from their owning
//! source so that re-running a reconciliation finds the same records
//! instead of creating new ones.

use sha2::{Digest, Sha256};

/// Maximum length of a generated resource name.
pub const MAX_NAME_LEN: usize = 63;

pub const WORKSPACE_PREFIX: &str = "w1";
pub const THREAD_PREFIX: &str = "t1";
pub const KNOWLEDGE_FILE_PREFIX: &str = "kf1";

const HASH_LEN: usize = 8;

/// Join `parts` with `-`. Names over [`MAX_NAME_LEN`] are truncated and
/// suffixed with a hash of the full name, so distinct inputs stay distinct.
pub fn safe_concat_name<S: AsRef<str>>(parts: &[S]) -> String {
    let full = join(parts);
    if full.len() <= MAX_NAME_LEN {
        return full;
    }

    let hash = short_hash(&full);
    let prefix = truncate_to_boundary(&full, MAX_NAME_LEN - HASH_LEN - 1);
    format!("{}-{}", prefix.trim_end_matches('-'), hash)
}

/// `prefix` followed by a hash of the remaining parts. Used where the parts
/// may contain characters that are not valid in a name (paths, URLs).
pub fn safe_hash_concat_name<S: AsRef<str>>(prefix: &str, parts: &[S]) -> String {
    format!("{}-{}", prefix, long_hash(&join(parts)))
}

pub fn workspace_name(source_name: &str) -> String {
    safe_concat_name(&[WORKSPACE_PREFIX, source_name])
}

pub fn thread_name(source_name: &str) -> String {
    safe_concat_name(&[THREAD_PREFIX, source_name])
}

pub fn knowledge_file_name(source_name: &str, file_id: &str) -> String {
    safe_hash_concat_name(KNOWLEDGE_FILE_PREFIX, &[source_name, file_id])
}

fn join<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("-")
}

fn short_hash(s: &str) -> String {
    let mut hex = long_hash(s);
    hex.truncate(HASH_LEN);
    hex
}

fn long_hash(s: &str) -> String {
    Sha256::digest(s.as_bytes())
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn truncate_to_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
