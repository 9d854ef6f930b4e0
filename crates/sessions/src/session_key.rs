//! Stable session ids derived from the working directory.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex prefix length of a session id.
const SESSION_ID_LEN: usize = 16;

/// Map a working directory to its session id.
///
/// The path is canonicalized when possible so `./repo` and `/abs/repo`
/// share one transcript.
pub fn session_id_for_workdir(workdir: &Path) -> String {
    let canonical = workdir
        .canonicalize()
        .unwrap_or_else(|_| workdir.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(SESSION_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_dir_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let a = session_id_for_workdir(dir.path());
        let b = session_id_for_workdir(&dir.path().join("."));
        assert_eq!(a, b);
        assert_eq!(a.len(), SESSION_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_dirs_differ() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        assert_ne!(session_id_for_workdir(a.path()), session_id_for_workdir(b.path()));
    }
}
