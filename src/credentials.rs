use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

/// Failure to load the credential source. Fatal at startup: the server
/// must not accept traffic without a loaded credential set.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read credential source: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed credential line {line}: expected `username password`")]
    MalformedLine { line: usize },
}

/// Immutable username -> password map, loaded once at startup and shared
/// read-only for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    /// Parse line-oriented `username password` records.
    ///
    /// Fields are whitespace-separated and anything after the password is
    /// ignored, so passwords cannot contain spaces. Blank lines are
    /// skipped; a non-blank line without a password field is malformed.
    /// If a username appears on more than one line, the last entry wins.
    pub fn load(reader: impl BufRead) -> Result<Self, LoadError> {
        let mut users = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(username) = fields.next() else {
                continue;
            };
            let password = fields
                .next()
                .ok_or(LoadError::MalformedLine { line: idx + 1 })?;
            users.insert(username.to_string(), password.to_string());
        }
        Ok(Self { users })
    }

    /// Load credentials from a file on disk.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        Self::load(BufReader::new(file))
    }

    /// True iff the username exists and the stored password matches the
    /// supplied one exactly. Plain comparison, not constant time; this is
    /// not a security boundary.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users.get(username).is_some_and(|stored| stored == password)
    }

    /// Number of distinct usernames.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    #[test]
    fn loads_and_verifies_credentials() {
        let store = CredentialStore::load(Cursor::new("alice pw1\nbob pw2\n")).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.verify("alice", "pw1"));
        assert!(store.verify("bob", "pw2"));
        assert!(!store.verify("alice", "pw2"));
        assert!(!store.verify("carol", "pw1"));
    }

    #[test]
    fn rejects_any_password_mutation() {
        let store = CredentialStore::load(Cursor::new("alice pw1\n")).unwrap();
        assert!(store.verify("alice", "pw1"));
        assert!(!store.verify("alice", "pw2"));
        assert!(!store.verify("alice", "pw"));
        assert!(!store.verify("alice", "pw1 "));
        assert!(!store.verify("alice", "Pw1"));
    }

    #[test]
    fn duplicate_username_last_wins() {
        let store = CredentialStore::load(Cursor::new("alice old\nalice new\n")).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.verify("alice", "old"));
        assert!(store.verify("alice", "new"));
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let err = CredentialStore::load(Cursor::new("alice pw1\nbob\n")).unwrap_err();
        match err {
            LoadError::MalformedLine { line } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let store = CredentialStore::load(Cursor::new("alice pw1\n\n  \nbob pw2\n")).unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }

    #[test]
    fn an_empty_source_is_a_valid_empty_store() {
        let store = CredentialStore::load(Cursor::new("")).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(!store.verify("alice", "pw1"));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let store = CredentialStore::load(Cursor::new("alice pw1 trailing junk\n")).unwrap();
        assert!(store.verify("alice", "pw1"));
    }

    #[test]
    fn load_path_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "alice pw1").unwrap();
        writeln!(file, "bob pw2").unwrap();

        let store = CredentialStore::load_path(&path).unwrap();
        assert!(store.verify("alice", "pw1"));
        assert!(store.verify("bob", "pw2"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CredentialStore::load_path(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
