use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// What a user did, as recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    Logout,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Login => write!(f, "login"),
            Action::Logout => write!(f, "logout"),
        }
    }
}

/// Append-only recorder of user activity.
///
/// The service reports every successful login and logout here; failed
/// attempts are never recorded. Implementations must be shareable across
/// request handlers.
pub trait ActivitySink: Send + Sync {
    fn record(&self, username: &str, action: Action, timestamp: DateTime<Utc>) -> io::Result<()>;
}

/// Writes one `<username> <action> <timestamp>` line per event.
///
/// The file is opened in append mode for every record, so an operator can
/// rotate or truncate it while the server runs.
#[derive(Debug, Clone)]
pub struct FileActivitySink {
    path: PathBuf,
}

impl FileActivitySink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ActivitySink for FileActivitySink {
    fn record(&self, username: &str, action: Action, timestamp: DateTime<Utc>) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} {} {}", username, action, timestamp.to_rfc3339())
    }
}
