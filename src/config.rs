use std::env;

/// Server settings, read once at startup. Every value has a default so the
/// broker runs with no configuration at all.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Line-oriented `username password` credential file.
    pub users_file: String,
    /// Append-only activity log for login/logout events.
    pub activity_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("CHAT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("CHAT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            users_file: env::var("USERS_FILE").unwrap_or_else(|_| "users.txt".to_string()),
            activity_log: env::var("ACTIVITY_LOG").unwrap_or_else(|_| "logs.txt".to_string()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Terminal client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub poll_interval_secs: u64,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: env::var("CHAT_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        }
    }
}
