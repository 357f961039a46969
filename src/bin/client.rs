use std::io::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use agora::config::ClientConfig;
use agora::messages::Message;

/// HTTP client for the broker's polling protocol.
struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(rename = "newMessages")]
    new_messages: Vec<Message>,
    #[serde(rename = "totalMessages")]
    total_messages: u64,
}

impl ChatClient {
    fn new(base_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base_url })
    }

    async fn login(&self, username: &str, password: &str) -> Result<bool> {
        let resp: SuccessResponse = self
            .http
            .post(format!("{}/login", self.base_url))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.success)
    }

    async fn logout(&self, username: &str) -> Result<bool> {
        let resp: SuccessResponse = self
            .http
            .post(format!("{}/logout", self.base_url))
            .form(&[("username", username)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.success)
    }

    async fn send_message(&self, username: &str, message: &str, to_user: Option<&str>) -> Result<bool> {
        let mut form = vec![("username", username), ("message", message)];
        if let Some(to) = to_user {
            form.push(("toUser", to));
        }
        let resp: SuccessResponse = self
            .http
            .post(format!("{}/send", self.base_url))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.success)
    }

    /// Fetch everything the server has from `count` onwards.
    async fn get_messages(&self, count: u64) -> Result<PollResponse> {
        let resp = self
            .http
            .get(format!("{}/messages", self.base_url))
            .query(&[("count", count)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }

    async fn get_active_users(&self) -> Result<Vec<String>> {
        let users = self
            .http
            .get(format!("{}/list", self.base_url))
            .send()
            .await?
            .json()
            .await?;
        Ok(users)
    }
}

/// A message is shown when it is broadcast, addressed to us, or our own.
/// Directed messages for other users stay in the log but are not printed.
fn visible_to(msg: &Message, username: &str) -> bool {
    match &msg.recipient {
        None => true,
        Some(recipient) => recipient == username || msg.sender == username,
    }
}

/// Split `@user text` into the recipient and the untouched body.
fn parse_directed(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('@')?;
    let space = rest.find(' ')?;
    let user = &rest[..space];
    if user.is_empty() {
        return None;
    }
    Some((user, line))
}

async fn prompt(lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>, label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let line = lines
        .next_line()
        .await?
        .context("stdin closed")?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let config = ClientConfig::from_env();
    let client = Arc::new(ChatClient::new(config.server_url.clone())?);

    println!("Connecting to {}", config.server_url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Keep asking until the server accepts a login.
    let username = loop {
        let username = prompt(&mut lines, "Username: ").await?;
        let password = prompt(&mut lines, "Password: ").await?;
        if username.is_empty() || password.is_empty() {
            println!("Username and password cannot be empty");
            continue;
        }
        match client.login(&username, &password).await {
            Ok(true) => break username,
            Ok(false) => println!("Invalid credentials, please try again."),
            Err(e) => println!("Login failed: {}", e),
        }
    };

    println!("Logged in as {}. Type a message, @user text for a private message,", username);
    println!("@@list / @@anonymous / @@showanonymous / @@quit for commands, exit to leave.");

    // Background poller: fetch from our cursor, advance it to the server's
    // total, print what concerns us.
    let cursor = Arc::new(AtomicU64::new(0));
    let poller = {
        let client = client.clone();
        let cursor = cursor.clone();
        let username = username.clone();
        let interval = Duration::from_secs(config.poll_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match client.get_messages(cursor.load(Ordering::SeqCst)).await {
                    Ok(resp) => {
                        cursor.store(resp.total_messages, Ordering::SeqCst);
                        for msg in resp.new_messages.iter().filter(|m| visible_to(m, &username)) {
                            println!("{}: {}", msg.sender, msg.body);
                        }
                    }
                    Err(e) => eprintln!("Poll failed: {}", e),
                }
            }
        })
    };

    let mut anonymous = false;
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        if let Some(command) = line.strip_prefix("@@") {
            match command.trim().to_lowercase().as_str() {
                "list" => match client.get_active_users().await {
                    Ok(users) => println!("Active users: {}", users.join(", ")),
                    Err(e) => println!("List failed: {}", e),
                },
                "quit" => break,
                "anonymous" => {
                    anonymous = !anonymous;
                    println!("Anonymous mode toggled to: {}", if anonymous { "ON" } else { "OFF" });
                }
                "showanonymous" => {
                    println!("Anonymous mode: {}", if anonymous { "ON" } else { "OFF" });
                }
                other => println!("Unknown command: {}", other),
            }
            continue;
        }

        let sender = if anonymous { "Anonymous" } else { username.as_str() };
        let result = match parse_directed(line) {
            Some((to_user, body)) => client.send_message(sender, body, Some(to_user)).await,
            None => client.send_message(sender, line, None).await,
        };
        match result {
            Ok(true) => {}
            Ok(false) => println!("Server rejected the message"),
            Err(e) => println!("Send failed: {}", e),
        }
    }

    poller.abort();
    if let Err(e) = client.logout(&username).await {
        println!("Logout failed: {}", e);
    }
    println!("Bye");
    Ok(())
}
