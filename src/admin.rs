use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::service::ChatService;

/// Operator console on stdin.
///
/// `listall` prints the active users, `quit` requests shutdown. Returns
/// only when the operator types `quit`; the caller treats the return as a
/// shutdown signal. When stdin closes (headless runs have no console) the
/// task parks forever so the server keeps serving.
pub async fn run(service: Arc<ChatService>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Admin console stdin closed, console disabled");
                break;
            }
            Err(e) => {
                info!("Admin console read error: {}, console disabled", e);
                break;
            }
        };
        match line.trim() {
            "" => {}
            "listall" => {
                let users = service.list_active_users();
                if users.is_empty() {
                    println!("No active users");
                } else {
                    println!("Active users:");
                    for user in users {
                        println!("  {}", user);
                    }
                }
            }
            "quit" => {
                println!("Shutting down...");
                return;
            }
            other => println!("Unknown command: {}", other),
        }
    }

    // No console, but the server must keep serving.
    std::future::pending::<()>().await;
}
