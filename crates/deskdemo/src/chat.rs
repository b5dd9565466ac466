//! Terminal chat against a running deskdemo server.

use std::io::Write;

use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use deskdemo_client::{ChatClient, ChatSession, ClientError};
use deskdemo_core::Role;

/// Send `message` once, or read messages from stdin until EOF.
pub async fn run(url: &str, message: Option<String>) -> Result<()> {
    let client = ChatClient::new(url);
    let mut session = ChatSession::new();

    if let Some(message) = message {
        return send(&client, &mut session, &message)
            .await
            .map_err(|e| miette::miette!("{}", e));
    }

    eprintln!("Connected to {}. Type a message, ctrl-d to quit.", client.base_url());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.into_diagnostic()? {
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = send(&client, &mut session, &line).await {
            warn!(error = %e, "message not delivered");
        }
    }

    Ok(())
}

/// Send one message, printing the answer as it streams in.
async fn send(client: &ChatClient, session: &mut ChatSession, text: &str) -> Result<(), ClientError> {
    let mut printer = Printer::default();
    let result = client
        .send(session, text, |s| printer.update(s))
        .await;
    println!();
    result
}

/// Prints the newest assistant text and tool activity incrementally.
#[derive(Default)]
struct Printer {
    shown: String,
    last_tool: Option<String>,
}

impl Printer {
    fn update(&mut self, session: &ChatSession) {
        if let Some(status) = session.tool_status() {
            if self.last_tool.as_deref() != Some(status.tool.as_str()) {
                eprintln!("[using {}]", status.tool);
                self.last_tool = Some(status.tool.clone());
            }
        }

        let Some(reply) = session.messages().last().filter(|m| m.role == Role::Assistant) else {
            return;
        };

        let mut stdout = std::io::stdout();
        if reply.content.starts_with(&self.shown) {
            let _ = stdout.write_all(reply.content[self.shown.len()..].as_bytes());
        } else {
            // An error replaces the text rather than extending it.
            let _ = writeln!(stdout);
            let _ = stdout.write_all(reply.content.as_bytes());
        }
        let _ = stdout.flush();
        self.shown.clone_from(&reply.content);
    }
}
