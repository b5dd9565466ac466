use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;
use crate::message::{AgentEvent, MessageParser};

/// Events buffered between the parser task and the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Stream of events from one agent query.
///
/// Items arrive in the order the CLI produced them. An `Err` item means the
/// underlying process failed; nothing follows it. Dropping the stream stops
/// the query.
///
/// # Examples
///
/// ```rust,no_run
/// # use deskdemo_claude::prelude::*;
/// # #[tokio::main]
/// # async fn main() -> deskdemo_claude::Result<()> {
/// let client = Client::new(Config::default());
/// let mut stream = client.query("Write a haiku").await?;
///
/// while let Some(event) = stream.next().await {
///     match event? {
///         AgentEvent::TextDelta(text) => print!("{text}"),
///         AgentEvent::Finished(summary) => println!("\n[{}]", summary.subtype),
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct AgentStream {
    receiver: mpsc::Receiver<Result<AgentEvent>>,
}

impl AgentStream {
    /// Create a stream fed by the returned sender.
    ///
    /// Useful for agents that do not shell out, and for tests.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<AgentEvent>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { receiver: rx })
    }

    /// Create a stream that yields the given items and then ends.
    pub fn from_events(events: Vec<Result<AgentEvent>>) -> Self {
        let (tx, stream) = Self::channel(events.len());
        for event in events {
            // Capacity matches the number of items, so this never fails.
            let _ = tx.try_send(event);
        }
        stream
    }

    /// Parse raw CLI output lines into events on a background task.
    pub fn from_line_stream(
        mut line_receiver: mpsc::Receiver<Result<String>>,
        parser: MessageParser,
    ) -> Self {
        let (tx, stream) = Self::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(line_result) = line_receiver.recv().await {
                let line = match line_result {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                };

                let events = match parser.parse_line(&line) {
                    Ok(events) => events,
                    Err(e) => {
                        debug!(error = %e, "Failed to parse line as message: {}", line);
                        continue;
                    }
                };

                for event in events {
                    if tx.send(Ok(event)).await.is_err() {
                        debug!("Event receiver dropped");
                        return;
                    }
                }
            }
        });

        stream
    }

    /// Drain the stream and return the concatenated assistant text.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();

        while let Some(event) = self.next().await {
            match event? {
                AgentEvent::TextDelta(delta) => text.push_str(&delta),
                AgentEvent::Finished(_) => break,
                _ => {}
            }
        }

        Ok(text)
    }
}

impl Stream for AgentStream {
    type Item = Result<AgentEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lines_become_events() {
        let (tx, rx) = mpsc::channel(16);
        for line in [
            r#"{"type":"system","subtype":"init"}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}}"#,
            "garbage that is not json",
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo"}}}"#,
            r#"{"type":"result","subtype":"success","is_error":false}"#,
        ] {
            tx.send(Ok(line.to_string())).await.unwrap();
        }
        drop(tx);

        let stream = AgentStream::from_line_stream(rx, MessageParser::new(true));
        assert_eq!(stream.collect_text().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_process_error_ends_stream() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"a"}}}"#.to_string()))
            .await
            .unwrap();
        tx.send(Err(Error::Timeout(5))).await.unwrap();
        tx.send(Ok("never seen".to_string())).await.unwrap();
        drop(tx);

        let events: Vec<_> = AgentStream::from_line_stream(rx, MessageParser::new(true))
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(Error::Timeout(5))));
    }

    #[tokio::test]
    async fn test_from_events() {
        let stream = AgentStream::from_events(vec![
            Ok(AgentEvent::TextDelta("x".into())),
            Ok(AgentEvent::ToolStart { name: "Read".into() }),
        ]);
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
    }
}
