use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::{Config, validate_prompt},
    error::Result,
    message::MessageParser,
    process::spawn_streaming,
    stream::AgentStream,
};

/// Something that can answer a prompt with a stream of events.
///
/// The relay depends on this trait rather than on [`Client`], so it can be
/// driven by a scripted agent in tests.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Start a query. Errors returned here happen before any output.
    async fn query(&self, prompt: &str) -> Result<AgentStream>;
}

/// Agent backed by the `claude` CLI.
///
/// # Examples
///
/// ```rust,no_run
/// # use deskdemo_claude::{Agent, Client, Config};
/// # #[tokio::main]
/// # async fn main() -> deskdemo_claude::Result<()> {
/// let client = Client::new(Config::builder().max_turns(5).build()?);
/// let answer = client.query("What is 2 + 2?").await?.collect_text().await?;
/// println!("{answer}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    config: Arc<Config>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl Agent for Client {
    async fn query(&self, prompt: &str) -> Result<AgentStream> {
        validate_prompt(prompt)?;
        let lines = spawn_streaming(&self.config, prompt).await?;
        Ok(AgentStream::from_line_stream(
            lines,
            MessageParser::new(self.config.include_partial_messages),
        ))
    }
}
