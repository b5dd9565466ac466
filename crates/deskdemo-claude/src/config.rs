use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// Validation constants
const MAX_PROMPT_LENGTH: usize = 500_000;
const MAX_SYSTEM_PROMPT_LENGTH: usize = 100_000;
const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 14400; // 4 hours
const MAX_TURNS_LIMIT: u32 = 100;
const MAX_TOOL_NAME_LENGTH: usize = 100;

/// Which tools the agent may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "preset", content = "tools")]
pub enum ToolPreset {
    /// The CLI's full built-in toolset.
    #[default]
    ClaudeCode,
    /// Only the listed tools (`--allowedTools`).
    Allowed(Vec<String>),
}

/// How the CLI asks for permission before running tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    Plan,
    /// Run every tool without asking. There is no human at the CLI's
    /// terminal when it is driven from the relay.
    BypassPermissions,
}

impl PermissionMode {
    /// Value for `--permission-mode`.
    pub fn as_flag(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

/// Configuration for a streaming agent query.
///
/// # Examples
///
/// ```rust
/// use deskdemo_claude::{Config, PermissionMode};
///
/// let config = Config::builder()
///     .model("claude-sonnet-4-5")
///     .permission_mode(PermissionMode::BypassPermissions)
///     .max_turns(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_turns, Some(10));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Explicit path to the `claude` binary. Looked up on `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Appended to the CLI's own system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_system_prompt: Option<String>,

    #[serde(default)]
    pub tools: ToolPreset,

    #[serde(default)]
    pub permission_mode: PermissionMode,

    /// Upper bound on agentic turns for one query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,

    /// Emit `stream_event` partial messages so text arrives as deltas.
    #[serde(default = "default_true")]
    pub include_partial_messages: bool,

    /// Seconds to wait for each output line before killing the process.
    pub timeout_secs: u64,

    /// Working directory of the CLI process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for the CLI process.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary: None,
            model: None,
            append_system_prompt: None,
            tools: ToolPreset::default(),
            permission_mode: PermissionMode::default(),
            max_turns: None,
            include_partial_messages: true,
            timeout_secs: 120,
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Check every value against its limits.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(prompt) = &self.append_system_prompt {
            if prompt.len() > MAX_SYSTEM_PROMPT_LENGTH {
                return Err(Error::InvalidInput(format!(
                    "System prompt exceeds maximum length of {} characters (got {})",
                    MAX_SYSTEM_PROMPT_LENGTH,
                    prompt.len()
                )));
            }
        }

        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(Error::InvalidInput(format!(
                "Timeout must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds (got {})",
                self.timeout_secs
            )));
        }

        if let Some(turns) = self.max_turns {
            if turns == 0 || turns > MAX_TURNS_LIMIT {
                return Err(Error::InvalidInput(format!(
                    "Max turns must be between 1 and {MAX_TURNS_LIMIT} (got {turns})"
                )));
            }
        }

        if let ToolPreset::Allowed(tools) = &self.tools {
            for tool in tools {
                if tool.is_empty() || tool.len() > MAX_TOOL_NAME_LENGTH {
                    return Err(Error::InvalidInput(format!(
                        "Tool name length must be between 1 and {MAX_TOOL_NAME_LENGTH} characters (got '{tool}')"
                    )));
                }
                if !is_valid_tool_name(tool) {
                    return Err(Error::InvalidInput(format!(
                        "Invalid tool name format: '{tool}'. Tool names must contain only alphanumeric characters, underscores, hyphens, and colons"
                    )));
                }
            }
        }

        if let Some(path) = &self.binary {
            if path.as_os_str().is_empty() {
                return Err(Error::InvalidInput(
                    "Binary path cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Reject empty and oversized prompts before spawning anything.
pub(crate) fn validate_prompt(prompt: &str) -> Result<(), Error> {
    if prompt.trim().is_empty() {
        return Err(Error::InvalidInput("Prompt cannot be empty".to_string()));
    }
    if prompt.len() > MAX_PROMPT_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Prompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters (got {})",
            prompt.len()
        )));
    }
    Ok(())
}

fn is_valid_tool_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ':')
}

/// Fluent builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.binary = Some(path.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.append_system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolPreset) -> Self {
        self.config.tools = tools;
        self
    }

    #[must_use]
    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.config.permission_mode = mode;
        self
    }

    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.config.max_turns = Some(turns);
        self
    }

    #[must_use]
    pub fn include_partial_messages(mut self, include: bool) -> Self {
        self.config.include_partial_messages = include;
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<Config, Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test_case(Config::builder().timeout_secs(0) ; "zero timeout")]
    #[test_case(Config::builder().timeout_secs(MAX_TIMEOUT_SECS + 1) ; "huge timeout")]
    #[test_case(Config::builder().max_turns(0) ; "zero turns")]
    #[test_case(Config::builder().max_turns(MAX_TURNS_LIMIT + 1) ; "too many turns")]
    #[test_case(Config::builder().tools(ToolPreset::Allowed(vec![String::new()])) ; "empty tool")]
    #[test_case(Config::builder().tools(ToolPreset::Allowed(vec!["rm -rf".into()])) ; "bad tool")]
    #[test_case(Config::builder().binary("") ; "empty binary")]
    fn test_invalid_configs(builder: ConfigBuilder) {
        assert!(matches!(builder.build(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_mcp_style_tool_names_allowed() {
        let config = Config::builder()
            .tools(ToolPreset::Allowed(vec![
                "WebSearch".into(),
                "mcp__github:list_issues".into(),
            ]))
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_validate_prompt() {
        assert!(validate_prompt("hello").is_ok());
        assert!(validate_prompt("   ").is_err());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_permission_flags() {
        assert_eq!(PermissionMode::BypassPermissions.as_flag(), "bypassPermissions");
        assert_eq!(PermissionMode::AcceptEdits.as_flag(), "acceptEdits");
    }
}
