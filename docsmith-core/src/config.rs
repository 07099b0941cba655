//! Configuration for docsmith runs.
//!
//! This module provides the `Config` struct with a builder pattern for
//! choosing the source file, the model, the prompt templates and the agent
//! framework command.

use crate::agent::process::ProcessFramework;
use crate::agent::{create_model, ModelHandle, DEFAULT_CONTEXT};
use crate::error::{Error, Result};
use crate::prompts::PromptTemplates;
use std::path::PathBuf;

/// Default agent framework command.
const DEFAULT_AGENT_COMMAND: &str = "docsmith-agent";

/// Default agent run timeout in seconds (10 minutes).
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 600;

/// Configuration for a documentation run.
#[derive(Debug, Clone)]
pub struct Config {
    /// The Python source file to document.
    pub source_path: Option<PathBuf>,

    /// Names of the functions to document; empty means all of them.
    pub only: Vec<String>,

    /// The model identifier passed to the framework.
    pub model_id: String,

    /// Model context size in tokens.
    pub context: u32,

    /// Base URL of the model API.
    pub api_base: Option<String>,

    /// Prompt template file; the packaged templates are used when unset.
    pub prompt_path: Option<PathBuf>,

    /// The agent framework command to run.
    pub agent_command: String,

    /// Arguments to pass to the agent framework command.
    pub agent_args: Vec<String>,

    /// Timeout for one agent run in seconds.
    pub agent_timeout_secs: u64,

    /// Whether `complete` requires an accepted docstring.
    pub require_docstring: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_path: None,
            only: Vec::new(),
            model_id: String::new(),
            context: DEFAULT_CONTEXT,
            api_base: None,
            prompt_path: None,
            agent_command: DEFAULT_AGENT_COMMAND.to_string(),
            agent_args: Vec::new(),
            agent_timeout_secs: DEFAULT_AGENT_TIMEOUT_SECS,
            require_docstring: true,
        }
    }
}

impl Config {
    /// Create a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source file path.
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Restrict the run to the named functions.
    pub fn only(mut self, names: Vec<String>) -> Self {
        self.only = names;
        self
    }

    /// Set the model identifier.
    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the model context size.
    pub fn context(mut self, context: u32) -> Self {
        self.context = context;
        self
    }

    /// Set the model API base URL.
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set the prompt template file path.
    pub fn prompt_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompt_path = Some(path.into());
        self
    }

    /// Set the agent framework command.
    pub fn agent_command(mut self, command: impl Into<String>) -> Self {
        self.agent_command = command.into();
        self
    }

    /// Set the agent framework arguments.
    pub fn agent_args(mut self, args: Vec<String>) -> Self {
        self.agent_args = args;
        self
    }

    /// Set the agent framework arguments from a string (space-separated).
    pub fn agent_args_str(mut self, args: impl Into<String>) -> Self {
        self.agent_args = args.into().split_whitespace().map(String::from).collect();
        self
    }

    /// Set the agent run timeout in seconds.
    pub fn agent_timeout_secs(mut self, secs: u64) -> Self {
        self.agent_timeout_secs = secs;
        self
    }

    /// Choose whether `complete` requires an accepted docstring.
    pub fn require_docstring(mut self, required: bool) -> Self {
        self.require_docstring = required;
        self
    }

    /// Get a formatted display string for the agent command.
    ///
    /// Returns the command and arguments as they would appear on the command line.
    pub fn agent_display(&self) -> String {
        if self.agent_args.is_empty() {
            self.agent_command.clone()
        } else {
            format!("{} {}", self.agent_command, self.agent_args.join(" "))
        }
    }

    /// Check that the configuration can drive a run.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` naming the first unusable setting.
    pub fn validate(&self) -> Result<()> {
        if self.source_path.is_none() {
            return Err(Error::config_error("no source file configured"));
        }
        if self.model_id.trim().is_empty() {
            return Err(Error::config_error("no model configured"));
        }
        if self.context == 0 {
            return Err(Error::config_error("context size must be positive"));
        }
        if self.agent_command.trim().is_empty() {
            return Err(Error::config_error("no agent command configured"));
        }
        if self.agent_timeout_secs == 0 {
            return Err(Error::config_error("agent timeout must be positive"));
        }
        Ok(())
    }

    /// Load the configured prompt templates.
    ///
    /// # Errors
    ///
    /// Returns `Error::PromptRead` or `Error::PromptParse` if the template
    /// file cannot be used.
    pub fn prompt_templates(&self) -> Result<PromptTemplates> {
        match &self.prompt_path {
            Some(path) => PromptTemplates::load(path),
            None => PromptTemplates::packaged(),
        }
    }

    /// The configured model.
    pub fn model(&self) -> ModelHandle {
        create_model(&self.model_id, self.context, self.api_base.clone())
    }

    /// The configured agent framework bridge.
    pub fn framework(&self) -> ProcessFramework {
        ProcessFramework::new(
            &self.agent_command,
            self.agent_args.clone(),
            self.agent_timeout_secs,
        )
    }
}
