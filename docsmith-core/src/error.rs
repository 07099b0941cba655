//! Error types for docsmith.
//!
//! This module provides a unified error type for all operations in the
//! docsmith-core library, including docstring parsing, schema building,
//! tool invocation, prompt loading, and the agent framework bridge.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for docsmith-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The docstring is malformed or leaves a parameter undocumented.
    #[error("{message}")]
    DocstringParsing {
        /// Description of what is wrong with the docstring.
        message: String,
    },

    /// A type annotation is missing or cannot be turned into a schema.
    #[error("{message}")]
    TypeHintParsing {
        /// Description of the offending annotation.
        message: String,
    },

    /// A `(choices: [...])` marker does not hold a JSON array of strings.
    #[error("invalid choices for argument '{argument}' in '{function}': {source}")]
    InvalidChoices {
        /// The function being documented.
        function: String,
        /// The argument whose description carries the marker.
        argument: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A tool was called before its precondition held.
    #[error("{message}")]
    Precondition {
        /// Description of the unmet precondition.
        message: String,
    },

    /// The agent asked for a tool that is not in the tool set.
    #[error("unknown tool: '{name}'")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// Tool arguments did not match the tool's inputs.
    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments {
        /// The tool being invoked.
        tool: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The source file is not a Python file.
    #[error("expected a python source file, got '{path}'")]
    UnsupportedSource {
        /// The rejected path.
        path: PathBuf,
    },

    /// Failed to read a source file from disk.
    #[error("failed to read source file '{path}': {source}")]
    SourceRead {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The source file could not be split into function definitions.
    #[error("failed to parse python source: {message}")]
    SourceParse {
        /// Description of the unparseable construct.
        message: String,
    },

    /// Failed to read the prompt template file from disk.
    #[error("failed to read prompt templates '{path}': {source}")]
    PromptRead {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the prompt template YAML.
    #[error("failed to parse prompt templates: {source}")]
    PromptParse {
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The agent framework process encountered an error during execution.
    #[error("agent execution failed: {message}")]
    AgentError {
        /// Description of what went wrong.
        message: String,
    },

    /// The configured agent framework command was not found.
    #[error("agent command not found: '{command}'")]
    AgentNotFound {
        /// The command that was not found.
        command: String,
    },

    /// The agent run exceeded its timeout.
    #[error("agent timed out after {timeout_secs} seconds")]
    AgentTimeout {
        /// The timeout that was exceeded.
        timeout_secs: u64,
    },

    /// The agent framework sent a message the bridge cannot interpret.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the bad message.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem.
        message: String,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new `DocstringParsing` error with the given message.
    pub fn docstring(message: impl Into<String>) -> Self {
        Self::DocstringParsing {
            message: message.into(),
        }
    }

    /// Create a new `TypeHintParsing` error with the given message.
    pub fn type_hint(message: impl Into<String>) -> Self {
        Self::TypeHintParsing {
            message: message.into(),
        }
    }

    /// Create a new `SourceParse` error with the given message.
    pub fn source_parse(message: impl Into<String>) -> Self {
        Self::SourceParse {
            message: message.into(),
        }
    }

    /// Create a new `Precondition` error with the given message.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Create a new `InvalidArguments` error for the given tool.
    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a new `AgentError` with the given message.
    pub fn agent_error(message: impl Into<String>) -> Self {
        Self::AgentError {
            message: message.into(),
        }
    }

    /// Create a new `Protocol` error with the given message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new `ConfigError` with the given message.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Whether the agent may recover from this error by calling the tool again.
    ///
    /// Recoverable errors are reported back to the agent as failed tool
    /// results instead of ending the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DocstringParsing { .. }
                | Error::TypeHintParsing { .. }
                | Error::InvalidChoices { .. }
                | Error::Precondition { .. }
                | Error::UnknownTool { .. }
                | Error::InvalidArguments { .. }
        )
    }
}

/// A specialized `Result` type for docsmith-core operations.
pub type Result<T> = std::result::Result<T, Error>;
