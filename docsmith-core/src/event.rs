//! Event system for docsmith runs.
//!
//! The runner and the agent bridge report progress through a channel of
//! [`Event`]s. Consumers such as the CLI print them as they arrive; the
//! run itself never depends on anyone listening.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Default channel buffer size.
const DEFAULT_CHANNEL_SIZE: usize = 100;

/// Events emitted while documenting a source file.
#[derive(Debug, Clone)]
pub enum Event {
    /// The run has started.
    Started {
        /// The source file being documented.
        source: String,
        /// Number of functions selected for documentation.
        functions: usize,
    },

    /// The agent is starting on a function.
    FunctionStarted {
        /// The function name.
        name: String,
        /// Position of the function in the run (1-indexed).
        index: usize,
        /// Number of functions in the run.
        total: usize,
    },

    /// Output from the agent framework (stdout or stderr).
    AgentOutput {
        /// The output text.
        text: String,
        /// Whether this is from stderr.
        is_stderr: bool,
    },

    /// The agent invoked a tool.
    ToolInvoked {
        /// The tool name.
        tool: String,
    },

    /// A tool call failed; the error goes back to the agent.
    ToolFailed {
        /// The tool name.
        tool: String,
        /// The error reported to the agent.
        message: String,
    },

    /// A terminal tool ended the agent turn.
    FinalAnswer {
        /// The tool that produced the answer.
        tool: String,
        /// The answer message.
        message: String,
    },

    /// The agent is done with a function.
    FunctionFinished {
        /// The function name.
        name: String,
        /// How the function ended up.
        status: FunctionStatus,
    },

    /// Warning message.
    Warning {
        /// The warning message.
        message: String,
    },

    /// Error message (non-fatal).
    Error {
        /// The error message.
        message: String,
    },

    /// Every selected function has been processed.
    Finished {
        /// Functions that received a docstring.
        documented: usize,
        /// Functions processed.
        total: usize,
    },

    /// The run was cancelled before processing every function.
    Cancelled {
        /// Functions processed before cancellation.
        processed: usize,
    },
}

/// Outcome of documenting one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionStatus {
    /// A docstring was accepted.
    Documented,
    /// The agent declared the task impossible.
    Impossible,
    /// The agent stopped without an accepted docstring.
    Incomplete,
    /// The agent run failed.
    Failed,
}

impl FunctionStatus {
    /// Check if the function ended up with a docstring.
    pub fn is_documented(&self) -> bool {
        matches!(self, FunctionStatus::Documented)
    }
}

/// Sender for events.
pub type EventSender = mpsc::Sender<Event>;

/// Receiver for events.
pub type EventReceiver = mpsc::Receiver<Event>;

/// Create a new event channel with the default buffer size.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

impl Event {
    /// Create a warning event with the given message.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }

    /// Create an error event with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Create an agent output event for stdout.
    pub fn agent_output(text: impl Into<String>) -> Self {
        Self::AgentOutput {
            text: text.into(),
            is_stderr: false,
        }
    }

    /// Create an agent output event for stderr.
    pub fn agent_stderr(text: impl Into<String>) -> Self {
        Self::AgentOutput {
            text: text.into(),
            is_stderr: true,
        }
    }
}

impl std::fmt::Display for FunctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionStatus::Documented => write!(f, "documented"),
            FunctionStatus::Impossible => write!(f, "impossible"),
            FunctionStatus::Incomplete => write!(f, "incomplete"),
            FunctionStatus::Failed => write!(f, "failed"),
        }
    }
}
