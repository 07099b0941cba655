//! docsmith core library
//!
//! This crate provides the core functionality for docsmith, an agent that
//! writes Google-style docstrings for Python functions: the Python function
//! loader, the docstring parser, the type-hint schema builder, the schema
//! reconciler, the agent's terminal tools, the agent framework bridge and
//! the runner that ties them together.

pub mod agent;
pub mod config;
pub mod docstring;
pub mod error;
pub mod event;
pub mod prompts;
pub mod python;
pub mod reconcile;
pub mod runner;
pub mod schema;
pub mod state;
pub mod tools;

pub use agent::process::ProcessFramework;
pub use agent::{
    create_model, make_agent, run_agent, AgentDefinition, AgentFramework, AgentRun, FinalAnswer,
    ModelHandle, ToolReply,
};
pub use config::Config;
pub use error::{Error, Result};
pub use event::{Event, EventReceiver, EventSender, FunctionStatus};
pub use prompts::PromptTemplates;
pub use python::{load_functions, parse_function, PyFunction, PyModule, SkippedFunction};
pub use reconcile::{reconcile, ReconciledSchema};
pub use runner::{FunctionReport, RunReport, Runner, RunnerHandle};
pub use schema::{function_schema, FunctionSchema, TypeSchema};
pub use state::TaskState;
pub use tools::{Tool, ToolCall, ToolOutcome, ToolSet, ToolSpec};
