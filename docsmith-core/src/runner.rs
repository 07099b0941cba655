//! Documentation runner.
//!
//! This module provides the `Runner` struct that documents every selected
//! function of a Python source file, one agent run per function, and
//! collects the results into a serializable [`RunReport`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::agent::{make_agent, AgentDefinition, AgentFramework, AgentRun};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{channel, Event, EventReceiver, EventSender, FunctionStatus};
use crate::python::{load_functions, PyFunction};
use crate::reconcile::ReconciledSchema;
use crate::state::TaskState;
use crate::tools::{ToolSet, IMPOSSIBLE};

/// The runner that documents a source file.
#[derive(Debug)]
pub struct Runner {
    /// Configuration for the runner.
    config: Config,
    /// Event sender for communicating with consumers.
    events: EventSender,
    /// Shared cancellation flag.
    cancel_flag: Arc<AtomicBool>,
}

/// Handle for controlling a running runner instance.
///
/// This handle can be used to cancel the runner from another task or thread.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    /// Shared cancellation flag.
    cancel_flag: Arc<AtomicBool>,
}

impl RunnerHandle {
    /// Signal the runner to stop before the next function.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}

/// The result of documenting one function.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionReport {
    /// The function name.
    pub name: String,
    /// Line of the function's `def`.
    pub lineno: usize,
    /// How the function ended up.
    pub status: FunctionStatus,
    /// The final answer, or the error for failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The accepted docstring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Schema of the accepted docstring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<ReconciledSchema>,
    /// Number of tool calls the agent made.
    pub tool_calls: usize,
    /// Number of those calls that failed.
    pub failed_tool_calls: usize,
    /// Duration of the agent run in seconds.
    pub duration_secs: f64,
}

/// The result of a documentation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The documented source file.
    pub source: PathBuf,
    /// The model identifier used.
    pub model: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Whether the run was cancelled before processing every function.
    pub cancelled: bool,
    /// Per-function results in source order.
    pub functions: Vec<FunctionReport>,
}

impl RunReport {
    /// Number of functions that received a docstring.
    pub fn documented(&self) -> usize {
        self.functions
            .iter()
            .filter(|f| f.status.is_documented())
            .count()
    }

    /// Check if every processed function received a docstring.
    pub fn all_documented(&self) -> bool {
        !self.cancelled && self.documented() == self.functions.len()
    }

    /// Get the report for a function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionReport> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl Runner {
    /// Create a new runner with the given configuration.
    ///
    /// Returns a tuple of (Runner, EventReceiver, RunnerHandle).
    /// - The `Runner` documents the configured source file.
    /// - The `EventReceiver` can be used to receive events from the runner.
    /// - The `RunnerHandle` can be used to cancel the runner.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsmith_core::{Config, runner::Runner};
    ///
    /// let config = Config::new().source_path("lib.py").model_id("ollama/llama3");
    /// let (runner, events, handle) = Runner::new(config);
    ///
    /// // The handle can be cloned and sent to another task
    /// let handle_clone = handle.clone();
    /// ```
    pub fn new(config: Config) -> (Self, EventReceiver, RunnerHandle) {
        let (tx, rx) = channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let runner = Self {
            config,
            events: tx,
            cancel_flag: cancel_flag.clone(),
        };

        let handle = RunnerHandle { cancel_flag };

        (runner, rx, handle)
    }

    /// Check if cancellation has been requested.
    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Document the selected functions of the source file.
    ///
    /// Each function gets a fresh [`TaskState`] and one agent run through
    /// `framework`. A failed run is recorded in the report and the runner
    /// moves on to the next function.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the source file or
    /// prompt templates cannot be loaded, or the agent command does not
    /// exist.
    pub async fn run(&self, framework: &dyn AgentFramework) -> Result<RunReport> {
        self.config.validate()?;
        let source = self
            .config
            .source_path
            .clone()
            .ok_or_else(|| Error::config_error("no source file configured"))?;

        let started_at = Utc::now();
        let module = load_functions(&source)?;
        for skipped in &module.skipped {
            let _ = self.events.send(Event::warning(skipped.to_string())).await;
        }
        let functions = self.select(module.functions).await;

        let agent = make_agent(
            ToolSet::new(self.config.require_docstring)?,
            self.config.model(),
            self.config.prompt_templates()?,
        );

        let _ = self
            .events
            .send(Event::Started {
                source: source.display().to_string(),
                functions: functions.len(),
            })
            .await;

        let total = functions.len();
        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;

        for (i, function) in functions.into_iter().enumerate() {
            if self.is_cancelled() {
                cancelled = true;
                let _ = self
                    .events
                    .send(Event::Cancelled {
                        processed: reports.len(),
                    })
                    .await;
                break;
            }

            let _ = self
                .events
                .send(Event::FunctionStarted {
                    name: function.name.clone(),
                    index: i + 1,
                    total,
                })
                .await;

            let report = self.document(framework, &agent, function).await?;
            info!(function = %report.name, status = %report.status, "function processed");
            let _ = self
                .events
                .send(Event::FunctionFinished {
                    name: report.name.clone(),
                    status: report.status,
                })
                .await;
            reports.push(report);
        }

        let report = RunReport {
            source,
            model: self.config.model_id.clone(),
            started_at,
            finished_at: Utc::now(),
            cancelled,
            functions: reports,
        };

        if !cancelled {
            let _ = self
                .events
                .send(Event::Finished {
                    documented: report.documented(),
                    total: report.functions.len(),
                })
                .await;
        }

        Ok(report)
    }

    /// Apply the `only` filter, warning about names that match nothing.
    async fn select(&self, functions: Vec<PyFunction>) -> Vec<PyFunction> {
        if self.config.only.is_empty() {
            return functions;
        }

        for name in &self.config.only {
            if !functions.iter().any(|f| &f.name == name) {
                let _ = self
                    .events
                    .send(Event::warning(format!(
                        "function '{}' not found in source file",
                        name
                    )))
                    .await;
            }
        }

        functions
            .into_iter()
            .filter(|f| self.config.only.contains(&f.name))
            .collect()
    }

    /// Run the agent on one function and classify the result.
    async fn document(
        &self,
        framework: &dyn AgentFramework,
        agent: &AgentDefinition,
        function: PyFunction,
    ) -> Result<FunctionReport> {
        let name = function.name.clone();
        let lineno = function.lineno;
        let problem = agent.templates().render_task(&function);
        let mut state = TaskState::new(function);
        let start = Instant::now();

        let run = match framework.run(agent, &problem, &mut state, &self.events).await {
            Ok(run) => run,
            Err(e @ Error::AgentNotFound { .. }) => {
                let _ = self.events.send(Event::error(e.to_string())).await;
                return Err(e);
            }
            Err(e) if state.has_docstring() => {
                let _ = self
                    .events
                    .send(Event::warning(format!(
                        "agent failed on '{}' after its docstring was accepted: {}",
                        name, e
                    )))
                    .await;
                return Ok(FunctionReport {
                    name,
                    lineno,
                    status: FunctionStatus::Documented,
                    message: Some(e.to_string()),
                    docstring: Some(state.docstring),
                    schema: state.schema,
                    tool_calls: 0,
                    failed_tool_calls: 0,
                    duration_secs: start.elapsed().as_secs_f64(),
                });
            }
            Err(e) => {
                let _ = self
                    .events
                    .send(Event::error(format!("agent failed on '{}': {}", name, e)))
                    .await;
                return Ok(FunctionReport {
                    name,
                    lineno,
                    status: FunctionStatus::Failed,
                    message: Some(e.to_string()),
                    docstring: None,
                    schema: None,
                    tool_calls: 0,
                    failed_tool_calls: 0,
                    duration_secs: start.elapsed().as_secs_f64(),
                });
            }
        };

        let status = classify(&run, &state);
        let duration_secs = if run.duration_secs > 0.0 {
            run.duration_secs
        } else {
            start.elapsed().as_secs_f64()
        };
        let docstring = state.has_docstring().then(|| state.docstring.clone());

        Ok(FunctionReport {
            name,
            lineno,
            status,
            message: run.final_answer.map(|a| a.message),
            docstring,
            schema: state.schema,
            tool_calls: run.tool_calls,
            failed_tool_calls: run.failed_tool_calls,
            duration_secs,
        })
    }
}

fn classify(run: &AgentRun, state: &TaskState) -> FunctionStatus {
    if state.has_docstring() {
        FunctionStatus::Documented
    } else if run.final_tool() == Some(IMPOSSIBLE) {
        FunctionStatus::Impossible
    } else {
        FunctionStatus::Incomplete
    }
}
