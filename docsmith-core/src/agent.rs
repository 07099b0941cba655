//! Agent construction and the agent framework seam.
//!
//! docsmith does not run a reasoning loop of its own. It describes an agent
//! (model, tools, prompt templates) as an [`AgentDefinition`] and hands it to
//! an [`AgentFramework`], which drives the model and calls back into the
//! tool set. [`process::ProcessFramework`] is the framework bridge used by
//! the CLI: it talks to an external agent runtime over stdin and stdout.

pub mod process;

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::{Event, EventSender};
use crate::prompts::PromptTemplates;
use crate::state::TaskState;
use crate::tools::{ToolCall, ToolOutcome, ToolSet};

/// Default model context size in tokens.
pub const DEFAULT_CONTEXT: u32 = 8192;

/// Verbosity level requested from the framework.
pub const VERBOSITY_LEVEL: u8 = 4;

/// Modules generated code may import.
pub const AUTHORIZED_IMPORTS: &[&str] = &["typing"];

/// The model an agent should use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHandle {
    /// The model identifier, as understood by the framework.
    pub model_id: String,

    /// Context size in tokens.
    pub num_ctx: u32,

    /// Base URL of the model API, if not the provider default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Describe a model for the framework.
///
/// # Examples
///
/// ```
/// use docsmith_core::agent::{create_model, DEFAULT_CONTEXT};
///
/// let model = create_model("ollama/llama3", DEFAULT_CONTEXT, None);
/// assert_eq!(model.num_ctx, 8192);
/// assert!(model.api_base.is_none());
/// ```
pub fn create_model(model_id: impl Into<String>, context: u32, api_base: Option<String>) -> ModelHandle {
    ModelHandle {
        model_id: model_id.into(),
        num_ctx: context,
        api_base,
    }
}

/// An agent bound to a tool set, a model and prompt templates.
#[derive(Debug)]
pub struct AgentDefinition {
    tools: ToolSet,
    model: ModelHandle,
    templates: PromptTemplates,
    verbosity_level: u8,
    authorized_imports: Vec<String>,
}

/// Build an agent from its parts.
pub fn make_agent(tools: ToolSet, model: ModelHandle, templates: PromptTemplates) -> AgentDefinition {
    AgentDefinition {
        tools,
        model,
        templates,
        verbosity_level: VERBOSITY_LEVEL,
        authorized_imports: AUTHORIZED_IMPORTS.iter().map(|s| s.to_string()).collect(),
    }
}

impl AgentDefinition {
    /// The agent's tools.
    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// The agent's model.
    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// The agent's prompt templates.
    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    /// The verbosity level requested from the framework.
    pub fn verbosity_level(&self) -> u8 {
        self.verbosity_level
    }

    /// Modules generated code may import.
    pub fn authorized_imports(&self) -> &[String] {
        &self.authorized_imports
    }

    /// The request that asks a framework to run this agent on `problem`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the prompt templates hold YAML that has
    /// no JSON form (non-string mapping keys, for instance).
    pub fn run_request(&self, problem: &str) -> Result<Value> {
        let templates = serde_json::to_value(&self.templates)
            .map_err(|e| Error::protocol(format!("cannot encode prompt templates: {}", e)))?;

        Ok(json!({
            "type": "run",
            "agent": {
                "model": self.model,
                "verbosity_level": self.verbosity_level,
                "authorized_imports": self.authorized_imports,
                "prompt_templates": templates,
            },
            "tools": self.tools.definitions(),
            "problem": problem,
            "stream": true,
        }))
    }

    /// Service one tool call from the framework.
    ///
    /// Tool failures are reported back as a failed [`ToolReply`] so the
    /// agent can correct itself.
    ///
    /// # Errors
    ///
    /// Returns the tool's error only if it is not recoverable.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        state: &mut TaskState,
        events: &EventSender,
    ) -> Result<ToolReply> {
        debug!(tool = %call.name, arguments = %call.arguments, "tool call");
        let _ = events
            .send(Event::ToolInvoked {
                tool: call.name.clone(),
            })
            .await;

        match self.tools.invoke(call, state) {
            Ok(ToolOutcome::FinalAnswer(message)) => {
                let _ = events
                    .send(Event::FinalAnswer {
                        tool: call.name.clone(),
                        message: message.clone(),
                    })
                    .await;
                Ok(ToolReply::FinalAnswer {
                    tool: call.name.clone(),
                    message,
                })
            }
            Ok(ToolOutcome::Continue) => Ok(ToolReply::ToolResult {
                ok: true,
                content: String::new(),
            }),
            Err(e) if e.is_recoverable() => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                let _ = events
                    .send(Event::ToolFailed {
                        tool: call.name.clone(),
                        message: e.to_string(),
                    })
                    .await;
                Ok(ToolReply::ToolResult {
                    ok: false,
                    content: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// The answer to a tool call, as sent back to the framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolReply {
    /// The turn goes on with this tool result.
    ToolResult {
        /// Whether the tool succeeded.
        ok: bool,
        /// The result, or the error message when `ok` is false.
        content: String,
    },
    /// The turn is over.
    FinalAnswer {
        /// The tool that ended the turn.
        tool: String,
        /// The answer message.
        message: String,
    },
}

impl ToolReply {
    /// Check if the reply ends the turn.
    pub fn is_final(&self) -> bool {
        matches!(self, ToolReply::FinalAnswer { .. })
    }
}

/// The final answer of an agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// The terminal tool that produced the answer.
    pub tool: String,
    /// The answer message.
    pub message: String,
}

/// Summary of one agent run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRun {
    /// The final answer, if a terminal tool ended the run.
    pub final_answer: Option<FinalAnswer>,
    /// Number of tool calls serviced.
    pub tool_calls: usize,
    /// Number of tool calls that failed.
    pub failed_tool_calls: usize,
    /// Exit code of the framework process, if there was one.
    pub exit_code: Option<i32>,
    /// Duration of the run in seconds.
    pub duration_secs: f64,
}

impl AgentRun {
    /// The name of the tool that ended the run.
    pub fn final_tool(&self) -> Option<&str> {
        self.final_answer.as_ref().map(|a| a.tool.as_str())
    }
}

/// Something that can run an agent to completion.
#[async_trait]
pub trait AgentFramework: Send + Sync {
    /// Run `agent` on `problem`, invoking its tools against `state`.
    async fn run(
        &self,
        agent: &AgentDefinition,
        problem: &str,
        state: &mut TaskState,
        events: &EventSender,
    ) -> Result<AgentRun>;
}

/// Build an agent and run it once on `problem`.
pub async fn run_agent(
    framework: &dyn AgentFramework,
    tools: ToolSet,
    model: ModelHandle,
    templates: PromptTemplates,
    problem: &str,
    state: &mut TaskState,
    events: &EventSender,
) -> Result<AgentRun> {
    let agent = make_agent(tools, model, templates);
    let start = Instant::now();
    let mut run = framework.run(&agent, problem, state, events).await?;
    if run.duration_secs == 0.0 {
        run.duration_secs = start.elapsed().as_secs_f64();
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::channel;
    use crate::python::parse_function;
    use crate::tools::{COMPLETE, DOCSTRING};

    const ADD_DOCSTRING: &str = "Adds two numbers.\n\nArgs:\n    a: first\n    b: second\n\nReturns:\n    the sum\n";

    fn add_state() -> TaskState {
        TaskState::new(parse_function("def add(a: int, b: int) -> int:\n    return a + b\n").unwrap())
    }

    fn agent() -> AgentDefinition {
        make_agent(
            ToolSet::gated().unwrap(),
            create_model("test-model", DEFAULT_CONTEXT, Some("http://localhost:11434".into())),
            PromptTemplates::packaged().unwrap(),
        )
    }

    /// Replays a fixed list of tool calls, stopping at the first final answer.
    struct Scripted(Vec<ToolCall>);

    #[async_trait]
    impl AgentFramework for Scripted {
        async fn run(
            &self,
            agent: &AgentDefinition,
            _problem: &str,
            state: &mut TaskState,
            events: &EventSender,
        ) -> Result<AgentRun> {
            let mut run = AgentRun::default();
            for call in &self.0 {
                run.tool_calls += 1;
                match agent.dispatch(call, state, events).await? {
                    ToolReply::FinalAnswer { tool, message } => {
                        run.final_answer = Some(FinalAnswer { tool, message });
                        break;
                    }
                    ToolReply::ToolResult { ok: false, .. } => run.failed_tool_calls += 1,
                    ToolReply::ToolResult { .. } => {}
                }
            }
            Ok(run)
        }
    }

    #[test]
    fn test_make_agent() {
        let agent = agent();
        assert_eq!(agent.verbosity_level(), 4);
        assert_eq!(agent.authorized_imports(), &["typing".to_string()]);
        assert_eq!(agent.model().model_id, "test-model");
        assert_eq!(agent.tools().names(), vec!["complete", "impossible", "docstring"]);
    }

    #[test]
    fn test_run_request() {
        let request = agent().run_request("document add").unwrap();
        assert_eq!(request["type"], "run");
        assert_eq!(request["problem"], "document add");
        assert_eq!(request["stream"], true);
        assert_eq!(request["agent"]["model"]["num_ctx"], 8192);
        assert_eq!(request["agent"]["model"]["api_base"], "http://localhost:11434");
        assert_eq!(request["agent"]["authorized_imports"][0], "typing");
        assert!(request["agent"]["prompt_templates"]["system_prompt"].is_string());
        assert_eq!(request["tools"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_tool_reply_wire_format() {
        let reply = ToolReply::ToolResult {
            ok: false,
            content: "bad".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "tool_result", "ok": false, "content": "bad"})
        );
        let reply = ToolReply::FinalAnswer {
            tool: "complete".to_string(),
            message: "done".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "final_answer", "tool": "complete", "message": "done"})
        );
    }

    #[tokio::test]
    async fn test_dispatch_reports_failures() {
        let agent = agent();
        let mut state = add_state();
        let (tx, mut rx) = channel();

        let reply = agent
            .dispatch(&ToolCall::new(COMPLETE, json!({})), &mut state, &tx)
            .await
            .unwrap();
        assert_eq!(
            reply,
            ToolReply::ToolResult {
                ok: false,
                content: "Docstring was not updated.  Use docstring() to update it.".to_string(),
            }
        );

        drop(tx);
        let mut failed = false;
        while let Some(event) = rx.recv().await {
            if let Event::ToolFailed { tool, .. } = event {
                assert_eq!(tool, COMPLETE);
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn test_run_agent_documents_function() {
        let framework = Scripted(vec![
            ToolCall::new(COMPLETE, json!({})),
            ToolCall::new(DOCSTRING, json!({"docstring": ADD_DOCSTRING})),
        ]);
        let mut state = add_state();
        let (tx, _rx) = channel();

        let run = run_agent(
            &framework,
            ToolSet::gated().unwrap(),
            create_model("test-model", DEFAULT_CONTEXT, None),
            PromptTemplates::packaged().unwrap(),
            "document add",
            &mut state,
            &tx,
        )
        .await
        .unwrap();

        assert_eq!(run.tool_calls, 2);
        assert_eq!(run.failed_tool_calls, 1);
        assert_eq!(run.final_tool(), Some(DOCSTRING));
        assert_eq!(state.docstring, ADD_DOCSTRING);
    }
}
