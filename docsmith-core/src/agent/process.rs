//! Bridge to an agent framework running in a child process.
//!
//! The child receives one `run` request line on stdin and then drives the
//! conversation. Lines it writes to stdout are either JSON tool calls,
//!
//! ```text
//! {"type": "tool_call", "id": 1, "name": "docstring", "arguments": {"docstring": "..."}}
//! ```
//!
//! which are answered on stdin with a `tool_result` or `final_answer` line
//! carrying the same `id`, or anything else, which is streamed as agent
//! output. After a final answer stdin is closed and the child is expected
//! to exit.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{AgentDefinition, AgentFramework, AgentRun, FinalAnswer, ToolReply};
use crate::error::{Error, Result};
use crate::event::{Event, EventSender};
use crate::state::TaskState;
use crate::tools::ToolCall;

/// An agent framework reached through a child process.
#[derive(Debug, Clone)]
pub struct ProcessFramework {
    /// The command to run.
    command: String,
    /// Arguments to pass to the command.
    args: Vec<String>,
    /// Timeout in seconds for one agent run.
    timeout_secs: u64,
}

impl ProcessFramework {
    /// Create a bridge that runs `command` with `args` for each agent run.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsmith_core::agent::process::ProcessFramework;
    ///
    /// let framework = ProcessFramework::new("docsmith-agent", vec!["--stdio".to_string()], 600);
    /// assert_eq!(framework.command(), "docsmith-agent");
    /// ```
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            args,
            timeout_secs,
        }
    }

    /// Get the command this bridge will run.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Get the arguments this bridge will pass.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the run timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

#[async_trait]
impl AgentFramework for ProcessFramework {
    async fn run(
        &self,
        agent: &AgentDefinition,
        problem: &str,
        state: &mut TaskState,
        events: &EventSender,
    ) -> Result<AgentRun> {
        let start = Instant::now();
        let request = agent.run_request(problem)?;

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::AgentNotFound {
                    command: self.command.clone(),
                }
            } else {
                Error::AgentError {
                    message: format!("failed to spawn agent process: {}", e),
                }
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::agent_error("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::agent_error("failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::agent_error("failed to capture stderr"))?;

        let limit = Duration::from_secs(self.timeout_secs);
        let session = Session {
            agent,
            state,
            events,
            stdin: Some(stdin),
            run: AgentRun::default(),
        };

        let mut run = match timeout(limit, session.converse(&request, stdout, stderr)).await {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(e);
            }
            Err(_) => {
                let _ = child.kill().await;
                let _ = events
                    .send(Event::warning(format!(
                        "agent timed out after {} seconds",
                        self.timeout_secs
                    )))
                    .await;
                return Err(Error::AgentTimeout {
                    timeout_secs: self.timeout_secs,
                });
            }
        };

        let remaining = limit.saturating_sub(start.elapsed());
        run.exit_code = match timeout(remaining, child.wait()).await {
            Ok(Ok(status)) => status.code(),
            Ok(Err(e)) => {
                return Err(Error::AgentError {
                    message: format!("wait failed: {}", e),
                })
            }
            // The turn already ended; a process that lingers after it is killed.
            Err(_) if run.final_answer.is_some() => {
                let _ = child.kill().await;
                warn!(
                    timeout_secs = self.timeout_secs,
                    "agent did not exit after its final answer"
                );
                None
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(Error::AgentTimeout {
                    timeout_secs: self.timeout_secs,
                });
            }
        };

        run.duration_secs = start.elapsed().as_secs_f64();
        debug!(
            exit_code = ?run.exit_code,
            tool_calls = run.tool_calls,
            duration_secs = run.duration_secs,
            "agent process finished"
        );
        Ok(run)
    }
}

/// One conversation with a running agent process.
struct Session<'a> {
    agent: &'a AgentDefinition,
    state: &'a mut TaskState,
    events: &'a EventSender,
    stdin: Option<ChildStdin>,
    run: AgentRun,
}

impl Session<'_> {
    /// Send the request, then service the child's output until it closes stdout.
    async fn converse(
        mut self,
        request: &Value,
        stdout: ChildStdout,
        stderr: ChildStderr,
    ) -> Result<AgentRun> {
        self.send(request).await?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();
        let mut stderr_open = true;

        loop {
            tokio::select! {
                line = stdout_reader.next_line() => {
                    match line {
                        Ok(Some(text)) => self.handle_line(&text).await?,
                        Ok(None) => {
                            // stdout closed; whatever is left on stderr is still output
                            while stderr_open {
                                match stderr_reader.next_line().await {
                                    Ok(Some(text)) => {
                                        let _ = self.events.send(Event::agent_stderr(text)).await;
                                    }
                                    _ => stderr_open = false,
                                }
                            }
                            break;
                        }
                        Err(e) => {
                            let _ = self.events.send(Event::error(format!("error reading stdout: {}", e))).await;
                            break;
                        }
                    }
                }
                line = stderr_reader.next_line(), if stderr_open => {
                    match line {
                        Ok(Some(text)) => {
                            let _ = self.events.send(Event::agent_stderr(text)).await;
                        }
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            stderr_open = false;
                            let _ = self.events.send(Event::error(format!("error reading stderr: {}", e))).await;
                        }
                    }
                }
            }
        }

        Ok(self.run)
    }

    async fn handle_line(&mut self, text: &str) -> Result<()> {
        let Some(message) = parse_tool_call(text) else {
            let _ = self.events.send(Event::agent_output(text)).await;
            return Ok(());
        };

        if self.stdin.is_none() {
            warn!(line = text, "tool call after final answer ignored");
            return Ok(());
        }

        self.run.tool_calls += 1;
        let (id, reply) = match message {
            Ok((id, call)) => (id, self.agent.dispatch(&call, self.state, self.events).await?),
            Err((id, e)) => {
                let content = format!("malformed tool call: {}", e);
                let _ = self
                    .events
                    .send(Event::ToolFailed {
                        tool: "tool_call".to_string(),
                        message: content.clone(),
                    })
                    .await;
                (id, ToolReply::ToolResult { ok: false, content })
            }
        };

        if matches!(reply, ToolReply::ToolResult { ok: false, .. }) {
            self.run.failed_tool_calls += 1;
        }

        let mut line = serde_json::to_value(&reply)
            .map_err(|e| Error::protocol(format!("cannot encode reply: {}", e)))?;
        if let (Some(id), Value::Object(map)) = (id, &mut line) {
            map.insert("id".to_string(), id);
        }
        self.send(&line).await?;

        if let ToolReply::FinalAnswer { tool, message } = reply {
            self.run.final_answer = Some(FinalAnswer { tool, message });
            self.stdin = None;
        }
        Ok(())
    }

    async fn send(&mut self, message: &Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::protocol("agent stdin is closed"))?;

        let mut line = message.to_string();
        line.push('\n');
        debug!(line = line.trim_end(), "sending to agent");

        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::agent_error(format!("failed to write to agent: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::agent_error(format!("failed to write to agent: {}", e)))
    }
}

type ParsedCall = std::result::Result<(Option<Value>, ToolCall), (Option<Value>, serde_json::Error)>;

/// Recognize a tool call line; `None` means the line is plain output.
fn parse_tool_call(text: &str) -> Option<ParsedCall> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let mut value: Value = serde_json::from_str(trimmed).ok()?;
    if value.get("type").and_then(Value::as_str) != Some("tool_call") {
        return None;
    }

    let id = value.as_object_mut().and_then(|m| m.remove("id"));
    Some(match serde_json::from_value::<ToolCall>(value) {
        Ok(call) => Ok((id, call)),
        Err(e) => Err((id, e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{create_model, make_agent, DEFAULT_CONTEXT};
    use crate::event::channel;
    use crate::prompts::PromptTemplates;
    use crate::python::parse_function;
    use crate::tools::ToolSet;
    use serde_json::json;

    fn agent() -> AgentDefinition {
        make_agent(
            ToolSet::gated().unwrap(),
            create_model("test-model", DEFAULT_CONTEXT, None),
            PromptTemplates::packaged().unwrap(),
        )
    }

    fn add_state() -> TaskState {
        TaskState::new(parse_function("def add(a: int, b: int) -> int:\n    return a + b\n").unwrap())
    }

    #[test]
    fn test_parse_tool_call() {
        assert!(parse_tool_call("thinking about it").is_none());
        assert!(parse_tool_call("{not json").is_none());
        assert!(parse_tool_call(r#"{"type": "log", "text": "hi"}"#).is_none());

        let parsed = parse_tool_call(
            r#"{"type": "tool_call", "id": 7, "name": "impossible", "arguments": {"message": "no"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.0, Some(json!(7)));
        assert_eq!(parsed.1.name, "impossible");
        assert_eq!(parsed.1.arguments, json!({"message": "no"}));

        let parsed = parse_tool_call(r#"{"type": "tool_call", "id": "a"}"#).unwrap();
        assert!(matches!(parsed, Err((Some(_), _))));
    }

    #[tokio::test]
    async fn test_run_not_found() {
        let framework = ProcessFramework::new("nonexistent-command-that-does-not-exist", vec![], 60);
        let mut state = add_state();
        let (tx, _rx) = channel();

        let result = framework.run(&agent(), "document add", &mut state, &tx).await;
        match result {
            Err(Error::AgentNotFound { command }) => {
                assert_eq!(command, "nonexistent-command-that-does-not-exist");
            }
            other => panic!("expected AgentNotFound error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plain_output_is_streamed() {
        let framework = ProcessFramework::new(
            "sh",
            vec![
                "-c".to_string(),
                "read request; echo 'stdout line'; echo 'stderr line' >&2".to_string(),
            ],
            60,
        );
        let mut state = add_state();
        let (tx, mut rx) = channel();

        let run = framework
            .run(&agent(), "document add", &mut state, &tx)
            .await
            .unwrap();
        assert!(run.final_answer.is_none());
        assert_eq!(run.tool_calls, 0);
        assert_eq!(run.exit_code, Some(0));

        drop(tx);
        let mut stdout_events = 0;
        let mut stderr_events = 0;
        while let Some(event) = rx.recv().await {
            if let Event::AgentOutput { is_stderr, .. } = event {
                if is_stderr {
                    stderr_events += 1;
                } else {
                    stdout_events += 1;
                }
            }
        }
        assert_eq!(stdout_events, 1);
        assert_eq!(stderr_events, 1);
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let framework = ProcessFramework::new("sh", vec!["-c".to_string(), "sleep 30".to_string()], 1);
        let mut state = add_state();
        let (tx, _rx) = channel();

        let result = framework.run(&agent(), "document add", &mut state, &tx).await;
        assert!(matches!(result, Err(Error::AgentTimeout { timeout_secs: 1 })));
    }

    #[tokio::test]
    async fn test_final_answer_survives_lingering_child() {
        let script = r#"read request
echo '{"type":"tool_call","id":1,"name":"docstring","arguments":{"docstring":"Add.\n\nArgs:\n    a: first\n    b: second\n"}}'
read reply
exec >&- 2>&-
sleep 5"#;
        let framework = ProcessFramework::new("sh", vec!["-c".to_string(), script.to_string()], 2);
        let mut state = add_state();
        let (tx, _rx) = channel();

        let run = framework
            .run(&agent(), "document add", &mut state, &tx)
            .await
            .unwrap();
        assert_eq!(run.final_tool(), Some("docstring"));
        assert_eq!(run.exit_code, None);
        assert!(state.has_docstring());
        assert!(state.schema.is_some());
    }
}
