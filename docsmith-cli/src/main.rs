//! docsmith CLI - Write Google-style docstrings for Python functions with an LLM agent.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use docsmith_core::event::{Event, EventReceiver};
use docsmith_core::python::load_functions;
use docsmith_core::schema::function_schema;
use docsmith_core::{Config, RunReport, Runner, ToolSet};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

/// docsmith - Document Python functions with a tool-using LLM agent.
///
/// docsmith runs an agent on every top-level function of a Python file.
/// The agent proposes a docstring, which is checked against the function's
/// type hints before it is accepted.
#[derive(Parser, Debug)]
#[command(name = "docsmith")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Python source file to document.
    #[arg(value_name = "FILE", required_unless_present = "tools")]
    pub file: Option<PathBuf>,

    /// Model identifier passed to the agent framework.
    #[arg(short = 'm', long = "model", env = "DOCSMITH_MODEL")]
    pub model: Option<String>,

    /// Model context size in tokens.
    #[arg(long = "context", default_value = "8192")]
    pub context: u32,

    /// Base URL of the model API.
    #[arg(long = "api-base", env = "DOCSMITH_API_BASE")]
    pub api_base: Option<String>,

    /// Prompt template YAML file to use instead of the packaged one.
    #[arg(long = "prompts", value_name = "YAML")]
    pub prompts: Option<PathBuf>,

    /// Agent framework command to run.
    ///
    /// The command receives a run request on stdin and calls docsmith's
    /// tools by writing JSON lines to stdout.
    #[arg(
        short = 'a',
        long = "agent",
        default_value = "docsmith-agent",
        env = "DOCSMITH_AGENT"
    )]
    pub agent: String,

    /// Arguments to pass to the agent command (space-separated).
    #[arg(long = "agent-args", default_value = "", allow_hyphen_values = true)]
    pub agent_args: String,

    /// Timeout in seconds for one agent run.
    #[arg(long = "timeout", default_value = "600")]
    pub timeout: u64,

    /// Only document this function (repeatable).
    #[arg(short = 'f', long = "function", value_name = "NAME")]
    pub functions: Vec<String>,

    /// Let `complete` succeed without an accepted docstring.
    #[arg(long = "ungated")]
    pub ungated: bool,

    /// Print each function's type-hint schema and exit.
    #[arg(long = "schema", conflicts_with = "tools")]
    pub schema: bool,

    /// Print the tool definitions and exit.
    #[arg(long = "tools")]
    pub tools: bool,

    /// Print the run report as JSON.
    #[arg(long = "json")]
    pub json: bool,

    /// Enable verbose output.
    ///
    /// Streams agent output and enables debug logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Convert CLI arguments to a Config.
    pub fn to_config(&self) -> Config {
        let mut config = Config::new()
            .only(self.functions.clone())
            .context(self.context)
            .agent_command(&self.agent)
            .agent_args_str(&self.agent_args)
            .agent_timeout_secs(self.timeout)
            .require_docstring(!self.ungated);

        if let Some(ref path) = self.file {
            config = config.source_path(path);
        }

        if let Some(ref model) = self.model {
            config = config.model_id(model);
        }

        if let Some(ref api_base) = self.api_base {
            config = config.api_base(api_base);
        }

        if let Some(ref path) = self.prompts {
            config = config.prompt_path(path);
        }

        config
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.tools {
        let tools = ToolSet::new(!cli.ungated).context("failed to build tool set")?;
        println!("{}", serde_json::to_string_pretty(&tools.definitions())?);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.schema {
        return print_schemas(&cli);
    }

    let config = cli.to_config();
    tracing::debug!(agent = %config.agent_display(), "starting run");

    let framework = config.framework();
    let (runner, events, handle) = Runner::new(config);

    let printer = tokio::spawn(print_events(events, cli.verbose));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling after the current function...");
            handle.cancel();
        }
    });

    let result = runner.run(&framework).await;
    drop(runner);
    let _ = printer.await;

    let report = result.context("documentation run failed")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.all_documented() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Print the type-hint schema of each selected function as one JSON object.
fn print_schemas(cli: &Cli) -> Result<ExitCode> {
    let path = cli.file.as_ref().context("no source file given")?;
    let module = load_functions(path)
        .with_context(|| format!("failed to load '{}'", path.display()))?;

    let mut schemas = Map::new();
    let mut ok = true;
    for function in &module.functions {
        if !cli.functions.is_empty() && !cli.functions.contains(&function.name) {
            continue;
        }
        let value = match function_schema(function) {
            Ok(schema) => serde_json::to_value(&schema)?,
            Err(e) => {
                ok = false;
                json!({ "error": e.to_string() })
            }
        };
        schemas.insert(function.name.clone(), value);
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(schemas))?);
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn print_events(mut events: EventReceiver, verbose: bool) {
    while let Some(event) = events.recv().await {
        match event {
            Event::Started { source, functions } => {
                eprintln!("documenting {} function(s) in {}", functions, source);
            }
            Event::FunctionStarted { name, index, total } => {
                eprintln!("[{}/{}] {}", index, total, name);
            }
            Event::AgentOutput { text, is_stderr } => {
                if verbose {
                    if is_stderr {
                        eprintln!("  ! {}", text);
                    } else {
                        eprintln!("  | {}", text);
                    }
                }
            }
            Event::ToolInvoked { tool } => {
                if verbose {
                    eprintln!("  -> {}", tool);
                }
            }
            Event::ToolFailed { tool, message } => {
                eprintln!("  {} failed: {}", tool, message);
            }
            Event::FinalAnswer { tool, message } => {
                eprintln!("  {}: {}", tool, message);
            }
            Event::FunctionFinished { name, status } => {
                eprintln!("  {} {}", name, status);
            }
            Event::Warning { message } => eprintln!("warning: {}", message),
            Event::Error { message } => eprintln!("error: {}", message),
            Event::Finished { documented, total } => {
                eprintln!("documented {}/{} function(s)", documented, total);
            }
            Event::Cancelled { processed } => {
                eprintln!("cancelled after {} function(s)", processed);
            }
        }
    }
}

fn print_report(report: &RunReport) {
    for function in &report.functions {
        println!("# {} (line {}): {}", function.name, function.lineno, function.status);
        if let Some(docstring) = &function.docstring {
            println!("\"\"\"");
            println!("{}", docstring);
            println!("\"\"\"");
        } else if let Some(message) = &function.message {
            println!("{}", message);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_to_config() {
        let cli = Cli::parse_from([
            "docsmith",
            "lib.py",
            "-m",
            "ollama/llama3",
            "--agent-args",
            "--stdio --quiet",
            "-f",
            "add",
            "-f",
            "divide",
            "--ungated",
        ]);
        let config = cli.to_config();

        assert_eq!(config.source_path, Some(PathBuf::from("lib.py")));
        assert_eq!(config.model_id, "ollama/llama3");
        assert_eq!(config.agent_args, vec!["--stdio", "--quiet"]);
        assert_eq!(config.only, vec!["add", "divide"]);
        assert!(!config.require_docstring);
        assert_eq!(config.context, 8192);
        assert_eq!(config.agent_timeout_secs, 600);
    }

    #[test]
    fn test_cli_tools_without_file() {
        let cli = Cli::try_parse_from(["docsmith", "--tools"]).unwrap();
        assert!(cli.tools);
        assert!(cli.file.is_none());
    }

    #[test]
    fn test_cli_requires_file() {
        assert!(Cli::try_parse_from(["docsmith"]).is_err());
    }

    #[test]
    fn test_cli_schema_conflicts_with_tools() {
        assert!(Cli::try_parse_from(["docsmith", "lib.py", "--schema", "--tools"]).is_err());
    }
}
