//! Terminal tools offered to the documentation agent.
//!
//! Three tools end an agent turn: `docstring` records a docstring for the
//! function under documentation, `complete` declares the task done and
//! `impossible` gives up. Each returns [`ToolOutcome::FinalAnswer`] on
//! success; failures are returned as errors the agent can react to.
//!
//! Every tool describes itself with a Python-style handler signature and
//! docstring. The tool's [`ToolSpec`] is derived from that text with the
//! same reconciler used for the functions being documented.

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::python::parse_function;
use crate::reconcile::reconcile;
use crate::schema::{SchemaType, TypeSchema};
use crate::state::TaskState;

/// Name of the completion tool.
pub const COMPLETE: &str = "complete";

/// Name of the give-up tool.
pub const IMPOSSIBLE: &str = "impossible";

/// Name of the docstring tool.
pub const DOCSTRING: &str = "docstring";

const DEFAULT_COMPLETE_MESSAGE: &str = "Task was completed";
const DEFAULT_IMPOSSIBLE_MESSAGE: &str = "Task was impossible";
const DOCSTRING_ADDED: &str = "Added docstring";
const DOCSTRING_NOT_UPDATED: &str = "Docstring was not updated.  Use docstring() to update it.";

const COMPLETE_HANDLER: &str = r#"def complete(message: str = "Task was completed"):
    """
    Mark the solution as complete.

    Args:
        message: A completion message
    """
"#;

const IMPOSSIBLE_HANDLER: &str = r#"def impossible(message: str = "Task was impossible"):
    """
    Mark the solution as impossible

    Args:
        message: A message explaining why the task was impossible
    """
"#;

const DOCSTRING_HANDLER: &str = r#"def docstring(docstring: str, function: str = None):
    """
    Update the docstring for the function.

    Args:
        docstring: A string containing the docstring for the function.
        function: the name of the function.
    """
"#;

/// What a tool call means for the agent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The turn goes on.
    Continue,
    /// The turn is over, with this answer.
    FinalAnswer(String),
}

impl ToolOutcome {
    /// Check if the outcome ends the turn.
    pub fn is_final(&self) -> bool {
        matches!(self, ToolOutcome::FinalAnswer(_))
    }
}

/// A tool invocation requested by the agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    /// The tool name.
    pub name: String,

    /// Keyword arguments, as a JSON object.
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    /// Create a tool call.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Description of a tool's inputs and output, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// The tool name.
    pub name: String,

    /// What the tool does.
    pub description: String,

    /// Input schemas keyed by argument name, in declaration order.
    pub inputs: IndexMap<String, TypeSchema>,

    /// Arguments without defaults.
    pub required: Vec<String>,

    /// JSON type name of the output.
    pub output_type: String,
}

impl ToolSpec {
    /// Derive a spec from a handler's signature and docstring.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler text has no function, no docstring,
    /// or a docstring that does not describe every argument.
    pub fn from_handler(handler: &str) -> Result<Self> {
        let function = parse_function(handler)?;
        let docstring = function.docstring.as_deref().ok_or_else(|| {
            Error::docstring(format!("handler '{}' has no docstring", function.name))
        })?;
        let schema = reconcile(&function, docstring)?;

        let output_type = match &schema.returns.kind {
            Some(SchemaType::Single(kind)) => kind.as_str().to_string(),
            _ => "null".to_string(),
        };

        Ok(Self {
            name: function.name.clone(),
            description: schema.summary,
            inputs: schema.parameters,
            required: schema.required,
            output_type,
        })
    }

    /// The tool definition in function-calling JSON form.
    pub fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": self.inputs,
                    "required": self.required,
                },
            },
            "output_type": self.output_type,
        })
    }
}

/// A named action the agent can invoke.
pub trait Tool: fmt::Debug + Send + Sync {
    /// The tool's description.
    fn spec(&self) -> &ToolSpec;

    /// The tool's name.
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Run the tool against the shared task state.
    fn forward(&self, state: &mut TaskState, args: &Map<String, Value>) -> Result<ToolOutcome>;
}

/// Marks the task complete, optionally only once a docstring was recorded.
#[derive(Debug)]
pub struct Complete {
    spec: ToolSpec,
    require_docstring: bool,
}

impl Complete {
    /// Create the completion tool.
    ///
    /// With `require_docstring`, completion fails until the `docstring`
    /// tool has recorded a docstring.
    pub fn new(require_docstring: bool) -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::from_handler(COMPLETE_HANDLER)?,
            require_docstring,
        })
    }
}

impl Tool for Complete {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn forward(&self, state: &mut TaskState, args: &Map<String, Value>) -> Result<ToolOutcome> {
        let message = optional_str(COMPLETE, args, "message")?.unwrap_or(DEFAULT_COMPLETE_MESSAGE);

        if self.require_docstring && !state.has_docstring() {
            return Err(Error::precondition(DOCSTRING_NOT_UPDATED));
        }

        Ok(ToolOutcome::FinalAnswer(message.to_string()))
    }
}

/// Gives up on the task.
#[derive(Debug)]
pub struct Impossible {
    spec: ToolSpec,
}

impl Impossible {
    /// Create the give-up tool.
    pub fn new() -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::from_handler(IMPOSSIBLE_HANDLER)?,
        })
    }
}

impl Tool for Impossible {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn forward(&self, _state: &mut TaskState, args: &Map<String, Value>) -> Result<ToolOutcome> {
        let message =
            optional_str(IMPOSSIBLE, args, "message")?.unwrap_or(DEFAULT_IMPOSSIBLE_MESSAGE);
        Ok(ToolOutcome::FinalAnswer(message.to_string()))
    }
}

/// Records a docstring after checking it against the function's type hints.
#[derive(Debug)]
pub struct DocString {
    spec: ToolSpec,
}

impl DocString {
    /// Create the docstring tool.
    pub fn new() -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::from_handler(DOCSTRING_HANDLER)?,
        })
    }
}

impl Tool for DocString {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn forward(&self, state: &mut TaskState, args: &Map<String, Value>) -> Result<ToolOutcome> {
        let docstring = required_str(DOCSTRING, args, "docstring")?;
        if let Some(name) = optional_str(DOCSTRING, args, "function")? {
            if name != state.function.name {
                warn!(
                    requested = name,
                    function = %state.function.name,
                    "docstring tool called for a different function"
                );
            }
        }

        let schema = reconcile(&state.function, docstring)?;
        state.accept(docstring, schema);

        Ok(ToolOutcome::FinalAnswer(DOCSTRING_ADDED.to_string()))
    }
}

/// The tools offered to one agent.
#[derive(Debug)]
pub struct ToolSet {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolSet {
    /// Create the `complete`, `impossible` and `docstring` tools.
    pub fn new(require_docstring: bool) -> Result<Self> {
        Ok(Self {
            tools: vec![
                Box::new(Complete::new(require_docstring)?),
                Box::new(Impossible::new()?),
                Box::new(DocString::new()?),
            ],
        })
    }

    /// The default tool set: completion requires a recorded docstring.
    pub fn gated() -> Result<Self> {
        Self::new(true)
    }

    /// A tool set whose completion never checks for a docstring.
    pub fn ungated() -> Result<Self> {
        Self::new(false)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tool definitions in function-calling JSON form.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.spec().definition()).collect()
    }

    /// Invoke the tool named by `call` against `state`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTool` for a name outside the set,
    /// `Error::InvalidArguments` if the arguments are not an object or hold
    /// an argument the tool does not declare, and whatever the tool returns.
    pub fn invoke(&self, call: &ToolCall, state: &mut TaskState) -> Result<ToolOutcome> {
        let tool = self.get(&call.name).ok_or_else(|| Error::UnknownTool {
            name: call.name.clone(),
        })?;

        let empty = Map::new();
        let args = match &call.arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(Error::invalid_arguments(
                    &call.name,
                    format!("expected an object, got {}", other),
                ))
            }
        };
        if let Some(unknown) = args.keys().find(|k| !tool.spec().inputs.contains_key(*k)) {
            return Err(Error::invalid_arguments(
                &call.name,
                format!("unexpected argument '{}'", unknown),
            ));
        }

        debug!(tool = %call.name, function = %state.function.name, "invoking tool");
        tool.forward(state, args)
    }
}

fn optional_str<'a>(tool: &str, args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::invalid_arguments(
            tool,
            format!("'{}' must be a string, got {}", key, other),
        )),
    }
}

fn required_str<'a>(tool: &str, args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    optional_str(tool, args, key)?
        .ok_or_else(|| Error::invalid_arguments(tool, format!("missing required argument '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::parse_function;

    const ADD_DOCSTRING: &str = "Adds two numbers.\n\nArgs:\n    a: first (choices: [\"1\", \"2\"])\n    b: second\n\nReturns:\n    the sum\n";

    fn add_state() -> TaskState {
        TaskState::new(parse_function("def add(a: int, b: int) -> int:\n    return a + b\n").unwrap())
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_tool_specs_from_handlers() {
        let tools = ToolSet::gated().unwrap();
        assert_eq!(tools.names(), vec![COMPLETE, IMPOSSIBLE, DOCSTRING]);

        let docstring = tools.get(DOCSTRING).unwrap().spec();
        assert_eq!(docstring.description, "Update the docstring for the function.");
        assert_eq!(docstring.required, vec!["docstring"]);
        assert_eq!(
            docstring.inputs["function"].description.as_deref(),
            Some("the name of the function.")
        );
        assert!(docstring.inputs["function"].nullable);
        assert_eq!(docstring.output_type, "null");

        let complete = tools.get(COMPLETE).unwrap().spec();
        assert_eq!(complete.description, "Mark the solution as complete.");
        assert!(complete.required.is_empty());
    }

    #[test]
    fn test_definitions_shape() {
        let tools = ToolSet::gated().unwrap();
        let definitions = tools.definitions();
        assert_eq!(definitions.len(), 3);
        assert_eq!(definitions[2]["function"]["name"], "docstring");
        assert_eq!(
            definitions[2]["function"]["parameters"]["properties"]["docstring"]["type"],
            "string"
        );
    }

    #[test]
    fn test_docstring_tool_records_state() {
        let tool = DocString::new().unwrap();
        let mut state = add_state();

        let outcome = tool
            .forward(&mut state, &args(json!({"docstring": ADD_DOCSTRING})))
            .unwrap();

        assert_eq!(outcome, ToolOutcome::FinalAnswer("Added docstring".to_string()));
        assert_eq!(state.docstring, ADD_DOCSTRING);
        let schema = state.schema.as_ref().unwrap();
        assert_eq!(schema.parameters["a"].description.as_deref(), Some("first"));
        assert_eq!(
            schema.parameters["a"].enum_values,
            Some(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(schema.returns.description.as_deref(), Some("the sum"));
    }

    #[test]
    fn test_docstring_tool_leaves_state_on_failure() {
        let tool = DocString::new().unwrap();
        let mut state = add_state();
        let before = state.clone();

        let result = tool.forward(
            &mut state,
            &args(json!({"docstring": "Adds.\n\nArgs:\n    a: first\n"})),
        );
        assert!(matches!(result, Err(Error::DocstringParsing { .. })));
        assert_eq!(state, before);

        let result = tool.forward(
            &mut state,
            &args(json!({"docstring": "Adds.\n\nArgs:\n    a: x (choices: [oops])\n    b: y\n"})),
        );
        assert!(matches!(result, Err(Error::InvalidChoices { .. })));
        assert_eq!(state, before);

        let outcome = tool
            .forward(&mut state, &args(json!({"docstring": ADD_DOCSTRING})))
            .unwrap();
        assert!(outcome.is_final());
        assert_eq!(state.docstring, ADD_DOCSTRING);
    }

    #[test]
    fn test_docstring_tool_requires_docstring_argument() {
        let tool = DocString::new().unwrap();
        let mut state = add_state();
        let result = tool.forward(&mut state, &args(json!({"function": "add"})));
        assert!(matches!(result, Err(Error::InvalidArguments { .. })));
    }

    #[test]
    fn test_gated_complete() {
        let tool = Complete::new(true).unwrap();
        let mut state = add_state();

        match tool.forward(&mut state, &Map::new()) {
            Err(Error::Precondition { message }) => {
                assert_eq!(message, "Docstring was not updated.  Use docstring() to update it.")
            }
            other => panic!("expected Precondition, got {:?}", other),
        }

        state.docstring = "Adds.".to_string();
        let outcome = tool.forward(&mut state, &Map::new()).unwrap();
        assert_eq!(outcome, ToolOutcome::FinalAnswer("Task was completed".to_string()));
    }

    #[test]
    fn test_ungated_complete() {
        let tool = Complete::new(false).unwrap();
        let mut state = add_state();
        let outcome = tool
            .forward(&mut state, &args(json!({"message": "all done"})))
            .unwrap();
        assert_eq!(outcome, ToolOutcome::FinalAnswer("all done".to_string()));
    }

    #[test]
    fn test_impossible() {
        let tool = Impossible::new().unwrap();
        let mut state = add_state();

        let outcome = tool
            .forward(&mut state, &args(json!({"message": "no can do"})))
            .unwrap();
        assert_eq!(outcome, ToolOutcome::FinalAnswer("no can do".to_string()));

        state.docstring = "Adds.".to_string();
        let outcome = tool.forward(&mut state, &Map::new()).unwrap();
        assert_eq!(outcome, ToolOutcome::FinalAnswer("Task was impossible".to_string()));
    }

    #[test]
    fn test_invoke_validates_calls() {
        let tools = ToolSet::gated().unwrap();
        let mut state = add_state();

        let result = tools.invoke(&ToolCall::new("explode", Value::Null), &mut state);
        assert!(matches!(result, Err(Error::UnknownTool { .. })));

        let result = tools.invoke(&ToolCall::new(IMPOSSIBLE, json!("nope")), &mut state);
        assert!(matches!(result, Err(Error::InvalidArguments { .. })));

        let result = tools.invoke(
            &ToolCall::new(IMPOSSIBLE, json!({"reason": "x"})),
            &mut state,
        );
        assert!(matches!(result, Err(Error::InvalidArguments { .. })));

        let result = tools.invoke(&ToolCall::new(IMPOSSIBLE, json!({"message": 3})), &mut state);
        assert!(matches!(result, Err(Error::InvalidArguments { .. })));

        let outcome = tools
            .invoke(&ToolCall::new(IMPOSSIBLE, Value::Null), &mut state)
            .unwrap();
        assert_eq!(outcome, ToolOutcome::FinalAnswer("Task was impossible".to_string()));
    }

    #[test]
    fn test_invoke_docstring_then_complete() {
        let tools = ToolSet::gated().unwrap();
        let mut state = add_state();

        assert!(tools
            .invoke(&ToolCall::new(COMPLETE, json!({})), &mut state)
            .is_err());

        tools
            .invoke(
                &ToolCall::new(DOCSTRING, json!({"docstring": ADD_DOCSTRING, "function": "add"})),
                &mut state,
            )
            .unwrap();

        let outcome = tools
            .invoke(&ToolCall::new(COMPLETE, json!({})), &mut state)
            .unwrap();
        assert_eq!(outcome, ToolOutcome::FinalAnswer("Task was completed".to_string()));
    }
}
