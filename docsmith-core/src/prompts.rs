//! Prompt templates for the documentation agent.
//!
//! Templates are YAML documents. The packaged default is compiled into the
//! crate; a file can replace it. Only `system_prompt` is required. Keys the
//! crate does not interpret are kept and handed to the agent framework as-is.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::python::PyFunction;

/// The packaged `code_agent.yaml`.
const PACKAGED: &str = include_str!("../prompts/code_agent.yaml");

/// Task used when a template file has no `task` key.
const DEFAULT_TASK: &str = "Write a Google-style docstring for the function `{{ function_name }}`.\n\n```python\n{{ code }}\n```";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Prompt templates handed to the agent framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplates {
    /// The system prompt. Framework placeholders are left for the framework.
    pub system_prompt: String,

    /// The per-function task template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Any other keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl PromptTemplates {
    /// The templates packaged with the crate.
    ///
    /// # Errors
    ///
    /// Returns `Error::PromptParse` if the packaged YAML is invalid.
    pub fn packaged() -> Result<Self> {
        Self::from_yaml(PACKAGED)
    }

    /// Parse templates from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::PromptParse` if the text is not valid YAML or lacks
    /// `system_prompt`.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|source| Error::PromptParse { source })
    }

    /// Load templates from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::PromptRead` if the file cannot be read and
    /// `Error::PromptParse` if its content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::PromptRead {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded prompt templates");
        Self::from_yaml(&text)
    }

    /// Render the problem statement for documenting `function`.
    ///
    /// `{{function_name}}` and `{{code}}` are substituted; other
    /// placeholders are left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsmith_core::prompts::PromptTemplates;
    /// use docsmith_core::python::parse_function;
    ///
    /// let templates = PromptTemplates::from_yaml(
    ///     "system_prompt: be brief\ntask: 'Document {{function_name}}: {{code}}'\n",
    /// )
    /// .unwrap();
    /// let func = parse_function("def f(x: int):\n    pass").unwrap();
    ///
    /// assert_eq!(
    ///     templates.render_task(&func),
    ///     "Document f: def f(x: int):\n    pass"
    /// );
    /// ```
    pub fn render_task(&self, function: &PyFunction) -> String {
        let template = self.task.as_deref().unwrap_or(DEFAULT_TASK);
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match &caps[1] {
                "function_name" => function.name.clone(),
                "code" => function.source.clone(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::parse_function;
    use std::io::Write;

    fn add() -> PyFunction {
        parse_function("def add(a: int, b: int) -> int:\n    return a + b\n").unwrap()
    }

    #[test]
    fn test_packaged_templates() {
        let templates = PromptTemplates::packaged().unwrap();
        assert!(templates.system_prompt.contains("docstring"));
        assert!(templates.task.is_some());
        assert!(templates.extra.contains_key("planning"));
        assert!(templates.extra.contains_key("final_answer"));
    }

    #[test]
    fn test_render_packaged_task() {
        let templates = PromptTemplates::packaged().unwrap();
        let task = templates.render_task(&add());
        assert!(task.contains("`add`"));
        assert!(task.contains("return a + b"));
        assert!(!task.contains("{{"));
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let templates =
            PromptTemplates::from_yaml("system_prompt: x\ntask: '{{ code }} {{ tools }}'\n")
                .unwrap();
        let task = templates.render_task(&add());
        assert!(task.ends_with(" {{ tools }}"));
    }

    #[test]
    fn test_render_without_task_uses_default() {
        let templates = PromptTemplates::from_yaml("system_prompt: x\n").unwrap();
        let task = templates.render_task(&add());
        assert!(task.starts_with("Write a Google-style docstring for the function `add`."));
    }

    #[test]
    fn test_missing_system_prompt() {
        let result = PromptTemplates::from_yaml("task: x\n");
        assert!(matches!(result, Err(Error::PromptParse { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "system_prompt: custom\nmanaged_agent:\n  task: nested").unwrap();

        let templates = PromptTemplates::load(file.path()).unwrap();
        assert_eq!(templates.system_prompt, "custom");
        assert!(templates.extra.contains_key("managed_agent"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = PromptTemplates::load("/nonexistent/prompts.yaml");
        assert!(matches!(result, Err(Error::PromptRead { .. })));
    }
}
