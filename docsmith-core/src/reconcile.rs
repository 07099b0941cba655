//! Reconciling docstring text with type-hint schemas.
//!
//! The type hints of a function say what each parameter is; the docstring
//! says what it means. [`reconcile`] merges the two into one annotated
//! schema and refuses docstrings that leave a parameter undocumented.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::docstring::parse_google_docstring;
use crate::error::{Error, Result};
use crate::python::PyFunction;
use crate::schema::{function_schema, FunctionSchema, TypeSchema, RETURN_KEY};

/// A trailing `(choices: [...])` marker at the very end of a description.
static CHOICES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?i:choices):\s*(.*?)\)\s*$").expect("choices pattern is valid")
});

/// A function schema annotated with docstring text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledSchema {
    /// The function name.
    pub name: String,

    /// The docstring summary.
    pub summary: String,

    /// Parameter schemas with descriptions in declaration order, `"return"` excluded.
    pub parameters: IndexMap<String, TypeSchema>,

    /// Parameters the caller must supply.
    pub required: Vec<String>,

    /// The return-value schema; empty when the return is not annotated.
    pub returns: TypeSchema,
}

/// Merge a docstring into the type-hint schema of `function`.
///
/// Nothing is returned unless every parameter is described, so callers can
/// write the result into shared state all at once.
///
/// # Errors
///
/// Returns `Error::DocstringParsing` if the docstring is malformed or a
/// parameter has no description, `Error::TypeHintParsing` if the function's
/// annotations cannot be converted, and `Error::InvalidChoices` if a choices
/// marker does not hold a JSON array of strings.
///
/// # Examples
///
/// ```
/// use docsmith_core::python::parse_function;
/// use docsmith_core::reconcile::reconcile;
///
/// let add = parse_function("def add(a: int, b: int) -> int:\n    return a + b\n").unwrap();
/// let schema = reconcile(
///     &add,
///     "Adds two numbers.\n\nArgs:\n    a: first (choices: [\"1\", \"2\"])\n    b: second\n\nReturns:\n    the sum\n",
/// )
/// .unwrap();
///
/// assert_eq!(schema.parameters["a"].description.as_deref(), Some("first"));
/// assert_eq!(schema.parameters["a"].enum_values, Some(vec!["1".to_string(), "2".to_string()]));
/// assert_eq!(schema.returns.description.as_deref(), Some("the sum"));
/// ```
pub fn reconcile(function: &PyFunction, docstring: &str) -> Result<ReconciledSchema> {
    let parsed = parse_google_docstring(docstring)?;
    let FunctionSchema {
        mut properties,
        required,
        ..
    } = function_schema(function)?;

    // Templates often skip return documentation, so a missing description is fine.
    let returns = match properties.shift_remove(RETURN_KEY) {
        Some(mut schema) => {
            if let Some(description) = &parsed.returns {
                schema.description = Some(description.clone());
            }
            schema
        }
        None => TypeSchema::default(),
    };

    for (name, schema) in properties.iter_mut() {
        if name == "self" {
            continue;
        }

        let description = parsed.param(name).ok_or_else(|| {
            Error::docstring(format!(
                "Cannot generate JSON schema for {} because the docstring has no description for the argument '{}'",
                function.name, name
            ))
        })?;

        let (description, choices) =
            split_choices(description).map_err(|source| Error::InvalidChoices {
                function: function.name.clone(),
                argument: name.clone(),
                source,
            })?;
        if choices.is_some() {
            schema.enum_values = choices;
        }
        schema.description = Some(description);
    }

    Ok(ReconciledSchema {
        name: function.name.clone(),
        summary: parsed.summary,
        parameters: properties,
        required,
        returns,
    })
}

/// Split a trailing `(choices: [...])` marker off a description.
///
/// Returns the description without the marker and the parsed choices, or
/// the description unchanged when it does not end in a marker.
///
/// # Errors
///
/// Returns the JSON error if the marker's content is not an array of strings.
pub fn split_choices(
    description: &str,
) -> std::result::Result<(String, Option<Vec<String>>), serde_json::Error> {
    let Some(caps) = CHOICES.captures(description) else {
        return Ok((description.to_string(), None));
    };
    let (Some(marker), Some(list)) = (caps.get(0), caps.get(1)) else {
        return Ok((description.to_string(), None));
    };

    let choices: Vec<String> = serde_json::from_str(list.as_str())?;
    let choices = choices.iter().map(|c| c.trim().to_string()).collect();
    let description = description[..marker.start()].trim().to_string();

    Ok((description, Some(choices)))
}
