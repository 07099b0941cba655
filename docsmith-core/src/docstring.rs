//! Google-style docstring parsing.
//!
//! Splits a docstring into its summary, the per-argument descriptions of the
//! `Args:` section and the text of the `Returns:` section. Every other
//! section (`Raises:`, `Examples:`, ...) is recognized so that it terminates
//! the previous one, and is otherwise ignored.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::python::clean_doc;

/// One `name (type): description` line opening an argument entry.
static ARG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*{0,2}(?P<name>[A-Za-z_]\w*)\s*(?:\((?P<type>[^)]*)\))?\s*:\s*(?P<desc>.*)$")
        .expect("argument line pattern is valid")
});

/// A bare type prefix such as `int:` or `list[str]:` at the start of `Returns:`.
static RETURN_TYPE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][\w\[\].,|]*:\s*").expect("return prefix pattern is valid")
});

/// A docstring split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocstring {
    /// Everything before the first section header.
    pub summary: String,

    /// Argument descriptions keyed by argument name.
    pub params: BTreeMap<String, String>,

    /// The `Returns:` text, if the section is present and not empty.
    pub returns: Option<String>,
}

impl ParsedDocstring {
    /// Get the description of an argument.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Args,
    Returns,
    Other,
}

fn section_header(line: &str) -> Option<Section> {
    match line.trim() {
        "Args:" | "Arguments:" | "Parameters:" => Some(Section::Args),
        "Returns:" | "Return:" => Some(Section::Returns),
        "Yields:" | "Raises:" | "Examples:" | "Example:" | "Note:" | "Notes:" => {
            Some(Section::Other)
        }
        _ => None,
    }
}

/// Parse a Google-style docstring.
///
/// # Errors
///
/// Returns `Error::DocstringParsing` if a line of the `Args:` section at the
/// section's base indentation is not a `name: description` entry, or if an
/// argument is described twice.
///
/// # Examples
///
/// ```
/// use docsmith_core::docstring::parse_google_docstring;
///
/// let parsed = parse_google_docstring(
///     "Adds two numbers.\n\nArgs:\n    a: first\n    b: second\n\nReturns:\n    the sum\n",
/// )
/// .unwrap();
///
/// assert_eq!(parsed.summary, "Adds two numbers.");
/// assert_eq!(parsed.param("b"), Some("second"));
/// assert_eq!(parsed.returns.as_deref(), Some("the sum"));
/// ```
pub fn parse_google_docstring(text: &str) -> Result<ParsedDocstring> {
    let mut summary_lines = Vec::new();
    let mut arg_lines = Vec::new();
    let mut return_lines = Vec::new();
    let mut current: Option<Section> = None;

    for line in text.lines() {
        if let Some(section) = section_header(line) {
            current = Some(section);
            continue;
        }
        match current {
            None => summary_lines.push(line),
            Some(Section::Args) => arg_lines.push(line),
            Some(Section::Returns) => return_lines.push(line),
            Some(Section::Other) => {}
        }
    }

    Ok(ParsedDocstring {
        summary: clean_doc(&summary_lines.join("\n")).trim_end().to_string(),
        params: parse_args(&arg_lines)?,
        returns: parse_returns(&return_lines),
    })
}

fn parse_args(lines: &[&str]) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    let mut base_indent: Option<usize> = None;
    let mut entry: Option<(String, Vec<String>)> = None;

    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        let indent = line.len() - line.trim_start().len();
        let base = *base_indent.get_or_insert(indent);

        if indent > base {
            if let Some((_, parts)) = entry.as_mut() {
                parts.push(line.trim().to_string());
                continue;
            }
        }

        let caps = ARG_LINE.captures(line.trim()).ok_or_else(|| {
            Error::docstring(format!(
                "cannot parse argument entry '{}' in docstring",
                line.trim()
            ))
        })?;

        finish_entry(entry.take(), &mut params)?;
        entry = Some((caps["name"].to_string(), vec![caps["desc"].trim().to_string()]));
    }

    finish_entry(entry, &mut params)?;
    Ok(params)
}

fn finish_entry(
    entry: Option<(String, Vec<String>)>,
    params: &mut BTreeMap<String, String>,
) -> Result<()> {
    let Some((name, parts)) = entry else {
        return Ok(());
    };

    let description = parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    if params.insert(name.clone(), description).is_some() {
        return Err(Error::docstring(format!(
            "argument '{}' is described more than once",
            name
        )));
    }
    Ok(())
}

fn parse_returns(lines: &[&str]) -> Option<String> {
    let joined = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let text = RETURN_TYPE_PREFIX.replace(&joined, "").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
