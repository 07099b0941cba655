//! Loading Python functions from source files.
//!
//! This module reads a `.py` file and enumerates the functions defined at
//! its top level, recovering each function's signature (parameters, type
//! annotations, defaults, return annotation), its source text and its
//! existing docstring. Nothing is executed: the signature is read from the
//! source text, which is all the schema builder needs.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A loaded Python source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyModule {
    /// The module name (the file stem).
    pub name: String,

    /// The path the module was loaded from.
    pub path: PathBuf,

    /// The full source text.
    pub source: String,

    /// Top-level functions in definition order.
    pub functions: Vec<PyFunction>,

    /// Top-level definitions whose signature could not be read.
    pub skipped: Vec<SkippedFunction>,
}

impl PyModule {
    /// Get a function by name.
    pub fn function(&self, name: &str) -> Option<&PyFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A top-level `def` the loader could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFunction {
    /// The 1-based line of the `def`.
    pub lineno: usize,

    /// Why the definition was skipped.
    pub reason: String,
}

impl std::fmt::Display for SkippedFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skipped function on line {}: {}", self.lineno, self.reason)
    }
}

/// A function definition recovered from source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyFunction {
    /// The function name.
    pub name: String,

    /// Whether the function is declared `async def`.
    pub is_async: bool,

    /// Parameters in declaration order (`*` and `/` markers omitted).
    pub parameters: Vec<Parameter>,

    /// The return annotation text, if any.
    pub return_annotation: Option<String>,

    /// 1-indexed line of the `def` keyword.
    pub lineno: usize,

    /// Decorators, signature and body.
    pub source: String,

    /// The existing docstring, cleaned of its indentation.
    pub docstring: Option<String>,
}

/// How a parameter binds its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// An ordinary parameter (positional-only parameters included).
    Positional,
    /// A parameter after `*` or `*args`.
    KeywordOnly,
    /// `*args`.
    VarPositional,
    /// `**kwargs`.
    VarKeyword,
}

/// A single function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// The parameter name without leading stars.
    pub name: String,

    /// How the parameter binds.
    pub kind: ParameterKind,

    /// The annotation text, if any.
    pub annotation: Option<String>,

    /// The default value text, if any.
    pub default: Option<String>,
}

impl Parameter {
    /// Whether the caller may omit this argument.
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
            || matches!(
                self.kind,
                ParameterKind::VarPositional | ParameterKind::VarKeyword
            )
    }
}

/// Load the top-level functions of a Python source file.
///
/// # Errors
///
/// Returns `Error::UnsupportedSource` if the path does not end in `.py` and
/// `Error::SourceRead` if the file cannot be read. Functions whose signature
/// cannot be read are listed in [`PyModule::skipped`] instead.
pub fn load_functions(path: impl AsRef<Path>) -> Result<PyModule> {
    let path = path.as_ref();
    if path.extension().and_then(|e| e.to_str()) != Some("py") {
        return Err(Error::UnsupportedSource {
            path: path.to_path_buf(),
        });
    }

    let source = std::fs::read_to_string(path).map_err(|source| Error::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let (functions, skipped) = parse_module(&source);
    for skip in &skipped {
        tracing::warn!(module = %name, line = skip.lineno, reason = %skip.reason, "skipped function");
    }

    tracing::debug!(module = %name, functions = functions.len(), "loaded python module");

    Ok(PyModule {
        name,
        path: path.to_path_buf(),
        source,
        functions,
        skipped,
    })
}

/// Parse a single function definition.
///
/// # Errors
///
/// Returns `Error::SourceParse` if the text holds no top-level function, or
/// if the first one has a signature that cannot be read.
///
/// # Examples
///
/// ```
/// use docsmith_core::python::parse_function;
///
/// let func = parse_function("def add(a: int, b: int = 1) -> int:\n    return a + b\n").unwrap();
/// assert_eq!(func.name, "add");
/// assert_eq!(func.parameters.len(), 2);
/// assert_eq!(func.return_annotation.as_deref(), Some("int"));
/// ```
pub fn parse_function(source: &str) -> Result<PyFunction> {
    let (functions, skipped) = parse_module(source);
    let first = functions.into_iter().next();
    match (first, skipped.into_iter().next()) {
        (Some(function), Some(skip)) if skip.lineno < function.lineno => {
            Err(Error::source_parse(skip.reason))
        }
        (Some(function), _) => Ok(function),
        (None, Some(skip)) => Err(Error::source_parse(skip.reason)),
        (None, None) => Err(Error::source_parse("no function definition found")),
    }
}

/// Parse every top-level function definition in a module's source.
///
/// Definitions whose signature cannot be read are returned separately and
/// do not stop the rest of the module from loading.
pub fn parse_module(source: &str) -> (Vec<PyFunction>, Vec<SkippedFunction>) {
    let lines: Vec<&str> = source.lines().collect();
    let mut functions = Vec::new();
    let mut skipped = Vec::new();
    let mut triple: Option<&'static str> = None;
    let mut decorators_start: Option<usize> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if triple.is_none() && is_top_level_statement(line) {
            if line.starts_with('@') {
                decorators_start.get_or_insert(i);
            } else if line.starts_with("def ") || line.starts_with("async def ") {
                let start = decorators_start.take().unwrap_or(i);
                match parse_function_at(&lines, start, i) {
                    Ok((function, end)) => {
                        functions.push(function);
                        i = end + 1;
                        continue;
                    }
                    Err(e) => skipped.push(SkippedFunction {
                        lineno: i + 1,
                        reason: parse_reason(e),
                    }),
                }
            } else if !line.starts_with('#') {
                decorators_start = None;
            }
        }
        triple = track_triple_quotes(triple, line);
        i += 1;
    }

    (functions, skipped)
}

fn parse_reason(error: Error) -> String {
    match error {
        Error::SourceParse { message } => message,
        other => other.to_string(),
    }
}

fn is_top_level_statement(line: &str) -> bool {
    !line.trim().is_empty() && !line.starts_with(|c: char| c.is_whitespace())
}

/// Blank lines and column-0 comments after a body belong to the module.
fn is_trailing_filler(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}

/// Parse the function whose `def` is on `def_idx`; returns it with its last line.
fn parse_function_at(lines: &[&str], start: usize, def_idx: usize) -> Result<(PyFunction, usize)> {
    let sig_end = signature_end(lines, def_idx).ok_or_else(|| {
        Error::source_parse(format!("unterminated signature on line {}", def_idx + 1))
    })?;
    let header = lines[def_idx..=sig_end]
        .iter()
        .map(|l| strip_comment(l))
        .collect::<Vec<_>>()
        .join("\n");
    let signature = parse_signature(&header)?;

    let mut end = sig_end;
    let mut triple: Option<&'static str> = None;
    for (j, line) in lines.iter().enumerate().skip(sig_end + 1) {
        if triple.is_none() && is_top_level_statement(line) && !line.starts_with('#') {
            break;
        }
        triple = track_triple_quotes(triple, line);
        end = j;
    }
    while end > sig_end && is_trailing_filler(lines[end]) {
        end -= 1;
    }

    let body = if signature.trailing.is_empty() {
        lines[sig_end + 1..=end].join("\n")
    } else {
        signature.trailing.clone()
    };

    let function = PyFunction {
        name: signature.name,
        is_async: signature.is_async,
        parameters: signature.parameters,
        return_annotation: signature.return_annotation,
        lineno: def_idx + 1,
        source: lines[start..=end].join("\n"),
        docstring: leading_string_literal(&body),
    };
    Ok((function, end))
}

struct Signature {
    is_async: bool,
    name: String,
    parameters: Vec<Parameter>,
    return_annotation: Option<String>,
    trailing: String,
}

fn signature_end(lines: &[&str], def_idx: usize) -> Option<usize> {
    let mut header = String::new();
    for (idx, line) in lines.iter().enumerate().skip(def_idx) {
        if idx > def_idx {
            header.push('\n');
        }
        header.push_str(strip_comment(line));

        let Some(open) = find_top_level(&header, '(') else {
            continue;
        };
        let Some(close) = find_matching(&header, open) else {
            continue;
        };
        if find_top_level(&header[close + 1..], ':').is_some() {
            return Some(idx);
        }
    }
    None
}

fn parse_signature(header: &str) -> Result<Signature> {
    let text = header.trim_start();
    let (is_async, text) = match text.strip_prefix("async ") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };
    let text = text
        .strip_prefix("def ")
        .ok_or_else(|| Error::source_parse("expected 'def'"))?
        .trim_start();

    let open = find_top_level(text, '(')
        .ok_or_else(|| Error::source_parse("missing parameter list"))?;
    let name = function_name(&text[..open]);
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(Error::source_parse(format!("invalid function name '{}'", name)));
    }

    let close = find_matching(text, open)
        .ok_or_else(|| Error::source_parse(format!("unbalanced parameters in '{}'", name)))?;
    let rest = &text[close + 1..];
    let colon = find_top_level(rest, ':')
        .ok_or_else(|| Error::source_parse(format!("missing ':' after '{}' signature", name)))?;

    let return_annotation = rest[..colon]
        .trim()
        .strip_prefix("->")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(Signature {
        parameters: parse_parameters(&text[open + 1..close], &name)?,
        is_async,
        name,
        return_annotation,
        trailing: rest[colon + 1..].trim().to_string(),
    })
}

/// The name in `name[T, U]`, dropping any type-parameter list.
fn function_name(head: &str) -> String {
    let head = head.trim();
    match head.find('[') {
        Some(bracket) if head.ends_with(']') => head[..bracket].trim_end().to_string(),
        _ => head.to_string(),
    }
}

fn parse_parameters(text: &str, function: &str) -> Result<Vec<Parameter>> {
    let mut parameters = Vec::new();
    let mut keyword_only = false;

    for piece in split_top_level(text, ',') {
        let piece = piece.trim();
        match piece {
            "" | "/" => continue,
            "*" => {
                keyword_only = true;
                continue;
            }
            _ => {}
        }

        let (kind, piece) = if let Some(rest) = piece.strip_prefix("**") {
            (ParameterKind::VarKeyword, rest)
        } else if let Some(rest) = piece.strip_prefix('*') {
            keyword_only = true;
            (ParameterKind::VarPositional, rest)
        } else if keyword_only {
            (ParameterKind::KeywordOnly, piece)
        } else {
            (ParameterKind::Positional, piece)
        };

        let (head, default) = match find_default_eq(piece) {
            Some(idx) => (&piece[..idx], Some(piece[idx + 1..].trim().to_string())),
            None => (piece, None),
        };
        let (name, annotation) = match find_top_level(head, ':') {
            Some(idx) => (&head[..idx], Some(head[idx + 1..].trim().to_string())),
            None => (head, None),
        };

        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(Error::source_parse(format!(
                "invalid parameter '{}' in '{}'",
                piece, function
            )));
        }

        parameters.push(Parameter {
            name: name.to_string(),
            kind,
            annotation: annotation.filter(|a| !a.is_empty()),
            default: default.filter(|d| !d.is_empty()),
        });
    }

    Ok(parameters)
}

/// Visit every character outside string literals with the bracket depth before it.
fn for_each_code_char(text: &str, mut visit: impl FnMut(usize, char, usize) -> ControlFlow<()>) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if c == '"' || c == '\'' {
            quote = Some(c);
            continue;
        }

        if visit(idx, c, depth).is_break() {
            return;
        }

        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
}

/// Find the first `target` at bracket depth zero, outside string literals.
pub(crate) fn find_top_level(text: &str, target: char) -> Option<usize> {
    let mut found = None;
    for_each_code_char(text, |idx, c, depth| {
        if c == target && depth == 0 {
            found = Some(idx);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    found
}

/// Split on `sep` at bracket depth zero, outside string literals.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for_each_code_char(text, |idx, c, depth| {
        if c == sep && depth == 0 {
            pieces.push(&text[last..idx]);
            last = idx + c.len_utf8();
        }
        ControlFlow::Continue(())
    });
    pieces.push(&text[last..]);
    pieces
}

/// Find the bracket closing the one opened at `open`.
pub(crate) fn find_matching(text: &str, open: usize) -> Option<usize> {
    let mut found = None;
    for_each_code_char(text, |idx, c, depth| {
        if idx > open && matches!(c, ')' | ']' | '}') && depth == 1 {
            found = Some(idx);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    found
}

/// Find the `=` separating a parameter from its default, ignoring comparisons.
fn find_default_eq(piece: &str) -> Option<usize> {
    let bytes = piece.as_bytes();
    let mut found = None;
    for_each_code_char(piece, |idx, c, depth| {
        let next = bytes.get(idx + 1).copied();
        let prev = idx.checked_sub(1).and_then(|p| bytes.get(p)).copied();
        if c == '='
            && depth == 0
            && next != Some(b'=')
            && !matches!(prev, Some(b'=' | b'!' | b'<' | b'>'))
        {
            found = Some(idx);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    found
}

fn strip_comment(line: &str) -> &str {
    let mut cut = line.len();
    for_each_code_char(line, |idx, c, _| {
        if c == '#' {
            cut = idx;
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    line[..cut].trim_end()
}

/// Update the open triple-quote state after `line`.
///
/// Outside a triple-quoted string, comments and ordinary string literals
/// are skipped.
fn track_triple_quotes(mut open: Option<&'static str>, line: &str) -> Option<&'static str> {
    let mut rest = line;
    loop {
        match open {
            Some(delim) => match rest.find(delim) {
                Some(idx) => {
                    rest = &rest[idx + delim.len()..];
                    open = None;
                }
                None => return open,
            },
            None => match next_triple_quote(rest) {
                Some((idx, delim)) => {
                    rest = &rest[idx + delim.len()..];
                    open = Some(delim);
                }
                None => return None,
            },
        }
    }
}

/// Find the next triple quote in code, stopping at a comment.
fn next_triple_quote(text: &str) -> Option<(usize, &'static str)> {
    let mut chars = text.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '#' => return None,
            '"' | '\'' => {
                let delim = if c == '"' { "\"\"\"" } else { "'''" };
                if text[idx..].starts_with(delim) {
                    return Some((idx, delim));
                }
                let mut escaped = false;
                for (_, d) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if d == '\\' {
                        escaped = true;
                    } else if d == c {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn leading_string_literal(body: &str) -> Option<String> {
    let text = body.trim_start();
    let text = text
        .strip_prefix(|c: char| matches!(c, 'r' | 'R' | 'u' | 'U'))
        .filter(|t| t.starts_with(|c: char| c == '"' || c == '\''))
        .unwrap_or(text);

    for delim in ["\"\"\"", "'''"] {
        if let Some(rest) = text.strip_prefix(delim) {
            let end = rest.find(delim)?;
            return Some(clean_doc(&rest[..end]));
        }
    }

    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &text[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// Remove docstring indentation the way Python's `inspect.cleandoc` does.
pub(crate) fn clean_doc(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_width(l))
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            if i > 0 && indent_width(l) >= margin {
                strip_indent(l, margin)
            } else {
                l.trim_start()
            }
        })
        .collect();

    while cleaned.first().is_some_and(|l| l.trim().is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

/// Leading whitespace, counted in characters.
fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Drop the first `width` characters of `line`'s indentation.
fn strip_indent(line: &str, width: usize) -> &str {
    match line.char_indices().nth(width) {
        Some((idx, _)) => &line[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MODULE: &str = r#""""Module docstring.

def not_a_function(x):
"""

import typing


@decorator
def add(a: int, b: int) -> int:
    """Add two numbers.

    Args:
        a: first
        b: second
    """
    return a + b


class Thing:
    def method(self, x: int) -> int:
        return x


async def fetch(
    url: str,  # the address
    *,
    retries: int = 3,
    headers: dict[str, str] | None = None,
) -> bytes:
    text = """
not a def
"""
    return b""

def one_liner(x: float) -> float: return x * 2
"#;

    #[test]
    fn test_parse_module_top_level_functions() {
        let (functions, _) = parse_module(MODULE);
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add", "fetch", "one_liner"]);
    }

    #[test]
    fn test_parse_decorated_function() {
        let (functions, _) = parse_module(MODULE);
        let add = &functions[0];

        assert!(add.source.starts_with("@decorator\ndef add"));
        assert!(add.source.ends_with("return a + b"));
        assert_eq!(add.return_annotation.as_deref(), Some("int"));
        assert_eq!(
            add.docstring.as_deref(),
            Some("Add two numbers.\n\nArgs:\n    a: first\n    b: second")
        );
    }

    #[test]
    fn test_parse_multiline_signature() {
        let (functions, _) = parse_module(MODULE);
        let fetch = &functions[1];

        assert!(fetch.is_async);
        assert_eq!(fetch.return_annotation.as_deref(), Some("bytes"));
        assert_eq!(fetch.parameters.len(), 3);

        assert_eq!(fetch.parameters[0].name, "url");
        assert_eq!(fetch.parameters[0].annotation.as_deref(), Some("str"));
        assert_eq!(fetch.parameters[0].kind, ParameterKind::Positional);

        assert_eq!(fetch.parameters[1].name, "retries");
        assert_eq!(fetch.parameters[1].kind, ParameterKind::KeywordOnly);
        assert_eq!(fetch.parameters[1].default.as_deref(), Some("3"));

        assert_eq!(
            fetch.parameters[2].annotation.as_deref(),
            Some("dict[str, str] | None")
        );
        assert_eq!(fetch.parameters[2].default.as_deref(), Some("None"));
        assert!(fetch.source.contains("not a def"));
        assert!(fetch.docstring.is_none());
    }

    #[test]
    fn test_parse_one_liner() {
        let (functions, _) = parse_module(MODULE);
        let one = &functions[2];
        assert_eq!(one.name, "one_liner");
        assert_eq!(one.source, "def one_liner(x: float) -> float: return x * 2");
    }

    #[test]
    fn test_parse_star_parameters() {
        let func = parse_function(
            "def f(self, a, /, *args: int, key: str = \"a=b\", **kwargs: float):\n    pass\n",
        )
        .unwrap();

        let kinds: Vec<ParameterKind> = func.parameters.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParameterKind::Positional,
                ParameterKind::Positional,
                ParameterKind::VarPositional,
                ParameterKind::KeywordOnly,
                ParameterKind::VarKeyword,
            ]
        );
        assert_eq!(func.parameters[1].annotation, None);
        assert_eq!(func.parameters[3].default.as_deref(), Some("\"a=b\""));
        assert!(func.parameters[4].is_optional());
        assert!(!func.parameters[1].is_optional());
    }

    #[test]
    fn test_parse_function_without_def() {
        let result = parse_function("x = 1\n");
        assert!(matches!(result, Err(Error::SourceParse { .. })));
    }

    #[test]
    fn test_unterminated_signature() {
        let result = parse_function("def broken(a: int,\n");
        assert!(matches!(result, Err(Error::SourceParse { .. })));

        let (functions, skipped) = parse_module("def broken(a: int,\n");
        assert!(functions.is_empty());
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].lineno, 1);
        assert!(skipped[0].reason.contains("unterminated signature"));
    }

    #[test]
    fn test_unreadable_function_does_not_hide_the_rest() {
        let source = "def bad(a b) -> int:\n    return 1\n\ndef add(a: int) -> int:\n    return a\n";
        let (functions, skipped) = parse_module(source);

        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].lineno, 1);
        assert!(skipped[0].reason.contains("invalid parameter"));
        assert!(skipped[0]
            .to_string()
            .starts_with("skipped function on line 1: "));

        assert!(matches!(
            parse_function(source),
            Err(Error::SourceParse { .. })
        ));
    }

    #[test]
    fn test_parse_type_parameter_list() {
        let source = "def first[T](items: list[T]) -> T:\n    return items[0]\n\n\ndef add(a: int, b: int) -> int:\n    return a + b\n";
        let (functions, skipped) = parse_module(source);

        assert!(skipped.is_empty());
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["first", "add"]);

        let first = &functions[0];
        assert_eq!(first.parameters.len(), 1);
        assert_eq!(first.parameters[0].annotation.as_deref(), Some("list[T]"));
        assert_eq!(first.return_annotation.as_deref(), Some("T"));
    }

    #[test]
    fn test_parse_bounded_type_parameters() {
        let func = parse_function(
            "def pick[K: (int, str), V](key: K, value: V) -> V:\n    return value\n",
        )
        .unwrap();
        assert_eq!(func.name, "pick");
        let names: Vec<&str> = func.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["key", "value"]);
    }

    #[test]
    fn test_triple_quotes_in_comments_and_strings() {
        let source = r#"# prefer """ for docstrings
X = '"""'
Y = "it's"

def a(x: int) -> int: ...
def b(y: int) -> int: ...
"#;
        let (functions, skipped) = parse_module(source);

        assert!(skipped.is_empty());
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_track_triple_quotes() {
        assert_eq!(track_triple_quotes(None, r#"x = 1  # """"#), None);
        assert_eq!(track_triple_quotes(None, r#"x = '"""'"#), None);
        assert_eq!(
            track_triple_quotes(None, r##"x = "#" + """doc"##),
            Some("\"\"\"")
        );
        assert_eq!(track_triple_quotes(Some("'''"), "end''' # '''"), None);
        assert_eq!(track_triple_quotes(None, "s = '''a''' + '''b"), Some("'''"));
    }

    #[test]
    fn test_docstring_with_wide_whitespace_indent() {
        let source = "def f(x: int) -> int:\n    \"\"\"Summary.\n\n    Args:\n\u{3000}\u{3000}x: value\n    \"\"\"\n    return x\n";
        let func = parse_function(source).unwrap();
        assert_eq!(
            func.docstring.as_deref(),
            Some("Summary.\n\n  Args:\nx: value")
        );
    }

    #[test]
    fn test_clean_doc_counts_characters() {
        assert_eq!(
            clean_doc("Top.\n\u{a0}\u{a0}a\n\u{a0}\u{a0}  b"),
            "Top.\na\n  b"
        );
        assert_eq!(clean_doc("\n    Top.\n      more\n"), "Top.\n  more");
    }

    #[test]
    fn test_load_functions_rejects_non_python() {
        let result = load_functions("module.txt");
        assert!(matches!(result, Err(Error::UnsupportedSource { .. })));
    }

    #[test]
    fn test_load_functions_from_file() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        write!(file, "{}", MODULE).unwrap();

        let module = load_functions(file.path()).unwrap();
        assert_eq!(module.functions.len(), 3);
        assert!(module.skipped.is_empty());
        assert!(module.function("add").is_some());
        assert!(module.function("method").is_none());
        assert_eq!(module.source, MODULE);
    }

    #[test]
    fn test_load_functions_missing_file() {
        let result = load_functions("/nonexistent/dir/module.py");
        assert!(matches!(result, Err(Error::SourceRead { .. })));
    }

    #[test]
    fn test_split_top_level_respects_brackets_and_strings() {
        assert_eq!(
            split_top_level("a: dict[str, int], b: str = 'x,y'", ','),
            vec!["a: dict[str, int]", " b: str = 'x,y'"]
        );
    }
}
