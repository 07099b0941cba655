//! Shared task state for one documentation task.

use crate::python::PyFunction;
use crate::reconcile::ReconciledSchema;

/// State shared by the tools while documenting one function.
///
/// The caller owns it and lends it to each tool call as `&mut`. Only the
/// `docstring` tool writes to it, and only after the docstring has been
/// fully reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskState {
    /// The function under documentation.
    pub function: PyFunction,

    /// The current best docstring; empty until one is accepted.
    pub docstring: String,

    /// Schema of the accepted docstring.
    pub schema: Option<ReconciledSchema>,
}

impl TaskState {
    /// Create the state for documenting `function`.
    pub fn new(function: PyFunction) -> Self {
        Self {
            function,
            docstring: String::new(),
            schema: None,
        }
    }

    /// Whether a docstring has been accepted.
    pub fn has_docstring(&self) -> bool {
        !self.docstring.is_empty()
    }

    /// Record an accepted docstring together with its schema.
    pub(crate) fn accept(&mut self, docstring: impl Into<String>, schema: ReconciledSchema) {
        self.docstring = docstring.into();
        self.schema = Some(schema);
    }
}
