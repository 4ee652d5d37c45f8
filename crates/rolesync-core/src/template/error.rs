//! Template error types.

use super::Span;

/// An error raised while parsing or formatting an attribute template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    /// The error message.
    pub message: String,
    /// The location of the error in the pattern.
    pub span: Span,
    /// The offending pattern.
    pub pattern: String,
}

impl TemplateError {
    /// Creates a new template error.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span, pattern: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
            pattern: pattern.into(),
        }
    }

    /// Creates a "no value for field" error.
    #[must_use]
    pub fn missing_value(field: &str, span: Span, pattern: impl Into<String>) -> Self {
        Self::new(format!("No value for field '{field}'"), span, pattern)
    }
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at position {}..{} in '{}'",
            self.message, self.span.start, self.span.end, self.pattern
        )
    }
}

impl std::error::Error for TemplateError {}
