//! Warning sink shared by the codecs and record validation.
//!
//! Conditions that are tolerated but worth reporting (a leader that violates the
//! MARC 21 structural invariants, empty MARC-XML fields that get dropped, empty
//! subfield values) are handed to a [`Diagnostics`] value passed in by the caller.
//! Every message is also forwarded to the `log` facade at `warn` level.

use log::warn;

/// Collector for non-fatal problems found while reading or validating records.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    /// Source of the data being processed, used as a message prefix
    pub context: Option<String>,
    /// Collected warning messages, oldest first
    pub warnings: Vec<String>,
}

impl Diagnostics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink whose messages are prefixed with `context` (usually a path).
    #[must_use]
    pub fn with_context(context: impl Into<String>) -> Self {
        Diagnostics {
            context: Some(context.into()),
            warnings: Vec::new(),
        }
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        let message = match &self.context {
            Some(context) => format!("{context}: {message}"),
            None => message,
        };
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Whether any warnings have been recorded.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Remove and return all collected warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_default() {
        let diagnostics = Diagnostics::default();
        assert!(diagnostics.context.is_none());
        assert!(!diagnostics.has_warnings());
    }

    #[test]
    fn test_warnings_are_prefixed_with_context() {
        let mut diagnostics = Diagnostics::with_context("input.xml");
        diagnostics.warn("empty control field 005 dropped");
        assert_eq!(
            diagnostics.warnings,
            vec!["input.xml: empty control field 005 dropped".to_string()]
        );
    }

    #[test]
    fn test_take_warnings_drains() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("one");
        diagnostics.warn("two");
        assert_eq!(diagnostics.take_warnings().len(), 2);
        assert!(!diagnostics.has_warnings());
    }
}
