//! Validation visitor for object-store component trees.
//!
//! Setters keep individual fields legal at mutation time; this pass
//! re-checks the same invariants on whole trees (a definition loaded from
//! disk, or assembled programmatically) and adds the cross-field rules no
//! single setter can see: duplicate aliases in a data tank, a mapping
//! referencing an unknown table, an update pipe with nothing enabled.
//!
//! Containers implement [`Validate`] by descending into children inside
//! [`ValidationContext::visit`] frames, so every issue carries the path of
//! the component that produced it.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ObjectStoreError, Result};

/// Longest legal component name (pipes, attributes, provider instances).
pub const MAX_NAME_LEN: usize = 50;

/// Longest legal back-end alias (tables, credentials).
pub const MAX_ALIAS_LEN: usize = 128;

/// Default cap on recorded error-severity issues.
const DEFAULT_MAX_ERRORS: usize = 100;

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Suspicious but loadable
    Warning,
    /// The definition must not be persisted or served
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A single issue recorded during a validation pass.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Issue severity
    pub severity: Severity,
    /// Slash-joined component path ("Application/Pipe[orders]")
    pub path: String,
    /// Human-readable description of the violated rule
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.path, self.message)
    }
}

/// Accumulates issues while walking a component tree.
pub struct ValidationContext {
    path: Vec<String>,
    issues: Vec<ValidationIssue>,
    max_errors: usize,
    suppressed: usize,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationContext {
    /// Creates a context with the default error cap.
    pub fn new() -> Self {
        Self {
            path: Vec::new(),
            issues: Vec::new(),
            max_errors: DEFAULT_MAX_ERRORS,
            suppressed: 0,
        }
    }

    /// Builder method to set the error cap.
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors.max(1);
        self
    }

    /// Runs `f` with `segment` pushed onto the component path.
    pub fn visit(&mut self, segment: impl Into<String>, f: impl FnOnce(&mut Self)) {
        self.path.push(segment.into());
        f(self);
        self.path.pop();
    }

    /// Records an error-severity issue at the current path.
    pub fn error(&mut self, message: impl Into<String>) {
        if self.error_count() >= self.max_errors {
            self.suppressed += 1;
            return;
        }
        let issue = ValidationIssue {
            severity: Severity::Error,
            path: self.current_path(),
            message: message.into(),
        };
        tracing::debug!(%issue, "validation error");
        self.issues.push(issue);
    }

    /// Records a warning-severity issue at the current path.
    pub fn warning(&mut self, message: impl Into<String>) {
        let issue = ValidationIssue {
            severity: Severity::Warning,
            path: self.current_path(),
            message: message.into(),
        };
        tracing::debug!(%issue, "validation warning");
        self.issues.push(issue);
    }

    /// Records an error if `value` is not a legal component name.
    pub fn require_valid_name(&mut self, field: &str, value: &str, max_len: usize) {
        if let Err(e) = validate_name(field, value, max_len) {
            self.error(e.to_string());
        }
    }

    /// Issues recorded so far.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Number of error-severity issues recorded.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Whether any error-severity issue was recorded.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Finishes the pass.
    ///
    /// # Errors
    /// Returns [`ObjectStoreError::Validation`] carrying the formatted
    /// issue report if any error-severity issue was recorded. Warnings
    /// alone pass through in the `Ok` value.
    pub fn into_result(self) -> Result<Vec<ValidationIssue>> {
        if !self.has_errors() {
            return Ok(self.issues);
        }

        let count = self.error_count() + self.suppressed;
        let mut report: String = self
            .issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        if self.suppressed > 0 {
            report.push_str(&format!("\n({} further errors suppressed)", self.suppressed));
        }
        Err(ObjectStoreError::Validation { count, report })
    }

    fn current_path(&self) -> String {
        if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path.join("/")
        }
    }
}

/// Implemented by every component; containers descend into children.
pub trait Validate {
    /// Records this component's rule violations into the context.
    fn validate(&self, ctx: &mut ValidationContext);
}

/// Checks a component name at setter time.
///
/// Names start with a letter and continue with letters, digits, or
/// underscores, bounded by `max_len`.
///
/// # Errors
/// Returns `InvalidValue` naming `field` when the invariant fails.
pub fn validate_name(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.is_empty() {
        return Err(ObjectStoreError::invalid_value(field, "must not be empty"));
    }
    if value.len() > max_len {
        return Err(ObjectStoreError::invalid_value(
            field,
            format!("exceeds {} characters", max_len),
        ));
    }
    if !name_pattern().is_match(value) {
        return Err(ObjectStoreError::invalid_value(
            field,
            format!(
                "'{}' must start with a letter and contain only letters, digits, and underscores",
                value
            ),
        ));
    }
    Ok(())
}

#[allow(clippy::unwrap_used)] // literal pattern, cannot fail
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_identifiers() {
        assert!(validate_name("f", "orders", MAX_NAME_LEN).is_ok());
        assert!(validate_name("f", "Order_42", MAX_NAME_LEN).is_ok());
    }

    #[test]
    fn test_validate_name_rejects_empty() {
        assert!(validate_name("f", "", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_validate_name_rejects_bad_charset() {
        assert!(validate_name("f", "4orders", MAX_NAME_LEN).is_err());
        assert!(validate_name("f", "or ders", MAX_NAME_LEN).is_err());
        assert!(validate_name("f", "or-ders", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_validate_name_rejects_overlong() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(validate_name("f", &long, MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_context_paths() {
        let mut ctx = ValidationContext::new();
        ctx.visit("Application[site]", |ctx| {
            ctx.visit("Pipe[orders]", |ctx| {
                ctx.error("broken mapping");
            });
            ctx.warning("no credentials defined");
        });

        assert_eq!(ctx.issues().len(), 2);
        assert_eq!(ctx.issues()[0].path, "Application[site]/Pipe[orders]");
        assert_eq!(ctx.issues()[1].path, "Application[site]");
    }

    #[test]
    fn test_into_result_with_errors() {
        let mut ctx = ValidationContext::new();
        ctx.error("bad");
        let err = ctx.into_result().unwrap_err();
        assert!(matches!(
            err,
            ObjectStoreError::Validation { count: 1, .. }
        ));
    }

    #[test]
    fn test_into_result_warnings_only() {
        let mut ctx = ValidationContext::new();
        ctx.warning("odd but legal");
        let issues = ctx.into_result().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_error_cap() {
        let mut ctx = ValidationContext::new().with_max_errors(2);
        for i in 0..5 {
            ctx.error(format!("error {}", i));
        }
        assert_eq!(ctx.issues().len(), 2);
        let err = ctx.into_result().unwrap_err();
        assert!(matches!(err, ObjectStoreError::Validation { count: 5, .. }));
    }
}
