//! Configuration validation with structured errors and suggestions.
//!
//! Checks the controller configuration, injection templates and
//! instrumentation rules before they reach the registry. Returns a
//! [`ValidationResult`] with errors (reject the batch) and warnings (advisory).

mod controller_checks;
mod rule_checks;

pub(crate) mod fuzzy;

use std::collections::HashMap;

use crate::schema::*;
use serde::{Deserialize, Serialize};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted location, e.g. `"rules[2].matchRules.namespaceRegex"`.
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn reject(&mut self, path: String, message: String, suggestion: Option<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path,
            message,
            suggestion,
        });
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.reject(path.into(), message.into(), None);
    }

    pub(crate) fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.reject(path.into(), message.into(), Some(suggestion.into()));
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Fold another result into this one.
    pub(crate) fn absorb(&mut self, other: ValidationResult) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// One-line digest of the errors for log fields.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate the global controller configuration.
pub fn validate_controller(config: &ControllerConfig) -> ValidationResult {
    let mut result = ValidationResult::new();
    controller_checks::validate_required(config, &mut result);
    controller_checks::validate_proxy(config, &mut result);
    result
}

/// Validate injection template definitions.
pub fn validate_templates(templates: &[InjectionTemplate]) -> ValidationResult {
    let mut result = ValidationResult::new();
    rule_checks::validate_template_names(templates, &mut result);
    result
}

/// Validate a batch of rules that will share one tier.
pub fn validate_rules(rules: &[InstrumentationRule]) -> ValidationResult {
    let mut result = ValidationResult::new();
    for (i, rule) in rules.iter().enumerate() {
        rule_checks::validate_rule(rule, &format!("rules[{}]", i), &mut result);
    }
    rule_checks::validate_unique_names(rules, &mut result);
    result
}

/// Validate a single rule before upsert.
pub fn validate_rule(rule: &InstrumentationRule) -> ValidationResult {
    let mut result = ValidationResult::new();
    rule_checks::validate_rule(rule, "rule", &mut result);
    result
}

/// Check that every template a rule references exists.
pub fn validate_template_refs(
    rule: &InstrumentationRule,
    templates: &HashMap<String, InjectionSpec>,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    rule_checks::validate_template_refs(rule, templates, &mut result);
    result
}
