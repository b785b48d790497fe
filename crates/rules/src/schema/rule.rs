//! Instrumentation rules and injection templates.

use serde::{Deserialize, Serialize};

use super::{InjectionSpec, MatchCriteria};

fn default_priority() -> i32 {
    1
}

/// A named match predicate plus one injection spec or an ordered set of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub match_rules: MatchCriteria,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_rules: Option<InjectionSpec>,
    /// Lower values are tried first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Multi-agent composition; takes precedence over `injection_rules`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injection_rule_set: Vec<InjectionSpec>,
}

impl Default for InstrumentationRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            match_rules: MatchCriteria::default(),
            injection_rules: None,
            priority: default_priority(),
            injection_rule_set: Vec::new(),
        }
    }
}

impl InstrumentationRule {
    /// Specs to dispatch, in order.
    pub fn specs(&self) -> Vec<&InjectionSpec> {
        if !self.injection_rule_set.is_empty() {
            self.injection_rule_set.iter().collect()
        } else {
            self.injection_rules.iter().collect()
        }
    }

    pub fn specs_mut(&mut self) -> Vec<&mut InjectionSpec> {
        if !self.injection_rule_set.is_empty() {
            self.injection_rule_set.iter_mut().collect()
        } else {
            self.injection_rules.iter_mut().collect()
        }
    }

    /// Whether this rule dispatches more than one spec.
    pub fn is_rule_set(&self) -> bool {
        !self.injection_rule_set.is_empty()
    }
}

/// A partial spec merged into rules that reference it by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionTemplate {
    pub name: String,
    #[serde(default)]
    pub injection_rules: InjectionSpec,
}
