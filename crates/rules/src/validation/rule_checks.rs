//! Rule and template checks: names, regexes, technology tokens, template references.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use super::fuzzy::fuzzy_match;
use super::ValidationResult;
use crate::schema::*;

const LANGUAGES: &[&str] = &["java", "dotnetcore", "nodejs", "apache", "nginx"];
const VENDORS: &[&str] = &["appd", "otel", "telescope"];

pub(super) fn validate_rule(rule: &InstrumentationRule, path: &str, result: &mut ValidationResult) {
    if rule.name.is_empty() {
        result.error(format!("{}.name", path), "instrumentation rule name is required");
    }

    for (field, pattern) in rule.match_rules.patterns() {
        if let Err(e) = Regex::new(pattern) {
            result.error(
                format!("{}.matchRules.{}", path, field),
                format!("invalid regex '{}': {}", pattern, e),
            );
        }
    }

    let multi_key = rule
        .match_rules
        .labels
        .iter()
        .chain(&rule.match_rules.annotations)
        .any(|entry| entry.len() > 1);
    if multi_key {
        result.warn(
            format!("{}.matchRules", path),
            "label/annotation entries should hold a single key each",
        );
    }

    for (i, spec) in rule.specs().into_iter().enumerate() {
        let spec_path = if rule.is_rule_set() {
            format!("{}.injectionRuleSet[{}]", path, i)
        } else {
            format!("{}.injectionRules", path)
        };
        validate_spec(spec, &spec_path, result);
    }
}

fn validate_spec(spec: &InjectionSpec, path: &str, result: &mut ValidationResult) {
    // Templates may supply the technology, so only a present token is checked.
    if !spec.technology.is_empty() {
        let technology = Technology::parse(&spec.technology);
        let (language, vendor) = spec
            .technology
            .split_once('/')
            .unwrap_or((spec.technology.as_str(), ""));
        if technology.language.is_none() {
            let mut message = format!("unknown technology '{}'", language);
            if let Some(hint) = fuzzy_match(language, LANGUAGES) {
                message.push_str(&format!(", did you mean '{}'?", hint));
            }
            result.warn(format!("{}.technology", path), message);
        }
        if technology.vendor.is_none() {
            let mut message = format!("unknown vendor '{}'", vendor);
            if let Some(hint) = fuzzy_match(vendor, VENDORS) {
                message.push_str(&format!(", did you mean '{}'?", hint));
            }
            result.warn(format!("{}.technology", path), message);
        }
    }

    if spec.application_name_source == Some(NameSource::Expression)
        && spec.application_name_expression.is_empty()
    {
        result.warn(
            format!("{}.applicationNameExpression", path),
            "applicationNameSource is 'expression' but no expression is set",
        );
    }
    if spec.application_name_source == Some(NameSource::Auto) {
        result.warn(
            format!("{}.applicationNameSource", path),
            "'auto' only applies to tier names",
        );
    }
}

pub(super) fn validate_unique_names(rules: &[InstrumentationRule], result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for (i, rule) in rules.iter().enumerate() {
        if !rule.name.is_empty() && !seen.insert(rule.name.as_str()) {
            result.error(
                format!("rules[{}].name", i),
                format!("duplicate rule name '{}'", rule.name),
            );
        }
    }
}

pub(super) fn validate_template_names(
    templates: &[InjectionTemplate],
    result: &mut ValidationResult,
) {
    let mut seen = HashSet::new();
    for (i, template) in templates.iter().enumerate() {
        if template.name.is_empty() {
            result.error(
                format!("injectionTemplates[{}].name", i),
                "injection template name is required",
            );
        } else if !seen.insert(template.name.as_str()) {
            result.warn(
                format!("injectionTemplates[{}].name", i),
                format!("duplicate template '{}', the later one wins", template.name),
            );
        }
        if !template.injection_rules.template.is_empty() {
            result.warn(
                format!("injectionTemplates[{}].injectionRules.template", i),
                "templates do not chain, nested template reference is ignored",
            );
        }
    }
}

pub(super) fn validate_template_refs(
    rule: &InstrumentationRule,
    templates: &HashMap<String, InjectionSpec>,
    result: &mut ValidationResult,
) {
    let names: Vec<&str> = templates.keys().map(String::as_str).collect();
    for spec in rule.specs() {
        if spec.template.is_empty() || templates.contains_key(&spec.template) {
            continue;
        }
        let path = format!("{}.template", rule.name);
        let message = format!("injection template '{}' not found", spec.template);
        match fuzzy_match(&spec.template, &names) {
            Some(hint) => result.error_with_suggestion(path, message, format!("did you mean '{}'?", hint)),
            None => result.error(path, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::super::*;

    fn rule(name: &str, technology: &str) -> InstrumentationRule {
        InstrumentationRule {
            name: name.into(),
            injection_rules: Some(InjectionSpec {
                technology: technology.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn valid_rules_pass() {
        let result = validate_rules(&[rule("a", "java"), rule("b", "nodejs/otel")]);
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn empty_name_is_error() {
        let result = validate_rule(&rule("", "java"));
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "rule.name");
    }

    #[test]
    fn bad_regex_is_error_with_field_path() {
        let mut r = rule("a", "java");
        r.match_rules.labels = vec![BTreeMap::from([("app".to_string(), "(".to_string())])];
        let result = validate_rules(&[r]);
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "rules[0].matchRules.labels[0].app");
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = validate_rules(&[rule("a", "java"), rule("a", "java")]);
        assert!(!result.valid);
        assert!(result.errors[0].message.contains("duplicate"));
    }

    #[test]
    fn unknown_technology_warns_with_hint() {
        let result = validate_rule(&rule("a", "jav/otle"));
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].message.contains("did you mean 'java'"));
        assert!(result.warnings[1].message.contains("did you mean 'otel'"));
    }

    #[test]
    fn missing_template_suggests_close_name() {
        let mut r = rule("a", "java");
        if let Some(spec) = r.injection_rules.as_mut() {
            spec.template = "java-defaults".into();
        }
        let templates = HashMap::from([("java-default".to_string(), InjectionSpec::default())]);
        let result = validate_template_refs(&r, &templates);
        assert!(!result.valid);
        assert_eq!(
            result.errors[0].suggestion.as_deref(),
            Some("did you mean 'java-default'?")
        );
    }

    #[test]
    fn unnamed_template_is_error() {
        let templates = vec![InjectionTemplate::default()];
        assert!(!validate_templates(&templates).valid);
    }
}
