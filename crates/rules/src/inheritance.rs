//! Template inheritance and default filling for injection specs.
//!
//! Resolution is single-level: a spec names at most one template, templates
//! never reference other templates. Scalars keep the injection's own value and
//! fall back to the template's; `env` and `options` merge by name with the
//! spec winning. Defaults fill whatever is still unset afterwards.

use std::collections::{BTreeMap, HashMap};

use crate::schema::{
    InjectionSpec, InjectionTemplate, InstrumentationRule, NameSource, NameValue, OptionalBool,
    ResourceReservation,
};

/// A spec referenced a template that is not registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("injection template '{template}' not found")]
pub struct UnknownTemplate {
    pub template: String,
}

/// Values applied to fields still unset after template merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionDefaults {
    pub application_name: String,
    pub application_name_source: NameSource,
    pub tier_name_source: NameSource,
    pub java_env_var: String,
    pub reservation_cpu: String,
    pub reservation_memory: String,
    pub netviz_port: String,
    pub use_pod_name_for_node_name: bool,
    pub do_not_instrument: bool,
    pub inject_k8s_otel_resource_attrs: bool,
}

impl Default for InjectionDefaults {
    fn default() -> Self {
        Self {
            application_name: "DEFAULT_APP_NAME".to_string(),
            application_name_source: NameSource::Namespace,
            tier_name_source: NameSource::Auto,
            java_env_var: "JAVA_TOOL_OPTIONS".to_string(),
            reservation_cpu: "100m".to_string(),
            reservation_memory: "50M".to_string(),
            netviz_port: "3892".to_string(),
            use_pod_name_for_node_name: false,
            do_not_instrument: false,
            inject_k8s_otel_resource_attrs: true,
        }
    }
}

fn inherit(own: &mut String, template: &str) {
    if own.is_empty() {
        *own = template.to_string();
    }
}

/// Merge two name/value lists by name; `specific` entries override
/// `templated` ones. Output is ordered by name.
pub fn merge_name_values(specific: &[NameValue], templated: &[NameValue]) -> Vec<NameValue> {
    let mut merged: BTreeMap<&str, &str> = BTreeMap::new();
    for item in templated.iter().chain(specific) {
        merged.insert(item.name.as_str(), item.value.as_str());
    }
    merged
        .into_iter()
        .map(|(name, value)| NameValue::new(name, value))
        .collect()
}

/// Merge `template` into `spec` field by field.
pub fn apply_template(spec: &mut InjectionSpec, template: &InjectionSpec) {
    inherit(&mut spec.technology, &template.technology);
    inherit(&mut spec.image, &template.image);
    inherit(&mut spec.java_env_var, &template.java_env_var);
    inherit(&mut spec.java_custom_config, &template.java_custom_config);

    spec.application_name_source = spec.application_name_source.or(template.application_name_source);
    inherit(&mut spec.application_name, &template.application_name);
    inherit(&mut spec.application_name_label, &template.application_name_label);
    inherit(&mut spec.application_name_annotation, &template.application_name_annotation);
    inherit(&mut spec.application_name_expression, &template.application_name_expression);

    spec.tier_name_source = spec.tier_name_source.or(template.tier_name_source);
    inherit(&mut spec.tier_name, &template.tier_name);
    inherit(&mut spec.tier_name_label, &template.tier_name_label);
    inherit(&mut spec.tier_name_annotation, &template.tier_name_annotation);
    inherit(&mut spec.tier_name_expression, &template.tier_name_expression);

    spec.use_pod_name_for_node_name = spec.use_pod_name_for_node_name.or(template.use_pod_name_for_node_name);
    spec.do_not_instrument = spec.do_not_instrument.or(template.do_not_instrument);
    spec.inject_k8s_otel_resource_attrs = spec
        .inject_k8s_otel_resource_attrs
        .or(template.inject_k8s_otel_resource_attrs);

    if spec.resource_reservation.is_none() {
        spec.resource_reservation = template.resource_reservation.clone();
    }
    inherit(&mut spec.log_level, &template.log_level);
    inherit(&mut spec.netviz_port, &template.netviz_port);
    inherit(&mut spec.open_telemetry_collector, &template.open_telemetry_collector);

    spec.env = merge_name_values(&spec.env, &template.env);
    spec.options = merge_name_values(&spec.options, &template.options);
}

/// Fill every field still unset with `defaults`.
pub fn apply_defaults(spec: &mut InjectionSpec, defaults: &InjectionDefaults) {
    inherit(&mut spec.application_name, &defaults.application_name);
    spec.application_name_source.get_or_insert(defaults.application_name_source);
    spec.tier_name_source.get_or_insert(defaults.tier_name_source);
    inherit(&mut spec.java_env_var, &defaults.java_env_var);
    inherit(&mut spec.netviz_port, &defaults.netviz_port);

    let reservation = spec
        .resource_reservation
        .get_or_insert_with(ResourceReservation::default);
    inherit(&mut reservation.cpu, &defaults.reservation_cpu);
    inherit(&mut reservation.memory, &defaults.reservation_memory);

    spec.use_pod_name_for_node_name = spec
        .use_pod_name_for_node_name
        .or(OptionalBool::Set(defaults.use_pod_name_for_node_name));
    spec.do_not_instrument = spec
        .do_not_instrument
        .or(OptionalBool::Set(defaults.do_not_instrument));
    spec.inject_k8s_otel_resource_attrs = spec
        .inject_k8s_otel_resource_attrs
        .or(OptionalBool::Set(defaults.inject_k8s_otel_resource_attrs));
}

/// Template merge followed by default filling.
///
/// Idempotent: resolving an already-resolved spec returns it unchanged.
pub fn resolve(
    spec: &InjectionSpec,
    templates: &HashMap<String, InjectionSpec>,
    defaults: &InjectionDefaults,
) -> Result<InjectionSpec, UnknownTemplate> {
    let mut resolved = spec.clone();
    if !spec.template.is_empty() {
        let template = templates.get(&spec.template).ok_or_else(|| UnknownTemplate {
            template: spec.template.clone(),
        })?;
        apply_template(&mut resolved, template);
    }
    apply_defaults(&mut resolved, defaults);
    Ok(resolved)
}

/// Resolve every spec of a rule in place.
pub fn resolve_rule(
    rule: &InstrumentationRule,
    templates: &HashMap<String, InjectionSpec>,
    defaults: &InjectionDefaults,
) -> Result<InstrumentationRule, UnknownTemplate> {
    let mut resolved = rule.clone();
    for spec in resolved.specs_mut() {
        *spec = resolve(spec, templates, defaults)?;
    }
    Ok(resolved)
}

/// Index templates by name. Unnamed templates are skipped.
pub fn template_index(templates: &[InjectionTemplate]) -> HashMap<String, InjectionSpec> {
    templates
        .iter()
        .filter(|t| !t.name.is_empty())
        .map(|t| (t.name.clone(), t.injection_rules.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn templates(name: &str, spec: InjectionSpec) -> HashMap<String, InjectionSpec> {
        HashMap::from([(name.to_string(), spec)])
    }

    #[test]
    fn empty_field_inherits_from_template() {
        let spec = InjectionSpec {
            template: "t1".into(),
            ..Default::default()
        };
        let t1 = InjectionSpec {
            java_env_var: "JAVA_TOOL_OPTIONS".into(),
            ..Default::default()
        };
        let resolved = resolve(&spec, &templates("t1", t1), &InjectionDefaults::default()).unwrap();
        assert_eq!(resolved.java_env_var, "JAVA_TOOL_OPTIONS");
    }

    #[test]
    fn own_value_is_never_overridden() {
        let spec = InjectionSpec {
            template: "t1".into(),
            java_env_var: "MY_VAR".into(),
            ..Default::default()
        };
        let t1 = InjectionSpec {
            java_env_var: "JAVA_TOOL_OPTIONS".into(),
            ..Default::default()
        };
        let resolved = resolve(&spec, &templates("t1", t1), &InjectionDefaults::default()).unwrap();
        assert_eq!(resolved.java_env_var, "MY_VAR");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let spec = InjectionSpec {
            template: "missing".into(),
            ..Default::default()
        };
        let err = resolve(&spec, &HashMap::new(), &InjectionDefaults::default()).unwrap_err();
        assert_eq!(err.template, "missing");
    }

    #[test]
    fn defaults_fill_the_rest() {
        let resolved = resolve(
            &InjectionSpec::default(),
            &HashMap::new(),
            &InjectionDefaults::default(),
        )
        .unwrap();
        assert_eq!(resolved.application_name, "DEFAULT_APP_NAME");
        assert_eq!(resolved.application_name_source, Some(NameSource::Namespace));
        assert_eq!(resolved.tier_name_source, Some(NameSource::Auto));
        assert_eq!(resolved.netviz_port, "3892");
        assert_eq!(resolved.reservation().cpu, "100m");
        assert_eq!(resolved.reservation().memory, "50M");
        assert_eq!(resolved.inject_k8s_otel_resource_attrs, OptionalBool::Set(true));
        assert_eq!(resolved.do_not_instrument, OptionalBool::Set(false));
    }

    #[test]
    fn booleans_resolve_own_then_template_then_default() {
        let t1 = InjectionSpec {
            inject_k8s_otel_resource_attrs: OptionalBool::Set(false),
            use_pod_name_for_node_name: OptionalBool::Set(true),
            ..Default::default()
        };
        let spec = InjectionSpec {
            template: "t1".into(),
            use_pod_name_for_node_name: OptionalBool::Set(false),
            ..Default::default()
        };
        let resolved = resolve(&spec, &templates("t1", t1), &InjectionDefaults::default()).unwrap();
        assert_eq!(resolved.use_pod_name_for_node_name, OptionalBool::Set(false));
        assert_eq!(resolved.inject_k8s_otel_resource_attrs, OptionalBool::Set(false));
    }

    #[test]
    fn partial_reservation_is_completed_by_defaults() {
        let t1 = InjectionSpec {
            resource_reservation: Some(ResourceReservation {
                cpu: "300m".into(),
                memory: String::new(),
            }),
            ..Default::default()
        };
        let spec = InjectionSpec {
            template: "t1".into(),
            ..Default::default()
        };
        let resolved = resolve(&spec, &templates("t1", t1), &InjectionDefaults::default()).unwrap();
        assert_eq!(resolved.reservation().cpu, "300m");
        assert_eq!(resolved.reservation().memory, "50M");
    }

    #[test]
    fn name_values_merge_by_key_sorted() {
        let templated = vec![NameValue::new("B", "t"), NameValue::new("A", "t")];
        let specific = vec![NameValue::new("C", "s"), NameValue::new("B", "s")];
        let merged = merge_name_values(&specific, &templated);
        assert_eq!(
            merged,
            vec![NameValue::new("A", "t"), NameValue::new("B", "s"), NameValue::new("C", "s")]
        );
    }

    #[test]
    fn resolve_rule_covers_rule_sets() {
        let rule = InstrumentationRule {
            name: "r".into(),
            injection_rule_set: vec![
                InjectionSpec::default(),
                InjectionSpec {
                    template: "t1".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let t1 = InjectionSpec {
            technology: "java/otel".into(),
            ..Default::default()
        };
        let resolved =
            resolve_rule(&rule, &templates("t1", t1), &InjectionDefaults::default()).unwrap();
        assert_eq!(resolved.injection_rule_set[1].technology, "java/otel");
        assert_eq!(resolved.injection_rule_set[0].java_env_var, "JAVA_TOOL_OPTIONS");
    }

    fn arb_name_values() -> impl Strategy<Value = Vec<NameValue>> {
        prop::collection::vec(("[A-D]", "[a-z]{0,3}"), 0..5)
            .prop_map(|v| v.into_iter().map(|(n, val)| NameValue::new(n, val)).collect())
    }

    fn arb_flag() -> impl Strategy<Value = OptionalBool> {
        prop_oneof![
            Just(OptionalBool::Unset),
            Just(OptionalBool::Set(true)),
            Just(OptionalBool::Set(false)),
        ]
    }

    fn arb_spec(with_template: bool) -> impl Strategy<Value = InjectionSpec> {
        (
            "(java|nodejs)?",
            "[A-Z_]{0,6}",
            arb_flag(),
            arb_flag(),
            arb_name_values(),
            arb_name_values(),
        )
            .prop_map(move |(technology, java_env_var, reuse, k8s, env, options)| InjectionSpec {
                template: if with_template { "t1".into() } else { String::new() },
                technology,
                java_env_var,
                use_pod_name_for_node_name: reuse,
                inject_k8s_otel_resource_attrs: k8s,
                env,
                options,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn resolution_is_idempotent(spec in arb_spec(true), template in arb_spec(false)) {
            let templates = templates("t1", template);
            let defaults = InjectionDefaults::default();
            let once = resolve(&spec, &templates, &defaults).unwrap();
            let twice = resolve(&once, &templates, &defaults).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
