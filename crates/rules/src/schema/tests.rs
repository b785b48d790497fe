//! Tests for schema types.

use super::*;

const NAMESPACED_RULE_YAML: &str = r#"
apiVersion: ext.appd.com/v1alpha1
kind: Instrumentation
metadata:
  name: java-payments
  namespace: payments
spec:
  name: java-payments
  priority: 2
  matchRules:
    podNameRegex: "^checkout-.*"
    labels:
      - language: java
  injectionRules:
    template: java-base
    technology: java/appd
    applicationNameSource: label
    applicationNameLabel: app
    usePodNameForNodeName: true
    injectK8SOtelResourceAttrs: false
    resourceReservation:
      cpu: 250m
    env:
      - name: APPD_DEBUG
        value: "1"
"#;

const CONFIG_MAP_YAML: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: webhook-instrumentor-config
  namespace: appd
data:
  controller: |
    host: controller.example.com
    port: "443"
    isSecure: true
    accountName: customer1
    accessKey: abc
  instrumentation: |
    - name: all-java
      matchRules:
        namespaceRegex: ".*"
      injectionRules:
        technology: java
"#;

const COLLECTOR_YAML: &str = r#"
apiVersion: ext.appd.com/v1alpha1
kind: OpenTelemetryCollector
metadata:
  name: traces
  namespace: payments
spec:
  mode: sidecar
  image: otel/opentelemetry-collector:0.88.0
  config: |
    receivers: {}
  env:
    - name: GOMEMLIMIT
      value: 400MiB
"#;

#[test]
fn parse_namespaced_rule_two_pass() {
    let envelope: ObjectEnvelope = serde_yaml::from_str(NAMESPACED_RULE_YAML).unwrap();
    assert_eq!(envelope.object_kind().unwrap(), ObjectKind::Instrumentation);
    assert_eq!(envelope.metadata.namespace, "payments");

    let object = envelope.parse_full().unwrap();
    assert_eq!(object.kind(), ObjectKind::Instrumentation);
    let rule = &object.as_rule().unwrap().spec;
    assert_eq!(rule.priority, 2);
    assert_eq!(rule.match_rules.labels[0]["language"], "java");

    let spec = rule.injection_rules.as_ref().unwrap();
    assert_eq!(spec.template, "java-base");
    assert_eq!(spec.application_name_source, Some(NameSource::Label));
    assert_eq!(spec.use_pod_name_for_node_name, OptionalBool::Set(true));
    assert_eq!(spec.inject_k8s_otel_resource_attrs, OptionalBool::Set(false));
    assert!(spec.do_not_instrument.is_unset());
    assert_eq!(spec.reservation().cpu, "250m");
    assert_eq!(spec.env, vec![NameValue::new("APPD_DEBUG", "1")]);
}

#[test]
fn parse_config_map() {
    let envelope: ObjectEnvelope = serde_yaml::from_str(CONFIG_MAP_YAML).unwrap();
    let object = envelope.parse_full().unwrap();
    let map = object.as_config_map().unwrap();
    assert_eq!(map.metadata.name, "webhook-instrumentor-config");

    let controller: ControllerConfig = serde_yaml::from_str(&map.data["controller"]).unwrap();
    assert!(controller.is_secure);
    assert_eq!(controller.port, "443");

    let rules: Vec<InstrumentationRule> =
        serde_yaml::from_str(&map.data["instrumentation"]).unwrap();
    assert_eq!(rules[0].priority, 1, "priority defaults to 1");
    assert_eq!(rules[0].specs().len(), 1);
}

#[test]
fn parse_collector() {
    let envelope: ObjectEnvelope = serde_yaml::from_str(COLLECTOR_YAML).unwrap();
    let object = envelope.parse_full().unwrap();
    let collector = object.as_collector().unwrap();
    assert_eq!(collector.spec.mode, Some(CollectorMode::Sidecar));
    assert_eq!(collector.spec.env[0].value.as_deref(), Some("400MiB"));
    assert!(object.as_rule().is_none());
}

#[test]
fn unknown_kind_is_rejected() {
    let yaml = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: x\n";
    let envelope: ObjectEnvelope = serde_yaml::from_str(yaml).unwrap();
    let err = envelope.parse_full().unwrap_err();
    assert!(err.contains("Secret"));
}

#[test]
fn kind_display_roundtrip() {
    for kind in [
        ObjectKind::ConfigMap,
        ObjectKind::Instrumentation,
        ObjectKind::ClusterInstrumentation,
        ObjectKind::OpenTelemetryCollector,
    ] {
        assert_eq!(kind.to_string().parse::<ObjectKind>().unwrap(), kind);
    }
}

#[test]
fn technology_token_defaults_vendor() {
    let t = Technology::parse("java");
    assert_eq!(t.language, Some(Language::Java));
    assert_eq!(t.vendor, Some(Vendor::Appd));

    let t = Technology::parse("dotnetcore/otel");
    assert_eq!(t.language, Some(Language::DotnetCore));
    assert_eq!(t.vendor, Some(Vendor::Otel));

    let t = Technology::parse("ruby");
    assert_eq!(t.language, None);
    assert_eq!(t.vendor, Some(Vendor::Appd));

    let t = Technology::parse("java/acme");
    assert_eq!(t.vendor, None);
}

#[test]
fn rule_set_takes_precedence_over_single_spec() {
    let yaml = r#"
name: multi
injectionRules:
  technology: java
injectionRuleSet:
  - technology: java
  - technology: java/otel
"#;
    let rule: InstrumentationRule = serde_yaml::from_str(yaml).unwrap();
    assert!(rule.is_rule_set());
    let specs = rule.specs();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[1].technology, "java/otel");
}

#[test]
fn optional_bool_precedence() {
    let own = OptionalBool::Set(false);
    assert_eq!(own.or(OptionalBool::Set(true)).resolve(true), false);
    assert_eq!(OptionalBool::Unset.or(OptionalBool::Set(true)).resolve(false), true);
    assert_eq!(OptionalBool::Unset.or(OptionalBool::Unset).resolve(true), true);
}

#[test]
fn unset_fields_are_omitted_when_serialized() {
    let spec = InjectionSpec {
        technology: "java".into(),
        ..Default::default()
    };
    let json = serde_json::to_value(&spec).unwrap();
    assert_eq!(json, serde_json::json!({"technology": "java"}));
}
