//! Tests for the configuration loader module.

use std::fs;
use std::sync::Arc;

use notify::event::{CreateKind, RemoveKind};
use notify::{Event, EventKind};
use tempfile::TempDir;

use super::watcher::handle_fs_event;
use super::*;
use crate::registry::{Registry, RuleScope};
use crate::schema::CollectorMode;

const CONFIG_MAP_YAML: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: webhook-instrumentor-config
  namespace: default
data:
  controller: |
    host: controller.example.com
    port: "443"
    accountName: customer1
    accessKey: abc
  injectionTemplates: |
    - name: java-base
      injectionRules:
        technology: java
        image: appdynamics/java-agent:latest
  instrumentation: |
    - name: all-java
      matchRules:
        labels:
          - language: java
      injectionRules:
        template: java-base
"#;

const COLLECTOR_MAP_YAML: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: otel-collector-config
data:
  shared.mode: deployment
  shared.serviceName: collector.observability
"#;

const RULE_YAML: &str = r#"
apiVersion: ext.appd.com/v1alpha1
kind: Instrumentation
metadata:
  name: checkout
  namespace: payments
spec:
  priority: 3
  matchRules:
    namespaceRegex: ".*"
    podNameRegex: checkout
  injectionRules:
    template: java-base
"#;

const COLLECTOR_YAML: &str = r#"
apiVersion: ext.appd.com/v1alpha1
kind: OpenTelemetryCollector
metadata:
  name: traces
  namespace: payments
spec:
  mode: deployment
  config: "receivers: {}"
"#;

fn temp_loader() -> (TempDir, ConfigLoader) {
    let dir = TempDir::new().expect("create tempdir");
    let registry = Arc::new(Registry::default());
    let applier = ObjectApplier::new(registry, &injector_core::Config::default());
    let loader = ConfigLoader::new(dir.path().to_path_buf(), applier);
    (dir, loader)
}

#[test]
fn load_all_applies_configmaps_before_resources() {
    let (dir, loader) = temp_loader();
    // Sorts before the ConfigMap on disk; still needs its templates.
    fs::write(dir.path().join("a-rule.yaml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("z-config.yaml"), CONFIG_MAP_YAML).unwrap();

    let results = loader.load_all().unwrap();
    let loaded = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Loaded { .. }))
        .count();
    assert_eq!(loaded, 2, "{:?}", results);

    let state = loader.applier().registry().snapshot();
    let tier = state.tier(&RuleScope::Namespace("payments".into()));
    let rule = &tier[0].rule;
    assert_eq!(rule.name, "payments/checkout");
    assert_eq!(rule.match_rules.namespace_regex, "^payments$");
    let spec = rule.injection_rules.as_ref().unwrap();
    assert_eq!(spec.image, "appdynamics/java-agent:latest");
    assert_eq!(state.config_rules[0].rule.name, "all-java");
}

#[test]
fn load_all_skips_dotfiles_non_yaml_and_foreign_configmaps() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("config.yml"), CONFIG_MAP_YAML).unwrap();
    fs::write(dir.path().join(".hidden.yml"), CONFIG_MAP_YAML).unwrap();
    fs::write(dir.path().join("readme.txt"), "not an object").unwrap();
    fs::write(
        dir.path().join("other.yml"),
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: unrelated\ndata: {}\n",
    )
    .unwrap();

    let results = loader.load_all().unwrap();
    let skipped = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .count();
    assert_eq!(skipped, 3);
}

#[test]
fn subdirectories_are_scanned() {
    let (dir, loader) = temp_loader();
    let nested = dir.path().join("collectors");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("shared.yaml"), COLLECTOR_MAP_YAML).unwrap();
    fs::write(nested.join("traces.yaml"), COLLECTOR_YAML).unwrap();

    loader.load_all().unwrap();
    let state = loader.applier().registry().snapshot();
    assert_eq!(
        state.collectors.lookup("search", "shared").unwrap().service_name,
        "collector.observability"
    );
    let traces = state.collectors.lookup("payments", "traces").unwrap();
    assert_eq!(traces.mode, CollectorMode::Deployment);
    assert_eq!(traces.service_name, "otel-collector-traces.payments.svc.cluster.local");
}

#[test]
fn broken_files_fail_individually() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("config.yaml"), CONFIG_MAP_YAML).unwrap();
    fs::write(dir.path().join("broken.yaml"), "kind: [unterminated").unwrap();
    fs::write(
        dir.path().join("secret.yaml"),
        "apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n",
    )
    .unwrap();

    let results = loader.load_all().unwrap();
    let failed = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
        .count();
    assert_eq!(failed, 2);
    assert_eq!(loader.applier().registry().snapshot().config_rules.len(), 1);
}

#[test]
fn configuration_without_controller_is_rejected() {
    let (dir, loader) = temp_loader();
    let yaml = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: webhook-instrumentor-config\ndata:\n  instrumentation: \"[]\"\n";
    fs::write(dir.path().join("config.yaml"), yaml).unwrap();

    let results = loader.load_all().unwrap();
    match &results[0].status {
        LoadStatus::Failed { error } => assert!(error.contains("controller")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(loader.applier().registry().snapshot().controller.is_none());
}

#[test]
fn removed_file_undoes_its_resource() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("config.yaml"), CONFIG_MAP_YAML).unwrap();
    let rule_path = dir.path().join("rule.yaml");
    fs::write(&rule_path, RULE_YAML).unwrap();
    loader.load_all().unwrap();
    assert_eq!(loader.applied().len(), 2);

    fs::remove_file(&rule_path).unwrap();
    let event = Event::new(EventKind::Remove(RemoveKind::File)).add_path(rule_path.clone());
    handle_fs_event(&event, loader.applier(), &loader.applied);

    let state = loader.applier().registry().snapshot();
    assert!(state.namespaced_rules.is_empty());
    assert!(!loader.applied().contains_key(&rule_path));
}

#[test]
fn hot_reload_applies_new_file() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("config.yaml"), CONFIG_MAP_YAML).unwrap();
    loader.load_all().unwrap();

    let path = dir.path().join("traces.yaml");
    fs::write(&path, COLLECTOR_YAML).unwrap();
    let event = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
    handle_fs_event(&event, loader.applier(), &loader.applied);

    let state = loader.applier().registry().snapshot();
    assert!(state.collectors.lookup("payments", "traces").is_some());
    assert_eq!(
        loader.applied().get(&path),
        Some(&AppliedObject::Collector {
            namespace: "payments".into(),
            name: "traces".into()
        })
    );
}

#[test]
fn cluster_rule_is_qualified() {
    let object = crate::schema::RuleObject {
        api_version: "ext.appd.com/v1alpha1".into(),
        kind: "ClusterInstrumentation".into(),
        metadata: crate::schema::ObjectMetadata {
            name: "everything".into(),
            namespace: String::new(),
        },
        spec: Default::default(),
    };
    let (scope, rule) = qualified_rule(&object, true);
    assert_eq!(scope, RuleScope::Cluster);
    assert_eq!(rule.name, "*cluster*/everything");
    assert!(rule.match_rules.namespace_regex.is_empty());
}

#[test]
fn watch_starts_on_existing_directory() {
    let (_dir, mut loader) = temp_loader();
    loader.watch().unwrap();
}
