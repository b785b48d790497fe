//! Regex matching of workload metadata against [`MatchCriteria`].
//!
//! The namespace pattern must match the whole namespace; pod-name, label and
//! annotation patterns match anywhere in the value. A label or annotation the
//! workload does not carry is a non-match.

use injector_core::Workload;
use regex::Regex;
use tracing::warn;

use crate::schema::MatchCriteria;

/// Criteria with every regex compiled up front.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    namespace: Option<Regex>,
    pod_name: Option<Regex>,
    labels: Vec<(String, Regex)>,
    annotations: Vec<(String, Regex)>,
}

impl CompiledMatcher {
    pub fn compile(criteria: &MatchCriteria) -> Result<Self, regex::Error> {
        let namespace = match criteria.namespace_regex.as_str() {
            "" => None,
            re => Some(Regex::new(&format!("^(?:{})$", re))?),
        };
        let pod_name = match criteria.pod_name_regex.as_str() {
            "" => None,
            re => Some(Regex::new(re)?),
        };
        Ok(Self {
            namespace,
            pod_name,
            labels: compile_pairs(&criteria.labels)?,
            annotations: compile_pairs(&criteria.annotations)?,
        })
    }

    pub fn matches(&self, workload: &Workload) -> bool {
        if let Some(re) = &self.namespace {
            if !re.is_match(workload.namespace()) {
                return false;
            }
        }
        if let Some(re) = &self.pod_name {
            if !re.is_match(workload.name()) {
                return false;
            }
        }
        let labels_ok = self
            .labels
            .iter()
            .all(|(key, re)| workload.label(key).is_some_and(|v| re.is_match(v)));
        if !labels_ok {
            return false;
        }
        self.annotations
            .iter()
            .all(|(key, re)| workload.annotation(key).is_some_and(|v| re.is_match(v)))
    }
}

fn compile_pairs(
    entries: &[std::collections::BTreeMap<String, String>],
) -> Result<Vec<(String, Regex)>, regex::Error> {
    let mut out = Vec::new();
    for entry in entries {
        for (key, re) in entry {
            // An empty pattern still requires the key.
            out.push((key.clone(), Regex::new(re)?));
        }
    }
    Ok(out)
}

/// One-shot match that compiles on the fly.
///
/// A malformed regex is logged and treated as a non-match.
pub fn matches(workload: &Workload, criteria: &MatchCriteria) -> bool {
    match CompiledMatcher::compile(criteria) {
        Ok(matcher) => matcher.matches(workload),
        Err(e) => {
            warn!(error = %e, workload = %workload.name(), "Malformed match regex, treating as no match");
            false
        }
    }
}
