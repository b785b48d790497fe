//! Match criteria evaluated against workload metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which workloads a rule applies to. Unset fields place no constraint;
/// all present constraints are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace_regex: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_name_regex: String,
    /// Ordered label constraints, each normally a single `key: regex` entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<BTreeMap<String, String>>,
}

impl MatchCriteria {
    /// Every regex carried by these criteria, with a path for diagnostics.
    pub fn patterns(&self) -> Vec<(String, &str)> {
        let mut out = Vec::new();
        if !self.namespace_regex.is_empty() {
            out.push(("namespaceRegex".to_string(), self.namespace_regex.as_str()));
        }
        if !self.pod_name_regex.is_empty() {
            out.push(("podNameRegex".to_string(), self.pod_name_regex.as_str()));
        }
        for (i, entry) in self.labels.iter().enumerate() {
            for (key, re) in entry {
                out.push((format!("labels[{}].{}", i, key), re.as_str()));
            }
        }
        for (i, entry) in self.annotations.iter().enumerate() {
            for (key, re) in entry {
                out.push((format!("annotations[{}].{}", i, key), re.as_str()));
            }
        }
        out
    }
}
