use std::fmt;

use serde::Serialize;

use crate::plugin_system::dependency::DependencyNode;

/// Parent name recorded for the root of a dependency tree
pub const ROOT_PARENT: &str = "root";

/// Several requirers of the same plugin demand different versions of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyConflict {
    /// The plugin whose version is disputed
    pub plugin: String,
    /// Every parent that pulled the plugin in, grouped by the version it got
    pub required_by: Vec<String>,
    /// Distinct versions, in first-seen order
    pub versions: Vec<String>,
}

impl fmt::Display for DependencyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (versions {} required by {})",
            self.plugin,
            self.versions.join(", "),
            self.required_by.join(", ")
        )
    }
}

/// Versions seen for one plugin name, each with the parents that demanded it
#[derive(Debug, Default)]
struct VersionDemands {
    by_version: Vec<(String, Vec<String>)>,
}

impl VersionDemands {
    fn record(&mut self, version: &str, parent: &str) {
        match self.by_version.iter_mut().find(|(v, _)| v == version) {
            Some((_, parents)) => parents.push(parent.to_string()),
            None => self.by_version.push((version.to_string(), vec![parent.to_string()])),
        }
    }
}

/// Walk a dependency tree and report every name demanded at more than one version.
///
/// Results follow the order in which names are first met in a pre-order walk.
pub fn collect_version_conflicts(root: &DependencyNode) -> Vec<DependencyConflict> {
    let mut demands: Vec<(String, VersionDemands)> = Vec::new();
    let mut stack: Vec<(&DependencyNode, &str)> = vec![(root, ROOT_PARENT)];

    while let Some((node, parent)) = stack.pop() {
        let index = match demands.iter().position(|(name, _)| *name == node.name) {
            Some(index) => index,
            None => {
                demands.push((node.name.clone(), VersionDemands::default()));
                demands.len() - 1
            }
        };
        demands[index].1.record(&node.version, parent);

        // Reverse so children are visited in declaration order
        for child in node.dependencies.iter().rev() {
            stack.push((child, node.name.as_str()));
        }
    }

    demands
        .into_iter()
        .filter(|(_, demand)| demand.by_version.len() > 1)
        .map(|(plugin, demand)| {
            let versions = demand.by_version.iter().map(|(v, _)| v.clone()).collect();
            let required_by = demand.by_version.into_iter().flat_map(|(_, parents)| parents).collect();
            DependencyConflict {
                plugin,
                required_by,
                versions,
            }
        })
        .collect()
}
