use std::collections::btree_map;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::plugin_system::conflict::{DependencyConflict, collect_version_conflicts};
use crate::plugin_system::manifest::PluginManifest;
use crate::plugin_system::version::satisfies_version;

/// One plugin in a dependency tree, owning its children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub name: String,
    pub version: String,
    pub dependencies: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: DependencyNode) -> Self {
        self.dependencies.push(child);
        self
    }
}

/// Result of a successful resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDependencies {
    /// Dependencies first, the target plugin last
    pub install_order: Vec<String>,
    pub dependency_tree: DependencyNode,
    /// Always empty on success, conflicts abort resolution
    pub conflicts: Vec<DependencyConflict>,
}

/// Outcome of [`DependencyResolver::validate_tree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Distinguishes resolution failures without matching on messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyErrorKind {
    MissingDependency,
    VersionMismatch,
    CircularDependency,
    VersionConflict,
    Other,
}

/// Error that can occur when resolving dependencies
#[derive(Debug, Error)]
pub enum DependencyError {
    /// The required plugin was not found
    #[error("Dependency not found: {name} (required by {required_by})")]
    MissingPlugin { name: String, required_by: String },

    /// The plugin was found, but the version is incompatible
    #[error(
        "Version mismatch: {plugin_name} {actual_version} does not satisfy {required_range} (required by {required_by})"
    )]
    IncompatibleVersion {
        plugin_name: String,
        required_range: String,
        actual_version: String,
        required_by: String,
    },

    /// Dependency cycle detected
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// Different parents demand different versions of the same plugin
    #[error(
        "Dependency conflicts found while resolving {plugin}: {}",
        .conflicts.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("; ")
    )]
    VersionConflict {
        plugin: String,
        conflicts: Vec<DependencyConflict>,
    },

    /// Other dependency resolution error
    #[error("Dependency error: {0}")]
    Other(String),
}

impl DependencyError {
    pub fn kind(&self) -> DependencyErrorKind {
        match self {
            DependencyError::MissingPlugin { .. } => DependencyErrorKind::MissingDependency,
            DependencyError::IncompatibleVersion { .. } => DependencyErrorKind::VersionMismatch,
            DependencyError::CyclicDependency(_) => DependencyErrorKind::CircularDependency,
            DependencyError::VersionConflict { .. } => DependencyErrorKind::VersionConflict,
            DependencyError::Other(_) => DependencyErrorKind::Other,
        }
    }

    /// The plugin the failure is attributed to
    pub fn plugin(&self) -> Option<&str> {
        match self {
            DependencyError::MissingPlugin { required_by, .. } => Some(required_by),
            DependencyError::IncompatibleVersion { required_by, .. } => Some(required_by),
            DependencyError::CyclicDependency(path) => path.last().map(String::as_str),
            DependencyError::VersionConflict { plugin, .. } => Some(plugin),
            DependencyError::Other(_) => None,
        }
    }
}

/// A partially expanded node during tree construction
struct Frame<'a> {
    node: DependencyNode,
    pending: btree_map::Iter<'a, String, String>,
    /// Names from the root down to and including this node
    ancestors: Vec<String>,
}

impl<'a> Frame<'a> {
    fn new(manifest: &'a PluginManifest, ancestors: Vec<String>) -> Self {
        Self {
            node: DependencyNode::new(&manifest.name, &manifest.version),
            pending: manifest.dependencies.iter(),
            ancestors,
        }
    }
}

/// Builds dependency trees and installation orders
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `target` against `available`, all or nothing
    pub fn resolve(
        &self,
        target: &PluginManifest,
        available: &HashMap<String, PluginManifest>,
    ) -> Result<ResolvedDependencies, DependencyError> {
        let dependency_tree = self.build_dependency_tree(target, available)?;

        let conflicts = self.find_conflicts(&dependency_tree);
        if !conflicts.is_empty() {
            return Err(DependencyError::VersionConflict {
                plugin: target.name.clone(),
                conflicts,
            });
        }

        let install_order = self.topological_sort(&dependency_tree);
        log::debug!("Resolved {} install order: {}", target.name, install_order.join(", "));

        Ok(ResolvedDependencies {
            install_order,
            dependency_tree,
            conflicts,
        })
    }

    /// Expand `target.dependencies` into a tree.
    ///
    /// Each stack frame carries the path of names above it; a dependency that
    /// already appears on that path is a cycle.
    pub fn build_dependency_tree(
        &self,
        target: &PluginManifest,
        available: &HashMap<String, PluginManifest>,
    ) -> Result<DependencyNode, DependencyError> {
        let mut stack = vec![Frame::new(target, vec![target.name.clone()])];
        let mut root = None;

        while let Some(mut frame) = stack.pop() {
            let Some((dep_name, range)) = frame.pending.next() else {
                match stack.last_mut() {
                    Some(parent) => parent.node.dependencies.push(frame.node),
                    None => root = Some(frame.node),
                }
                continue;
            };

            let dependency = available.get(dep_name).ok_or_else(|| DependencyError::MissingPlugin {
                name: dep_name.clone(),
                required_by: frame.node.name.clone(),
            })?;

            if !satisfies_version(&dependency.version, range) {
                return Err(DependencyError::IncompatibleVersion {
                    plugin_name: dep_name.clone(),
                    required_range: range.clone(),
                    actual_version: dependency.version.clone(),
                    required_by: frame.node.name.clone(),
                });
            }

            let mut path = frame.ancestors.clone();
            path.push(dep_name.clone());
            if frame.ancestors.contains(dep_name) {
                return Err(DependencyError::CyclicDependency(path));
            }

            stack.push(frame);
            stack.push(Frame::new(dependency, path));
        }

        root.ok_or_else(|| DependencyError::Other(format!("no dependency tree built for {}", target.name)))
    }

    /// Names demanded at more than one version, with the parents demanding them
    pub fn find_conflicts(&self, tree: &DependencyNode) -> Vec<DependencyConflict> {
        collect_version_conflicts(tree)
    }

    /// Post-order walk: every dependency precedes its dependents, the root is last
    pub fn topological_sort(&self, tree: &DependencyNode) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![(tree, false)];

        while let Some((node, children_done)) = stack.pop() {
            if children_done {
                order.push(node.name.clone());
                continue;
            }
            if !visited.insert(node.name.as_str()) {
                continue;
            }
            stack.push((node, true));
            for child in node.dependencies.iter().rev() {
                stack.push((child, false));
            }
        }

        order
    }

    pub fn satisfies_version(&self, version: &str, range: &str) -> bool {
        satisfies_version(version, range)
    }

    /// Every plugin below the root, de-duplicated, in pre-order
    pub fn all_dependencies(&self, tree: &DependencyNode) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![tree];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.name.as_str()) {
                continue;
            }
            result.push(node.name.clone());
            for child in node.dependencies.iter().rev() {
                stack.push(child);
            }
        }

        // Exclude root
        result.into_iter().skip(1).collect()
    }

    /// Report repeated names along any root-to-leaf path of a tree built elsewhere
    pub fn validate_tree(&self, tree: &DependencyNode) -> TreeValidation {
        let mut errors = Vec::new();
        let mut stack: Vec<(&DependencyNode, Vec<&str>)> = vec![(tree, Vec::new())];

        while let Some((node, path)) = stack.pop() {
            if path.contains(&node.name.as_str()) {
                errors.push(format!("Circular dependency: {} -> {}", path.join(" -> "), node.name));
                continue;
            }

            let mut child_path = path;
            child_path.push(node.name.as_str());
            for child in node.dependencies.iter().rev() {
                stack.push((child, child_path.clone()));
            }
        }

        TreeValidation {
            valid: errors.is_empty(),
            errors,
        }
    }
}
