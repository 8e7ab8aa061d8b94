#![cfg(test)]

use std::collections::HashMap;

use crate::plugin_system::dependency::{
    DependencyError, DependencyErrorKind, DependencyNode, DependencyResolver,
};
use crate::plugin_system::manifest::{ManifestBuilder, PluginManifest};

fn available(manifests: &[PluginManifest]) -> HashMap<String, PluginManifest> {
    manifests.iter().map(|m| (m.name.clone(), m.clone())).collect()
}

#[test]
fn test_chain_resolves_in_dependency_order() {
    let a = ManifestBuilder::new("a", "1.0.0").dependency("b", "^1.0.0").build();
    let b = ManifestBuilder::new("b", "1.2.0").dependency("c", "~2.1.0").build();
    let c = ManifestBuilder::new("c", "2.1.4").build();

    let resolver = DependencyResolver::new();
    let resolved = resolver.resolve(&a, &available(&[b, c])).expect("resolution should succeed");

    assert_eq!(resolved.install_order, vec!["c", "b", "a"]);
    assert!(resolved.conflicts.is_empty());

    let tree = &resolved.dependency_tree;
    assert_eq!(tree.name, "a");
    assert_eq!(tree.dependencies.len(), 1);
    assert_eq!(tree.dependencies[0].name, "b");
    assert_eq!(tree.dependencies[0].dependencies[0].version, "2.1.4");
}

#[test]
fn test_no_dependencies_yields_only_target() {
    let a = ManifestBuilder::new("a", "1.0.0").build();
    let resolved = DependencyResolver::new().resolve(&a, &HashMap::new()).unwrap();
    assert_eq!(resolved.install_order, vec!["a"]);
    assert!(resolved.dependency_tree.dependencies.is_empty());
}

#[test]
fn test_shared_dependency_appears_once_in_order() {
    // a -> {b, c}, b -> d, c -> d
    let a = ManifestBuilder::new("a", "1.0.0")
        .dependency("b", "^1.0.0")
        .dependency("c", "^1.0.0")
        .build();
    let b = ManifestBuilder::new("b", "1.0.0").dependency("d", "^1.0.0").build();
    let c = ManifestBuilder::new("c", "1.0.0").dependency("d", "^1.0.0").build();
    let d = ManifestBuilder::new("d", "1.0.0").build();

    let resolved = DependencyResolver::new().resolve(&a, &available(&[b, c, d])).unwrap();
    assert_eq!(resolved.install_order, vec!["d", "b", "c", "a"]);
}

#[test]
fn test_missing_dependency_names_requirer() {
    let a = ManifestBuilder::new("a", "1.0.0").dependency("b", "^1.0.0").build();
    let b = ManifestBuilder::new("b", "1.0.0").dependency("ghost", "^1.0.0").build();

    let err = DependencyResolver::new().resolve(&a, &available(&[b])).unwrap_err();
    assert_eq!(err.kind(), DependencyErrorKind::MissingDependency);
    match &err {
        DependencyError::MissingPlugin { name, required_by } => {
            assert_eq!(name, "ghost");
            assert_eq!(required_by, "b");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("ghost"));
    assert_eq!(err.plugin(), Some("b"));
}

#[test]
fn test_incompatible_version() {
    let a = ManifestBuilder::new("a", "1.0.0").dependency("b", "^2.0.0").build();
    let b = ManifestBuilder::new("b", "1.4.0").build();

    let err = DependencyResolver::new().resolve(&a, &available(&[b])).unwrap_err();
    assert_eq!(err.kind(), DependencyErrorKind::VersionMismatch);
    assert!(matches!(
        err,
        DependencyError::IncompatibleVersion { ref plugin_name, ref actual_version, .. }
            if plugin_name == "b" && actual_version == "1.4.0"
    ));
}

#[test]
fn test_cycle_reports_full_path() {
    let a = ManifestBuilder::new("a", "1.0.0").dependency("b", "^1.0.0").build();
    let b = ManifestBuilder::new("b", "1.0.0").dependency("a", "^1.0.0").build();

    let err = DependencyResolver::new().resolve(&a, &available(&[a.clone(), b])).unwrap_err();
    assert_eq!(err.kind(), DependencyErrorKind::CircularDependency);
    assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
}

#[test]
fn test_longer_cycle_is_detected() {
    let a = ManifestBuilder::new("a", "1.0.0").dependency("b", "^1.0.0").build();
    let b = ManifestBuilder::new("b", "1.0.0").dependency("c", "^1.0.0").build();
    let c = ManifestBuilder::new("c", "1.0.0").dependency("b", "^1.0.0").build();

    let err = DependencyResolver::new().resolve(&a, &available(&[b, c])).unwrap_err();
    match err {
        DependencyError::CyclicDependency(path) => assert_eq!(path, vec!["a", "b", "c", "b"]),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_diamond_is_not_a_cycle() {
    // The same name in sibling branches must not be mistaken for a cycle
    let a = ManifestBuilder::new("a", "1.0.0")
        .dependency("b", "^1.0.0")
        .dependency("c", "^1.0.0")
        .build();
    let b = ManifestBuilder::new("b", "1.0.0").dependency("d", "^1.0.0").build();
    let c = ManifestBuilder::new("c", "1.0.0").dependency("d", "^1.0.0").build();
    let d = ManifestBuilder::new("d", "1.0.0").build();

    let resolver = DependencyResolver::new();
    let deps = available(&[b, c, d]);
    // Repeated calls share no state
    assert!(resolver.resolve(&a, &deps).is_ok());
    assert!(resolver.resolve(&a, &deps).is_ok());
}

#[test]
fn test_all_dependencies_excludes_root() {
    let tree = DependencyNode::new("a", "1.0.0")
        .with_child(DependencyNode::new("b", "1.0.0").with_child(DependencyNode::new("d", "1.0.0")))
        .with_child(DependencyNode::new("c", "1.0.0").with_child(DependencyNode::new("d", "1.0.0")));

    let resolver = DependencyResolver::new();
    assert_eq!(resolver.all_dependencies(&tree), vec!["b", "d", "c"]);
    assert_eq!(resolver.topological_sort(&tree), vec!["d", "b", "c", "a"]);
}

#[test]
fn test_validate_tree_reports_cycles() {
    let resolver = DependencyResolver::new();

    let healthy = DependencyNode::new("a", "1.0.0").with_child(DependencyNode::new("b", "1.0.0"));
    let report = resolver.validate_tree(&healthy);
    assert!(report.valid);
    assert!(report.errors.is_empty());

    let cyclic = DependencyNode::new("a", "1.0.0")
        .with_child(DependencyNode::new("b", "1.0.0").with_child(DependencyNode::new("a", "1.0.0")));
    let report = resolver.validate_tree(&cyclic);
    assert!(!report.valid);
    assert_eq!(report.errors, vec!["Circular dependency: a -> b -> a"]);
}

#[test]
fn test_resolver_satisfies_version_delegates() {
    let resolver = DependencyResolver::new();
    assert!(resolver.satisfies_version("1.2.5", "^1.2.0"));
    assert!(!resolver.satisfies_version("2.0.0", "^1.2.0"));
}
