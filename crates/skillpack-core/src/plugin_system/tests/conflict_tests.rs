#![cfg(test)]

use crate::plugin_system::conflict::{DependencyConflict, ROOT_PARENT, collect_version_conflicts};
use crate::plugin_system::dependency::{DependencyError, DependencyErrorKind, DependencyNode, DependencyResolver};

/// a requires b@1.0.0 and c@2.0.0; c requires b@1.1.0
fn conflicting_tree() -> DependencyNode {
    DependencyNode::new("a", "1.0.0")
        .with_child(DependencyNode::new("b", "1.0.0"))
        .with_child(DependencyNode::new("c", "2.0.0").with_child(DependencyNode::new("b", "1.1.0")))
}

#[test]
fn test_conflict_names_plugin_and_versions() {
    let conflicts = DependencyResolver::new().find_conflicts(&conflicting_tree());

    assert_eq!(conflicts.len(), 1);
    let conflict = &conflicts[0];
    assert_eq!(conflict.plugin, "b");
    assert_eq!(conflict.versions, vec!["1.0.0", "1.1.0"]);
    assert_eq!(conflict.required_by, vec!["a", "c"]);
}

#[test]
fn test_same_version_everywhere_is_not_a_conflict() {
    let tree = DependencyNode::new("a", "1.0.0")
        .with_child(DependencyNode::new("b", "1.0.0"))
        .with_child(DependencyNode::new("c", "2.0.0").with_child(DependencyNode::new("b", "1.0.0")));

    assert!(collect_version_conflicts(&tree).is_empty());
}

#[test]
fn test_root_is_recorded_with_root_parent() {
    // The root name reappearing deeper at another version is also a conflict
    let tree = DependencyNode::new("a", "1.0.0")
        .with_child(DependencyNode::new("x", "1.0.0").with_child(DependencyNode::new("a", "0.9.0")));

    let conflicts = collect_version_conflicts(&tree);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].required_by, vec![ROOT_PARENT, "x"]);
}

#[test]
fn test_conflict_display_and_error_message() {
    let conflicts = collect_version_conflicts(&conflicting_tree());
    assert_eq!(conflicts[0].to_string(), "b (versions 1.0.0, 1.1.0 required by a, c)");

    let err = DependencyError::VersionConflict {
        plugin: "a".to_string(),
        conflicts: conflicts.clone(),
    };
    assert_eq!(err.kind(), DependencyErrorKind::VersionConflict);
    assert_eq!(err.plugin(), Some("a"));
    assert!(err.to_string().contains("b (versions 1.0.0, 1.1.0"));
}

#[test]
fn test_conflict_serializes_camel_case() {
    let conflict = DependencyConflict {
        plugin: "b".into(),
        required_by: vec!["a".into()],
        versions: vec!["1.0.0".into()],
    };
    let value = serde_json::to_value(&conflict).unwrap();
    assert_eq!(value["requiredBy"][0], "a");
}
