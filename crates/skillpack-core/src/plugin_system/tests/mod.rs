pub mod fixtures;

pub mod conflict_tests;
pub mod dependency_tests;
pub mod manifest_tests;
pub mod registry_tests;
