use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static FRONTMATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---\n([\s\S]*?)\n---").expect("frontmatter regex is valid"));

static FIELD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+):\s*(.+)$").expect("frontmatter field regex is valid"));

/// Description used when a skill descriptor does not provide one
pub const DEFAULT_SKILL_DESCRIPTION: &str = "No description";

/// A skill exposed by an installed plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    /// Absolute path of the skill directory
    pub path: PathBuf,
    pub enabled: bool,
    /// Name of the owning plugin
    pub plugin: String,
}

/// Extract the `key: value` pairs of a `---` delimited header.
///
/// Returns `None` when the document does not start with a header block.
/// Lines that are not simple `key: value` pairs are ignored.
pub fn parse_frontmatter(content: &str) -> Option<BTreeMap<String, String>> {
    let normalized = content.replace("\r\n", "\n");
    let block = FRONTMATTER.captures(&normalized)?.get(1)?.as_str().to_string();

    let fields = block
        .lines()
        .filter_map(|line| FIELD_LINE.captures(line))
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
        .collect();

    Some(fields)
}
