use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::plugin_system::manifest::{HookKind, PluginManifest};
use crate::plugin_system::version::is_valid_semver;
use crate::utils::fs::{collect_files, is_hidden};

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("plugin name regex is valid"));

const REQUIRED_FIELDS: [&str; 4] = ["name", "version", "description", "skills"];
const DANGEROUS_FILESYSTEM_PERMISSIONS: [&str; 2] = ["write", "delete"];
const DANGEROUS_TOOLS: [&str; 4] = ["rm", "sudo", "chmod", "chown"];

/// A single finding, located by a JSONPath-style path into the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// True when there are no errors; warnings never invalidate
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|issue| issue.code == code)
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|issue| issue.code == code)
    }

    /// Error messages joined for inclusion in another error
    pub fn error_summary(&self) -> String {
        self.errors.iter().map(|issue| issue.message.as_str()).collect::<Vec<_>>().join(", ")
    }
}

#[derive(Default)]
struct Report {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Report {
    fn error(&mut self, code: &'static str, message: impl Into<String>, path: impl Into<String>) {
        self.errors.push(ValidationIssue {
            code,
            message: message.into(),
            path: path.into(),
        });
    }

    fn warning(&mut self, code: &'static str, message: impl Into<String>, path: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            code,
            message: message.into(),
            path: path.into(),
        });
    }

    fn finish(self) -> ValidationResult {
        ValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Platform name of the running host, using the `linux`/`darwin`/`win32` convention
pub fn current_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn string_list(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Structural and filesystem checks for plugin manifests, plus content checksums
#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Check a manifest candidate against the plugin directory it came from.
    ///
    /// Never fails: every problem, including a non-object candidate, is reported
    /// in the returned [`ValidationResult`].
    pub async fn validate(&self, candidate: &Value, install_path: &Path) -> ValidationResult {
        let mut report = Report::default();

        let Some(manifest) = candidate.as_object() else {
            report.error("INVALID_TYPE", "Manifest must be an object", "$");
            return report.finish();
        };

        for field in REQUIRED_FIELDS {
            if manifest.get(field).is_none_or(Value::is_null) {
                report.error(
                    "MISSING_REQUIRED_FIELD",
                    format!("Missing required field: {}", field),
                    format!("$.{}", field),
                );
            }
        }

        Self::check_name(manifest, &mut report);
        Self::check_version(manifest, &mut report);
        Self::check_description(manifest, &mut report);
        Self::check_skills(manifest, install_path, &mut report).await;
        Self::check_dependencies(manifest, &mut report);
        Self::check_permissions(manifest, &mut report);
        Self::check_system_requirements(manifest, &mut report);
        Self::check_hooks(manifest, install_path, &mut report).await;
        Self::check_metadata(manifest, &mut report);

        report.finish()
    }

    /// Validate an already parsed manifest
    pub async fn validate_manifest(&self, manifest: &PluginManifest, install_path: &Path) -> ValidationResult {
        match serde_json::to_value(manifest) {
            Ok(candidate) => self.validate(&candidate, install_path).await,
            Err(e) => {
                let mut report = Report::default();
                report.error("INVALID_TYPE", format!("Manifest could not be serialized: {}", e), "$");
                report.finish()
            }
        }
    }

    fn check_name(manifest: &Map<String, Value>, report: &mut Report) {
        let Some(name) = manifest.get("name").filter(|v| !v.is_null()) else {
            return;
        };
        let name = name.as_str().unwrap_or_default();

        if !NAME_PATTERN.is_match(name) {
            report.error(
                "INVALID_NAME",
                "Plugin name must be lowercase alphanumeric with hyphens only",
                "$.name",
            );
        }
        if name.chars().count() > constants::MAX_NAME_LENGTH {
            report.error(
                "NAME_TOO_LONG",
                format!("Plugin name must be {} characters or less", constants::MAX_NAME_LENGTH),
                "$.name",
            );
        }
    }

    fn check_version(manifest: &Map<String, Value>, report: &mut Report) {
        let Some(version) = manifest.get("version").filter(|v| !v.is_null()) else {
            return;
        };
        if !version.as_str().is_some_and(is_valid_semver) {
            report.error(
                "INVALID_VERSION",
                "Version must follow semantic versioning (e.g., 1.0.0)",
                "$.version",
            );
        }
    }

    fn check_description(manifest: &Map<String, Value>, report: &mut Report) {
        let Some(description) = manifest.get("description").and_then(Value::as_str) else {
            return;
        };
        let length = description.chars().count();

        if length < constants::MIN_DESCRIPTION_LENGTH {
            report.warning(
                "SHORT_DESCRIPTION",
                format!("Description should be at least {} characters", constants::MIN_DESCRIPTION_LENGTH),
                "$.description",
            );
        }
        if length > constants::MAX_DESCRIPTION_LENGTH {
            report.error(
                "DESCRIPTION_TOO_LONG",
                format!("Description must be {} characters or less", constants::MAX_DESCRIPTION_LENGTH),
                "$.description",
            );
        }
    }

    async fn check_skills(manifest: &Map<String, Value>, install_path: &Path, report: &mut Report) {
        let Some(skills) = manifest.get("skills").filter(|v| !v.is_null()) else {
            return;
        };
        let Some(skills) = skills.as_array() else {
            report.error("INVALID_SKILLS", "Skills must be an array", "$.skills");
            return;
        };
        if skills.is_empty() {
            report.error("NO_SKILLS", "Plugin must include at least one skill", "$.skills");
            return;
        }

        for (index, skill) in skills.iter().enumerate() {
            let skill_path = match skill {
                Value::String(path) => Some(path.as_str()),
                Value::Object(entry) => entry.get("path").and_then(Value::as_str),
                _ => None,
            };
            let Some(skill_path) = skill_path else {
                report.error(
                    "MISSING_SKILL_PATH",
                    format!("Skill at index {} missing path", index),
                    format!("$.skills[{}]", index),
                );
                continue;
            };

            let json_path = format!("$.skills[{}].path", index);
            let full_path = install_path.join(skill_path);
            match tokio::fs::metadata(&full_path).await {
                Err(_) => report.error(
                    "SKILL_PATH_NOT_FOUND",
                    format!("Skill path not found: {}", skill_path),
                    json_path,
                ),
                Ok(metadata) if !metadata.is_dir() => report.error(
                    "SKILL_NOT_DIRECTORY",
                    format!("Skill path is not a directory: {}", skill_path),
                    json_path,
                ),
                Ok(_) => {
                    let descriptor = full_path.join(constants::SKILL_DESCRIPTOR_FILE);
                    if !tokio::fs::try_exists(&descriptor).await.unwrap_or(false) {
                        report.error(
                            "MISSING_SKILL_MD",
                            format!("Skill directory missing {}: {}", constants::SKILL_DESCRIPTOR_FILE, skill_path),
                            json_path,
                        );
                    }
                }
            }
        }
    }

    fn check_dependencies(manifest: &Map<String, Value>, report: &mut Report) {
        let Some(dependencies) = manifest.get("dependencies").filter(|v| !v.is_null()) else {
            return;
        };
        let Some(dependencies) = dependencies.as_object() else {
            report.error("INVALID_DEPENDENCIES", "Dependencies must be an object", "$.dependencies");
            return;
        };

        for name in dependencies.keys() {
            if !NAME_PATTERN.is_match(name) {
                report.error(
                    "INVALID_DEPENDENCY_NAME",
                    format!("Invalid dependency name: {}", name),
                    format!("$.dependencies.{}", name),
                );
            }
        }
    }

    /// Permissions are informational, so findings here are warnings only
    fn check_permissions(manifest: &Map<String, Value>, report: &mut Report) {
        let Some(permissions) = manifest.get("permissions").and_then(Value::as_object) else {
            return;
        };

        let filesystem = string_list(permissions.get("filesystem"));
        for permission in DANGEROUS_FILESYSTEM_PERMISSIONS {
            if filesystem.contains(&permission) {
                report.warning(
                    "DANGEROUS_PERMISSION",
                    format!("Plugin requests dangerous filesystem permission: {}", permission),
                    "$.permissions.filesystem",
                );
            }
        }

        for tool in string_list(permissions.get("tools")) {
            if DANGEROUS_TOOLS.contains(&tool) {
                report.warning(
                    "DANGEROUS_TOOL",
                    format!("Plugin requests potentially dangerous tool: {}", tool),
                    "$.permissions.tools",
                );
            }
        }

        let wants_network = match permissions.get("network") {
            Some(Value::Array(hosts)) => !hosts.is_empty(),
            Some(Value::Null) | None => false,
            Some(Value::Bool(enabled)) => *enabled,
            Some(_) => true,
        };
        if wants_network {
            report.warning("NETWORK_ACCESS", "Plugin requests network access", "$.permissions.network");
        }
    }

    fn check_system_requirements(manifest: &Map<String, Value>, report: &mut Report) {
        let Some(requirements) = manifest.get("systemRequirements").and_then(Value::as_object) else {
            return;
        };

        if requirements.get("platforms").is_some_and(Value::is_array) {
            let platform = current_platform();
            if !string_list(requirements.get("platforms")).contains(&platform) {
                report.warning(
                    "PLATFORM_MISMATCH",
                    format!("Plugin may not support current platform: {}", platform),
                    "$.systemRequirements.platforms",
                );
            }
        }

        for (field, code) in [("minVersion", "INVALID_MIN_VERSION"), ("maxVersion", "INVALID_MAX_VERSION")] {
            let Some(version) = requirements.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            if !version.as_str().is_some_and(is_valid_semver) {
                report.error(
                    code,
                    format!("{} must follow semantic versioning", field),
                    format!("$.systemRequirements.{}", field),
                );
            }
        }
    }

    async fn check_hooks(manifest: &Map<String, Value>, install_path: &Path, report: &mut Report) {
        let Some(hooks) = manifest.get("hooks").and_then(Value::as_object) else {
            return;
        };

        for (hook, script) in hooks {
            let json_path = format!("$.hooks.{}", hook);
            if !HookKind::is_known(hook) {
                report.warning("UNKNOWN_HOOK", format!("Unknown hook: {}", hook), json_path.clone());
            }

            let Some(script) = script.as_str() else {
                report.error(
                    "INVALID_HOOK_SCRIPT",
                    format!("Hook script must be a string: {}", hook),
                    json_path,
                );
                continue;
            };

            if !tokio::fs::try_exists(install_path.join(script)).await.unwrap_or(false) {
                report.error(
                    "HOOK_SCRIPT_NOT_FOUND",
                    format!("Hook script not found: {}", script),
                    json_path,
                );
            }
        }
    }

    /// Author shape, then the soft "consider adding" warnings
    fn check_metadata(manifest: &Map<String, Value>, report: &mut Report) {
        if let Some(author) = manifest.get("author").filter(|v| !v.is_null()) {
            if author.get("name").and_then(Value::as_str).is_none() {
                report.error("INVALID_AUTHOR", "Author must have at least a name field", "$.author");
            }
        }

        let soft = [
            ("license", "NO_LICENSE", "Consider adding a license field"),
            ("author", "NO_AUTHOR", "Consider adding author information"),
            ("repository", "NO_REPOSITORY", "Consider adding repository information"),
        ];
        for (field, code, message) in soft {
            if manifest.get(field).is_none_or(Value::is_null) {
                report.warning(code, message, format!("$.{}", field));
            }
        }
    }

    /// Hex sha256 over the contents of every file under `dir`.
    ///
    /// Files are visited in sorted relative-path order; `node_modules` and
    /// dot-directories are skipped. Each file contributes its `/`-separated
    /// relative path, its length and its contents, so renames and bytes moved
    /// across file boundaries both change the digest.
    pub async fn calculate_checksum(&self, dir: &Path) -> Result<String> {
        let root = dir.to_path_buf();
        tokio::task::spawn_blocking(move || checksum_blocking(&root))
            .await
            .map_err(|e| Error::io(std::io::Error::other(e), "spawn_blocking", dir.to_path_buf()))?
    }

    pub async fn verify_checksum(&self, dir: &Path, expected: &str) -> Result<bool> {
        let actual = self.calculate_checksum(dir).await?;
        Ok(actual.eq_ignore_ascii_case(expected))
    }
}

fn checksum_blocking(root: &Path) -> Result<String> {
    let skip = |name: &std::ffi::OsStr| name == "node_modules" || is_hidden(name);
    let files = collect_files(root, &skip).map_err(|e| Error::io(e, "collect_files", root.to_path_buf()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    for relative in files {
        let path = root.join(&relative);
        let mut file = std::fs::File::open(&path).map_err(|e| Error::io(e, "open", path.clone()))?;
        let length = file
            .metadata()
            .map_err(|e| Error::io(e, "metadata", path.clone()))?
            .len();

        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(length.to_be_bytes());

        let mut hashed = 0u64;
        while hashed < length {
            let read = file.read(&mut buffer).map_err(|e| Error::io(e, "read", path.clone()))?;
            if read == 0 {
                break;
            }
            let take = read.min((length - hashed) as usize);
            hasher.update(&buffer[..take]);
            hashed += take as u64;
        }
        if hashed < length {
            return Err(Error::io(
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "file shrank while hashing"),
                "read",
                path,
            ));
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}
