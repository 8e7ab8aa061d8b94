/// Application name
pub const APP_NAME: &str = "skillpack";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default base directory name, created under the current working directory
pub const DEFAULT_BASE_DIR_NAME: &str = ".claude-plugin";

/// Installed plugins directory, relative to the base directory
pub const PLUGINS_DIR: &str = "plugins";

/// Registry document, relative to the base directory
pub const REGISTRY_FILE: &str = "registry.json";

/// Cache directory, relative to the base directory
pub const CACHE_DIR: &str = "cache";

/// Logs directory, relative to the base directory
pub const LOGS_DIR: &str = "logs";

/// Optional configuration file stem inside the base directory (`config.json`, `config.toml`, ...)
pub const CONFIG_FILE_STEM: &str = "config";

/// Manifest filename at the root of every plugin
pub const MANIFEST_FILE: &str = "plugin.json";

/// Descriptor file inside every skill directory
pub const SKILL_DESCRIPTOR_FILE: &str = "SKILL.md";

/// Format version written into new registry documents
pub const REGISTRY_FORMAT_VERSION: &str = "1.0.0";

/// Wall-clock limit for a single hook script
pub const HOOK_TIMEOUT_SECS: u64 = 60;

/// Maximum plugin name length
pub const MAX_NAME_LENGTH: usize = 100;

/// Descriptions shorter than this produce a warning
pub const MIN_DESCRIPTION_LENGTH: usize = 10;

/// Descriptions longer than this are rejected
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Directories never copied into an installation or counted towards its size
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git"];

/// Environment variable that overrides the base directory for the CLI
pub const HOME_ENV_VAR: &str = "SKILLPACK_HOME";
