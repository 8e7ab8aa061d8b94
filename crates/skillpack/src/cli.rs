use std::path::Path;
use std::process::ExitCode;

use skillpack_core::plugin_system::PluginSystemError;
use skillpack_core::{
    DefaultPluginManager, InstallOptions, ManagerConfig, Plugin, PluginFilter, PluginLoader, PluginManager,
    PluginStatus, Result, UninstallOptions, Validator,
};

use crate::Command;

/// Run one subcommand against the plugin base directory `base_dir`
pub async fn execute(command: Command, base_dir: &Path) -> Result<ExitCode> {
    let config = ManagerConfig::load(base_dir)?;

    match command {
        Command::Install {
            source,
            force,
            no_activate,
            skip_deps,
            require_version,
        } => {
            let options = InstallOptions {
                force,
                skip_dependencies: skip_deps,
                activate: !no_activate,
                version: require_version,
            };
            let plugin = open(config).await?.install(&source, options).await?;
            println!("Installed {}@{} ({})", plugin.name, plugin.version, plugin.status);
        }
        Command::Uninstall { name, force, keep_data } => {
            open(config)
                .await?
                .uninstall(&name, UninstallOptions { force, keep_data })
                .await?;
            println!("Uninstalled {}", name);
        }
        Command::List {
            active,
            inactive,
            category,
            keyword,
        } => {
            let mut filter = PluginFilter {
                category,
                keyword,
                ..PluginFilter::default()
            };
            if active {
                filter = filter.with_status(PluginStatus::Active);
            }
            if inactive {
                filter = filter.with_status(PluginStatus::Inactive);
            }
            print_list(&open(config).await?.list(&filter).await?);
        }
        Command::Info { name } => {
            let manager = open(config).await?;
            let plugin = manager
                .get(&name)
                .await?
                .ok_or(PluginSystemError::PluginNotFound { plugin: name })?;
            print_info(&manager, &plugin).await;
        }
        Command::Activate { name } => {
            open(config).await?.activate(&name).await?;
            println!("Activated {}", name);
        }
        Command::Deactivate { name } => {
            open(config).await?.deactivate(&name).await?;
            println!("Deactivated {}", name);
        }
        // Validation never touches the base directory
        Command::Validate { path } => return validate(&config, &path).await,
    }

    Ok(ExitCode::SUCCESS)
}

async fn open(config: ManagerConfig) -> Result<DefaultPluginManager> {
    let manager = DefaultPluginManager::new(config);
    manager.initialize().await?;
    Ok(manager)
}

async fn validate(config: &ManagerConfig, path: &Path) -> Result<ExitCode> {
    let loader = PluginLoader::new(config.plugin_dir.clone(), config.hook_timeout);
    let candidate = loader.load_manifest_value(path).await?;
    let result = Validator::new().validate(&candidate, path).await;

    for error in &result.errors {
        println!("error   [{}] {}", error.code, error);
    }
    for warning in &result.warnings {
        println!("warning [{}] {}", warning.code, warning);
    }

    if result.valid {
        println!("{} is valid ({} warning(s))", path.display(), result.warnings.len());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} is invalid ({} error(s))", path.display(), result.errors.len());
        Ok(ExitCode::FAILURE)
    }
}

fn print_list(plugins: &[Plugin]) {
    if plugins.is_empty() {
        println!("No plugins installed.");
        return;
    }

    let width = plugins
        .iter()
        .map(|p| p.name.len() + p.version.len() + 1)
        .max()
        .unwrap_or(0);
    for plugin in plugins {
        let id = format!("{}@{}", plugin.name, plugin.version);
        println!(
            "{:<width$}  {:<8}  {}",
            id,
            plugin.status.as_str(),
            plugin.manifest.description,
            width = width
        );
    }
}

async fn print_info(manager: &DefaultPluginManager, plugin: &Plugin) {
    let manifest = &plugin.manifest;
    println!("Name:         {}", plugin.name);
    println!("Version:      {}", plugin.version);
    println!("Status:       {}", plugin.status);
    println!("Description:  {}", manifest.description);
    if let Some(author) = &manifest.author {
        match &author.email {
            Some(email) => println!("Author:       {} <{}>", author.name, email),
            None => println!("Author:       {}", author.name),
        }
    }
    if let Some(license) = &manifest.license {
        println!("License:      {}", license);
    }
    if let Some(category) = &manifest.category {
        println!("Category:     {}", category);
    }
    if !manifest.keywords.is_empty() {
        println!("Keywords:     {}", manifest.keywords.join(", "));
    }
    println!("Source:       {}", plugin.source);
    println!("Installed:    {}", plugin.installed_at.to_rfc3339());
    println!("Updated:      {}", plugin.updated_at.to_rfc3339());
    if let Some(checksum) = &plugin.checksum {
        println!("Checksum:     {}", checksum);
    }

    if !plugin.resolved_dependencies.is_empty() {
        println!("Dependencies:");
        for (name, version) in &plugin.resolved_dependencies {
            println!("  {}@{}", name, version);
        }
    }

    match manager.loader().load_skills(plugin).await {
        Ok(skills) => {
            println!("Skills:");
            for skill in skills {
                let state = if skill.enabled { "" } else { " (disabled)" };
                println!("  {}{}: {}", skill.name, state, skill.description);
            }
        }
        Err(e) => println!("Skills:       unavailable ({})", e),
    }

    let size = manager.loader().plugin_size(&plugin.name, &plugin.version).await;
    println!("Size:         {}", format_size(size));
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
