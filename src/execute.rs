use std::path::Path;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::debug;
use toolbelt::paths::{default_registry_path, helix_runtime_dir};
use toolbelt::{HttpFetcher, InstallReport, Installer, Placement, ToolRegistry};
use crate::cli::{ToolbeltCommand, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    let registry = load_registry(cli.registry.as_deref())?;
    // Only helix needs this; a missing home directory fails that tool alone.
    let runtime_root = helix_runtime_dir()
        .inspect_err(|e| debug!("no helix runtime directory: {e:#}"))
        .ok();
    let installer = Installer::new(registry, HttpFetcher::new()?, runtime_root);
    match cli.command {
        ToolbeltCommand::List { json } => {
            execute_list(&installer, json)
        }
        ToolbeltCommand::Install { tools, all, groups, dest, sudo } => {
            execute_install(&installer, tools, all, groups, &dest, sudo)
        }
    }
}

/// `--registry` first, then the user registry file if present, then the built-in table.
pub fn load_registry(explicit: Option<&Path>) -> Result<ToolRegistry> {
    if let Some(path) = explicit {
        return ToolRegistry::load(path)
            .with_context(|| format!("Could not load registry {}", path.display()));
    }
    if let Ok(path) = default_registry_path() {
        if path.exists() {
            debug!(path = %path.display(), "using user registry");
            return ToolRegistry::load(&path)
                .with_context(|| format!("Could not load registry {}", path.display()));
        }
    }
    Ok(ToolRegistry::builtin())
}

pub fn execute_list(installer: &Installer, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(installer.list_descriptors())?);
        return Ok(());
    }
    println!("available tools:\n");
    for (group, tools) in installer.registry().by_group() {
        println!("  [{}]", group.bold());
        for tool in tools {
            println!("    {} v{}", format!("{:15}", tool.name()).green(), tool.version());
        }
        println!();
    }
    Ok(())
}

/// Resolves the install selection: `--all`, then `--group`, then explicit names.
fn select_names(
    registry: &ToolRegistry,
    tools: Vec<String>,
    all: bool,
    groups: &[String],
) -> Vec<String> {
    if all {
        registry.names()
    } else if !groups.is_empty() {
        registry.names_in_groups(groups)
    } else {
        tools
    }
}

pub fn execute_install(
    installer: &Installer,
    tools: Vec<String>,
    all: bool,
    groups: Vec<String>,
    dest: &Path,
    sudo: bool,
) -> Result<()> {
    let names = select_names(installer.registry(), tools, all, &groups);
    if names.is_empty() {
        bail!("no tools specified");
    }
    if !dest.exists() {
        bail!("destination {} does not exist", dest.display());
    }
    let placement = if sudo { Placement::sudo() } else { Placement::Direct };
    let report = installer.install_all(&names, dest, &placement);
    print_summary(&report);
    if !report.succeeded() {
        let failed = report.failures().count();
        bail!("{} of {} tools failed to install", failed, report.outcomes.len());
    }
    Ok(())
}

fn print_summary(report: &InstallReport) {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(tool) => {
                println!("{} {} v{}", "installed".green().bold(), tool.name, tool.version);
                for binary in &tool.binaries {
                    println!("  {}", binary.display());
                }
                if let Some(note) = &tool.note {
                    println!("  {} {}", "note:".yellow(), note);
                }
            }
            Err(e) => {
                eprintln!("{} {}: {}", "error:".red().bold(), outcome.name, e);
            }
        }
    }
}
