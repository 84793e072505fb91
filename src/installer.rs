use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};
use crate::error::{InstallError, Result};
use crate::extract::InstalledEntry;
use crate::fetch::{Fetch, HttpFetcher};
use crate::hash;
use crate::placement::{set_executable, Placement};
use crate::registry::{ToolDescriptor, ToolRegistry};

/// A tool that made it into the destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTool {
    pub name: String,
    pub version: String,
    /// Destination paths, one per distinct installed name, in archive order.
    pub binaries: Vec<PathBuf>,
    /// Post-install note with the version substituted.
    pub note: Option<String>,
}

/// What happened to one requested name.
#[derive(Debug)]
pub struct ToolOutcome {
    pub name: String,
    pub result: Result<InstalledTool>,
}

/// Per-name results of a batch, in request order.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub outcomes: Vec<ToolOutcome>,
}

impl InstallReport {
    /// `true` only if every requested tool installed.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn installed(&self) -> impl Iterator<Item = &InstalledTool> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &InstallError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }
}

/// Drives fetch, verify, extract and place for requested tools, one at a time.
pub struct Installer<F: Fetch = HttpFetcher> {
    registry: ToolRegistry,
    fetcher: F,
    runtime_root: Option<PathBuf>,
}

impl<F: Fetch> Installer<F> {
    /// `runtime_root` is where helix runtime files go (normally
    /// [`crate::paths::helix_runtime_dir`]). Without one, only helix tools fail.
    pub fn new(registry: ToolRegistry, fetcher: F, runtime_root: Option<PathBuf>) -> Self {
        Self { registry, fetcher, runtime_root }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn list_descriptors(&self) -> &[ToolDescriptor] {
        self.registry.list_descriptors()
    }

    /// Installs every name in order into `dest`.
    ///
    /// A failing tool is logged and recorded, then the batch moves on; nothing
    /// is retried. Check [`InstallReport::succeeded`] for the overall result.
    pub fn install_all<S: AsRef<str>>(
        &self,
        names: &[S],
        dest: &Path,
        placement: &Placement,
    ) -> InstallReport {
        let mut report = InstallReport::default();
        for name in names {
            let name = name.as_ref();
            let result = self.install_tool(name, dest, placement);
            match &result {
                Ok(tool) => info!(tool = name, version = %tool.version, "done"),
                Err(e) => warn!(tool = name, "{e}"),
            }
            report.outcomes.push(ToolOutcome {
                name: name.to_string(),
                result,
            });
        }
        report
    }

    /// Installs a single tool.
    ///
    /// The artifact is verified before it is written anywhere, and every entry
    /// is extracted and staged before the first file reaches `dest`. The temp
    /// file and staging directory are removed when this returns, on every path.
    ///
    /// # Errors
    /// Any [`InstallError`] except [`InstallError::Registry`].
    pub fn install_tool(
        &self,
        name: &str,
        dest: &Path,
        placement: &Placement,
    ) -> Result<InstalledTool> {
        let tool = self.registry
            .get(name)
            .ok_or_else(|| InstallError::UnknownTool(name.to_string()))?;
        info!(tool = name, version = tool.version(), "installing");

        info!(url = %tool.url(), "downloading");
        let bytes = self.fetcher.fetch(tool.url_template(), tool.version())?;
        hash::verify(&bytes, tool.sha256())?;
        info!(sha256 = &tool.sha256()[..16], "verified");

        let artifact = persist(&bytes)?;
        drop(bytes);

        let entries = tool
            .extractor(self.runtime_root.as_deref())?
            .extract(artifact.path())?;
        debug!(tool = name, entries = entries.len(), "extracted");

        let staging = TempDir::new()
            .map_err(|e| InstallError::placement(std::env::temp_dir(), e))?;
        let staged = stage(&entries, staging.path())?;

        let mut binaries = Vec::with_capacity(staged.len());
        for bin_name in &staged {
            let target = dest.join(bin_name);
            placement.place(&staging.path().join(bin_name), &target)?;
            info!("installed {} -> {}", bin_name, target.display());
            binaries.push(target);
        }

        let note = tool.rendered_message();
        if let Some(note) = &note {
            info!("note: {note}");
        }
        Ok(InstalledTool {
            name: tool.name().to_string(),
            version: tool.version().to_string(),
            binaries,
            note,
        })
    }
}

/// Writes the verified bytes to a private temp file; zip needs to seek.
fn persist(bytes: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()
        .map_err(|e| InstallError::placement(std::env::temp_dir(), e))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| InstallError::placement(file.path(), e))?;
    Ok(file)
}

/// Writes entries into `staging`, later entries overwriting earlier ones of
/// the same name. Returns the distinct names in first-seen order.
fn stage(entries: &[InstalledEntry], staging: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        if !is_single_segment(&entry.name) {
            return Err(InstallError::archive(format!(
                "refusing to install '{}': not a plain file name",
                entry.name
            )));
        }
        let path = staging.join(&entry.name);
        std::fs::write(&path, &entry.content).map_err(|e| InstallError::placement(&path, e))?;
        if entry.executable {
            set_executable(&path)?;
        }
        if !names.contains(&entry.name) {
            names.push(entry.name.clone());
        }
    }
    Ok(names)
}

fn is_single_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
