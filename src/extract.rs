use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Component, Path, PathBuf};
use flate2::read::MultiGzDecoder;
use tracing::debug;
use xz2::read::XzDecoder;
use crate::error::{InstallError, Result};

/// Executable shipped in the helix release tarball.
pub const HELIX_BINARY: &str = "hx";
/// Path segment marking helix's runtime asset tree.
pub const RUNTIME_SEGMENT: &str = "runtime";

/// A file produced by extraction, bound for the destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledEntry {
    pub name: String,
    pub content: Vec<u8>,
    pub executable: bool,
}

impl InstalledEntry {
    pub fn executable(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            executable: true,
        }
    }
}

/// Decides which archive entries become installed files, and under which name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    binaries: Vec<String>,
    strip_components: usize,
}

impl FilterPolicy {
    pub fn new(binaries: Vec<String>, strip_components: usize) -> Self {
        Self { binaries, strip_components }
    }

    /// Returns the installed name for an entry with these path segments, or
    /// `None` if the entry is filtered out.
    ///
    /// The name is always the final segment. Entries with no segment left
    /// after stripping are dropped, as are names outside a non-empty filter.
    pub fn select<'a>(&self, segments: &'a [String]) -> Option<&'a str> {
        if segments.len() <= self.strip_components {
            return None;
        }
        let name = segments.last()?.as_str();
        if name == ".." {
            return None;
        }
        if !self.binaries.is_empty() && !self.binaries.iter().any(|b| b == name) {
            return None;
        }
        Some(name)
    }
}

/// Compression layer wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Xz,
}

impl Codec {
    /// Decodes every concatenated member/stream, not just the first.
    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Codec::Gzip => Box::new(MultiGzDecoder::new(reader)),
            Codec::Xz => Box::new(XzDecoder::new_multi_decoder(reader)),
        }
    }
}

/// Per-tool extraction strategy, selected from the tool's descriptor.
#[derive(Debug, Clone)]
pub enum Extractor {
    Tar { codec: Codec, filter: FilterPolicy },
    Zip { filter: FilterPolicy },
    /// The artifact is the executable; installed under `name`.
    RawBinary { name: String },
    /// Returns `hx` and writes the `runtime/` tree straight into `runtime_root`.
    HelixRuntime { runtime_root: PathBuf },
}

impl Extractor {
    /// Extracts the verified artifact at `artifact`.
    ///
    /// Returns the entries destined for the destination directory, in archive
    /// order and without deduplication. Only [`Extractor::HelixRuntime`] writes
    /// anything to disk itself.
    ///
    /// # Errors
    /// [`InstallError::ArchiveFormat`] if the container is malformed,
    /// [`InstallError::Placement`] if the artifact can't be read or helix
    /// runtime files can't be written.
    pub fn extract(&self, artifact: &Path) -> Result<Vec<InstalledEntry>> {
        match self {
            Extractor::Tar { codec, filter } => {
                let reader = BufReader::new(open(artifact)?);
                extract_tar(codec.decoder(reader), filter)
            }
            Extractor::Zip { filter } => extract_zip(BufReader::new(open(artifact)?), filter),
            Extractor::RawBinary { name } => {
                let content = std::fs::read(artifact)
                    .map_err(|e| InstallError::placement(artifact, e))?;
                Ok(vec![InstalledEntry::executable(name.as_str(), content)])
            }
            Extractor::HelixRuntime { runtime_root } => {
                let reader = BufReader::new(open(artifact)?);
                extract_helix(Codec::Xz.decoder(reader), runtime_root)
            }
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| InstallError::placement(path, e))
}

/// Splits an archive path into its segments. `.` and root markers are not segments.
pub fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Directory,
    /// Links, devices, fifos: never installed.
    Other,
}

/// Walks a tar stream in archive order, handing each entry's segments, kind
/// and content reader to `visit`.
pub(crate) fn walk_tar<R, F>(reader: R, mut visit: F) -> Result<()>
where
    R: Read,
    F: FnMut(&[String], EntryKind, &mut dyn Read) -> Result<()>,
{
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries().map_err(InstallError::archive)? {
        let mut entry = entry.map_err(InstallError::archive)?;
        let segments = path_segments(&entry.path().map_err(InstallError::archive)?);
        let entry_type = entry.header().entry_type();
        let kind = if entry_type.is_file() {
            EntryKind::File
        } else if entry_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        };
        visit(&segments, kind, &mut entry)?;
    }
    Ok(())
}

fn read_all(reader: &mut dyn Read) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    reader.read_to_end(&mut content).map_err(InstallError::archive)?;
    Ok(content)
}

/// Generic extraction over a (decompressed) tar stream.
pub fn extract_tar<R: Read>(reader: R, filter: &FilterPolicy) -> Result<Vec<InstalledEntry>> {
    let mut entries = Vec::new();
    walk_tar(reader, |segments, kind, content| {
        if kind != EntryKind::File {
            return Ok(());
        }
        if let Some(name) = filter.select(segments) {
            debug!(entry = %segments.join("/"), name, "selected");
            entries.push(InstalledEntry::executable(name, read_all(content)?));
        }
        Ok(())
    })?;
    Ok(entries)
}

/// Generic extraction over a zip archive. Zip needs random access.
pub fn extract_zip<R: Read + Seek>(reader: R, filter: &FilterPolicy) -> Result<Vec<InstalledEntry>> {
    let mut archive = zip::ZipArchive::new(reader).map_err(InstallError::archive)?;
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(InstallError::archive)?;
        if file.is_dir() {
            continue;
        }
        let segments = path_segments(Path::new(file.name()));
        let Some(name) = filter.select(&segments) else {
            continue;
        };
        debug!(entry = file.name(), name, "selected");
        let name = name.to_string();
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(InstallError::archive)?;
        entries.push(InstalledEntry::executable(name, content));
    }
    Ok(entries)
}

/// Helix extraction: `hx` is returned like any other binary, while everything
/// under a `runtime` segment is written to `runtime_root` directly.
pub fn extract_helix<R: Read>(reader: R, runtime_root: &Path) -> Result<Vec<InstalledEntry>> {
    let mut entries = Vec::new();
    walk_tar(reader, |segments, kind, content| {
        if segments.len() < 2 {
            return Ok(());
        }
        if kind == EntryKind::File && segments.last().map(String::as_str) == Some(HELIX_BINARY) {
            entries.push(InstalledEntry::executable(HELIX_BINARY, read_all(content)?));
            return Ok(());
        }
        let Some(idx) = segments.iter().position(|s| s == RUNTIME_SEGMENT) else {
            return Ok(());
        };
        let relative = &segments[idx + 1..];
        if relative.is_empty() {
            return Ok(());
        }
        if relative.iter().any(|s| s == "..") {
            return Err(InstallError::archive(format!(
                "runtime entry '{}' escapes the runtime directory",
                segments.join("/")
            )));
        }
        let dest = relative.iter().fold(runtime_root.to_path_buf(), |path, s| path.join(s));
        match kind {
            EntryKind::Directory => {
                std::fs::create_dir_all(&dest).map_err(|e| InstallError::placement(&dest, e))?;
            }
            EntryKind::File => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| InstallError::placement(parent, e))?;
                }
                let bytes = read_all(content)?;
                std::fs::write(&dest, bytes).map_err(|e| InstallError::placement(&dest, e))?;
                debug!(path = %dest.display(), "runtime file written");
            }
            EntryKind::Other => {}
        }
        Ok(())
    })?;
    Ok(entries)
}
