use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{InstallError, Result};
use crate::extract::{Codec, Extractor, FilterPolicy};
use crate::fetch::render_template;
use crate::hash::{format_hash, is_valid_digest};

/// Group name used for tools that carry no group tags.
pub const UNGROUPED: &str = "other";

/// Shown in errors when the helix runtime directory cannot be resolved.
const HELIX_RUNTIME_HINT: &str = "~/.config/helix/runtime";

/// How a tool's release artifact is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    Zip,
    /// The artifact is the executable itself.
    RawBinary,
    /// Helix editor tarball: `hx` plus a `runtime/` tree for the user config dir.
    HelixRuntime,
}

/// An installable tool, pinned to one version and one digest.
///
/// Descriptors are read-only once they are inside a [`ToolRegistry`]; the
/// digest is normalized at load time and is the only thing the installer
/// trusts about a download.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolDescriptor {
    name: String,
    version: String,
    sha256: String,
    format: ArchiveFormat,
    /// URL template; `{version}` is substituted.
    url: String,
    #[serde(default)]
    binaries: Vec<String>,
    #[serde(default)]
    strip_components: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binary_name: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_install_message: Option<String>,
}

impl ToolDescriptor {
    /// Creates a descriptor with no filter, no stripping and no groups.
    pub fn new(
        name: &str,
        version: &str,
        sha256: &str,
        format: ArchiveFormat,
        url: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            sha256: format_hash(sha256),
            format,
            url: url.to_string(),
            binaries: Vec::new(),
            strip_components: 0,
            binary_name: None,
            groups: Vec::new(),
            post_install_message: None,
        }
    }

    pub fn with_binaries(mut self, binaries: &[&str]) -> Self {
        self.binaries = binaries.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_strip_components(mut self, count: usize) -> Self {
        self.strip_components = count;
        self
    }

    pub fn with_binary_name(mut self, name: &str) -> Self {
        self.binary_name = Some(name.to_string());
        self
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_post_install_message(mut self, message: &str) -> Self {
        self.post_install_message = Some(message.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Normalized lowercase hex SHA-256 of the artifact.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn url_template(&self) -> &str {
        &self.url
    }

    /// The concrete download URL for the pinned version.
    pub fn url(&self) -> String {
        render_template(&self.url, &self.version)
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn in_any_group(&self, groups: &[String]) -> bool {
        self.groups.iter().any(|g| groups.contains(g))
    }

    /// The post-install note with `{version}` substituted, if any.
    pub fn rendered_message(&self) -> Option<String> {
        self.post_install_message
            .as_deref()
            .map(|m| render_template(m, &self.version))
    }

    /// Selects the extraction strategy for this tool.
    ///
    /// `runtime_root` is only needed by [`ArchiveFormat::HelixRuntime`]; a helix
    /// tool without one fails with [`InstallError::Placement`].
    pub fn extractor(&self, runtime_root: Option<&Path>) -> Result<Extractor> {
        let filter = FilterPolicy::new(self.binaries.clone(), self.strip_components);
        let extractor = match self.format {
            ArchiveFormat::TarGz => Extractor::Tar { codec: Codec::Gzip, filter },
            ArchiveFormat::TarXz => Extractor::Tar { codec: Codec::Xz, filter },
            ArchiveFormat::Zip => Extractor::Zip { filter },
            ArchiveFormat::RawBinary => Extractor::RawBinary {
                name: self.binary_name.clone().unwrap_or_else(|| self.name.clone()),
            },
            ArchiveFormat::HelixRuntime => Extractor::HelixRuntime {
                runtime_root: runtime_root
                    .ok_or_else(|| {
                        InstallError::placement(HELIX_RUNTIME_HINT, "could not determine home directory")
                    })?
                    .to_path_buf(),
            },
        };
        Ok(extractor)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(InstallError::Registry("tool with empty name".to_string()));
        }
        // Raw binaries fall back to the tool name as their file name.
        if !is_plain_file_name(&self.name) {
            return Err(InstallError::Registry(format!(
                "tool name '{}' must be a plain file name",
                self.name
            )));
        }
        if !is_valid_digest(&self.sha256) {
            return Err(InstallError::Registry(format!(
                "'{}': sha256 must be {} hex characters, got '{}'",
                self.name,
                crate::hash::SHA256_HEX_LEN,
                self.sha256
            )));
        }
        if self.url.trim().is_empty() {
            return Err(InstallError::Registry(format!("'{}': empty url", self.name)));
        }
        let names = self.binary_name.iter().chain(self.binaries.iter());
        for binary in names {
            if !is_plain_file_name(binary) {
                return Err(InstallError::Registry(format!(
                    "'{}': binary name '{}' must be a plain file name",
                    self.name, binary
                )));
            }
        }
        Ok(())
    }
}

/// A single path segment that cannot climb out of the directory it is joined to.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// The on-disk shape of a registry file: a list of `[[tool]]` tables.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    tool: Vec<ToolDescriptor>,
}

/// Ordered, validated, read-only set of tool descriptors.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Builds a registry, keeping the given order.
    ///
    /// # Errors
    /// Returns [`InstallError::Registry`] on duplicate names, empty names or urls,
    /// or malformed digests.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(tools.len());
        for mut tool in tools {
            tool.sha256 = format_hash(&tool.sha256);
            tool.validate()?;
            if !seen.insert(tool.name.clone()) {
                return Err(InstallError::Registry(format!("duplicate tool '{}'", tool.name)));
            }
            normalized.push(tool);
        }
        Ok(Self { tools: normalized })
    }

    /// Parses a registry from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(text)
            .map_err(|e| InstallError::Registry(e.to_string()))?;
        Self::new(file.tool)
    }

    /// Loads a registry file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| InstallError::Registry(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// All descriptors in registry order.
    pub fn list_descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    /// Names of tools carrying any of `groups`, in registry order.
    pub fn names_in_groups(&self, groups: &[String]) -> Vec<String> {
        self.tools
            .iter()
            .filter(|t| t.in_any_group(groups))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Descriptors keyed by group, groups sorted by name.
    ///
    /// A tool appears under every group it carries; untagged tools are listed
    /// under [`UNGROUPED`].
    pub fn by_group(&self) -> BTreeMap<String, Vec<&ToolDescriptor>> {
        let mut groups: BTreeMap<String, Vec<&ToolDescriptor>> = BTreeMap::new();
        for tool in &self.tools {
            if tool.groups.is_empty() {
                groups.entry(UNGROUPED.to_string()).or_default().push(tool);
            }
            for group in &tool.groups {
                groups.entry(group.clone()).or_default().push(tool);
            }
        }
        groups
    }

    /// The tools this crate knows about out of the box.
    pub fn builtin() -> Self {
        use ArchiveFormat::*;
        let tools = vec![
            ToolDescriptor::new(
                "zellij",
                "0.43.0",
                "00070e052a86e3072dbd626cc0a0295106e7ed74c42871ba38185d4ebbcae58a",
                TarGz,
                "https://github.com/zellij-org/zellij/releases/download/v{version}/zellij-x86_64-unknown-linux-musl.tar.gz",
            )
            .with_binaries(&["zellij"])
            .with_groups(&["base"]),
            ToolDescriptor::new(
                "helix",
                "25.07.1",
                "3f08e63ecd388fff657ad39722f88bb03dcf326f1f2da2700d99e1dc40ab2e8b",
                HelixRuntime,
                "https://github.com/helix-editor/helix/releases/download/{version}/helix-{version}-x86_64-linux.tar.xz",
            )
            .with_binaries(&["hx"])
            .with_strip_components(1)
            .with_groups(&["base"]),
            ToolDescriptor::new(
                "yazi",
                "25.5.31",
                "a2fdc9c35719fa72d94820893eb2fedd93fd1c418c2cf568702643526c358f7a",
                Zip,
                "https://github.com/sxyazi/yazi/releases/download/v{version}/yazi-x86_64-unknown-linux-musl.zip",
            )
            .with_binaries(&["yazi"])
            .with_strip_components(1)
            .with_groups(&["base"]),
            ToolDescriptor::new(
                "starship",
                "1.24.1",
                "44a729c34aea5b0451fba49108cdc5ef6b1ae68db65e7623cc244a52efcd23d1",
                TarGz,
                "https://github.com/starship/starship/releases/download/v{version}/starship-x86_64-unknown-linux-musl.tar.gz",
            )
            .with_binaries(&["starship"])
            .with_groups(&["base"]),
            ToolDescriptor::new(
                "uv",
                "0.5.11",
                "5b77978bc8ded7e1b6ddb6d6a3e52f684bcc07c6d9be11d7b4fc3c1c23f4458f",
                TarGz,
                "https://github.com/astral-sh/uv/releases/download/{version}/uv-x86_64-unknown-linux-musl.tar.gz",
            )
            .with_binaries(&["uv", "uvx"])
            .with_strip_components(1)
            .with_groups(&["base"]),
            ToolDescriptor::new(
                "kubectl",
                "1.34.3",
                "ab60ca5f0fd60c1eb81b52909e67060e3ba0bd27e55a8ac147cbc2172ff14212",
                RawBinary,
                "https://dl.k8s.io/release/v{version}/bin/linux/amd64/kubectl",
            )
            .with_binary_name("kubectl")
            .with_groups(&["k8s"]),
            ToolDescriptor::new(
                "talosctl",
                "1.9.1",
                "3dbc86618394db080a3465143c1bc45aefd4e299fc3f7e1429e93c255cf9c555",
                RawBinary,
                "https://github.com/siderolabs/talos/releases/download/v{version}/talosctl-linux-amd64",
            )
            .with_binary_name("talosctl")
            .with_groups(&["k8s"]),
            ToolDescriptor::new(
                "cilium",
                "0.18.9",
                "15978aaf82373b0682aa87ab217848b3fb6e3cd80adad365d34696fe92543923",
                TarGz,
                "https://github.com/cilium/cilium-cli/releases/download/v{version}/cilium-linux-amd64.tar.gz",
            )
            .with_binaries(&["cilium"])
            .with_groups(&["k8s"]),
            ToolDescriptor::new(
                "kubectl-cnpg",
                "1.28.0",
                "d39f8623ff4de6bc7a3013e596b808432ae50773ddac56efe04e9ded2205bbf1",
                TarGz,
                "https://github.com/cloudnative-pg/cloudnative-pg/releases/download/v{version}/kubectl-cnpg_{version}_linux_x86_64.tar.gz",
            )
            .with_binaries(&["kubectl-cnpg"])
            .with_groups(&["k8s"]),
            ToolDescriptor::new(
                "direnv",
                "2.35.0",
                "55c294f4376397c68b1f659f049fb104dc2ecd0fcb15a15949d7f748e3f70b66",
                RawBinary,
                "https://github.com/direnv/direnv/releases/download/v{version}/direnv.linux-amd64",
            )
            .with_binary_name("direnv")
            .with_groups(&["base"])
            .with_post_install_message("add 'eval \"$(direnv hook bash)\"' to your .bashrc"),
            ToolDescriptor::new(
                "just",
                "1.40.0",
                "181b91d0ceebe8a57723fb648ed2ce1a44d849438ce2e658339df4f8db5f1263",
                TarGz,
                "https://github.com/casey/just/releases/download/{version}/just-{version}-x86_64-unknown-linux-musl.tar.gz",
            )
            .with_binaries(&["just"])
            .with_groups(&["base"]),
        ];
        Self { tools }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn fixture() -> ToolRegistry {
        ToolRegistry::new(vec![
            ToolDescriptor::new("a", "1.0", DIGEST, ArchiveFormat::TarGz, "https://x/{version}/a.tgz")
                .with_groups(&["base"]),
            ToolDescriptor::new("b", "2.0", DIGEST, ArchiveFormat::RawBinary, "https://x/b")
                .with_groups(&["k8s", "base"]),
            ToolDescriptor::new("c", "3.0", DIGEST, ArchiveFormat::Zip, "https://x/c.zip"),
        ])
        .unwrap()
    }

    #[test]
    fn test_builtin_registry_is_valid() {
        let builtin = ToolRegistry::builtin();
        let rebuilt = ToolRegistry::new(builtin.list_descriptors().to_vec()).unwrap();
        assert_eq!(rebuilt.names(), builtin.names());
        assert_eq!(builtin.names().first().map(String::as_str), Some("zellij"));
        assert_eq!(builtin.get("helix").unwrap().format(), ArchiveFormat::HelixRuntime);
    }

    #[test]
    fn test_builtin_url_rendering() {
        let builtin = ToolRegistry::builtin();
        let cnpg = builtin.get("kubectl-cnpg").unwrap();
        assert_eq!(
            cnpg.url(),
            "https://github.com/cloudnative-pg/cloudnative-pg/releases/download/v1.28.0/kubectl-cnpg_1.28.0_linux_x86_64.tar.gz"
        );
    }

    #[test]
    fn test_get_and_order() {
        let registry = fixture();
        assert_eq!(registry.names(), vec!["a", "b", "c"]);
        assert_eq!(registry.get("b").unwrap().version(), "2.0");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_by_group_lists_untagged_as_other() {
        let registry = fixture();
        let groups = registry.by_group();
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec!["base", "k8s", "other"]);
        let base: Vec<_> = groups["base"].iter().map(|t| t.name()).collect();
        assert_eq!(base, vec!["a", "b"]);
        let other: Vec<_> = groups["other"].iter().map(|t| t.name()).collect();
        assert_eq!(other, vec!["c"]);
    }

    #[test]
    fn test_names_in_groups() {
        let registry = fixture();
        assert_eq!(registry.names_in_groups(&["k8s".to_string()]), vec!["b"]);
        assert!(registry.names_in_groups(&["none".to_string()]).is_empty());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let tool = ToolDescriptor::new("a", "1", DIGEST, ArchiveFormat::Zip, "https://x");
        let err = ToolRegistry::new(vec![tool.clone(), tool]).unwrap_err();
        assert!(matches!(err, InstallError::Registry(_)));
    }

    #[test]
    fn test_rejects_malformed_digest() {
        let tool = ToolDescriptor::new("a", "1", "deadbeef", ArchiveFormat::Zip, "https://x");
        assert!(matches!(ToolRegistry::new(vec![tool]), Err(InstallError::Registry(_))));
    }

    #[test]
    fn test_rejects_binary_names_with_paths() {
        let tool = ToolDescriptor::new("a", "1", DIGEST, ArchiveFormat::RawBinary, "https://x")
            .with_binary_name("../bin/a");
        assert!(matches!(ToolRegistry::new(vec![tool]), Err(InstallError::Registry(_))));
    }

    #[test]
    fn test_rejects_tool_names_that_leave_the_destination() {
        for name in ["../escaped", "bin/tool", "..", "."] {
            let tool = ToolDescriptor::new(name, "1", DIGEST, ArchiveFormat::RawBinary, "https://x");
            assert!(
                matches!(ToolRegistry::new(vec![tool]), Err(InstallError::Registry(_))),
                "accepted {name}"
            );
        }
    }

    #[test]
    fn test_helix_extractor_needs_runtime_root() {
        let tool = ToolDescriptor::new("helix", "1", DIGEST, ArchiveFormat::HelixRuntime, "https://x");
        assert!(matches!(tool.extractor(None), Err(InstallError::Placement { .. })));
        match tool.extractor(Some(Path::new("/rt"))).unwrap() {
            Extractor::HelixRuntime { runtime_root } => assert_eq!(runtime_root, Path::new("/rt")),
            other => panic!("unexpected extractor {:?}", other),
        }
    }

    #[test]
    fn test_tar_formats_pick_their_codec() {
        let gz = ToolDescriptor::new("a", "1", DIGEST, ArchiveFormat::TarGz, "https://x");
        let xz = ToolDescriptor::new("b", "1", DIGEST, ArchiveFormat::TarXz, "https://x");
        assert!(matches!(gz.extractor(None).unwrap(), Extractor::Tar { codec: Codec::Gzip, .. }));
        assert!(matches!(xz.extractor(None).unwrap(), Extractor::Tar { codec: Codec::Xz, .. }));
    }

    #[test]
    fn test_digest_is_normalized() {
        let tool = ToolDescriptor::new(
            "a", "1", &format!("sha256:{}", DIGEST.to_uppercase()), ArchiveFormat::Zip, "https://x",
        );
        let registry = ToolRegistry::new(vec![tool]).unwrap();
        assert_eq!(registry.get("a").unwrap().sha256(), DIGEST);
    }

    #[test]
    fn test_from_toml() {
        let text = format!(r#"
            [[tool]]
            name = "just"
            version = "1.40.0"
            sha256 = "{DIGEST}"
            format = "tar-gz"
            url = "https://x/{{version}}/just.tar.gz"
            binaries = ["just"]
            strip-components = 1
            groups = ["base"]
            post-install-message = "installed {{version}}"

            [[tool]]
            name = "kubectl"
            version = "1.34.3"
            sha256 = "{DIGEST}"
            format = "raw-binary"
            url = "https://x/kubectl"
            binary-name = "kubectl"
        "#);
        let registry = ToolRegistry::from_toml(&text).unwrap();
        assert_eq!(registry.names(), vec!["just", "kubectl"]);
        let just = registry.get("just").unwrap();
        assert_eq!(just.url(), "https://x/1.40.0/just.tar.gz");
        assert_eq!(just.rendered_message().as_deref(), Some("installed 1.40.0"));
        assert_eq!(just.format(), ArchiveFormat::TarGz);
        assert!(registry.get("kubectl").unwrap().groups().is_empty());
    }

    #[test]
    fn test_from_toml_rejects_unknown_format() {
        let text = format!(r#"
            [[tool]]
            name = "x"
            version = "1"
            sha256 = "{DIGEST}"
            format = "rar"
            url = "https://x"
        "#);
        assert!(matches!(ToolRegistry::from_toml(&text), Err(InstallError::Registry(_))));
    }

    #[test]
    fn test_raw_binary_extractor_defaults_to_tool_name() {
        let tool = ToolDescriptor::new("talosctl", "1", DIGEST, ArchiveFormat::RawBinary, "https://x");
        match tool.extractor(None).unwrap() {
            Extractor::RawBinary { name } => assert_eq!(name, "talosctl"),
            other => panic!("unexpected extractor {:?}", other),
        }
    }
}
