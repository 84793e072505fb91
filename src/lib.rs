//! # Toolbelt Core Library
//!
//! This crate contains the core logic of the `toolbelt` tool: it downloads pinned
//! release artifacts, verifies them against a SHA-256 digest, extracts the
//! executables they contain and installs them into a directory such as
//! `/usr/local/bin`.
//!
//! Every tool is described by a [`ToolDescriptor`] in a [`ToolRegistry`]. The
//! [`Installer`] walks a list of requested names and, for each one, runs
//! fetch → verify → extract → place. A failing tool never stops the batch.
//!
//! ## Modules Overview
//! - [`registry`] – Tool descriptors, the built-in table and TOML registry files
//! - [`fetch`] – Downloading artifacts (`{version}` URL templates, 60 s timeout)
//! - [`hash`] – SHA-256 verification
//! - [`extract`] – Per-format extraction: tar.gz, tar.xz, zip, raw binaries, helix
//! - [`placement`] – Copying staged binaries into place, optionally through `sudo`
//! - [`installer`] – The per-tool pipeline and batch reporting
//! - [`paths`] – Well-known user directories
//! - [`error`] – The [`InstallError`] kinds


pub mod error;
pub mod hash;
pub mod fetch;
pub mod registry;
pub mod extract;
pub mod placement;
pub mod installer;
pub mod paths;

pub use error::InstallError;
pub use fetch::{Fetch, HttpFetcher};
pub use extract::{Extractor, InstalledEntry, FilterPolicy, Codec};
pub use installer::*;
pub use placement::Placement;
pub use registry::*;
