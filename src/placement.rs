use std::path::Path;
use std::process::Command;
use tracing::debug;
use crate::error::{InstallError, Result};

/// Permission bits for installed binaries.
pub const EXEC_MODE: u32 = 0o755;

/// Program used for elevated copies unless told otherwise.
pub const DEFAULT_ELEVATION_PROGRAM: &str = "sudo";

/// How staged files reach the destination directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Placement {
    /// Plain `copy` + `chmod` as the current user.
    #[default]
    Direct,
    /// `<program> cp <src> <dst>` then `<program> chmod 755 <dst>`.
    Elevated { program: String },
}

impl Placement {
    /// Elevated placement through `sudo`.
    pub fn sudo() -> Self {
        Placement::Elevated {
            program: DEFAULT_ELEVATION_PROGRAM.to_string(),
        }
    }

    /// Copies `staged` to `dest`, overwriting it, and marks it executable.
    ///
    /// # Errors
    /// Returns [`InstallError::Placement`] if the copy or permission change
    /// fails, including a failing or missing elevation program.
    pub fn place(&self, staged: &Path, dest: &Path) -> Result<()> {
        match self {
            Placement::Direct => {
                std::fs::copy(staged, dest).map_err(|e| InstallError::placement(dest, e))?;
                set_executable(dest)?;
            }
            Placement::Elevated { program } => {
                run_elevated(program, dest, Command::new(program).arg("cp").arg(staged).arg(dest))?;
                run_elevated(
                    program,
                    dest,
                    Command::new(program).arg("chmod").arg(format!("{EXEC_MODE:o}")).arg(dest),
                )?;
            }
        }
        debug!(from = %staged.display(), to = %dest.display(), "placed");
        Ok(())
    }
}

fn run_elevated(program: &str, dest: &Path, command: &mut Command) -> Result<()> {
    let status = command
        .status()
        .map_err(|e| InstallError::placement(dest, format!("could not run {program}: {e}")))?;
    if !status.success() {
        return Err(InstallError::placement(dest, format!("{program} exited with {status}")));
    }
    Ok(())
}

/// Sets owner/group/other execute (0755) on `path`.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(EXEC_MODE))
        .map_err(|e| InstallError::placement(path, e))
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
