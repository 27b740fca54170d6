//! Locating the bwt daemon executable

use std::path::{Path, PathBuf};

use bwtctl_core::prelude::*;

/// File name of the daemon executable on this platform
pub fn daemon_file_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "bwt.exe"
    } else {
        "bwt"
    }
}

/// Resolve the daemon executable.
///
/// Search order:
/// 1. `configured` path, if set (must exist)
/// 2. next to the running executable
/// 3. `PATH`
pub fn resolve_daemon_binary(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return dunce::canonicalize(path).map_err(|e| Error::DaemonNotFound {
            searched: format!("{} ({})", path.display(), e),
        });
    }

    let mut searched = Vec::new();

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = dir.join(daemon_file_name());
        if candidate.is_file() {
            debug!("Using bundled daemon at {}", candidate.display());
            return Ok(candidate);
        }
        searched.push(candidate.display().to_string());
    }

    match which::which(daemon_file_name()) {
        Ok(path) => {
            debug!("Using daemon from PATH at {}", path.display());
            Ok(path)
        }
        Err(e) => {
            debug!("which {} failed: {}", daemon_file_name(), e);
            searched.push("PATH".to_string());
            Err(Error::DaemonNotFound {
                searched: searched.join(", "),
            })
        }
    }
}
