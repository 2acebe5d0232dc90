use crate::config::ToolsConfig;
use crate::error::{TrimError, TrimResult};
use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Root privileges and every configured tool on PATH.
pub fn check(tools: &ToolsConfig) -> TrimResult<()> {
    if !nix::unistd::geteuid().is_root() {
        return Err(TrimError::Environment("must be run as root".into()));
    }
    let path = env::var_os("PATH").unwrap_or_default();
    let dirs: Vec<PathBuf> = env::split_paths(&path).collect();
    let missing: Vec<&str> = tools.all().into_iter().filter(|t| find_tool(t, &dirs).is_none()).collect();
    if !missing.is_empty() {
        return Err(TrimError::Environment(format!("required tools not found: {}", missing.join(", "))));
    }
    Ok(())
}

/// Absolute or relative names are checked as given; bare names are searched in `dirs`.
fn find_tool(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    if name.contains('/') {
        let p = PathBuf::from(name);
        return is_executable(&p).then_some(p);
    }
    dirs.iter().map(|d| d.join(name)).find(|p| is_executable(p))
}

fn is_executable(p: &Path) -> bool {
    std::fs::metadata(p)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_executables_only() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("hdparm");
        let plain = dir.path().join("blkid");
        fs::write(&exe, "#!/bin/sh\n").unwrap();
        fs::write(&plain, "").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        let dirs = vec![dir.path().to_path_buf()];
        assert_eq!(find_tool("hdparm", &dirs), Some(exe.clone()));
        assert_eq!(find_tool("blkid", &dirs), None);
        assert_eq!(find_tool("xfs_db", &dirs), None);
        assert_eq!(find_tool(exe.to_str().unwrap(), &[]), Some(exe));
    }
}
