use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "SFTP_RELAY_CONFIG";
/// Overrides the log directory. Set but empty disables file logging.
pub const LOG_DIR_ENV: &str = "SFTP_RELAY_LOG_DIR";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "sftp-relay", "sftp-relay")
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Get the path to the config file
pub fn config_file() -> Option<PathBuf> {
    if let Some(path) = env_path(CONFIG_ENV) {
        return Some(path);
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the log directory path
pub fn log_dir() -> Option<PathBuf> {
    if std::env::var_os(LOG_DIR_ENV).is_some() {
        return env_path(LOG_DIR_ENV);
    }
    config_dir().map(|d| d.join("logs"))
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

/// Create `dir` if needed, owner-only on Unix.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

/// Ensure the log directory exists with proper permissions
pub fn ensure_log_dir() -> std::io::Result<PathBuf> {
    let dir = log_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine log directory",
        )
    })?;
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Expand tilde in path (e.g., ~/.ssh/known_hosts -> /home/user/.ssh/known_hosts)
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_with_tilde() {
        let path = expand_tilde("~/.ssh/known_hosts");
        assert!(!path.to_string_lossy().starts_with("~/"));
        assert!(path.to_string_lossy().ends_with(".ssh/known_hosts"));
    }

    #[test]
    fn test_expand_tilde_without_tilde() {
        let path = expand_tilde("/etc/ssh/ssh_known_hosts");
        assert_eq!(path, PathBuf::from("/etc/ssh/ssh_known_hosts"));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a").join("b");
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
