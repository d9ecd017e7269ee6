//! Per-user locations for the log and the config file.

use std::path::PathBuf;

const APP_DIR: &str = "ghostwhisper";
const LOG_FILE: &str = "ghostwhisper.log";

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(std::env::temp_dir)
}

/// `~/.local/share/ghostwhisper` on Unix, including macOS.
pub fn data_dir() -> PathBuf {
    #[cfg(unix)]
    {
        home().join(".local").join("share").join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir().unwrap_or_else(home).join(APP_DIR)
    }
}

/// `~/.config/ghostwhisper` on Unix.  On Windows a `config.toml` next to the
/// executable takes precedence (portable install).
pub fn config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        let portable = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
            .filter(|dir| dir.join("config.toml").exists());
        if let Some(dir) = portable {
            return dir;
        }
        dirs::config_dir().unwrap_or_else(home).join(APP_DIR)
    }
    #[cfg(unix)]
    {
        home().join(".config").join(APP_DIR)
    }
}

pub fn log_path() -> PathBuf {
    data_dir().join(LOG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_are_app_scoped() {
        assert!(data_dir().ends_with(APP_DIR));
        assert!(config_dir().ends_with(APP_DIR));
        assert_eq!(log_path().parent(), Some(data_dir().as_path()));
    }
}
