//! Platform-specific paths for the client.

use std::path::PathBuf;

const APP_DIR: &str = "sealbox";

/// Directory for the local cache.
///
/// Returns:
/// - Windows: %LOCALAPPDATA%\sealbox
/// - macOS: ~/Library/Application Support/sealbox
/// - Linux/Other: ~/.local/share/sealbox
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Directory holding `config.toml`.
///
/// Returns:
/// - Windows: %APPDATA%\sealbox
/// - macOS: ~/Library/Application Support/sealbox
/// - Linux/Other: ~/.config/sealbox
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

pub fn get_default_cache_path() -> PathBuf {
    get_data_dir().join("cache.db")
}

pub fn get_default_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Ensure the data directory exists, creating it if necessary
pub fn ensure_data_dir() -> std::io::Result<PathBuf> {
    let dir = get_data_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir() {
        assert!(get_data_dir().ends_with(APP_DIR));
    }

    #[test]
    fn test_get_config_dir() {
        assert!(get_config_dir().ends_with(APP_DIR));
    }

    #[test]
    fn test_default_paths() {
        assert!(get_default_cache_path().ends_with("cache.db"));
        assert!(get_default_config_path().ends_with("config.toml"));
        assert!(get_default_cache_path().starts_with(get_data_dir()));
    }
}
