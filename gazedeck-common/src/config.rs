//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Root folder resolution following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = shared_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Resolves the root folder for one service, logging where it came from.
pub struct RootFolderResolver {
    service_name: String,
    env_var: String,
}

impl RootFolderResolver {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            env_var: "GAZEDECK_ROOT_FOLDER".to_string(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        let root = resolve_root_folder(None, &self.env_var);
        tracing::info!(
            service = %self.service_name,
            root_folder = %root.display(),
            "Root folder resolved"
        );
        root
    }
}

/// Creates the root folder directory tree on first launch.
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing. Errors if the path exists but is a file.
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if self.root_folder.exists() && !self.root_folder.is_dir() {
            return Err(Error::Config(format!(
                "Root folder path exists but is not a directory: {}",
                self.root_folder.display()
            )));
        }
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// Get the shared configuration file path for the platform
fn shared_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/gazedeck/config.toml first, then /etc/gazedeck/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("gazedeck").join("config.toml"));
        let system_config = PathBuf::from("/etc/gazedeck/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("gazedeck").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Get per-service configuration file path (e.g. ~/.config/gazedeck/gazedeck-en.toml)
pub fn service_config_file(service_name: &str) -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .map(|d| d.join("gazedeck"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    Ok(dir.join(format!("{}.toml", service_name)))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/gazedeck (or /var/lib/gazedeck for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("gazedeck"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/gazedeck"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("gazedeck"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/gazedeck"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("gazedeck"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\gazedeck"))
    } else {
        PathBuf::from("./gazedeck_data")
    }
}

/// Write a TOML config atomically (temp file + rename)
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
