//! Configuration file loading and root folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MEATEYE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "meateye.db";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, toml_config: Option<&toml::Table>) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = toml_config
        .and_then(|config| config.get("root_folder"))
        .and_then(|v| v.as_str())
    {
        return PathBuf::from(root_folder);
    }

    default_root_folder()
}

/// Load the TOML config file
///
/// An explicitly named file must exist and parse. Without one, the platform
/// locations are probed and a missing file is not an error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<Option<toml::Table>> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config file not found: {}", path.display())));
            }
            path.to_path_buf()
        }
        None => match default_config_file() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return Ok(None);
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let table = content
        .parse::<toml::Table>()
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;

    debug!("Loaded config file {}", path.display());
    Ok(Some(table))
}

/// First existing config file among the platform locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("meateye").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/meateye/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("meateye"),
        None => {
            warn!("Could not determine local data directory, using ./meateye_data");
            PathBuf::from("./meateye_data")
        }
    }
}

/// Database path inside a root folder, creating the folder if missing
pub fn prepare_database_path(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE_NAME))
}
