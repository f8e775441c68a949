use super::RunConfig;
use crate::error::{ErrorCode, ErrorExt, Result, WordTallyError};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Location of the per-user configuration file, if a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "wordtally", "wordtally")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Parse a TOML configuration file
pub async fn load_config_file(path: &Path) -> Result<RunConfig> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        let code = if e.kind() == std::io::ErrorKind::NotFound {
            ErrorCode::CONFIG_NOT_FOUND
        } else {
            ErrorCode::CONFIG_GENERIC
        };
        WordTallyError::config_with_code(
            code,
            format!("failed to read {}", path.display()),
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })?;

    toml::from_str::<RunConfig>(&content)
        .to_config_error(path, format!("failed to parse {}", path.display()))
}

/// Build the run configuration: defaults, then the file, then the environment.
///
/// An explicit path must exist. Without one, the per-user file is used when present.
pub async fn load_config(explicit: Option<&Path>) -> Result<RunConfig> {
    let mut config = match explicit {
        Some(path) => load_config_file(path).await?,
        None => match default_config_path() {
            Some(path) if fs::try_exists(&path).await.unwrap_or(false) => {
                debug!("Loading configuration from {}", path.display());
                load_config_file(&path).await?
            }
            _ => RunConfig::default(),
        },
    };

    config.merge_env_vars();
    Ok(config)
}
