use super::{default_config_path, Config};
use crate::error::{ErrorCode, FitpalError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Loads [`Config`] from TOML and the environment
pub struct ConfigLoader {
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader that reads `path` when given, else `$FITPAL_CONFIG`, else the platform default
    pub fn new(path: Option<PathBuf>) -> Self {
        let explicit_path = path.or_else(|| std::env::var("FITPAL_CONFIG").ok().map(PathBuf::from));
        Self { explicit_path }
    }

    /// Load configuration and apply environment overrides
    pub async fn load(&self) -> Result<Config> {
        let mut config = match &self.explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(FitpalError::config_with_code(
                        ErrorCode::CONFIG_NOT_FOUND,
                        format!("Config file not found: {}", path.display()),
                    ));
                }
                Self::load_file(path).await?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path).await?,
                _ => Config::new(),
            },
        };

        config.merge_env_vars();
        config.validate()?;
        Ok(config)
    }

    async fn load_file(path: &Path) -> Result<Config> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| FitpalError::from(e).with_context(path.display()))?;
        Ok(config)
    }
}
