use crate::constants::{BASE_URL_ENV, CONFIG_DIR_ENV, DEFAULT_BASE_URL, USERNAME_ENV};
use crate::pipeline::templates::{default_probes, ProbeCandidate};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.yaml";
const TEMPLATE_CACHE_FILE: &str = "report_templates.json";

/// Startup settings read from `config.yaml`. Passwords are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub username: String,
    pub template_cache: Option<PathBuf>,
    pub template_probes: Vec<ProbeCandidate>,
    #[serde(skip)]
    config_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: String::from(DEFAULT_BASE_URL),
            username: String::new(),
            template_cache: None,
            template_probes: default_probes(),
            config_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Load from the default config directory, then apply environment
    /// overrides
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&config_dir())?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Load `config.yaml` from `dir`. A missing file yields defaults.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading {:?}", path))?;
            serde_yaml::from_str::<Settings>(&content)
                .with_context(|| format!("parsing {:?}", path))?
        } else {
            Settings::default()
        };
        settings.config_dir = dir.to_path_buf();
        Ok(settings)
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(username) = lookup(USERNAME_ENV).filter(|v| !v.trim().is_empty()) {
            self.username = username;
        }
    }

    /// Local template cache, `<config dir>/report_templates.json` unless set
    pub fn template_cache_path(&self) -> PathBuf {
        self.template_cache
            .clone()
            .unwrap_or_else(|| self.config_dir.join(TEMPLATE_CACHE_FILE))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// `$QAPI_CONFIG_DIR`, else `~/.qapi`
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".qapi")
}
