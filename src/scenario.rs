use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::{
    catalog::{Catalog, CatalogSpec},
    config::EngineConfig,
};

const KINGDOM: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/themes/kingdom.yaml"));
const STARTUP: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/themes/startup.yaml"));

/// Names of the themes compiled into the crate.
pub const BUILTIN_THEMES: [&str; 2] = ["kingdom", "startup"];

/// On-disk theme document: catalog tables plus the engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ThemeFile {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub catalog: CatalogSpec,
    pub config: EngineConfig,
}

/// A resolved theme, ready to initialize settlements from.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub description: Option<String>,
    pub catalog: Arc<Catalog>,
    pub config: EngineConfig,
}

impl Theme {
    pub fn from_file(file: ThemeFile) -> Result<Self> {
        let catalog = Catalog::from_spec(file.catalog)
            .with_context(|| format!("Invalid catalog in theme '{}'", file.name))?;
        Ok(Self {
            name: file.name,
            description: file.description,
            catalog: Arc::new(catalog),
            config: file.config,
        })
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let file: ThemeFile = serde_yaml::from_str(data).context("Failed to parse theme")?;
        Self::from_file(file)
    }

    pub fn builtin(name: &str) -> Result<Self> {
        let data = match name {
            "kingdom" => KINGDOM,
            "startup" => STARTUP,
            other => {
                return Err(anyhow!(
                    "Unknown built-in theme '{other}' (available: {})",
                    BUILTIN_THEMES.join(", ")
                ))
            }
        };
        Self::from_yaml(data).with_context(|| format!("Built-in theme '{name}' is broken"))
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Theme> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read theme file {}", path.display()))?;
        let theme: ThemeFile = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Theme::from_file(theme).with_context(|| format!("Failed to load {}", path.display()))
    }
}
