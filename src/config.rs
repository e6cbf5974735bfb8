use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShabakaError};
use crate::types::FetchPlan;

/// Name of the configuration file stored inside the `.shabaka` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory holding a word graph project.
pub const SHABAKA_DIR: &str = ".shabaka";

/// Configuration of a word graph project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShabakaConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Database file, relative to the project directory.
    pub db_path: String,
    /// Maximum number of direct hits per search.
    pub default_limit: usize,
    /// Fetch plan for plain searches.
    pub search_fetch_plan: String,
    /// Fetch plan for searches that expand the derivation subgraph.
    pub subgraph_fetch_plan: String,
    /// Treat shadda as an elidable mark when matching vocalized queries.
    pub ignore_shaddas: bool,
}

impl Default for ShabakaConfig {
    fn default() -> Self {
        Self {
            version: 1,
            db_path: format!("{SHABAKA_DIR}/shabaka.db"),
            default_limit: 100,
            search_fetch_plan: "*:1".to_string(),
            subgraph_fetch_plan: "*:2".to_string(),
            ignore_shaddas: false,
        }
    }
}

impl ShabakaConfig {
    /// Parses `(search_fetch_plan, subgraph_fetch_plan)`.
    pub fn fetch_plans(&self) -> Result<(FetchPlan, FetchPlan)> {
        let parse = |spec: &str| {
            FetchPlan::parse(spec).map_err(|e| ShabakaError::Config {
                message: format!("invalid fetch plan in config: {e}"),
            })
        };
        Ok((
            parse(&self.search_fetch_plan)?,
            parse(&self.subgraph_fetch_plan)?,
        ))
    }

    /// The fetch plan to use for a search, depending on subgraph expansion.
    pub fn fetch_plan_for(&self, expand_subgraph: bool) -> Result<FetchPlan> {
        let (search, subgraph) = self.fetch_plans()?;
        Ok(if expand_subgraph { subgraph } else { search })
    }

    /// Absolute database path for a project rooted at `project_root`.
    pub fn database_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.db_path)
    }
}

/// Returns the `.shabaka` directory of a project.
pub fn get_shabaka_dir(project_root: &Path) -> PathBuf {
    project_root.join(SHABAKA_DIR)
}

/// Returns the path of a project's `config.json`.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_shabaka_dir(project_root).join(CONFIG_FILENAME)
}

/// Loads a project's configuration, or the defaults if it has none.
pub fn load_config(project_root: &Path) -> Result<ShabakaConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(ShabakaConfig::default());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| ShabakaError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let config: ShabakaConfig =
        serde_json::from_str(&contents).map_err(|e| ShabakaError::Config {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?;

    config.fetch_plans()?;
    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it into place.
pub fn save_config(project_root: &Path, config: &ShabakaConfig) -> Result<()> {
    let shabaka_dir = get_shabaka_dir(project_root);
    fs::create_dir_all(&shabaka_dir).map_err(|e| ShabakaError::Config {
        message: format!(
            "failed to create project directory '{}': {}",
            shabaka_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(project_root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| ShabakaError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| ShabakaError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| ShabakaError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}
