use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use warrant_ingest::IngestConfig;
use warrant_model::KindSchema;
use warrant_storage::{ElasticConfig, SearchConfig};
use warrant_types::Rights;

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const VALID_FORMATS: [&str; 2] = ["compact", "json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Everything a Warrant deployment is configured with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarrantConfig {
    pub elastic: ElasticConfig,
    pub search: SearchConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
    pub kinds: Vec<KindSchema>,
}

impl WarrantConfig {
    /// Loads a TOML file, applies `WARRANT_*` environment overrides and
    /// validates the result.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML without overrides or validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides backend location and credentials from the environment:
    /// `WARRANT_ELASTIC_URL`, `WARRANT_ELASTIC_USERNAME`,
    /// `WARRANT_ELASTIC_PASSWORD`.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("WARRANT_ELASTIC_URL") {
            self.elastic.url = url;
        }
        if let Some(user) = var("WARRANT_ELASTIC_USERNAME") {
            self.elastic.username = Some(user);
        }
        if let Some(password) = var("WARRANT_ELASTIC_PASSWORD") {
            self.elastic.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "invalid log level '{}'; must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            );
        }
        if !VALID_FORMATS.contains(&self.logging.format.as_str()) {
            bail!(
                "invalid log format '{}'; must be one of: {}",
                self.logging.format,
                VALID_FORMATS.join(", ")
            );
        }

        if self.elastic.url.trim().is_empty() {
            bail!("elastic.url cannot be empty");
        }

        let search = &self.search;
        if search.max_page_size == 0 {
            bail!("search.max_page_size cannot be 0");
        }
        if search.default_page_size == 0 || search.default_page_size > search.max_page_size {
            bail!(
                "search.default_page_size ({}) must be between 1 and max_page_size ({})",
                search.default_page_size,
                search.max_page_size
            );
        }
        if search.max_result_window < search.max_page_size {
            bail!(
                "search.max_result_window ({}) cannot be smaller than max_page_size ({})",
                search.max_result_window,
                search.max_page_size
            );
        }
        if search.read_timeout_ms == 0 {
            bail!("search.read_timeout_ms cannot be 0");
        }

        if self.ingest.lock_shards == 0 {
            bail!("ingest.lock_shards cannot be 0");
        }

        let mut seen = HashSet::new();
        for schema in &self.kinds {
            validate_kind(schema)?;
            if !seen.insert(schema.kind.as_str()) {
                bail!("kind '{}' is configured twice", schema.kind);
            }
        }
        Ok(())
    }

    pub fn kind(&self, name: &str) -> Option<&KindSchema> {
        self.kinds.iter().find(|k| k.kind == name)
    }
}

fn validate_kind(schema: &KindSchema) -> Result<()> {
    let name = schema.kind.as_str();
    // Lowercase, no separators an index or alias name cannot hold.
    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid_name {
        bail!("invalid kind name '{name}'");
    }
    for (group, rights) in &schema.initial_group_rights {
        let parsed = Rights::parse_strict(rights)
            .map_err(|e| anyhow!("kind '{name}', group '{group}': {e}"))?;
        if parsed.is_empty() {
            bail!("kind '{name}', group '{group}': initial rights cannot be empty");
        }
    }
    Ok(())
}
