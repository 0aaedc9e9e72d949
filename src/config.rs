use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

use crate::model::MODEL_FILE;

/// Runtime configuration shared by the service and the CLIs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL for the lead store; optional when training from CSV.
    pub database_url: Option<String>,
    pub port: u16,
    /// Directory holding `lead_score_model.json` and `feature_config.json`.
    pub model_dir: PathBuf,
    /// Table (optionally schema-qualified) whose rows are read as lead documents.
    pub leads_table: String,
    /// Maximum number of leads read from the store.
    pub lead_limit: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 3000,
            model_dir: PathBuf::from("models"),
            leads_table: "leads".to_string(),
            lead_limit: 50_000,
        }
    }
}

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
});

/// Whether `name` is a plain or schema-qualified SQL identifier.
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            model_dir: std::env::var("MODEL_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            leads_table: std::env::var("LEADS_TABLE")
                .map(|table| {
                    if !is_valid_table_name(&table) {
                        anyhow::bail!("LEADS_TABLE must be a plain SQL identifier, got '{}'", table);
                    }
                    Ok(table)
                })
                .unwrap_or(Ok(defaults.leads_table))?,
            lead_limit: std::env::var("LEAD_LIMIT")
                .unwrap_or_else(|_| defaults.lead_limit.to_string())
                .parse()
                .ok()
                .filter(|limit: &i64| *limit > 0)
                .ok_or_else(|| anyhow::anyhow!("LEAD_LIMIT must be a positive integer"))?,
        };

        tracing::debug!("Model directory: {}", config.model_dir.display());
        tracing::debug!("Leads table: {}", config.leads_table);
        if let Some(ref url) = config.database_url {
            tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]);
        }

        Ok(config)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE)
    }

    /// The database URL, or an error explaining how to provide one.
    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Set DATABASE_URL (or DB_URL) or pass --csv path/to/leads.csv")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        assert!(is_valid_table_name("leads"));
        assert!(is_valid_table_name("lead_management.leads"));
        assert!(!is_valid_table_name("leads; DROP TABLE leads"));
        assert!(!is_valid_table_name("1leads"));
        assert!(!is_valid_table_name(""));
    }

    #[test]
    fn table_name_check_is_repeatable() {
        for _ in 0..3 {
            assert!(is_valid_table_name("public.leads"));
            assert!(!is_valid_table_name("public.leads.extra"));
        }
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(config.model_path().ends_with("lead_score_model.json"));
        assert!(config.require_database_url().is_err());
    }
}
