use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

use crate::locale::Language;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://teacher-evaluations.db";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub language: Language,
    pub export_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let language = match get("EVAL_LANGUAGE") {
            Some(value) if !value.trim().is_empty() => value
                .parse::<Language>()
                .map_err(|err| anyhow!("EVAL_LANGUAGE: {err}"))?,
            _ => Language::default(),
        };

        let export_dir = get("EVAL_EXPORT_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let config = Self {
            database_url,
            language,
            export_dir,
        };
        config.validate()?;
        Ok(config)
    }

    /// Command line flags win over the environment.
    pub fn with_overrides(mut self, database_url: Option<String>, language: Option<Language>) -> Result<Self> {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        if let Some(language) = language {
            self.language = language;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if !self.database_url.starts_with("sqlite:") {
            bail!("DATABASE_URL must be a sqlite: URL, got {}", self.database_url);
        }
        Ok(())
    }
}
