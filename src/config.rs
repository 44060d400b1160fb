use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::gradebook::DEFAULT_RECENT_LIMIT;
use crate::storage::cache::DEFAULT_TTL;
use crate::storage::supabase::DEFAULT_TABLE;
use crate::worksheet::builder::{DEFAULT_QUESTIONS_PER_WORKSHEET, DEFAULT_WORKSHEET_COUNT};
use crate::worksheet::generator::default_template_ids;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Supabase {
        url: String,
        api_key: String,
        table: String,
    },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    /// SQLite file holding every chat's dialogue state.
    pub dialogue_db: String,
    pub worksheet_count: usize,
    pub questions_per_worksheet: usize,
    pub templates: Vec<String>,
    pub recent_cache_ttl: Duration,
    pub recent_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads every setting through `lookup`, which returns `None` for unset names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let storage = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("supabase") => StorageBackend::Supabase {
                url: lookup("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                api_key: lookup("SUPABASE_KEY").ok_or(ConfigError::Missing("SUPABASE_KEY"))?,
                table: lookup("SUPABASE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let templates = match lookup("WORKSHEET_TEMPLATES") {
            Some(list) => list
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            None => default_template_ids(),
        };

        Ok(Self {
            storage,
            dialogue_db: lookup("DIALOGUE_DB").unwrap_or_else(|| "db.sqlite".to_string()),
            worksheet_count: parse_or(&lookup, "WORKSHEET_COUNT", DEFAULT_WORKSHEET_COUNT)?,
            questions_per_worksheet: parse_or(
                &lookup,
                "QUESTIONS_PER_WORKSHEET",
                DEFAULT_QUESTIONS_PER_WORKSHEET,
            )?,
            templates,
            recent_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "RECENT_CACHE_TTL_SECS",
                DEFAULT_TTL.as_secs(),
            )?),
            recent_limit: parse_or(&lookup, "RECENT_LIMIT", DEFAULT_RECENT_LIMIT)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
