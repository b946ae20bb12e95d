use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LlmConfig {
    pub model_name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    /// Refuse a registration whose username already exists.
    pub unique_usernames: bool,
    pub llm: LlmConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = match var("USER_STORE").as_deref().unwrap_or("memory") {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres {
                database_url: var("DATABASE_URL")
                    .context("DATABASE_URL is required when USER_STORE=postgres")?,
            },
            other => anyhow::bail!("unknown USER_STORE `{other}` (expected memory or postgres)"),
        };

        let llm = LlmConfig {
            model_name: var("LLM_MODEL_NAME").context("LLM_MODEL_NAME is required")?,
            base_url: var("LLM_BASE_URL").unwrap_or_else(|| "http://localhost:11434".into()),
            api_key: var("LLM_API_KEY").filter(|k| !k.is_empty()),
            timeout_secs: var("LLM_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };

        let log = LogConfig {
            filter: var("RUST_LOG")
                .unwrap_or_else(|| "chatauth=debug,axum=info,tower_http=info".into()),
            json: var("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("APP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
            store,
            unique_usernames: var("AUTH_UNIQUE_USERNAMES")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            llm,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[("LLM_MODEL_NAME", "llama3")])).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert!(!cfg.unique_usernames);
        assert_eq!(cfg.llm.base_url, "http://localhost:11434");
        assert_eq!(cfg.llm.api_key, None);
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.log.filter, "chatauth=debug,axum=info,tower_http=info");
        assert!(!cfg.log.json);
    }

    #[test]
    fn log_settings() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("LLM_MODEL_NAME", "llama3"),
            ("RUST_LOG", "warn"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(cfg.log.filter, "warn");
        assert!(cfg.log.json);

        let cfg = AppConfig::from_lookup(lookup(&[
            ("LLM_MODEL_NAME", "llama3"),
            ("LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert!(!cfg.log.json);
    }

    #[test]
    fn model_name_is_required() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn postgres_needs_database_url() {
        let err = AppConfig::from_lookup(lookup(&[
            ("LLM_MODEL_NAME", "llama3"),
            ("USER_STORE", "postgres"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let cfg = AppConfig::from_lookup(lookup(&[
            ("LLM_MODEL_NAME", "llama3"),
            ("USER_STORE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/chat"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/chat".into()
            }
        );
    }

    #[test]
    fn overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("LLM_MODEL_NAME", "mistral"),
            ("LLM_BASE_URL", "http://ollama:11434"),
            ("LLM_API_KEY", "sk-test"),
            ("LLM_TIMEOUT_SECS", "5"),
            ("AUTH_UNIQUE_USERNAMES", "true"),
            ("APP_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(cfg.llm.model_name, "mistral");
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.llm.timeout_secs, 5);
        assert!(cfg.unique_usernames);
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn unknown_store_is_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[
            ("LLM_MODEL_NAME", "llama3"),
            ("USER_STORE", "redis"),
        ]))
        .is_err());
    }
}
