use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::auth::repo::{InMemoryUserRepository, PgUserRepository, UserRepository};
use crate::auth::services::{AuthService, UserAuthService};
use crate::chat::services::{LlmService, OpenAiCompatLlmService};
use crate::config::{AppConfig, StoreBackend};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthService>,
    pub llm: Arc<dyn LlmService>,
}

impl AppState {
    /// Wire the user store, auth service and LLM client described by `config`.
    /// The store lives exactly as long as the returned state.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let users: Arc<dyn UserRepository> = match &config.store {
            StoreBackend::Memory => {
                info!("using in-memory user store");
                Arc::new(InMemoryUserRepository::new())
            }
            StoreBackend::Postgres { database_url } => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(database_url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("using postgres user store");
                Arc::new(PgUserRepository::new(db))
            }
        };

        let auth = Arc::new(
            UserAuthService::new(users).with_unique_usernames(config.unique_usernames),
        ) as Arc<dyn AuthService>;

        let llm = Arc::new(
            OpenAiCompatLlmService::new(&config.llm).context("build llm client")?,
        ) as Arc<dyn LlmService>;

        Ok(Self::from_parts(auth, llm))
    }

    pub fn from_parts(auth: Arc<dyn AuthService>, llm: Arc<dyn LlmService>) -> Self {
        Self { auth, llm }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmService>) -> Self {
        self.llm = llm;
        self
    }

    /// In-memory store and a canned LLM; every call builds a fresh store.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::chat::dto::{Answer, Question};
        use crate::chat::services::LlmError;
        use async_trait::async_trait;

        struct CannedLlm;
        #[async_trait]
        impl LlmService for CannedLlm {
            async fn execute(&self, question: &Question) -> Result<Answer, LlmError> {
                Ok(Answer {
                    text: format!("you said: {}", question.text),
                    used_tokens: Some(3),
                })
            }
        }

        let users = Arc::new(InMemoryUserRepository::new());
        let auth = Arc::new(UserAuthService::new(users)) as Arc<dyn AuthService>;
        Self::from_parts(auth, Arc::new(CannedLlm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, LogConfig};

    #[tokio::test]
    async fn init_wires_memory_store_from_borrowed_config() {
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreBackend::Memory,
            unique_usernames: true,
            llm: LlmConfig {
                model_name: "test".into(),
                base_url: "http://fake.local".into(),
                api_key: None,
                timeout_secs: 1,
            },
            log: LogConfig {
                filter: "off".into(),
                json: false,
            },
        };

        let state = AppState::init(&config).await.unwrap();
        let user = state.auth.register("Alice", "alice", "pw").await.unwrap();
        assert!(state.auth.register("Again", "alice", "pw").await.is_err());
        assert_eq!(
            state.auth.get_user_by_id(user.id).await.unwrap().map(|u| u.id),
            Some(user.id)
        );
        // still owned by the caller, for serve()
        assert_eq!(config.port, 0);
    }
}
