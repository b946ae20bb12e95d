use chatauth::{app, config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let subscriber = tracing_subscriber::fmt().with_env_filter(config.log.filter.as_str());
    if config.log.json {
        subscriber.with_target(false).json().init();
    } else {
        subscriber.init();
    }

    let state = AppState::init(&config).await?;
    app::serve(app::build_app(state), &config).await
}
