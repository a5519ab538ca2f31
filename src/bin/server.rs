use finance_chat_engine::{
    api::start_server,
    config::EngineConfig,
    engine::ConversationEngine,
    llm::intent_model,
    rate_limit::FixedWindowRateLimiter,
    scheduler::{Scheduler, TextReportGenerator},
    services::Services,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = EngineConfig::from_env()?;

    info!("🚀 Finance Chat Engine - API Server");
    info!("📍 Port: {}", config.port);
    info!("🌎 Timezone: {}", config.timezone);

    // Create components
    let services = Services::from_config(&config)?;
    let model = intent_model(&config)?;
    let rate_limiter = Arc::new(FixedWindowRateLimiter::new(
        config.rate_limit_max,
        config.rate_limit_window,
    ));
    let scheduler = Arc::new(Scheduler::new(
        services.clone(),
        Arc::new(TextReportGenerator::new(services.store.clone())),
        config.reminder_send_hour,
    ));
    let engine = ConversationEngine::new(services, model, rate_limiter);

    info!("✅ Engine initialized");
    info!("📡 Starting API server...");

    start_server(engine, scheduler, config.port).await?;

    Ok(())
}
