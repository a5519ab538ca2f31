//! Local chat loop: type messages as a single user, read replies on stdout.

use finance_chat_engine::{
    config::EngineConfig,
    engine::{ConversationEngine, Route},
    llm::intent_model,
    messenger::Messenger,
    rate_limit::FixedWindowRateLimiter,
    services::Services,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONSOLE_USER: &str = "5500000000000@c.us";

struct StdoutMessenger;

#[async_trait::async_trait]
impl Messenger for StdoutMessenger {
    async fn send(&self, _to: &str, text: &str) -> finance_chat_engine::Result<()> {
        println!("\n🤖 {}\n", text);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    dotenv::dotenv().ok();
    let config = EngineConfig::from_env()?;

    let mut services = Services::from_config(&config)?;
    services.messenger = Arc::new(StdoutMessenger);

    let engine = ConversationEngine::new(
        services,
        intent_model(&config)?,
        Arc::new(FixedWindowRateLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window,
        )),
    );

    println!("Finance Chat Engine console. Type #reset to restart, Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let route = engine.handle_message(CONSOLE_USER, &line).await;
        if route != Route::Ignored {
            info!(route = route.as_str(), "Turn routed");
        }
    }

    Ok(())
}
