//! Intent classification and action extraction
//!
//! Two calls per message: a cheap domain classifier, then the extraction
//! prompt for that domain.

pub mod actions;
pub mod gemini;
pub mod prompts;

pub use actions::{
    parse_actions, Action, BusinessDayHint, Domain, RecurrenceRequest, ReminderRequest,
    TransactionDraft,
};
pub use gemini::{GeminiClient, Generation};

use crate::config::EngineConfig;
use crate::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Canned reply when no model is available to write one.
pub const FALLBACK_REPLY: &str = "🤔 Não entendi muito bem.\n\
Você pode tentar, por exemplo:\n\
• *gastei 50 no mercado*\n\
• *recebi 3000 de salário*\n\
• *me lembra de pagar a luz dia 10*\n\
• *saldo*";

#[async_trait::async_trait]
pub trait IntentModel: Send + Sync {
    async fn classify_domain(&self, text: &str) -> Result<Domain>;

    /// Never fails on unreadable output; that becomes `[Action::Unknown]`.
    async fn extract_actions(&self, domain: Domain, text: &str) -> Result<Vec<Action>>;

    /// Free-form conversational answer.
    async fn reply(&self, text: &str) -> Result<String>;
}

/// Gemini when a key is configured, otherwise the offline scripted model.
pub fn intent_model(config: &EngineConfig) -> Result<Arc<dyn IntentModel>> {
    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; free-form messages get the canned reply");
        return Ok(Arc::new(ScriptedIntentModel::new()));
    }
    let client = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())?;
    Ok(Arc::new(GeminiIntentModel::new(client)))
}

pub struct GeminiIntentModel {
    client: GeminiClient,
}

impl GeminiIntentModel {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IntentModel for GeminiIntentModel {
    async fn classify_domain(&self, text: &str) -> Result<Domain> {
        let generation = self
            .client
            .generate("classifier", prompts::SYSTEM_PROMPT, &prompts::classifier(text), 0.0)
            .await?;
        let domain = Domain::from_response(&generation.text);
        debug!(domain = domain.as_str(), confidence = generation.confidence, "Domain classified");
        Ok(domain)
    }

    async fn extract_actions(&self, domain: Domain, text: &str) -> Result<Vec<Action>> {
        let generation = self
            .client
            .generate(
                domain.as_str(),
                prompts::SYSTEM_PROMPT,
                &prompts::extraction(domain, text),
                0.1,
            )
            .await?;
        Ok(parse_actions(&generation.text))
    }

    async fn reply(&self, text: &str) -> Result<String> {
        let generation = self
            .client
            .generate("reply", prompts::REPLY_SYSTEM_PROMPT, &prompts::reply(text), 0.7)
            .await?;
        let answer = generation.text.trim();
        if answer.is_empty() {
            return Ok(FALLBACK_REPLY.to_string());
        }
        Ok(answer.to_string())
    }
}

/// Model with queued answers. Without a script every message is `Other`
/// and extracts to `Unknown`, which makes it a usable offline model too.
pub struct ScriptedIntentModel {
    domain: Domain,
    script: Arc<Mutex<VecDeque<Vec<Action>>>>,
    calls: AtomicUsize,
}

impl ScriptedIntentModel {
    pub fn new() -> Self {
        Self {
            domain: Domain::Other,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Queue the result of the next extraction.
    pub async fn push_actions(&self, actions: Vec<Action>) {
        self.script.lock().await.push_back(actions);
    }

    /// Number of model calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedIntentModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IntentModel for ScriptedIntentModel {
    async fn classify_domain(&self, _text: &str) -> Result<Domain> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.domain)
    }

    async fn extract_actions(&self, _domain: Domain, _text: &str) -> Result<Vec<Action>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| vec![Action::Unknown]))
    }

    async fn reply(&self, _text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FALLBACK_REPLY.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_model_replays_queue() {
        let model = ScriptedIntentModel::new().with_domain(Domain::Query);
        model.push_actions(vec![Action::ViewBalance]).await;

        assert_eq!(model.classify_domain("saldo?").await.unwrap(), Domain::Query);
        assert_eq!(
            model.extract_actions(Domain::Query, "saldo?").await.unwrap(),
            vec![Action::ViewBalance]
        );
        assert_eq!(
            model.extract_actions(Domain::Query, "de novo").await.unwrap(),
            vec![Action::Unknown]
        );
        assert_eq!(model.calls(), 3);
    }
}
