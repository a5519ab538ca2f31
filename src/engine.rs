//! Conversation engine - one inbound message, one route
//!
//! INPUT → RESET? → LOCK → CONTEXT → RESUME | REGISTER | GREET →
//! DISAMBIGUATE → DETECT → RATE LIMIT → CLASSIFY → EXTRACT → DISPATCH

use crate::detectors::{DetectorChain, DetectorInput};
use crate::dialogue::reminder::{self, ReminderStart};
use crate::dialogue::{recurrence, registration, resume, Turn};
use crate::disambiguator::{detect_recurrence, detect_reminder};
use crate::dispatcher::Dispatcher;
use crate::error::FailureKind;
use crate::identity::log_tag;
use crate::llm::IntentModel;
use crate::models::User;
use crate::rate_limit::RateLimiter;
use crate::services::Services;
use crate::session::{SessionContext, Stage, UserLocks};
use crate::text::{normalize_for_match, sanitize_input};
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const RESET_REPLY: &str = "🔄 Conversa reiniciada. Pode começar de novo!";

lazy_static! {
    static ref RESET: Regex = Regex::new(r"^[#/]reset$").unwrap();
    static ref GREETING: Regex = Regex::new(
        r"^(oi+|ola|opa|hey|hello|e ai|eai|bom dia|boa tarde|boa noite|tudo bem|salve)( tudo bem)?[!.?, ]*$"
    )
    .unwrap();
}

/// Where a message ended up. Returned for logging and tests; every route
/// except `Ignored` has already replied to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Ignored,
    Reset,
    Resumed(Stage),
    Registration,
    Greeting,
    Recurrence,
    Reminder,
    Detector(&'static str),
    RateLimited,
    Inference,
    Failed(FailureKind),
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Ignored => "ignored",
            Route::Reset => "reset",
            Route::Resumed(stage) => stage.as_str(),
            Route::Registration => "registration",
            Route::Greeting => "greeting",
            Route::Recurrence => "recurrence",
            Route::Reminder => "reminder",
            Route::Detector(name) => *name,
            Route::RateLimited => "rate_limited",
            Route::Inference => "inference",
            Route::Failed(_) => "failed",
        }
    }
}

pub fn is_reset_command(text: &str) -> bool {
    RESET.is_match(&text.trim().to_lowercase())
}

pub fn is_greeting(text: &str) -> bool {
    GREETING.is_match(&normalize_for_match(text))
}

#[derive(Clone)]
pub struct ConversationEngine {
    services: Services,
    model: Arc<dyn IntentModel>,
    rate_limiter: Arc<dyn RateLimiter>,
    detectors: Arc<DetectorChain>,
    locks: Arc<UserLocks>,
}

impl ConversationEngine {
    pub fn new(
        services: Services,
        model: Arc<dyn IntentModel>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            services,
            model,
            rate_limiter,
            detectors: Arc::new(DetectorChain::default()),
            locks: Arc::new(UserLocks::new()),
        }
    }

    pub fn with_detectors(mut self, detectors: DetectorChain) -> Self {
        self.detectors = Arc::new(detectors);
        self
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Process one inbound message to completion. Failures are answered with
    /// an apology and leave the stored context as it was.
    pub async fn handle_message(&self, identifier: &str, text: &str) -> Route {
        let started = Instant::now();
        let text = sanitize_input(text);
        if text.is_empty() {
            debug!(user = %log_tag(identifier), "Empty message ignored");
            return Route::Ignored;
        }

        let route = match self.route(identifier, &text).await {
            Ok(route) => route,
            Err(e) => {
                let kind = e.failure_kind();
                error!(user = %log_tag(identifier), failure = ?kind, "Turn failed: {}", e);
                self.services.reply(identifier, kind.apology()).await;
                Route::Failed(kind)
            }
        };

        info!(
            user = %log_tag(identifier),
            route = route.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Message handled"
        );
        route
    }

    async fn route(&self, identifier: &str, text: &str) -> Result<Route> {
        if is_reset_command(text) {
            self.services.sessions.clear(identifier).await?;
            self.services.reply(identifier, RESET_REPLY).await;
            // A turn already holding the lock may still write its stage back.
            let _guard = self.locks.acquire(identifier).await;
            self.services.sessions.clear(identifier).await?;
            return Ok(Route::Reset);
        }

        let _guard = self.locks.acquire(identifier).await;

        let context = self.load_context(identifier).await;
        let user = self.services.store.find_user(identifier).await?;

        if let Some(SessionContext {
            stage: Some(stage),
            payload,
            ..
        }) = context
        {
            let turn = Turn::new(identifier, user.as_ref(), text);
            resume(&self.services, &turn, stage, &payload).await?;
            return Ok(Route::Resumed(stage));
        }

        let Some(user) = user else {
            registration::start(&self.services, identifier, None).await?;
            return Ok(Route::Registration);
        };

        self.route_registered(identifier, &user, text).await
    }

    async fn route_registered(&self, identifier: &str, user: &User, text: &str) -> Result<Route> {
        if is_greeting(text) {
            let first_name = user.name.split_whitespace().next().unwrap_or(&user.name);
            let greeting = format!(
                "Olá, {}! 👋\nComo posso ajudar com suas finanças hoje?\nDigite *ajuda* para ver o que eu sei fazer.",
                first_name
            );
            self.services.reply(identifier, &greeting).await;
            return Ok(Route::Greeting);
        }

        if let Some(proposal) = detect_recurrence(text) {
            debug!(user = %log_tag(identifier), frequency = %proposal.frequency, "Recurrence detected");
            recurrence::start(&self.services, identifier, proposal).await?;
            return Ok(Route::Recurrence);
        }

        if let Some(draft) = detect_reminder(text) {
            debug!(user = %log_tag(identifier), "Reminder detected");
            reminder::start(&self.services, identifier, user, ReminderStart::from_draft(draft, text))
                .await?;
            return Ok(Route::Reminder);
        }

        let input = DetectorInput::new(identifier, user.clone(), text, self.services.today());
        if let Some(name) = self.detectors.run(&input, &self.services).await? {
            return Ok(Route::Detector(name));
        }

        if !self.rate_limiter.check(identifier).await {
            warn!(user = %log_tag(identifier), "Rate limit exceeded");
            self.services
                .reply(identifier, FailureKind::RateLimited.apology())
                .await;
            return Ok(Route::RateLimited);
        }

        let domain = self.model.classify_domain(text).await?;
        let actions = self.model.extract_actions(domain, text).await?;
        debug!(
            user = %log_tag(identifier),
            domain = domain.as_str(),
            actions = actions.len(),
            "Actions extracted"
        );

        Dispatcher::new(&self.services, self.model.as_ref())
            .dispatch(identifier, user, text, &actions)
            .await?;
        Ok(Route::Inference)
    }

    /// A broken session backend degrades to "no active flow".
    async fn load_context(&self, identifier: &str) -> Option<SessionContext> {
        match self.services.sessions.get(identifier).await {
            Ok(context) => context,
            Err(e) => {
                warn!(user = %log_tag(identifier), "Failed to load session context: {}", e);
                None
            }
        }
    }
}
