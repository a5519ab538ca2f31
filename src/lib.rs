//! Finance Chat Engine
//!
//! Conversational backend for a pt-BR personal-finance assistant:
//! - Registers incomes and expenses from free-form text
//! - Guides multi-turn flows (registration, categories, scheduling,
//!   reminders, recurrences, edits, deletions)
//! - Answers common queries through deterministic detectors
//! - Falls back to an LLM only for what the heuristics cannot resolve
//!
//! MESSAGE LOOP:
//! INPUT → RESET? → LOCK → CONTEXT → RESUME | DISAMBIGUATE → DETECT →
//! RATE LIMIT → CLASSIFY → EXTRACT → DISPATCH

pub mod api;
pub mod clock;
pub mod config;
pub mod detectors;
pub mod dialogue;
pub mod disambiguator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod llm;
pub mod messenger;
pub mod models;
pub mod rate_limit;
pub mod recurrence;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod store;
pub mod temporal;
pub mod text;
pub mod validation;

pub use error::{EngineError, Result};

// Re-export common types
pub use engine::{ConversationEngine, Route};
pub use models::*;
pub use services::Services;
