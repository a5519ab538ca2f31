//! Reminder creation
//!
//! Collects message, date and optionally an amount. Dates already in the
//! past are refused and asked again. A bare day ("15") at the date question
//! is completed by a month question.

use super::{restart, Turn};
use crate::disambiguator::ReminderDraft;
use crate::llm::ReminderRequest;
use crate::models::{NewReminder, User};
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::temporal::{
    extract_bare_day, extract_business_day_rule, extract_month_year, normalize_month, parse_date,
    parse_date_or_iso, BusinessDayRule,
};
use crate::text::{collapse_whitespace, extract_amount, format_brl, format_date, normalize_for_match};
use crate::validation::is_valid_amount;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::info;

lazy_static! {
    static ref DAY_MARKER: Regex = Regex::new(r"\bdia\s+(\d{1,2})\b").unwrap();
}

const ASK_TEXT: &str = "💭 O que você quer que eu te lembre?";
const ASK_DATE: &str = "📆 Quando devo te lembrar? (Ex: *20/11*, *amanhã*, *dia 10*)";
const ASK_VALUE: &str = "💰 Qual o valor desse lembrete?";
const INVALID_DATE: &str =
    "❌ Não entendi a data. Ex: *25/12*, *amanhã*, *dia 10 do mês que vem*.";
const INVALID_MONTH: &str = "❌ Não entendi o mês. Ex: *este mês*, *novembro*, *mês que vem*.";

/// What is known when the flow opens.
#[derive(Debug, Clone, Default)]
pub struct ReminderStart {
    pub message: Option<String>,
    pub amount: Option<Decimal>,
    pub amount_pending: bool,
    /// Date as written by the extractor, pt-BR or ISO.
    pub date_hint: Option<String>,
    pub business_day: Option<BusinessDayRule>,
    pub original_text: String,
}

impl ReminderStart {
    pub fn from_draft(draft: ReminderDraft, original_text: &str) -> Self {
        Self {
            message: draft.message,
            amount: draft.amount.filter(|a| is_valid_amount(*a)),
            amount_pending: draft.amount_pending,
            date_hint: None,
            business_day: None,
            original_text: original_text.to_string(),
        }
    }

    pub fn from_request(request: &ReminderRequest, original_text: &str) -> Self {
        let business_day = request.business_day.as_ref().and_then(|hint| {
            Some(BusinessDayRule {
                n: hint.n.filter(|n| *n > 0)?,
                next_month: hint.next_month.unwrap_or(false),
            })
        });

        Self {
            message: request
                .message
                .as_deref()
                .map(collapse_whitespace)
                .filter(|m| !m.is_empty()),
            amount: request.amount.filter(|a| is_valid_amount(*a)),
            amount_pending: request.ask_amount.unwrap_or(false) && request.amount.is_none(),
            date_hint: request.date.clone().filter(|d| !d.trim().is_empty()),
            business_day,
            original_text: original_text.to_string(),
        }
    }
}

/// Day and month written apart, as in "dia 5 em março".
fn split_day_and_month(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let normalized = normalize_for_match(text);
    let day: u32 = DAY_MARKER.captures(&normalized)?.get(1)?.as_str().parse().ok()?;
    let (month, year) = extract_month_year(text, today)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn resolve_start_date(start: &ReminderStart, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = start
        .date_hint
        .as_deref()
        .and_then(|hint| parse_date_or_iso(hint, today))
    {
        return Some(date);
    }

    if let Some(rule) = start
        .business_day
        .or_else(|| extract_business_day_rule(&start.original_text))
    {
        return rule.resolve(today);
    }

    parse_date(&start.original_text, today)
        .or_else(|| split_day_and_month(&start.original_text, today))
}

fn base_payload(message: Option<&str>, amount: Option<Decimal>, amount_pending: bool) -> Payload {
    let mut payload = Payload::new().with_opt("message", message);
    if let Some(amount) = amount {
        payload = payload.with_decimal("amount", amount);
    }
    if amount_pending {
        payload = payload.with("amount_pending", true);
    }
    payload
}

/// Open the flow, asking only for what is still missing.
pub async fn start(services: &Services, identifier: &str, user: &User, start: ReminderStart) -> Result<()> {
    let today = services.today();
    let date = resolve_start_date(&start, today);

    let Some(message) = start.message.as_deref() else {
        let mut payload = base_payload(None, start.amount, start.amount_pending);
        if let Some(date) = date {
            payload = payload.with_date("date", date);
        }
        services
            .sessions
            .set(identifier, Some(Stage::ReminderAwaitingText), payload)
            .await?;
        services.reply(identifier, ASK_TEXT).await;
        return Ok(());
    };

    match date {
        Some(date) => {
            proceed(services, identifier, user, message, date, start.amount, start.amount_pending).await
        }
        None => {
            services
                .sessions
                .set(
                    identifier,
                    Some(Stage::ReminderAwaitingDate),
                    base_payload(Some(message), start.amount, start.amount_pending),
                )
                .await?;
            services.reply(identifier, ASK_DATE).await;
            Ok(())
        }
    }
}

/// Date known: refuse past dates, ask a pending amount, or save.
async fn proceed(
    services: &Services,
    identifier: &str,
    user: &User,
    message: &str,
    date: NaiveDate,
    amount: Option<Decimal>,
    amount_pending: bool,
) -> Result<()> {
    if date < services.today() {
        services
            .sessions
            .set(
                identifier,
                Some(Stage::ReminderAwaitingDate),
                base_payload(Some(message), amount, amount_pending),
            )
            .await?;
        let text = format!(
            "⚠️ Essa data (*{}*) já passou.\n📅 Me diga uma data a partir de hoje (ex: *hoje*, *amanhã*, *25/01*).",
            format_date(date)
        );
        services.reply(identifier, &text).await;
        return Ok(());
    }

    if amount_pending && amount.is_none() {
        services
            .sessions
            .set(
                identifier,
                Some(Stage::ReminderAwaitingValue),
                Payload::new().with("message", message).with_date("date", date),
            )
            .await?;
        services.reply(identifier, ASK_VALUE).await;
        return Ok(());
    }

    let reminder = services
        .store
        .create_reminder(NewReminder {
            user_id: user.id,
            message: message.to_string(),
            target_date: date,
            amount,
        })
        .await?;
    services.sessions.clear(identifier).await?;

    info!(reminder_id = %reminder.id, target = %reminder.target_date, "Reminder created");

    let mut text = format!(
        "🔔 Vou te lembrar: *{}* em *{}*",
        reminder.message,
        format_date(reminder.target_date)
    );
    if let Some(amount) = reminder.amount {
        text.push_str(&format!("\n💰 Valor: {}", format_brl(amount)));
    }
    services.reply(identifier, &text).await;
    Ok(())
}

fn pending_flag(payload: &Payload) -> bool {
    payload.get_bool("amount_pending").unwrap_or(false)
}

pub async fn on_text(services: &Services, turn: &Turn<'_>, user: &User, payload: &Payload) -> Result<()> {
    let message = collapse_whitespace(turn.text);
    if message.is_empty() {
        services.reply(turn.identifier, ASK_TEXT).await;
        return Ok(());
    }

    let amount = payload.get_decimal("amount");
    let amount_pending = pending_flag(payload);

    if let Some(date) = payload.get_date("date") {
        return proceed(services, turn.identifier, user, &message, date, amount, amount_pending).await;
    }

    services
        .sessions
        .set(
            turn.identifier,
            Some(Stage::ReminderAwaitingDate),
            base_payload(Some(&message), amount, amount_pending),
        )
        .await?;
    services.reply(turn.identifier, ASK_DATE).await;
    Ok(())
}

pub async fn on_date(services: &Services, turn: &Turn<'_>, user: &User, payload: &Payload) -> Result<()> {
    let Some(message) = payload.get_str("message") else {
        return restart(services, turn.identifier, Stage::ReminderAwaitingDate).await;
    };
    let amount = payload.get_decimal("amount");
    let amount_pending = pending_flag(payload);

    if let Some(day) = extract_bare_day(turn.text) {
        let mut next = base_payload(Some(message), amount, amount_pending);
        next = next.with("day", day);
        services
            .sessions
            .set(turn.identifier, Some(Stage::ReminderAwaitingMonth), next)
            .await?;
        let text = format!("📅 Dia *{}* de qual mês?", day);
        services.reply(turn.identifier, &text).await;
        return Ok(());
    }

    let today = services.today();
    let date = match extract_business_day_rule(turn.text) {
        Some(rule) => rule.resolve(today),
        None => parse_date(turn.text, today).or_else(|| split_day_and_month(turn.text, today)),
    };
    let Some(date) = date else {
        services.reply(turn.identifier, INVALID_DATE).await;
        return Ok(());
    };

    proceed(services, turn.identifier, user, message, date, amount, amount_pending).await
}

pub async fn on_value(services: &Services, turn: &Turn<'_>, user: &User, payload: &Payload) -> Result<()> {
    let Some(message) = payload.get_str("message") else {
        return restart(services, turn.identifier, Stage::ReminderAwaitingValue).await;
    };

    let Some(amount) = extract_amount(turn.text).filter(|a| is_valid_amount(*a)) else {
        services
            .reply(turn.identifier, "❌ Valor inválido. Ex: *150* ou *89,90*.")
            .await;
        return Ok(());
    };

    if let Some(date) = payload.get_date("date") {
        return proceed(services, turn.identifier, user, message, date, Some(amount), false).await;
    }

    let (stage, prompt) = match payload.get_u32("day") {
        Some(day) => (Stage::ReminderAwaitingMonth, format!("📅 Dia *{}* de qual mês?", day)),
        None => (Stage::ReminderAwaitingDate, ASK_DATE.to_string()),
    };
    let mut next = base_payload(Some(message), Some(amount), false);
    if let Some(day) = payload.get_u32("day") {
        next = next.with("day", day);
    }
    services.sessions.set(turn.identifier, Some(stage), next).await?;
    services.reply(turn.identifier, &prompt).await;
    Ok(())
}

pub async fn on_month(services: &Services, turn: &Turn<'_>, user: &User, payload: &Payload) -> Result<()> {
    let (Some(message), Some(day)) = (payload.get_str("message"), payload.get_u32("day")) else {
        return restart(services, turn.identifier, Stage::ReminderAwaitingMonth).await;
    };
    let today = services.today();

    let bare_month = normalize_month(turn.text);
    let month_year = match bare_month {
        Some(index) => Some((index + 1, today.year())),
        None => extract_month_year(turn.text, today),
    };
    let Some((month, year)) = month_year else {
        services.reply(turn.identifier, INVALID_MONTH).await;
        return Ok(());
    };

    let Some(mut date) = NaiveDate::from_ymd_opt(year, month, day) else {
        let text = format!("❌ O mês {:02}/{} não tem dia {}. Informe outro mês.", month, year, day);
        services.reply(turn.identifier, &text).await;
        return Ok(());
    };
    // a bare month that already passed means next year
    if bare_month.is_some() && date < today {
        if let Some(next_year) = NaiveDate::from_ymd_opt(year + 1, month, day) {
            date = next_year;
        }
    }

    let amount = payload.get_decimal("amount");
    proceed(services, turn.identifier, user, message, date, amount, pending_flag(payload)).await
}
