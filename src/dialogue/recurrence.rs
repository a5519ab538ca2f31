//! Recurrence confirmation
//!
//! A proposal is shown back to the user and only stored after an explicit
//! yes. Confirming creates the pending template transaction for the next
//! charge and the recurrence pointing at it.

use super::{restart, Turn};
use crate::disambiguator::{detect_recurrence, infer_kind, RecurrenceProposal};
use crate::llm::RecurrenceRequest;
use crate::models::{Frequency, MonthlyRule, NewRecurrence, NewTransaction, TransactionKind, User};
use crate::recurrence::next_charge_date;
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::store::resolve_category;
use crate::text::{extract_amount, format_brl, format_date, is_no, is_yes};
use crate::validation::is_valid_amount;
use crate::Result;
use tracing::info;

const ASK_VALUE: &str = "💰 Qual o valor dessa recorrência?";
const ASK_YES_NO: &str = "Só pra confirmar: responde com *Sim* ou *Não* 🙂";
const MISSING_DESCRIPTION: &str = "❌ Não entendi o que você quer tornar recorrente.\n\
Ex: *pagar academia todo dia 10 do mês 130*";
const MISSING_FREQUENCY: &str =
    "❌ Não consegui identificar a frequência (mensal, diária, semanal...).";

/// Merge what the extractor returned with what the heuristics read from the
/// same text. Extractor fields win.
pub fn proposal_from_request(request: &RecurrenceRequest, text: &str) -> Option<RecurrenceProposal> {
    let heuristic = detect_recurrence(text);

    let frequency = request
        .frequency
        .as_deref()
        .and_then(Frequency::parse)
        .or_else(|| heuristic.as_ref().map(|p| p.frequency))?;

    let rule_from_request = match request.monthly_rule.as_deref() {
        Some("business_day") => request.business_day.map(MonthlyRule::BusinessDay),
        _ => request
            .day_of_month
            .map(MonthlyRule::DayOfMonth)
            .or_else(|| request.business_day.map(MonthlyRule::BusinessDay)),
    };
    let monthly_rule = match frequency {
        Frequency::Monthly => rule_from_request.or_else(|| heuristic.as_ref().and_then(|p| p.monthly_rule)),
        _ => None,
    };

    let description = request
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .or_else(|| heuristic.as_ref().map(|p| p.description.clone()))
        .unwrap_or_default();

    Some(RecurrenceProposal {
        description,
        amount: request
            .amount
            .filter(|a| is_valid_amount(*a))
            .or_else(|| heuristic.as_ref().and_then(|p| p.amount)),
        kind: request
            .kind
            .as_deref()
            .and_then(TransactionKind::parse)
            .unwrap_or_else(|| infer_kind(text)),
        frequency,
        monthly_rule,
    })
}

fn proposal_payload(proposal: &RecurrenceProposal) -> Payload {
    let mut payload = Payload::new()
        .with("description", proposal.description.clone())
        .with("kind", proposal.kind.as_str())
        .with("frequency", proposal.frequency.as_str());
    if let Some(amount) = proposal.amount {
        payload = payload.with_decimal("amount", amount);
    }
    if let Some(rule) = proposal.monthly_rule {
        if let Ok(value) = serde_json::to_value(rule) {
            payload = payload.with("monthly_rule", value);
        }
    }
    payload
}

fn proposal_from_payload(payload: &Payload) -> Option<RecurrenceProposal> {
    Some(RecurrenceProposal {
        description: payload.get_str("description")?.to_string(),
        amount: payload.get_decimal("amount"),
        kind: TransactionKind::parse(payload.get_str("kind")?)?,
        frequency: Frequency::parse(payload.get_str("frequency")?)?,
        monthly_rule: payload
            .as_map()
            .get("monthly_rule")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
    })
}

fn summary(proposal: &RecurrenceProposal) -> String {
    let mut text = format!("Beleza. Vou criar essa recorrência:\n\n📌 *{}*\n", proposal.description);
    if let Some(amount) = proposal.amount {
        text.push_str(&format!("💰 *{}*\n", format_brl(amount)));
    }
    text.push_str(&format!("⏳ *{}*", proposal.frequency));
    if let Some(rule) = proposal.monthly_rule {
        text.push_str(&format!(" ({})", rule));
    }
    text.push_str("\n\nConfirma? (Sim/Não)");
    text
}

async fn ask_confirmation(services: &Services, identifier: &str, proposal: &RecurrenceProposal) -> Result<()> {
    services
        .sessions
        .set(
            identifier,
            Some(Stage::RecurrenceAwaitingConfirmation),
            proposal_payload(proposal),
        )
        .await?;
    services.reply(identifier, &summary(proposal)).await;
    Ok(())
}

/// Show the proposal, asking for the amount first when it is unknown.
pub async fn start(services: &Services, identifier: &str, proposal: RecurrenceProposal) -> Result<()> {
    if proposal.description.trim().is_empty() {
        services.reply(identifier, MISSING_DESCRIPTION).await;
        return Ok(());
    }

    if !proposal.amount.is_some_and(is_valid_amount) {
        return ask_value(services, identifier, proposal).await;
    }

    ask_confirmation(services, identifier, &proposal).await
}

async fn ask_value(services: &Services, identifier: &str, mut proposal: RecurrenceProposal) -> Result<()> {
    proposal.amount = None;
    services
        .sessions
        .set(
            identifier,
            Some(Stage::RecurrenceAwaitingValue),
            proposal_payload(&proposal),
        )
        .await?;
    services.reply(identifier, ASK_VALUE).await;
    Ok(())
}

/// Entry point for an extracted `create_recurrence` action.
pub async fn start_from_request(
    services: &Services,
    identifier: &str,
    request: &RecurrenceRequest,
    text: &str,
) -> Result<()> {
    match proposal_from_request(request, text) {
        Some(proposal) => start(services, identifier, proposal).await,
        None => {
            services.reply(identifier, MISSING_FREQUENCY).await;
            Ok(())
        }
    }
}

pub async fn on_value(services: &Services, turn: &Turn<'_>, _user: &User, payload: &Payload) -> Result<()> {
    let Some(mut proposal) = proposal_from_payload(payload) else {
        return restart(services, turn.identifier, Stage::RecurrenceAwaitingValue).await;
    };

    let Some(amount) = extract_amount(turn.text).filter(|a| is_valid_amount(*a)) else {
        services
            .reply(turn.identifier, "❌ Valor inválido. Ex: *130* ou *89,90*.")
            .await;
        return Ok(());
    };
    proposal.amount = Some(amount);

    ask_confirmation(services, turn.identifier, &proposal).await
}

pub async fn on_confirmation(
    services: &Services,
    turn: &Turn<'_>,
    user: &User,
    payload: &Payload,
) -> Result<()> {
    let Some(proposal) = proposal_from_payload(payload) else {
        return restart(services, turn.identifier, Stage::RecurrenceAwaitingConfirmation).await;
    };
    let Some(amount) = proposal.amount.filter(|a| is_valid_amount(*a)) else {
        return ask_value(services, turn.identifier, proposal).await;
    };

    if is_no(turn.text) {
        services.sessions.clear(turn.identifier).await?;
        services
            .reply(turn.identifier, "Tranquilo, cancelei a criação da recorrência ✅")
            .await;
        return Ok(());
    }
    if !is_yes(turn.text) {
        services.reply(turn.identifier, ASK_YES_NO).await;
        return Ok(());
    }

    let today = services.today();
    let Some(next_charge) = next_charge_date(proposal.frequency, proposal.monthly_rule, today) else {
        return restart(services, turn.identifier, Stage::RecurrenceAwaitingConfirmation).await;
    };

    let category_id = resolve_category(services.store.as_ref(), user.id, None, proposal.kind).await?;
    let template = services
        .store
        .create_transaction(NewTransaction {
            user_id: user.id,
            kind: proposal.kind,
            amount,
            description: Some(proposal.description.clone()),
            category_id: Some(category_id),
            occurred_on: today,
            scheduled_for: Some(next_charge),
            recurring: true,
        })
        .await?;

    let recurrence = services
        .store
        .create_recurrence(NewRecurrence {
            user_id: user.id,
            transaction_id: template.id,
            description: proposal.description.clone(),
            amount,
            kind: proposal.kind,
            frequency: proposal.frequency,
            monthly_rule: proposal.monthly_rule,
            next_charge,
        })
        .await?;
    services.sessions.clear(turn.identifier).await?;

    info!(
        recurrence_id = %recurrence.id,
        frequency = recurrence.frequency.as_str(),
        next_charge = %recurrence.next_charge,
        "Recurrence created"
    );

    let text = format!(
        "🔁 Recorrência criada!\n\n\
         📌 *{}*\n\
         💰 Valor: *{}*\n\
         ⏳ Frequência: *{}*\n\
         📆 Próxima cobrança: *{}*",
        recurrence.description,
        format_brl(amount),
        recurrence.frequency,
        format_date(recurrence.next_charge)
    );
    services.reply(turn.identifier, &text).await;
    Ok(())
}
