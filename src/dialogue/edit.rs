//! Transaction editing: id, field, new value.

use super::{restart, Turn};
use crate::handlers::transaction_line;
use crate::models::{Transaction, TransactionPatch, User};
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::temporal::parse_date_or_iso;
use crate::text::{collapse_whitespace, extract_amount, normalize_for_match};
use crate::validation::is_valid_amount;
use crate::Result;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

const ASK_ID: &str = "✏️ Informe o ID da transação que deseja editar (ex: *#a1b2c3d4*).";
const ASK_FIELD: &str = "O que deseja editar?\n1️⃣ Valor\n2️⃣ Descrição\n3️⃣ Data";
const NOT_FOUND: &str = "❌ Transação não encontrada. Confira o ID e envie novamente.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Amount,
    Description,
    Date,
}

impl EditField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditField::Amount => "amount",
            EditField::Description => "description",
            EditField::Date => "date",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let t = normalize_for_match(text);
        match t.trim_matches(|c: char| !c.is_alphanumeric()) {
            "1" | "valor" | "amount" | "value" => Some(EditField::Amount),
            "2" | "descricao" | "description" | "nome" => Some(EditField::Description),
            "3" | "data" | "date" | "dia" => Some(EditField::Date),
            _ => None,
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            EditField::Amount => "💰 Qual o novo valor?",
            EditField::Description => "📝 Qual a nova descrição?",
            EditField::Date => "📅 Qual a nova data? (ex: *25/02/2026*)",
        }
    }
}

/// Reference as typed by the user, without the leading '#'.
pub(crate) fn clean_reference(text: &str) -> String {
    text.trim().trim_start_matches('#').trim().to_lowercase()
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Open the flow; every piece the extractor already has skips its question.
pub async fn start(
    services: &Services,
    identifier: &str,
    user: &User,
    reference: Option<&str>,
    field: Option<&str>,
    new_value: Option<&Value>,
) -> Result<()> {
    let Some(reference) = reference.map(clean_reference).filter(|r| !r.is_empty()) else {
        services
            .sessions
            .set(identifier, Some(Stage::EditAwaitingId), Payload::new())
            .await?;
        services.reply(identifier, ASK_ID).await;
        return Ok(());
    };

    let Some(tx) = services.store.find_transaction(user.id, &reference).await? else {
        services
            .sessions
            .set(identifier, Some(Stage::EditAwaitingId), Payload::new())
            .await?;
        services.reply(identifier, NOT_FOUND).await;
        return Ok(());
    };

    let Some(field) = field.and_then(EditField::parse) else {
        return ask_field(services, identifier, &tx).await;
    };

    match new_value.and_then(value_text) {
        Some(value) => apply(services, identifier, user, tx.id, field, &value).await,
        None => ask_value(services, identifier, tx.id, field).await,
    }
}

async fn ask_field(services: &Services, identifier: &str, tx: &Transaction) -> Result<()> {
    services
        .sessions
        .set(
            identifier,
            Some(Stage::EditAwaitingField),
            Payload::new().with("id", tx.id.to_string()),
        )
        .await?;
    let text = format!("{}\n\n{}", transaction_line(tx), ASK_FIELD);
    services.reply(identifier, &text).await;
    Ok(())
}

async fn ask_value(services: &Services, identifier: &str, id: Uuid, field: EditField) -> Result<()> {
    services
        .sessions
        .set(
            identifier,
            Some(Stage::EditAwaitingValue),
            Payload::new()
                .with("id", id.to_string())
                .with("field", field.as_str()),
        )
        .await?;
    services.reply(identifier, field.prompt()).await;
    Ok(())
}

/// Validate and write the new value. Invalid input re-prompts and leaves
/// the context alone.
async fn apply(
    services: &Services,
    identifier: &str,
    user: &User,
    id: Uuid,
    field: EditField,
    raw: &str,
) -> Result<()> {
    let mut patch = TransactionPatch::default();
    match field {
        EditField::Amount => match extract_amount(raw).filter(|a| is_valid_amount(*a)) {
            Some(amount) => patch.amount = Some(amount),
            None => {
                services
                    .reply(identifier, "❌ Valor inválido. Ex: *150* ou *89,90*.")
                    .await;
                return Ok(());
            }
        },
        EditField::Description => {
            let description = collapse_whitespace(raw);
            if description.is_empty() {
                services.reply(identifier, field.prompt()).await;
                return Ok(());
            }
            patch.description = Some(description);
        }
        EditField::Date => match parse_date_or_iso(raw, services.today()) {
            Some(date) => patch.occurred_on = Some(date),
            None => {
                services
                    .reply(identifier, "❌ Data inválida. Use por exemplo *25/02/2026*.")
                    .await;
                return Ok(());
            }
        },
    }

    let updated = services.store.update_transaction(user.id, id, patch).await?;
    services.sessions.clear(identifier).await?;

    let Some(tx) = updated else {
        services.reply(identifier, "❌ Transação não encontrada.").await;
        return Ok(());
    };

    info!(transaction_id = %tx.id, field = field.as_str(), "Transaction edited");

    let label = match field {
        EditField::Amount => "Valor atualizado",
        EditField::Description => "Descrição atualizada",
        EditField::Date => "Data atualizada",
    };
    let text = format!("✔ {}!\n{}", label, transaction_line(&tx));
    services.reply(identifier, &text).await;
    Ok(())
}

fn payload_id(payload: &Payload) -> Option<Uuid> {
    payload.get_str("id").and_then(|id| Uuid::parse_str(id).ok())
}

pub async fn on_id(services: &Services, turn: &Turn<'_>, user: &User) -> Result<()> {
    let reference = clean_reference(turn.text);
    let found = if reference.is_empty() {
        None
    } else {
        services.store.find_transaction(user.id, &reference).await?
    };

    match found {
        Some(tx) => ask_field(services, turn.identifier, &tx).await,
        None => {
            services.reply(turn.identifier, NOT_FOUND).await;
            Ok(())
        }
    }
}

pub async fn on_field(services: &Services, turn: &Turn<'_>, _user: &User, payload: &Payload) -> Result<()> {
    let Some(id) = payload_id(payload) else {
        return restart(services, turn.identifier, Stage::EditAwaitingField).await;
    };

    match EditField::parse(turn.text) {
        Some(field) => ask_value(services, turn.identifier, id, field).await,
        None => {
            services.reply(turn.identifier, ASK_FIELD).await;
            Ok(())
        }
    }
}

pub async fn on_value(services: &Services, turn: &Turn<'_>, user: &User, payload: &Payload) -> Result<()> {
    let field = payload.get_str("field").and_then(EditField::parse);
    let (Some(id), Some(field)) = (payload_id(payload), field) else {
        return restart(services, turn.identifier, Stage::EditAwaitingValue).await;
    };
    apply(services, turn.identifier, user, id, field, turn.text).await
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::models::{NewTransaction, TransactionKind};
    use crate::store::FinanceStore;
    use rust_decimal::Decimal;

    async fn seed(h: &Harness) -> Transaction {
        h.store
            .create_transaction(NewTransaction {
                user_id: h.user.id,
                kind: TransactionKind::Expense,
                amount: Decimal::from(50),
                description: Some("mercado".into()),
                category_id: None,
                occurred_on: d(2026, 3, 9),
                scheduled_for: None,
                recurring: false,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_id_field_value() {
        let h = Harness::on(d(2026, 3, 10));
        let tx = seed(&h).await;

        start(&h.services, USER, &h.user, None, None, None).await.unwrap();
        let turn = Turn::new(USER, Some(&h.user), "#zzzzzzzz");
        on_id(&h.services, &turn, &h.user).await.unwrap();
        assert_eq!(h.last_reply().await, NOT_FOUND);

        let reference = format!("#{}", tx.short_id());
        let turn = Turn::new(USER, Some(&h.user), &reference);
        on_id(&h.services, &turn, &h.user).await.unwrap();
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::EditAwaitingField));

        let turn = Turn::new(USER, Some(&h.user), "1");
        on_field(&h.services, &turn, &h.user, &ctx.payload).await.unwrap();
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::EditAwaitingValue));

        let turn = Turn::new(USER, Some(&h.user), "abc");
        on_value(&h.services, &turn, &h.user, &ctx.payload).await.unwrap();
        assert!(h.services.sessions.get(USER).await.unwrap().is_some());

        let turn = Turn::new(USER, Some(&h.user), "75,50");
        on_value(&h.services, &turn, &h.user, &ctx.payload).await.unwrap();
        assert!(h.services.sessions.get(USER).await.unwrap().is_none());

        let updated = h.store.find_transaction(h.user.id, &tx.short_id()).await.unwrap().unwrap();
        assert_eq!(updated.amount, Decimal::new(7550, 2));
    }

    #[tokio::test]
    async fn test_complete_request_applies_directly() {
        let h = Harness::on(d(2026, 3, 10));
        let tx = seed(&h).await;
        let value = Value::String("feira".into());

        start(
            &h.services,
            USER,
            &h.user,
            Some(&tx.short_id()),
            Some("descrição"),
            Some(&value),
        )
        .await
        .unwrap();

        let updated = h.store.find_transaction(h.user.id, &tx.short_id()).await.unwrap().unwrap();
        assert_eq!(updated.description.as_deref(), Some("feira"));
        assert!(h.services.sessions.get(USER).await.unwrap().is_none());
    }
}
