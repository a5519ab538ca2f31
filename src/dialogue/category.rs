//! Category creation: name, then income or expense.

use super::{restart, Turn};
use crate::models::{TransactionKind, User};
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::text::{collapse_whitespace, normalize_for_match};
use crate::Result;
use tracing::info;

const ASK_NAME: &str = "📂 Qual o nome da nova categoria?";
const ASK_KIND: &str = "Essa categoria é de:\n1️⃣ Receita\n2️⃣ Despesa";
const MAX_NAME_CHARS: usize = 40;

fn parse_kind(text: &str) -> Option<TransactionKind> {
    match normalize_for_match(text).trim_matches(|c: char| !c.is_alphanumeric()) {
        "1" => Some(TransactionKind::Income),
        "2" => Some(TransactionKind::Expense),
        other => TransactionKind::parse(other),
    }
}

fn clean_name(text: &str) -> Option<String> {
    let name = collapse_whitespace(text.trim_matches(|c: char| c == '"' || c == '*'));
    let len = name.chars().count();
    ((2..=MAX_NAME_CHARS).contains(&len)).then_some(name)
}

/// Open the flow with whatever the extractor already knows.
pub async fn start(
    services: &Services,
    identifier: &str,
    user: &User,
    name: Option<&str>,
    kind: Option<&str>,
) -> Result<()> {
    let Some(name) = name.and_then(clean_name) else {
        services
            .sessions
            .set(identifier, Some(Stage::CategoryAwaitingName), Payload::new())
            .await?;
        services.reply(identifier, ASK_NAME).await;
        return Ok(());
    };

    match kind.and_then(parse_kind) {
        Some(kind) => create(services, identifier, user, &name, kind).await,
        None => ask_kind(services, identifier, user, name).await,
    }
}

async fn ask_kind(services: &Services, identifier: &str, user: &User, name: String) -> Result<()> {
    if let Some(existing) = services.store.find_category_by_name(user.id, &name).await? {
        services.sessions.clear(identifier).await?;
        let text = format!("📂 A categoria *{}* já existe.", existing.name);
        services.reply(identifier, &text).await;
        return Ok(());
    }

    services
        .sessions
        .set(
            identifier,
            Some(Stage::CategoryAwaitingType),
            Payload::new().with("name", name),
        )
        .await?;
    services.reply(identifier, ASK_KIND).await;
    Ok(())
}

async fn create(
    services: &Services,
    identifier: &str,
    user: &User,
    name: &str,
    kind: TransactionKind,
) -> Result<()> {
    services.sessions.clear(identifier).await?;

    if let Some(existing) = services.store.find_category_by_name(user.id, name).await? {
        let text = format!("📂 A categoria *{}* já existe.", existing.name);
        services.reply(identifier, &text).await;
        return Ok(());
    }

    let category = services.store.create_category(user.id, name, kind).await?;
    info!(category_id = %category.id, kind = kind.as_str(), "Category created");

    let text = format!("📂 Categoria *{}* criada como *{}*!", category.name, kind);
    services.reply(identifier, &text).await;
    Ok(())
}

pub async fn on_name(services: &Services, turn: &Turn<'_>, user: &User) -> Result<()> {
    let Some(name) = clean_name(turn.text) else {
        services
            .reply(turn.identifier, "❌ Nome inválido. Use entre 2 e 40 caracteres.")
            .await;
        return Ok(());
    };
    ask_kind(services, turn.identifier, user, name).await
}

pub async fn on_type(services: &Services, turn: &Turn<'_>, user: &User, payload: &Payload) -> Result<()> {
    let Some(name) = payload.get_str("name") else {
        return restart(services, turn.identifier, Stage::CategoryAwaitingType).await;
    };

    let Some(kind) = parse_kind(turn.text) else {
        services
            .reply(turn.identifier, "❌ Responda *1* para Receita ou *2* para Despesa.")
            .await;
        return Ok(());
    };

    create(services, turn.identifier, user, name, kind).await
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::store::FinanceStore;

    #[tokio::test]
    async fn test_name_then_type() {
        let h = Harness::on(d(2026, 3, 10));
        start(&h.services, USER, &h.user, None, None).await.unwrap();
        let turn = Turn::new(USER, Some(&h.user), "Pets");
        on_name(&h.services, &turn, &h.user).await.unwrap();

        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::CategoryAwaitingType));

        let turn = Turn::new(USER, Some(&h.user), "talvez");
        on_type(&h.services, &turn, &h.user, &ctx.payload).await.unwrap();
        assert!(h.services.sessions.get(USER).await.unwrap().is_some());

        let turn = Turn::new(USER, Some(&h.user), "2");
        on_type(&h.services, &turn, &h.user, &ctx.payload).await.unwrap();

        assert!(h.services.sessions.get(USER).await.unwrap().is_none());
        let category = h
            .store
            .find_category_by_name(h.user.id, "pets")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(category.kind, TransactionKind::Expense);
        assert!(h.last_reply().await.contains("criada como *Despesa*"));
    }

    #[tokio::test]
    async fn test_complete_request_skips_questions() {
        let h = Harness::on(d(2026, 3, 10));
        start(&h.services, USER, &h.user, Some("Freelas"), Some("receita"))
            .await
            .unwrap();
        assert!(h.services.sessions.get(USER).await.unwrap().is_none());
        assert_eq!(h.store.list_categories(h.user.id).await.unwrap().len(), 1);
    }
}
