//! Transaction deletion with explicit confirmation.

use super::edit::clean_reference;
use super::{restart, Turn};
use crate::handlers::transaction_line;
use crate::models::{Transaction, User};
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::text::{is_no, is_yes};
use crate::Result;
use tracing::info;
use uuid::Uuid;

const ASK_ID: &str = "🗑 Envie o ID da transação que deseja excluir (ex: *#a1b2c3d4*).";
const NOT_FOUND: &str = "❌ Transação não encontrada. Confira o ID e envie novamente.";
const ASK_YES_NO: &str = "Responda *sim* ou *não*.";

pub async fn start(services: &Services, identifier: &str, user: &User, reference: Option<&str>) -> Result<()> {
    let tx = match reference.map(clean_reference).filter(|r| !r.is_empty()) {
        Some(reference) => services.store.find_transaction(user.id, &reference).await?,
        None => None,
    };

    match tx {
        Some(tx) => ask_confirmation(services, identifier, &tx).await,
        None => {
            services
                .sessions
                .set(identifier, Some(Stage::DeleteAwaitingId), Payload::new())
                .await?;
            let prompt = if reference.is_some() { NOT_FOUND } else { ASK_ID };
            services.reply(identifier, prompt).await;
            Ok(())
        }
    }
}

async fn ask_confirmation(services: &Services, identifier: &str, tx: &Transaction) -> Result<()> {
    services
        .sessions
        .set(
            identifier,
            Some(Stage::DeleteAwaitingConfirmation),
            Payload::new().with("id", tx.id.to_string()),
        )
        .await?;
    let text = format!(
        "⚠ Tem certeza que deseja excluir?\n{}\n\n{}",
        transaction_line(tx),
        ASK_YES_NO
    );
    services.reply(identifier, &text).await;
    Ok(())
}

pub async fn on_id(services: &Services, turn: &Turn<'_>, user: &User) -> Result<()> {
    let reference = clean_reference(turn.text);
    let found = if reference.is_empty() {
        None
    } else {
        services.store.find_transaction(user.id, &reference).await?
    };

    match found {
        Some(tx) => ask_confirmation(services, turn.identifier, &tx).await,
        None => {
            services.reply(turn.identifier, NOT_FOUND).await;
            Ok(())
        }
    }
}

pub async fn on_confirmation(
    services: &Services,
    turn: &Turn<'_>,
    user: &User,
    payload: &Payload,
) -> Result<()> {
    let Some(id) = payload.get_str("id").and_then(|id| Uuid::parse_str(id).ok()) else {
        return restart(services, turn.identifier, Stage::DeleteAwaitingConfirmation).await;
    };

    if is_no(turn.text) {
        services.sessions.clear(turn.identifier).await?;
        services.reply(turn.identifier, "Operação cancelada.").await;
        return Ok(());
    }
    if !is_yes(turn.text) {
        services.reply(turn.identifier, ASK_YES_NO).await;
        return Ok(());
    }

    let deleted = services.store.delete_transaction(user.id, id).await?;
    services.sessions.clear(turn.identifier).await?;

    if deleted {
        info!(transaction_id = %id, "Transaction deleted");
        services
            .reply(turn.identifier, "🗑 Transação excluída com sucesso!")
            .await;
    } else {
        services
            .reply(turn.identifier, "❌ Essa transação não existe mais.")
            .await;
    }
    Ok(())
}
