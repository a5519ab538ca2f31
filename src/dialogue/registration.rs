//! Sign-up: full name, then CPF/CNPJ.

use super::{restart, Turn};
use crate::models::NewUser;
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::text::collapse_whitespace;
use crate::validation::{is_valid_person_name, is_valid_tax_id, normalize_tax_id};
use crate::Result;
use tracing::info;

const ASK_NAME: &str =
    "👋 Olá! Eu sou seu assistente financeiro.\nPara começar, qual é o seu *nome completo*?";
const ASK_TAX_ID: &str = "🪪 Agora informe seu *CPF ou CNPJ* (somente números).";
const INVALID_NAME: &str = "❌ Não parece um nome completo.\n\
Envie nome e sobrenome, só com letras (ex: *Maria Silva*).";
const INVALID_TAX_ID: &str = "❌ CPF/CNPJ inválido. Tente novamente.";

/// Open the flow, skipping the name question when a valid one is known.
pub async fn start(services: &Services, identifier: &str, name_hint: Option<&str>) -> Result<()> {
    if let Some(name) = name_hint
        .map(collapse_whitespace)
        .filter(|n| is_valid_person_name(n))
    {
        services
            .sessions
            .set(
                identifier,
                Some(Stage::RegistrationAwaitingTaxId),
                Payload::new().with("name", name),
            )
            .await?;
        services.reply(identifier, ASK_TAX_ID).await;
        return Ok(());
    }

    services
        .sessions
        .set(identifier, Some(Stage::RegistrationAwaitingName), Payload::new())
        .await?;
    services.reply(identifier, ASK_NAME).await;
    Ok(())
}

pub async fn on_name(services: &Services, turn: &Turn<'_>) -> Result<()> {
    let name = collapse_whitespace(turn.text);
    if !is_valid_person_name(&name) {
        services.reply(turn.identifier, INVALID_NAME).await;
        return Ok(());
    }

    services
        .sessions
        .set(
            turn.identifier,
            Some(Stage::RegistrationAwaitingTaxId),
            Payload::new().with("name", name),
        )
        .await?;
    services.reply(turn.identifier, ASK_TAX_ID).await;
    Ok(())
}

pub async fn on_tax_id(services: &Services, turn: &Turn<'_>, payload: &Payload) -> Result<()> {
    let Some(name) = payload.get_str("name") else {
        return restart(services, turn.identifier, Stage::RegistrationAwaitingTaxId).await;
    };

    if !is_valid_tax_id(turn.text) {
        services.reply(turn.identifier, INVALID_TAX_ID).await;
        return Ok(());
    }

    if services.store.find_user(turn.identifier).await?.is_some() {
        services.sessions.clear(turn.identifier).await?;
        services.reply(turn.identifier, "✅ Você já está cadastrado!").await;
        return Ok(());
    }

    let tax_id = normalize_tax_id(turn.text);
    let user = services
        .store
        .create_user(NewUser {
            identifier: turn.identifier.to_string(),
            name: name.to_string(),
            tax_id: tax_id.clone(),
        })
        .await?;
    services.sessions.clear(turn.identifier).await?;

    info!(user_id = %user.id, "User registered");

    let text = format!(
        "🎉 Cadastro concluído com sucesso!\n\
         👤 Nome: *{}*\n\
         🪪 CPF/CNPJ: *{}*\n\n\
         Envie *ajuda* para ver o que posso fazer.",
        user.name, tax_id
    );
    services.reply(turn.identifier, &text).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::store::FinanceStore;

    #[tokio::test]
    async fn test_full_registration() {
        let h = Harness::on(d(2026, 3, 10));
        start(&h.services, USER, None).await.unwrap();
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::RegistrationAwaitingName));

        on_name(&h.services, &Turn::new(USER, None, "Maria  Silva")).await.unwrap();
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::RegistrationAwaitingTaxId));
        assert_eq!(ctx.payload.get_str("name"), Some("Maria Silva"));

        on_tax_id(&h.services, &Turn::new(USER, None, "529.982.247-25"), &ctx.payload)
            .await
            .unwrap();

        assert!(h.services.sessions.get(USER).await.unwrap().is_none());
        let user = h.store.find_user(USER).await.unwrap().unwrap();
        assert_eq!(user.name, "Maria Silva");
        assert_eq!(user.tax_id, "52998224725");
        assert!(h.last_reply().await.contains("Cadastro concluído"));
    }

    #[tokio::test]
    async fn test_invalid_answers_keep_stage() {
        let h = Harness::on(d(2026, 3, 10));
        start(&h.services, USER, None).await.unwrap();

        on_name(&h.services, &Turn::new(USER, None, "oi")).await.unwrap();
        assert_eq!(h.last_reply().await, INVALID_NAME);
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::RegistrationAwaitingName));

        let payload = Payload::new().with("name", "Maria Silva");
        h.services
            .sessions
            .set(USER, Some(Stage::RegistrationAwaitingTaxId), payload.clone())
            .await
            .unwrap();
        on_tax_id(&h.services, &Turn::new(USER, None, "111.111.111-11"), &payload)
            .await
            .unwrap();
        assert_eq!(h.last_reply().await, INVALID_TAX_ID);
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::RegistrationAwaitingTaxId));
    }
}
