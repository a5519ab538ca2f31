//! One-shot handlers: each reads what it needs, replies once and leaves the
//! session context alone.

use crate::llm::TransactionDraft;
use crate::models::{
    NewTransaction, Transaction, TransactionFilter, TransactionKind, TransactionStatus, User,
};
use crate::services::Services;
use crate::store::resolve_category;
use crate::temporal::{month_bounds, parse_date_or_iso};
use crate::text::{extract_amount, format_brl, format_date};
use crate::validation::is_valid_amount;
use crate::Result;
use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Transactions shown per listing.
pub const TRANSACTION_LIMIT: usize = 30;
/// Reminders shown per listing.
pub const REMINDER_LIMIT: usize = 20;

pub const HELP_TEXT: &str = "📖 *Como posso ajudar*\n\n\
💸 *gastei 50 no mercado*: registra uma despesa\n\
💰 *recebi 3000 de salário*: registra uma receita\n\
🔔 *me lembra de pagar a luz dia 10*: cria um lembrete\n\
🔁 *pagar aluguel todo mês dia 10 1500*: cria uma recorrência\n\
📂 *criar categoria*: nova categoria\n\
📊 *saldo*: resumo financeiro\n\
🗓️ *despesas de março*: despesas do mês\n\
📋 *meus lembretes*: lembretes pendentes\n\
✏️ *editar transação* / 🗑 *excluir transação*\n\
👤 *meu perfil*: seus dados\n\n\
Envie *#reset* para cancelar qualquer operação em andamento.";

fn month_label(month: u32, year: i32) -> String {
    format!("{:02}/{}", month, year)
}

pub(crate) fn transaction_line(tx: &Transaction) -> String {
    format!(
        "• {} - {}: {} `#{}`",
        format_date(tx.occurred_on),
        tx.description.as_deref().unwrap_or("Sem descrição"),
        format_brl(tx.amount),
        tx.short_id()
    )
}

fn kind_icon(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Income => "💰",
        TransactionKind::Expense => "💸",
    }
}

fn kind_plural(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Income => "Receitas",
        TransactionKind::Expense => "Despesas",
    }
}

fn completed_in_month(
    kind: TransactionKind,
    month: u32,
    year: i32,
) -> Option<TransactionFilter> {
    let (from, to) = month_bounds(month, year)?;
    Some(TransactionFilter {
        kind: Some(kind),
        status: Some(TransactionStatus::Completed),
        from: Some(from),
        to: Some(to),
        ..Default::default()
    })
}

//
// ================= Listings and reports =================
//

/// Completed transactions of one kind in a month, newest first.
pub async fn send_transactions_by_month(
    services: &Services,
    to: &str,
    user: &User,
    kind: TransactionKind,
    month: u32,
    year: i32,
) -> Result<()> {
    let label = month_label(month, year);
    let Some(filter) = completed_in_month(kind, month, year) else {
        services.reply(to, "❌ Não entendi o mês.").await;
        return Ok(());
    };

    let transactions = services.store.list_transactions(user.id, &filter).await?;
    if transactions.is_empty() {
        let text = format!(
            "{} Não encontrei {} registradas para {}.",
            kind_icon(kind),
            kind_plural(kind).to_lowercase(),
            label
        );
        services.reply(to, &text).await;
        return Ok(());
    }

    let total: Decimal = transactions.iter().map(|t| t.amount).sum();
    let shown: Vec<String> = transactions
        .iter()
        .take(TRANSACTION_LIMIT)
        .map(transaction_line)
        .collect();

    let mut text = format!(
        "{} *{} de {}*\n\n{}\n\n💰 *Total do mês:* {}",
        kind_icon(kind),
        kind_plural(kind),
        label,
        shown.join("\n"),
        format_brl(total)
    );
    if transactions.len() > TRANSACTION_LIMIT {
        text.push_str(&format!("\n\n_(mostrando as {} mais recentes)_", TRANSACTION_LIMIT));
    }

    services.reply(to, &text).await;
    Ok(())
}

/// Expenses of one named category in a month.
pub async fn send_category_expenses(
    services: &Services,
    to: &str,
    user: &User,
    category_name: &str,
    month: u32,
    year: i32,
) -> Result<()> {
    let label = month_label(month, year);
    let Some(category) = services
        .store
        .find_category_by_name(user.id, category_name)
        .await?
    else {
        let text = format!("📂 Não encontrei a categoria *{}*.", category_name);
        services.reply(to, &text).await;
        return Ok(());
    };

    let Some(mut filter) = completed_in_month(TransactionKind::Expense, month, year) else {
        services.reply(to, "❌ Não entendi o mês.").await;
        return Ok(());
    };
    filter.category_id = Some(category.id);

    let transactions = services.store.list_transactions(user.id, &filter).await?;
    if transactions.is_empty() {
        let text = format!(
            "📂 Não encontrei despesas na categoria *{}* para {}.",
            category.name, label
        );
        services.reply(to, &text).await;
        return Ok(());
    }

    let total: Decimal = transactions.iter().map(|t| t.amount).sum();
    let lines: Vec<String> = transactions
        .iter()
        .take(TRANSACTION_LIMIT)
        .map(transaction_line)
        .collect();

    let text = format!(
        "📂 *Gastos na categoria {} em {}*\n\n{}\n\n💰 *Total nessa categoria:* {}",
        category.name,
        label,
        lines.join("\n"),
        format_brl(total)
    );
    services.reply(to, &text).await;
    Ok(())
}

/// Month expenses grouped by category, biggest first.
pub async fn send_expenses_by_category(
    services: &Services,
    to: &str,
    user: &User,
    month: u32,
    year: i32,
) -> Result<()> {
    let label = month_label(month, year);
    let Some(filter) = completed_in_month(TransactionKind::Expense, month, year) else {
        services.reply(to, "❌ Não entendi o mês.").await;
        return Ok(());
    };

    let transactions = services.store.list_transactions(user.id, &filter).await?;
    if transactions.is_empty() {
        let text = format!("📂 Nenhuma despesa registrada em {}.", label);
        services.reply(to, &text).await;
        return Ok(());
    }

    let mut totals: HashMap<Option<Uuid>, Decimal> = HashMap::new();
    for tx in &transactions {
        *totals.entry(tx.category_id).or_default() += tx.amount;
    }

    let mut rows = Vec::with_capacity(totals.len());
    for (category_id, total) in totals {
        let name = match category_id {
            Some(id) => services
                .store
                .get_category(id)
                .await?
                .map(|c| c.name)
                .unwrap_or_else(|| "Sem categoria".to_string()),
            None => "Sem categoria".to_string(),
        };
        rows.push((name, total));
    }
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let grand_total: Decimal = rows.iter().map(|(_, t)| *t).sum();
    let lines: Vec<String> = rows
        .iter()
        .map(|(name, total)| format!("• {}: {}", name, format_brl(*total)))
        .collect();

    let text = format!(
        "📂 *Gastos por categoria em {}*\n\n{}\n\n💸 *Total:* {}",
        label,
        lines.join("\n"),
        format_brl(grand_total)
    );
    services.reply(to, &text).await;
    Ok(())
}

/// Latest transactions of one kind, any date.
pub async fn send_recent_transactions(
    services: &Services,
    to: &str,
    user: &User,
    kind: TransactionKind,
) -> Result<()> {
    let filter = TransactionFilter {
        kind: Some(kind),
        ..Default::default()
    };
    let transactions = services.store.list_transactions(user.id, &filter).await?;

    if transactions.is_empty() {
        let text = format!(
            "{} Você ainda não tem {} registradas.",
            kind_icon(kind),
            kind_plural(kind).to_lowercase()
        );
        services.reply(to, &text).await;
        return Ok(());
    }

    let shown: Vec<&Transaction> = transactions.iter().take(TRANSACTION_LIMIT).collect();
    let total: Decimal = shown.iter().map(|t| t.amount).sum();
    let lines: Vec<String> = shown.iter().map(|t| transaction_line(t)).collect();

    let text = format!(
        "{} *Suas últimas {}*\n\n{}\n\n💰 *Total listado:* {}",
        kind_icon(kind),
        kind_plural(kind).to_lowercase(),
        lines.join("\n"),
        format_brl(total)
    );
    services.reply(to, &text).await;
    Ok(())
}

pub async fn send_pending_reminders(services: &Services, to: &str, user: &User) -> Result<()> {
    let reminders = services.store.list_pending_reminders(user.id).await?;
    if reminders.is_empty() {
        services.reply(to, "⚠️ Você não tem lembretes futuros.").await;
        return Ok(());
    }

    let lines: Vec<String> = reminders
        .iter()
        .take(REMINDER_LIMIT)
        .enumerate()
        .map(|(idx, r)| {
            let amount = r
                .amount
                .map(|a| format!(" ({})", format_brl(a)))
                .unwrap_or_default();
            format!("{}) {} - {}{}", idx + 1, format_date(r.target_date), r.message, amount)
        })
        .collect();

    let text = format!("📋 *Seus lembretes futuros*\n\n{}", lines.join("\n"));
    services.reply(to, &text).await;
    Ok(())
}

/// All-time completed totals.
pub async fn send_balance(services: &Services, to: &str, user: &User) -> Result<()> {
    let filter = TransactionFilter {
        status: Some(TransactionStatus::Completed),
        ..Default::default()
    };
    let income = services
        .store
        .sum_by_kind(user.id, TransactionKind::Income, &filter)
        .await?;
    let expenses = services
        .store
        .sum_by_kind(user.id, TransactionKind::Expense, &filter)
        .await?;

    let text = format!(
        "📊 *RELATÓRIO FINANCEIRO*\n\n\
         💰 Receitas: {}\n\
         💸 Despesas: {}\n\
         📍 Saldo: {}\n\n\
         🧾 Continue registrando para acompanhar sua saúde financeira!",
        format_brl(income),
        format_brl(expenses),
        format_brl(income - expenses)
    );
    services.reply(to, &text).await;
    Ok(())
}

pub async fn send_profile(services: &Services, to: &str, user: &User) -> Result<()> {
    let text = format!(
        "👤 *Seu perfil*\n\n\
         🧑 Nome: {}\n\
         🪪 CPF/CNPJ: {}\n\
         🕓 Criado em: {}",
        user.name,
        user.tax_id,
        format_date(user.created_at.date_naive())
    );
    services.reply(to, &text).await;
    Ok(())
}

pub async fn send_help(services: &Services, to: &str) -> Result<()> {
    services.reply(to, HELP_TEXT).await;
    Ok(())
}

//
// ================= Transaction registration =================
//

#[derive(Debug, Clone)]
pub enum Registration {
    Recorded(Transaction),
    /// Wants scheduling but no date could be read; the caller asks for one.
    NeedsDate { amount: Decimal },
    InvalidAmount,
}

/// Record an income or expense from an extracted draft.
///
/// The amount falls back to the one written in `original_text`. A future
/// scheduled date makes the transaction pending.
pub async fn register_transaction(
    services: &Services,
    to: &str,
    user: &User,
    kind: TransactionKind,
    draft: &TransactionDraft,
    original_text: &str,
) -> Result<Registration> {
    let amount = draft.amount.or_else(|| extract_amount(original_text));
    let Some(amount) = amount.filter(|a| is_valid_amount(*a)) else {
        services
            .reply(
                to,
                "❌ Valor inválido. Digite algo como 25, 100, 350,90...\nExemplo: *gastei 300 no mercado*",
            )
            .await;
        return Ok(Registration::InvalidAmount);
    };

    let today = services.today();
    let wants_schedule = draft.schedule.unwrap_or(false) || draft.scheduled_date.is_some();
    let scheduled = draft
        .scheduled_date
        .as_deref()
        .and_then(|raw| parse_date_or_iso(raw, today));

    if wants_schedule && scheduled.is_none() {
        return Ok(Registration::NeedsDate { amount });
    }

    let category_id =
        resolve_category(services.store.as_ref(), user.id, draft.category.as_deref(), kind).await?;
    let future = scheduled.filter(|d| *d > today);

    let tx = services
        .store
        .create_transaction(NewTransaction {
            user_id: user.id,
            kind,
            amount,
            description: draft.description.clone().filter(|d| !d.trim().is_empty()),
            category_id: Some(category_id),
            occurred_on: scheduled.unwrap_or(today),
            scheduled_for: future,
            recurring: false,
        })
        .await?;

    info!(kind = kind.as_str(), scheduled = future.is_some(), "Transaction recorded");

    let text = match future {
        Some(date) => format!(
            "📅 *{} agendada!*\n{} Valor: {}\n🔔 Data: *{}*\n🆔 `#{}`",
            kind,
            kind_icon(kind),
            format_brl(amount),
            format_date(date),
            tx.short_id()
        ),
        None => {
            let description = tx
                .description
                .as_deref()
                .map(|d| format!("\n📝 {}", d))
                .unwrap_or_default();
            format!(
                "{} *{} registrada!*\nValor: {}{}\n🆔 `#{}`",
                kind_icon(kind),
                kind,
                format_brl(amount),
                description,
                tx.short_id()
            )
        }
    };
    services.reply(to, &text).await;

    Ok(Registration::Recorded(tx))
}

/// Current month and year as seen by the clock.
pub fn current_month(services: &Services) -> (u32, i32) {
    let today = services.today();
    (today.month(), today.year())
}
