//! Periodic jobs triggered from outside (cron hitting the HTTP endpoints)
//!
//! Nothing here ticks on its own; each call handles whatever is due at the
//! moment it is made.

use crate::identity::log_tag;
use crate::models::{Reminder, TransactionFilter, TransactionKind, TransactionStatus, User};
use crate::services::Services;
use crate::store::FinanceStore;
use crate::temporal::{month_bounds, month_display_name, shift_month};
use crate::text::format_brl;
use crate::Result;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Counters returned to the trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Renders one user's report for a period. `None` when the period is empty.
#[async_trait::async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, user: &User, month: u32, year: i32) -> Result<Option<String>>;
}

/// Plain-text summary: totals, biggest expense and top categories.
pub struct TextReportGenerator {
    store: Arc<dyn FinanceStore>,
}

impl TextReportGenerator {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    async fn category_name(&self, id: Option<Uuid>) -> Result<String> {
        let name = match id {
            Some(id) => self.store.get_category(id).await?.map(|c| c.name),
            None => None,
        };
        Ok(name.unwrap_or_else(|| "Sem categoria".to_string()))
    }
}

#[async_trait::async_trait]
impl ReportGenerator for TextReportGenerator {
    async fn generate(&self, user: &User, month: u32, year: i32) -> Result<Option<String>> {
        let Some((from, to)) = month_bounds(month, year) else {
            return Ok(None);
        };
        let filter = TransactionFilter {
            status: Some(TransactionStatus::Completed),
            from: Some(from),
            to: Some(to),
            ..Default::default()
        };
        let transactions = self.store.list_transactions(user.id, &filter).await?;
        if transactions.is_empty() {
            return Ok(None);
        }

        let mut income = Decimal::ZERO;
        let mut expenses = Decimal::ZERO;
        let mut by_category: HashMap<Option<Uuid>, Decimal> = HashMap::new();
        for tx in &transactions {
            match tx.kind {
                TransactionKind::Income => income += tx.amount,
                TransactionKind::Expense => {
                    expenses += tx.amount;
                    *by_category.entry(tx.category_id).or_default() += tx.amount;
                }
            }
        }
        let balance = income - expenses;
        let (emoji, sign) = if balance >= Decimal::ZERO {
            ("✅", "positivo")
        } else {
            ("⚠️", "negativo")
        };

        let mut text = format!(
            "📊 *Relatório de {}/{}*\n\n💰 *Receitas:* {}\n💸 *Despesas:* {}\n{} *Saldo:* {} ({})\n",
            month_display_name(month),
            year,
            format_brl(income),
            format_brl(expenses),
            emoji,
            format_brl(balance),
            sign
        );

        let biggest = transactions
            .iter()
            .filter(|tx| tx.kind == TransactionKind::Expense)
            .max_by_key(|tx| tx.amount);
        if let Some(tx) = biggest {
            text.push_str(&format!(
                "\n🔻 *Maior gasto:*\n   {}\n   {} - {}\n",
                tx.description.as_deref().unwrap_or("Sem descrição"),
                format_brl(tx.amount),
                self.category_name(tx.category_id).await?
            ));
        }

        let mut ranked: Vec<(Option<Uuid>, Decimal)> = by_category.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        if !ranked.is_empty() && expenses > Decimal::ZERO {
            text.push_str("\n📂 *Top categorias de despesa:*\n");
            for (i, (id, total)) in ranked.into_iter().take(3).enumerate() {
                let share = (total * Decimal::from(100) / expenses).round_dp(1);
                text.push_str(&format!(
                    "   {}. {}: {} ({}%)\n",
                    i + 1,
                    self.category_name(id).await?,
                    format_brl(total),
                    share.to_string().replace('.', ",")
                ));
            }
        }

        Ok(Some(text.trim_end().to_string()))
    }
}

pub struct Scheduler {
    services: Services,
    reports: Arc<dyn ReportGenerator>,
    send_hour: u32,
}

impl Scheduler {
    pub fn new(services: Services, reports: Arc<dyn ReportGenerator>, send_hour: u32) -> Self {
        Self {
            services,
            reports,
            send_hour,
        }
    }

    /// Send every unsent reminder due on or before `now`'s date. Nothing goes
    /// out before the configured hour; a reminder is marked sent only after
    /// delivery succeeded.
    pub async fn dispatch_due_reminders(&self, now: NaiveDateTime) -> Result<JobReport> {
        let mut report = JobReport::default();
        if now.hour() < self.send_hour {
            info!(hour = now.hour(), send_hour = self.send_hour, "Too early for reminders");
            return Ok(report);
        }

        let due = self.services.store.list_due_reminders(now.date()).await?;
        let users: HashMap<Uuid, User> = self
            .services
            .store
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        for reminder in due {
            let Some(user) = users.get(&reminder.user_id) else {
                warn!(reminder_id = %reminder.id, "Reminder owner not found");
                report.skipped += 1;
                continue;
            };

            match self
                .services
                .messenger
                .send(&user.identifier, &reminder_text(&reminder))
                .await
            {
                Ok(()) => {
                    self.services.store.mark_reminder_sent(reminder.id).await?;
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        user = %log_tag(&user.identifier),
                        reminder_id = %reminder.id,
                        "Failed to deliver reminder: {}", e
                    );
                    report.failed += 1;
                }
            }
        }

        info!(sent = report.sent, failed = report.failed, skipped = report.skipped, "Reminders dispatched");
        Ok(report)
    }

    /// Report for the month before `today`, one message per user.
    pub async fn dispatch_monthly_reports(&self, today: NaiveDate) -> Result<JobReport> {
        let (year, month) = shift_month(today.year(), today.month(), -1);
        let mut report = JobReport::default();

        for user in self.services.store.list_users().await? {
            let text = match self.reports.generate(&user, month, year).await {
                Ok(Some(text)) => text,
                Ok(None) => format!(
                    "📊 *Relatório de {}/{}*\n\nVocê não registrou nenhuma transação neste período.",
                    month_display_name(month),
                    year
                ),
                Err(e) => {
                    warn!(user = %log_tag(&user.identifier), "Failed to build monthly report: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.services.messenger.send(&user.identifier, &text).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(user = %log_tag(&user.identifier), "Failed to deliver monthly report: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(month, year, sent = report.sent, failed = report.failed, "Monthly reports dispatched");
        Ok(report)
    }
}

fn reminder_text(reminder: &Reminder) -> String {
    match reminder.amount {
        Some(amount) => format!("⏰ *Lembrete*\n\n{}\n💰 Valor: {}", reminder.message, format_brl(amount)),
        None => format!("⏰ *Lembrete*\n\n{}", reminder.message),
    }
}
