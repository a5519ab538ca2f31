//! Core data models for the finance assistant

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    /// Lenient parse of pt-BR and English labels.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "income" | "receita" | "entrada" | "receitas" | "entradas" => {
                Some(TransactionKind::Income)
            }
            "expense" | "despesa" | "gasto" | "despesas" | "gastos" | "saida" | "saída" => {
                Some(TransactionKind::Expense)
            }
            _ => None,
        }
    }

    /// Name of the fallback category used when none is supplied.
    pub fn default_category(&self) -> &'static str {
        match self {
            TransactionKind::Income => "Outras receitas",
            TransactionKind::Expense => "Outras despesas",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Annual => "annual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" | "diaria" | "diária" | "diario" | "diário" => Some(Frequency::Daily),
            "weekly" | "semanal" => Some(Frequency::Weekly),
            "monthly" | "mensal" => Some(Frequency::Monthly),
            "annual" | "yearly" | "anual" => Some(Frequency::Annual),
            _ => None,
        }
    }
}

/// How a monthly recurrence picks its day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum MonthlyRule {
    DayOfMonth(u32),
    BusinessDay(u32),
}

//
// ================= User =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Channel address the user writes from.
    pub identifier: String,
    pub name: String,
    pub tax_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub identifier: String,
    pub name: String,
    pub tax_id: String,
}

//
// ================= Transaction =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub occurred_on: NaiveDate,
    pub scheduled_for: Option<NaiveDate>,
    pub status: TransactionStatus,
    pub recurring: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Short id shown to users in listings.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub occurred_on: NaiveDate,
    pub scheduled_for: Option<NaiveDate>,
    pub recurring: bool,
}

impl NewTransaction {
    /// Scheduled transactions stay pending until promoted by the scheduler.
    pub fn status(&self) -> TransactionStatus {
        if self.scheduled_for.is_some() {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Completed
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub category_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

//
// ================= Category =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

//
// ================= Reminder =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub target_date: NaiveDate,
    pub amount: Option<Decimal>,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: Uuid,
    pub message: String,
    pub target_date: NaiveDate,
    pub amount: Option<Decimal>,
}

//
// ================= Recurrence =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub frequency: Frequency,
    pub monthly_rule: Option<MonthlyRule>,
    pub next_charge: NaiveDate,
    pub interval: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecurrence {
    pub user_id: Uuid,
    pub transaction_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub frequency: Frequency,
    pub monthly_rule: Option<MonthlyRule>,
    pub next_charge: NaiveDate,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Income => "Receita",
            TransactionKind::Expense => "Despesa",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "DIÁRIA",
            Frequency::Weekly => "SEMANAL",
            Frequency::Monthly => "MENSAL",
            Frequency::Annual => "ANUAL",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for MonthlyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthlyRule::DayOfMonth(day) => write!(f, "dia {}", day),
            MonthlyRule::BusinessDay(n) => write!(f, "{}º dia útil", n),
        }
    }
}
