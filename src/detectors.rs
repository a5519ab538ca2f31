//! Fast-path detectors
//!
//! Deterministic predicate/action pairs for the most common queries. The
//! chain is ordered from the most specific to the most generic detector and
//! the first match wins, so a message is never answered twice. Detectors
//! only read the finance store and reply; they never touch the session.

use crate::handlers;
use crate::models::{TransactionKind, User};
use crate::services::Services;
use crate::temporal::{extract_month_year, normalize_month};
use crate::text::{extract_amount, normalize_for_match};
use crate::Result;
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

lazy_static! {
    static ref EXPENSE_WORD: Regex = Regex::new(r"\b(?:despesas?|gastos?)\b").unwrap();
    static ref EXPENSE_LISTING: Regex = Regex::new(r"\b(?:despesas|gastos)\b").unwrap();
    static ref INCOME_WORD: Regex = Regex::new(r"\b(?:receitas?|entradas?|ganhos)\b").unwrap();
    static ref INCOME_LISTING: Regex = Regex::new(r"\b(?:receitas|entradas)\b").unwrap();
    static ref BY_CATEGORY: Regex = Regex::new(r"\bpor\s+categorias?\b").unwrap();
    static ref CATEGORY_WORD: Regex = Regex::new(r"\bcategoria\s+(.+)$").unwrap();
    static ref REMINDER_NOUN: Regex = Regex::new(r"\blembretes?\b").unwrap();
    static ref LISTING_MARKER: Regex =
        Regex::new(r"\b(?:meus|minhas|listar|lista|mostrar|mostra|quais|ver|exibir)\b").unwrap();
    static ref BALANCE_WORD: Regex = Regex::new(r"\b(?:saldo|extrato|resumo)\b").unwrap();
    static ref PROFILE_WORD: Regex = Regex::new(r"\b(?:meu perfil|meus dados)\b").unwrap();
    static ref HELP_MESSAGE: Regex =
        Regex::new(r"^/?(?:ajuda|help|menu|comandos|o que voce faz)\s*\??$").unwrap();
}

/// Words that end a category name: connectors and month phrasing.
const CATEGORY_STOPWORDS: &[&str] = &[
    "de", "do", "da", "em", "no", "na", "neste", "nesse", "deste", "desse", "este", "esse",
    "mes", "passado", "que", "vem", "proximo", "atual", "ultimo",
];

/// One inbound message as seen by the detectors.
#[derive(Debug, Clone)]
pub struct DetectorInput {
    pub identifier: String,
    pub user: User,
    pub text: String,
    /// `text` lowercased without accents.
    pub normalized: String,
    pub today: NaiveDate,
}

impl DetectorInput {
    pub fn new(identifier: &str, user: User, text: &str, today: NaiveDate) -> Self {
        Self {
            identifier: identifier.to_string(),
            user,
            text: text.to_string(),
            normalized: normalize_for_match(text),
            today,
        }
    }

    fn has_amount(&self) -> bool {
        extract_amount(&self.text).is_some()
    }

    fn month_year(&self) -> Option<(u32, i32)> {
        extract_month_year(&self.text, self.today)
    }

    fn month_or_current(&self) -> (u32, i32) {
        self.month_year()
            .unwrap_or((self.today.month(), self.today.year()))
    }
}

#[async_trait::async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pure predicate over the message.
    fn matches(&self, input: &DetectorInput) -> bool;

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()>;
}

/// Category name written after "categoria", up to the month phrase.
fn category_name(normalized: &str) -> Option<String> {
    let caps = CATEGORY_WORD.captures(normalized)?;
    let tail = caps.get(1)?.as_str();

    let words: Vec<&str> = tail
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .take_while(|w| {
            !w.is_empty()
                && !CATEGORY_STOPWORDS.contains(w)
                && !w.chars().any(|c| c.is_ascii_digit())
                && normalize_month(w).is_none()
        })
        .collect();

    (!words.is_empty()).then(|| words.join(" "))
}

//
// ================= Detectors =================
//

pub struct CategoryExpensesByMonth;

#[async_trait::async_trait]
impl Detector for CategoryExpensesByMonth {
    fn name(&self) -> &'static str {
        "category_expenses_by_month"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        !input.has_amount()
            && EXPENSE_WORD.is_match(&input.normalized)
            && category_name(&input.normalized).is_some()
            && input.month_year().is_some()
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        let name = category_name(&input.normalized).unwrap_or_default();
        let (month, year) = input.month_or_current();
        handlers::send_category_expenses(services, &input.identifier, &input.user, &name, month, year)
            .await
    }
}

pub struct ExpensesByMonth;

#[async_trait::async_trait]
impl Detector for ExpensesByMonth {
    fn name(&self) -> &'static str {
        "expenses_by_month"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        !input.has_amount()
            && EXPENSE_WORD.is_match(&input.normalized)
            && !BY_CATEGORY.is_match(&input.normalized)
            && input.month_year().is_some()
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        let (month, year) = input.month_or_current();
        handlers::send_transactions_by_month(
            services,
            &input.identifier,
            &input.user,
            TransactionKind::Expense,
            month,
            year,
        )
        .await
    }
}

pub struct IncomesByMonth;

#[async_trait::async_trait]
impl Detector for IncomesByMonth {
    fn name(&self) -> &'static str {
        "incomes_by_month"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        !input.has_amount()
            && INCOME_WORD.is_match(&input.normalized)
            && input.month_year().is_some()
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        let (month, year) = input.month_or_current();
        handlers::send_transactions_by_month(
            services,
            &input.identifier,
            &input.user,
            TransactionKind::Income,
            month,
            year,
        )
        .await
    }
}

pub struct ExpensesByCategory;

#[async_trait::async_trait]
impl Detector for ExpensesByCategory {
    fn name(&self) -> &'static str {
        "expenses_by_category"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        !input.has_amount()
            && EXPENSE_WORD.is_match(&input.normalized)
            && BY_CATEGORY.is_match(&input.normalized)
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        let (month, year) = input.month_or_current();
        handlers::send_expenses_by_category(services, &input.identifier, &input.user, month, year)
            .await
    }
}

pub struct ListExpenses;

#[async_trait::async_trait]
impl Detector for ListExpenses {
    fn name(&self) -> &'static str {
        "list_expenses"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        !input.has_amount() && EXPENSE_LISTING.is_match(&input.normalized)
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        handlers::send_recent_transactions(
            services,
            &input.identifier,
            &input.user,
            TransactionKind::Expense,
        )
        .await
    }
}

pub struct ListIncomes;

#[async_trait::async_trait]
impl Detector for ListIncomes {
    fn name(&self) -> &'static str {
        "list_incomes"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        !input.has_amount() && INCOME_LISTING.is_match(&input.normalized)
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        handlers::send_recent_transactions(
            services,
            &input.identifier,
            &input.user,
            TransactionKind::Income,
        )
        .await
    }
}

pub struct ListReminders;

#[async_trait::async_trait]
impl Detector for ListReminders {
    fn name(&self) -> &'static str {
        "list_reminders"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        REMINDER_NOUN.is_match(&input.normalized) && LISTING_MARKER.is_match(&input.normalized)
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        handlers::send_pending_reminders(services, &input.identifier, &input.user).await
    }
}

pub struct Balance;

#[async_trait::async_trait]
impl Detector for Balance {
    fn name(&self) -> &'static str {
        "balance"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        !input.has_amount() && BALANCE_WORD.is_match(&input.normalized)
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        handlers::send_balance(services, &input.identifier, &input.user).await
    }
}

pub struct Profile;

#[async_trait::async_trait]
impl Detector for Profile {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        PROFILE_WORD.is_match(&input.normalized)
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        handlers::send_profile(services, &input.identifier, &input.user).await
    }
}

pub struct Help;

#[async_trait::async_trait]
impl Detector for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn matches(&self, input: &DetectorInput) -> bool {
        HELP_MESSAGE.is_match(&input.normalized)
    }

    async fn execute(&self, input: &DetectorInput, services: &Services) -> Result<()> {
        handlers::send_help(services, &input.identifier).await
    }
}

//
// ================= Chain =================
//

/// Ordered detector list. First match wins.
pub struct DetectorChain {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorChain {
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// Name of the detector that matched, if any.
    pub fn first_match(&self, input: &DetectorInput) -> Option<&'static str> {
        self.detectors
            .iter()
            .find(|d| d.matches(input))
            .map(|d| d.name())
    }

    /// Execute the first matching detector and return its name.
    pub async fn run(&self, input: &DetectorInput, services: &Services) -> Result<Option<&'static str>> {
        let Some(detector) = self.detectors.iter().find(|d| d.matches(input)) else {
            return Ok(None);
        };

        debug!(detector = detector.name(), "Fast-path detector matched");
        detector.execute(input, services).await?;
        Ok(Some(detector.name()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }
}

impl Default for DetectorChain {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(CategoryExpensesByMonth),
            Arc::new(ExpensesByMonth),
            Arc::new(IncomesByMonth),
            Arc::new(ExpensesByCategory),
            Arc::new(ListExpenses),
            Arc::new(ListIncomes),
            Arc::new(ListReminders),
            Arc::new(Balance),
            Arc::new(Profile),
            Arc::new(Help),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::identity::stable_user_id;
    use crate::messenger::RecordingMessenger;
    use crate::session::InMemorySessionStore;
    use crate::store::InMemoryFinanceStore;
    use chrono::Utc;

    const USER: &str = "5511988887777@c.us";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()
    }

    fn input(text: &str) -> DetectorInput {
        let user = User {
            id: stable_user_id(USER),
            identifier: USER.to_string(),
            name: "Ana Souza".to_string(),
            tax_id: "52998224725".to_string(),
            created_at: Utc::now(),
        };
        DetectorInput::new(USER, user, text, today())
    }

    fn services() -> (Services, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::new());
        let services = Services::new(
            Arc::new(InMemoryFinanceStore::new()),
            Arc::new(InMemorySessionStore::new()),
            messenger.clone(),
            Arc::new(FixedClock::on(today())),
        );
        (services, messenger)
    }

    #[test]
    fn test_category_name_stops_at_month_phrase() {
        assert_eq!(
            category_name("gastos na categoria mercado em marco"),
            Some("mercado".to_string())
        );
        assert_eq!(
            category_name("despesas da categoria casa e lazer do mes passado"),
            Some("casa e lazer".to_string())
        );
        assert_eq!(category_name("despesas por categoria em marco"), None);
    }

    #[test]
    fn test_predicates() {
        let chain = DetectorChain::default();
        assert_eq!(chain.first_match(&input("despesas de março")), Some("expenses_by_month"));
        assert_eq!(chain.first_match(&input("despesas de março 2026")), Some("expenses_by_month"));
        assert_eq!(chain.first_match(&input("receitas do mês passado")), Some("incomes_by_month"));
        assert_eq!(
            chain.first_match(&input("gastos por categoria este mês")),
            Some("expenses_by_category")
        );
        assert_eq!(chain.first_match(&input("meus gastos")), Some("list_expenses"));
        assert_eq!(chain.first_match(&input("minhas receitas")), Some("list_incomes"));
        assert_eq!(chain.first_match(&input("meus lembretes")), Some("list_reminders"));
        assert_eq!(chain.first_match(&input("qual meu saldo?")), Some("balance"));
        assert_eq!(chain.first_match(&input("meu perfil")), Some("profile"));
        assert_eq!(chain.first_match(&input("ajuda")), Some("help"));
    }

    #[test]
    fn test_amounts_bypass_listing_detectors() {
        let chain = DetectorChain::default();
        assert_eq!(chain.first_match(&input("gastei 50 de despesas no mercado")), None);
        assert_eq!(chain.first_match(&input("oi, tudo bem?")), None);
    }

    #[tokio::test]
    async fn test_only_first_matching_detector_runs() {
        let chain = DetectorChain::default();
        let message = input("gastos na categoria mercado em março");
        assert!(ListExpenses.matches(&message));
        assert!(ExpensesByMonth.matches(&message));

        let (services, messenger) = services();
        let executed = chain.run(&message, &services).await.unwrap();

        assert_eq!(executed, Some("category_expenses_by_month"));
        let sent = messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Não encontrei a categoria *mercado*"));
    }

    #[tokio::test]
    async fn test_no_match_sends_nothing() {
        let chain = DetectorChain::default();
        let (services, messenger) = services();
        let executed = chain.run(&input("bom dia"), &services).await.unwrap();
        assert_eq!(executed, None);
        assert!(messenger.sent().await.is_empty());
    }
}
