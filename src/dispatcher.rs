//! Action dispatcher
//!
//! Runs extracted actions in order. One-shot actions reply and let the loop
//! continue; an action that opens a dialogue flow owns the next turn, so the
//! loop stops right after it. When nothing ran, the model writes a free-form
//! answer instead.

use crate::dialogue::reminder::ReminderStart;
use crate::dialogue::{category, delete, edit, recurrence, reminder, scheduling};
use crate::handlers::{self, Registration};
use crate::identity::log_tag;
use crate::llm::{Action, IntentModel, TransactionDraft};
use crate::models::{TransactionKind, User};
use crate::services::Services;
use crate::temporal::extract_month_year;
use crate::Result;
use tracing::{debug, info};

/// What happened to one batch of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Names of the actions that ran, in order.
    pub executed: Vec<&'static str>,
    /// Action that opened a flow and stopped the loop.
    pub opened_flow: Option<&'static str>,
    /// The free-form reply was used.
    pub fallback: bool,
}

enum Step {
    Continue,
    Stop,
    Skipped,
}

pub struct Dispatcher<'a> {
    services: &'a Services,
    model: &'a dyn IntentModel,
}

impl<'a> Dispatcher<'a> {
    pub fn new(services: &'a Services, model: &'a dyn IntentModel) -> Self {
        Self { services, model }
    }

    pub async fn dispatch(
        &self,
        identifier: &str,
        user: &User,
        text: &str,
        actions: &[Action],
    ) -> Result<DispatchOutcome> {
        let mut outcome = DispatchOutcome::default();

        for action in actions {
            match self.execute(identifier, user, text, action).await? {
                Step::Continue => outcome.executed.push(action.name()),
                Step::Stop => {
                    outcome.executed.push(action.name());
                    outcome.opened_flow = Some(action.name());
                    break;
                }
                Step::Skipped => debug!(action = action.name(), "Action skipped"),
            }
        }

        if outcome.executed.is_empty() {
            let answer = self.model.reply(text).await?;
            self.services.reply(identifier, &answer).await;
            outcome.fallback = true;
        }

        info!(
            user = %log_tag(identifier),
            executed = ?outcome.executed,
            opened_flow = ?outcome.opened_flow,
            fallback = outcome.fallback,
            "Actions dispatched"
        );
        Ok(outcome)
    }

    async fn register(
        &self,
        identifier: &str,
        user: &User,
        kind: TransactionKind,
        draft: &TransactionDraft,
        text: &str,
    ) -> Result<Step> {
        let registration =
            handlers::register_transaction(self.services, identifier, user, kind, draft, text).await?;
        match registration {
            Registration::Recorded(_) | Registration::InvalidAmount => Ok(Step::Continue),
            Registration::NeedsDate { amount } => {
                scheduling::start(self.services, identifier, kind, amount, draft).await?;
                Ok(Step::Stop)
            }
        }
    }

    async fn execute(&self, identifier: &str, user: &User, text: &str, action: &Action) -> Result<Step> {
        let services = self.services;
        let (month, year) = extract_month_year(text, services.today())
            .unwrap_or_else(|| handlers::current_month(services));

        match action {
            Action::RegisterExpense(draft) => {
                self.register(identifier, user, TransactionKind::Expense, draft, text)
                    .await
            }
            Action::RegisterIncome(draft) => {
                self.register(identifier, user, TransactionKind::Income, draft, text)
                    .await
            }
            Action::CreateCategory { name, kind } => {
                category::start(services, identifier, user, name.as_deref(), kind.as_deref()).await?;
                Ok(Step::Stop)
            }
            Action::CreateReminder(request) => {
                reminder::start(services, identifier, user, ReminderStart::from_request(request, text))
                    .await?;
                Ok(Step::Stop)
            }
            Action::CreateRecurrence(request) => {
                recurrence::start_from_request(services, identifier, request, text).await?;
                Ok(Step::Stop)
            }
            Action::EditTransaction {
                id,
                field,
                new_value,
            } => {
                edit::start(
                    services,
                    identifier,
                    user,
                    id.as_deref(),
                    field.as_deref(),
                    new_value.as_ref(),
                )
                .await?;
                Ok(Step::Stop)
            }
            Action::DeleteTransaction { id } => {
                delete::start(services, identifier, user, id.as_deref()).await?;
                Ok(Step::Stop)
            }
            Action::ViewBalance => {
                handlers::send_balance(services, identifier, user).await?;
                Ok(Step::Continue)
            }
            Action::ViewProfile => {
                handlers::send_profile(services, identifier, user).await?;
                Ok(Step::Continue)
            }
            Action::ViewExpensesByCategory => {
                handlers::send_expenses_by_category(services, identifier, user, month, year).await?;
                Ok(Step::Continue)
            }
            Action::ViewCategoryExpenses { category } => {
                match category.as_deref().filter(|c| !c.trim().is_empty()) {
                    Some(name) => {
                        handlers::send_category_expenses(services, identifier, user, name, month, year)
                            .await?
                    }
                    None => {
                        handlers::send_expenses_by_category(services, identifier, user, month, year)
                            .await?
                    }
                }
                Ok(Step::Continue)
            }
            Action::ViewIncomeDetails => {
                handlers::send_recent_transactions(services, identifier, user, TransactionKind::Income)
                    .await?;
                Ok(Step::Continue)
            }
            Action::ViewExpenseDetails => {
                handlers::send_recent_transactions(services, identifier, user, TransactionKind::Expense)
                    .await?;
                Ok(Step::Continue)
            }
            Action::RegisterUser { .. } => {
                services.reply(identifier, "✅ Você já está cadastrado!").await;
                Ok(Step::Continue)
            }
            Action::Help => {
                handlers::send_help(services, identifier).await?;
                Ok(Step::Continue)
            }
            Action::Unknown => Ok(Step::Skipped),
        }
    }
}
