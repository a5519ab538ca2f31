//! Structured actions returned by the extraction prompts

use crate::text::extract_amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// Domain picked by the cheap classification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Finance,
    Reminder,
    Query,
    Other,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Finance => "finance",
            Domain::Reminder => "reminder",
            Domain::Query => "query",
            Domain::Other => "other",
        }
    }

    fn parse(value: &str) -> Domain {
        match value.trim().to_lowercase().as_str() {
            "finance" | "financeiro" => Domain::Finance,
            "reminder" | "lembrete" => Domain::Reminder,
            "query" | "consulta" => Domain::Query,
            _ => Domain::Other,
        }
    }

    /// Read `{"domain": "..."}` from a raw model answer. Anything unreadable
    /// is `Other`.
    pub fn from_response(raw: &str) -> Domain {
        let Some(value) = first_json_value(&clean_response(raw)) else {
            return Domain::Other;
        };
        value
            .get("domain")
            .or_else(|| value.get("dominio"))
            .and_then(Value::as_str)
            .map(Domain::parse)
            .unwrap_or(Domain::Other)
    }
}

//
// ================= Action payloads =================
//

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionDraft {
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub schedule: Option<bool>,
    pub scheduled_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessDayHint {
    #[serde(deserialize_with = "lenient_u32")]
    pub n: Option<u32>,
    pub next_month: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderRequest {
    pub message: Option<String>,
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: Option<Decimal>,
    /// The user wants to give the amount later.
    pub ask_amount: Option<bool>,
    pub business_day: Option<BusinessDayHint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceRequest {
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    /// "day_of_month" or "business_day"
    pub monthly_rule: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub day_of_month: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub business_day: Option<u32>,
}

/// One resolved intent. Every field is optional; the extractor leaves
/// out what it could not read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    RegisterExpense(TransactionDraft),
    RegisterIncome(TransactionDraft),
    CreateCategory {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        kind: Option<String>,
    },
    CreateReminder(ReminderRequest),
    CreateRecurrence(RecurrenceRequest),
    EditTransaction {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        new_value: Option<Value>,
    },
    DeleteTransaction {
        #[serde(default)]
        id: Option<String>,
    },
    ViewBalance,
    ViewProfile,
    ViewExpensesByCategory,
    ViewCategoryExpenses {
        #[serde(default)]
        category: Option<String>,
    },
    ViewIncomeDetails,
    ViewExpenseDetails,
    RegisterUser {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        tax_id: Option<String>,
    },
    Help,
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::RegisterExpense(_) => "register_expense",
            Action::RegisterIncome(_) => "register_income",
            Action::CreateCategory { .. } => "create_category",
            Action::CreateReminder(_) => "create_reminder",
            Action::CreateRecurrence(_) => "create_recurrence",
            Action::EditTransaction { .. } => "edit_transaction",
            Action::DeleteTransaction { .. } => "delete_transaction",
            Action::ViewBalance => "view_balance",
            Action::ViewProfile => "view_profile",
            Action::ViewExpensesByCategory => "view_expenses_by_category",
            Action::ViewCategoryExpenses { .. } => "view_category_expenses",
            Action::ViewIncomeDetails => "view_income_details",
            Action::ViewExpenseDetails => "view_expense_details",
            Action::RegisterUser { .. } => "register_user",
            Action::Help => "help",
            Action::Unknown => "unknown",
        }
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::from_str(&f.to_string()).ok())),
        Value::String(s) => extract_amount(s),
        _ => None,
    }
}

/// Numbers, numeric strings and "R$ 1.500,00" all read as an amount.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

//
// ================= Response cleaning =================
//

/// Strip code fences and escaped newlines.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    for fence in ["```json", "```JSON", "```Json", "```"] {
        text = text.replace(fence, "");
    }
    text.replace("\\n", "\n").trim().to_string()
}

/// First balanced `{...}` or `[...]` substring, ignoring brackets inside
/// JSON strings.
fn first_balanced(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn first_json_value(text: &str) -> Option<Value> {
    serde_json::from_str(first_balanced(text)?).ok()
}

fn action_from_value(value: Value) -> Action {
    match serde_json::from_value::<Action>(value) {
        Ok(action) => action,
        Err(e) => {
            warn!("Unreadable action from model: {}", e);
            Action::Unknown
        }
    }
}

/// Parse a raw extraction answer into actions. Never fails: anything that
/// cannot be read becomes a single `Unknown`.
pub fn parse_actions(raw: &str) -> Vec<Action> {
    let cleaned = clean_response(raw);
    let Some(value) = first_json_value(&cleaned) else {
        warn!(chars = raw.len(), "Model answer holds no JSON");
        return vec![Action::Unknown];
    };

    let actions: Vec<Action> = match value {
        Value::Array(items) => items.into_iter().map(action_from_value).collect(),
        other => vec![action_from_value(other)],
    };

    if actions.is_empty() {
        vec![Action::Unknown]
    } else {
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fenced_array_with_chatter() {
        let raw = "Claro! ```json\n[{\"action\":\"register_expense\",\"amount\":50,\"description\":\"mercado\"},{\"action\":\"view_balance\"}]\n``` pronto";
        let actions = parse_actions(raw);
        assert_eq!(actions.len(), 2);
        match &actions[0] {
            Action::RegisterExpense(draft) => {
                assert_eq!(draft.amount, Some(Decimal::from(50)));
                assert_eq!(draft.description.as_deref(), Some("mercado"));
                assert_eq!(draft.category, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(actions[1], Action::ViewBalance);
    }

    #[test]
    fn test_single_object_and_lenient_amounts() {
        let actions = parse_actions(r#"{"action":"register_income","amount":"R$ 1.500,00"}"#);
        match &actions[0] {
            Action::RegisterIncome(draft) => assert_eq!(draft.amount, Some(Decimal::from(1500))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_garbage_becomes_unknown() {
        assert_eq!(parse_actions("não sei"), vec![Action::Unknown]);
        assert_eq!(parse_actions("[]"), vec![Action::Unknown]);
        assert_eq!(parse_actions(r#"{"action":"launch_rocket"}"#), vec![Action::Unknown]);
        // ill-typed field
        assert_eq!(
            parse_actions(r#"{"action":"create_category","name":42}"#),
            vec![Action::Unknown]
        );
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_the_scanner() {
        let raw = r#"{"action":"create_reminder","message":"pagar {boleto}","date":null} extra }"#;
        match &parse_actions(raw)[0] {
            Action::CreateReminder(req) => {
                assert_eq!(req.message.as_deref(), Some("pagar {boleto}"));
                assert_eq!(req.date, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reminder_with_business_day_hint() {
        let raw = r#"[{"action":"create_reminder","message":"pagar condomínio","business_day":{"n":"5","next_month":true}}]"#;
        match &parse_actions(raw)[0] {
            Action::CreateReminder(req) => {
                let hint = req.business_day.clone().unwrap();
                assert_eq!(hint.n, Some(5));
                assert_eq!(hint.next_month, Some(true));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_domain_from_response() {
        assert_eq!(Domain::from_response(r#"{"domain":"finance"}"#), Domain::Finance);
        assert_eq!(Domain::from_response("```json\n{\"dominio\":\"lembrete\"}\n```"), Domain::Reminder);
        assert_eq!(Domain::from_response("consulta"), Domain::Other);
    }
}
