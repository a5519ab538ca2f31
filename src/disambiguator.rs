//! Keyword gates that route the two most common intents without inference
//!
//! Both run only when no dialogue stage is active. A recurrence needs a
//! frequency marker plus either a transactional trigger word or a
//! business-day ordinal. A reminder needs a reminder marker and no listing
//! marker.

use crate::models::{Frequency, MonthlyRule, TransactionKind};
use crate::temporal::{extract_business_day_rule, strip_temporal_phrases};
use crate::text::{collapse_whitespace, extract_amount, normalize_for_match, strip_amounts};
use crate::validation::is_valid_amount;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

lazy_static! {
    // Patterns below run on accent-free lowercase text.
    static ref DAY_OF_MONTH_MARKER: Regex = Regex::new(r"\btodo\s+dia\s+(\d{1,2})\b").unwrap();
    static ref MONTHLY_MARKER: Regex = Regex::new(
        r"\b(?:todo\s+mes|todos\s+os\s+meses|mensal|mensalmente|sempre\s+no\s+dia|sempre\s+dia|por\s+mes|ao\s+mes)\b"
    )
    .unwrap();
    static ref WEEKLY_MARKER: Regex =
        Regex::new(r"\b(?:toda\s+semana|todas\s+as\s+semanas|semanal|semanalmente|por\s+semana)\b").unwrap();
    static ref ANNUAL_MARKER: Regex =
        Regex::new(r"\b(?:todo\s+ano|todos\s+os\s+anos|anual|anualmente|por\s+ano)\b").unwrap();
    static ref DAILY_MARKER: Regex =
        Regex::new(r"\b(?:todo\s+dia|todos\s+os\s+dias|diariamente|diaria|diario)\b").unwrap();
    static ref EVERY: Regex = Regex::new(r"\btodo\b").unwrap();
    static ref DAY_NUMBER: Regex = Regex::new(r"\bdia\s+(\d{1,2})\b").unwrap();

    static ref TRIGGER_WORD: Regex = Regex::new(
        r"\b(?:pagar|pago|pagamento|paga|receber|recebo|recebimento|recebe|conta|contas|boleto|fatura|salario|aluguel|mensalidade|assinatura|parcela|prestacao|cobranca|condominio|academia|internet|luz|agua|plano)\b"
    )
    .unwrap();
    static ref INCOME_WORD: Regex = Regex::new(
        r"\b(?:receber|recebimento|recebo|recebe|entrada|salario|pix|deposito|bonus|ganhar|ganhei|ganho|cobrar|cobra)\b"
    )
    .unwrap();

    static ref REMINDER_MARKER: Regex = Regex::new(
        r"\b(?:me\s+lembra|me\s+lembre|lembra\s+de|lembre\s+de|lembre-me|lembrar\s+de|me\s+avisa|me\s+avise|nao\s+me\s+deixa\s+esquecer|nao\s+deixa\s+eu\s+esquecer|nao\s+posso\s+esquecer|lembrete)\b"
    )
    .unwrap();
    static ref LISTING_MARKER: Regex =
        Regex::new(r"\b(?:meus|minhas|listar|lista|liste|mostrar|mostra|mostre|quais|exibir)\b").unwrap();
    static ref VALUE_WORD: Regex = Regex::new(r"\bvalor\b").unwrap();

    // Applied to lowercase text that still has its accents.
    static ref GREETING_PREFIX: Regex = Regex::new(
        r"^(?:(?:oi|ol[aá]|opa|e\s+a[ií]|bom\s+dia|boa\s+tarde|boa\s+noite|por\s+favor)[\s,!.]+)+"
    )
    .unwrap();
    static ref FREQUENCY_PHRASE: Regex = Regex::new(
        r"\b(?:todo\s+dia\s+\d{1,2}|tod[oa]s?\s+(?:os\s+|as\s+)?(?:m[eê]s(?:es)?|dias?|semanas?|anos?)|sempre\s+(?:no\s+)?dia\s+\d{1,2}|sempre|mensal(?:mente)?|semanal(?:mente)?|anual(?:mente)?|di[aá]ri[ao]|diariamente|por\s+(?:m[eê]s|semana|ano)|ao\s+m[eê]s|recorrente)\b"
    )
    .unwrap();
    static ref REMINDER_PHRASE: Regex = Regex::new(
        r"\b(?:me\s+lembr[ae](?:\s+de)?|lembr[ae](?:-me)?\s+de|lembrar\s+de|me\s+avis[ae](?:\s+de|\s+para|\s+pra)?|n[aã]o\s+me\s+deixa\s+esquecer(?:\s+de)?|n[aã]o\s+deixa\s+eu\s+esquecer(?:\s+de)?|n[aã]o\s+posso\s+esquecer(?:\s+de)?|(?:criar\s+|cria\s+|novo\s+|um\s+)?lembrete(?:\s+de|\s+para|\s+pra)?)\b"
    )
    .unwrap();
    static ref VALUE_PHRASE: Regex =
        Regex::new(r"(?:\b(?:no|com|de)\s+)?\bvalor\b(?:\s+(?:de|depois|ainda))*").unwrap();
    static ref EDGE_CONNECTORS: Regex = Regex::new(
        r"^(?:(?:de|do|da|para|pra|pro|que|e|o|a)\s+)+|(?:\s+(?:em|no|na|de|do|da|por|com|para|pra|pro|o|a|e|todo|toda|reais|real))+$"
    )
    .unwrap();
}

/// Recurrence ready to be confirmed. Fields the heuristics could not read
/// stay empty and are asked for by the confirmation flow.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceProposal {
    pub description: String,
    pub amount: Option<Decimal>,
    pub kind: TransactionKind,
    pub frequency: Frequency,
    pub monthly_rule: Option<MonthlyRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderDraft {
    pub message: Option<String>,
    pub amount: Option<Decimal>,
    /// The user mentioned a value but gave no number.
    pub amount_pending: bool,
}

fn tidy(text: &str) -> String {
    let mut out = collapse_whitespace(text)
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ':' | ';' | '-'))
        .to_string();
    loop {
        let next = EDGE_CONNECTORS.replace_all(&out, "").trim().to_string();
        if next == out {
            return out;
        }
        out = next;
    }
}

/// Income when the text talks about receiving money, expense otherwise.
pub fn infer_kind(text: &str) -> TransactionKind {
    if INCOME_WORD.is_match(&normalize_for_match(text)) {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    }
}

fn frequency_and_rule(t: &str, original: &str) -> Option<(Frequency, Option<MonthlyRule>)> {
    if let Some(day) = DAY_OF_MONTH_MARKER
        .captures(t)
        .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .filter(|d| (1..=31).contains(d))
    {
        return Some((Frequency::Monthly, Some(MonthlyRule::DayOfMonth(day))));
    }

    let business_day = extract_business_day_rule(original);
    if let Some(rule) = business_day {
        if MONTHLY_MARKER.is_match(t) || EVERY.is_match(t) {
            return Some((Frequency::Monthly, Some(MonthlyRule::BusinessDay(rule.n))));
        }
    }

    if MONTHLY_MARKER.is_match(t) {
        let day = DAY_NUMBER
            .captures(t)
            .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .filter(|d| (1..=31).contains(d));
        return Some((Frequency::Monthly, day.map(MonthlyRule::DayOfMonth)));
    }
    if WEEKLY_MARKER.is_match(t) {
        return Some((Frequency::Weekly, None));
    }
    if ANNUAL_MARKER.is_match(t) {
        return Some((Frequency::Annual, None));
    }
    if DAILY_MARKER.is_match(t) {
        return Some((Frequency::Daily, None));
    }
    None
}

fn recurrence_description(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let without_greeting = GREETING_PREFIX.replace(&lowered, "");
    let without_reminder = REMINDER_PHRASE.replace_all(&without_greeting, " ");
    let without_frequency = FREQUENCY_PHRASE.replace_all(&without_reminder, " ");
    let without_dates = strip_temporal_phrases(&without_frequency);
    tidy(&strip_amounts(&without_dates))
}

/// Recurrence proposal when the message reads as a repeating charge.
pub fn detect_recurrence(text: &str) -> Option<RecurrenceProposal> {
    let t = normalize_for_match(text);
    let (frequency, monthly_rule) = frequency_and_rule(&t, text)?;

    let has_trigger = TRIGGER_WORD.is_match(&t);
    let has_business_day = extract_business_day_rule(text).is_some();
    if !has_trigger && !has_business_day {
        return None;
    }

    let proposal = RecurrenceProposal {
        description: recurrence_description(text),
        amount: extract_amount(text).filter(|a| is_valid_amount(*a)),
        kind: infer_kind(text),
        frequency,
        monthly_rule,
    };
    debug!(
        frequency = proposal.frequency.as_str(),
        has_amount = proposal.amount.is_some(),
        "Recurrence heuristic matched"
    );
    Some(proposal)
}

fn reminder_message(text: &str) -> Option<String> {
    let lowered = text.trim().to_lowercase();
    let without_greeting = GREETING_PREFIX.replace(&lowered, "");
    let without_marker = REMINDER_PHRASE.replace_all(&without_greeting, " ");
    let without_dates = strip_temporal_phrases(&without_marker);
    let without_value = VALUE_PHRASE.replace_all(&without_dates, " ");
    let message = tidy(&strip_amounts(&without_value));
    (!message.is_empty()).then_some(message)
}

/// Reminder draft when the message asks to be reminded of something and is
/// not asking to see existing reminders.
pub fn detect_reminder(text: &str) -> Option<ReminderDraft> {
    let t = normalize_for_match(text);
    if !REMINDER_MARKER.is_match(&t) || LISTING_MARKER.is_match(&t) {
        return None;
    }

    let amount = extract_amount(text).filter(|a| is_valid_amount(*a));
    let draft = ReminderDraft {
        message: reminder_message(text),
        amount_pending: amount.is_none() && VALUE_WORD.is_match(&t),
        amount,
    };
    debug!(
        has_message = draft.message.is_some(),
        has_amount = draft.amount.is_some(),
        "Reminder heuristic matched"
    );
    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_rent_proposal() {
        let proposal = detect_recurrence("pagar aluguel todo mês dia 10 1500").unwrap();
        assert_eq!(proposal.description, "pagar aluguel");
        assert_eq!(proposal.amount, Some(Decimal::from(1500)));
        assert_eq!(proposal.frequency, Frequency::Monthly);
        assert_eq!(proposal.monthly_rule, Some(MonthlyRule::DayOfMonth(10)));
        assert_eq!(proposal.kind, TransactionKind::Expense);
    }

    #[test]
    fn test_every_day_n_is_monthly() {
        let proposal = detect_recurrence("pagar academia todo dia 5 130").unwrap();
        assert_eq!(proposal.frequency, Frequency::Monthly);
        assert_eq!(proposal.monthly_rule, Some(MonthlyRule::DayOfMonth(5)));
        assert_eq!(proposal.amount, Some(Decimal::from(130)));
        assert_eq!(proposal.description, "pagar academia");
    }

    #[test]
    fn test_business_day_salary_is_income() {
        let proposal = detect_recurrence("recebo salário todo 5º dia útil 3000").unwrap();
        assert_eq!(proposal.kind, TransactionKind::Income);
        assert_eq!(proposal.monthly_rule, Some(MonthlyRule::BusinessDay(5)));
        assert_eq!(proposal.amount, Some(Decimal::from(3000)));
        assert_eq!(proposal.description, "recebo salário");
    }

    #[test]
    fn test_weekly_and_missing_amount() {
        let proposal = detect_recurrence("pagar a diarista toda semana").unwrap();
        assert_eq!(proposal.frequency, Frequency::Weekly);
        assert_eq!(proposal.amount, None);
        assert_eq!(proposal.description, "pagar a diarista");
    }

    #[test]
    fn test_recurrence_needs_both_signals() {
        // frequency without trigger
        assert!(detect_recurrence("corro todo dia").is_none());
        // trigger without frequency
        assert!(detect_recurrence("pagar aluguel 1500").is_none());
        assert!(detect_recurrence("me lembra de pagar a conta").is_none());
    }

    #[test]
    fn test_reminder_with_full_date() {
        let draft = detect_reminder("lembra de pagar a internet dia 25/12/2025").unwrap();
        assert_eq!(draft.message.as_deref(), Some("pagar a internet"));
        assert_eq!(draft.amount, None);
        assert!(!draft.amount_pending);
    }

    #[test]
    fn test_reminder_without_date() {
        let draft = detect_reminder("me lembra de pagar a conta").unwrap();
        assert_eq!(draft.message.as_deref(), Some("pagar a conta"));
    }

    #[test]
    fn test_reminder_amount_and_pending_value() {
        let draft = detect_reminder("me lembra de pagar o IPVA dia 20 valor 850").unwrap();
        assert_eq!(draft.amount, Some(Decimal::from(850)));
        assert_eq!(draft.message.as_deref(), Some("pagar o ipva"));

        let pending = detect_reminder("me lembra de pagar o boleto amanhã, valor te passo depois")
            .unwrap();
        assert!(pending.amount_pending);
        assert_eq!(pending.amount, None);
    }

    #[test]
    fn test_out_of_range_amounts_are_dropped() {
        let proposal = detect_recurrence("pagar aluguel todo mês dia 10 0").unwrap();
        assert_eq!(proposal.amount, None);
        assert_eq!(proposal.monthly_rule, Some(MonthlyRule::DayOfMonth(10)));

        let proposal = detect_recurrence("pagar aluguel todo mês dia 10 5000000").unwrap();
        assert_eq!(proposal.amount, None);

        let draft = detect_reminder("me lembra de pagar o IPVA dia 20 valor 0").unwrap();
        assert_eq!(draft.amount, None);
    }

    #[test]
    fn test_listing_is_not_a_reminder() {
        assert!(detect_reminder("quais são meus lembretes").is_none());
        assert!(detect_reminder("mostra os lembretes").is_none());
        assert!(detect_reminder("gastei 50 no mercado").is_none());
    }
}
