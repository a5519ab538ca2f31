//! pt-BR temporal expressions
//!
//! `parse_date` resolves the date phrases users type in chat ("amanhã",
//! "25/12", "dia 10 do mês que vem", "5 de março") against an explicit
//! "today". It never guesses: when no rule applies, or a rule lands on an
//! impossible calendar date, the result is `None` and the caller re-prompts.

pub mod business_day;

pub use business_day::{extract_business_day_rule, nth_business_day, BusinessDayRule};

use crate::text::{collapse_whitespace, normalize_for_match};
use chrono::{Datelike, Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

const MONTH_NAMES: &[(&str, u32)] = &[
    ("janeiro", 0),
    ("fevereiro", 1),
    ("marco", 2),
    ("abril", 3),
    ("maio", 4),
    ("junho", 5),
    ("julho", 6),
    ("agosto", 7),
    ("setembro", 8),
    ("outubro", 9),
    ("novembro", 10),
    ("dezembro", 11),
];

const MONTH_ABBREVIATIONS: &[(&str, u32)] = &[
    ("jan", 0),
    ("fev", 1),
    ("mar", 2),
    ("abr", 3),
    ("mai", 4),
    ("jun", 5),
    ("jul", 6),
    ("ago", 7),
    ("set", 8),
    ("out", 9),
    ("nov", 10),
    ("dez", 11),
];

lazy_static! {
    static ref PUNCTUATION: Regex = Regex::new(r"[.,;:!?]").unwrap();

    static ref TOMORROW: Regex = Regex::new(r"\bamanha\b").unwrap();
    static ref DAY_AFTER_TOMORROW: Regex = Regex::new(r"\bdepois\s+de\s+amanha\b").unwrap();
    static ref TODAY: Regex = Regex::new(r"\bhoje\b").unwrap();

    static ref FULL_NUMERIC: Regex =
        Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4}|\d{2})\b").unwrap();
    static ref SHORT_NUMERIC: Regex = Regex::new(r"\b(\d{1,2})[/-](\d{1,2})\b").unwrap();

    static ref DAY_MARKER: Regex = Regex::new(r"\bdia\s+(\d{1,2})\b").unwrap();
    static ref LONE_DAY: Regex = Regex::new(r"^(?:no dia |dia )?(\d{1,2})$").unwrap();

    static ref NEXT_MONTH_PHRASE: Regex = Regex::new(r"\b(?:mes que vem|proximo mes)\b").unwrap();
    static ref DAY_THEN_NEXT_MONTH: Regex =
        Regex::new(r"(?:dia\s+)?\b(\d{1,2})\b.*\b(?:mes que vem|proximo mes)\b").unwrap();
    static ref NEXT_MONTH_THEN_DAY: Regex =
        Regex::new(r"\b(?:proximo mes|mes que vem)\b.*?\b(\d{1,2})\b").unwrap();

    static ref THIS_MONTH_PHRASE: Regex =
        Regex::new(r"\b(?:desse mes|deste mes|do mes atual|mes atual|este mes|esse mes|neste mes|nesse mes)\b")
            .unwrap();
    static ref DAY_THEN_THIS_MONTH: Regex = Regex::new(
        r"(?:dia\s+)?\b(\d{1,2})\b.*\b(?:desse mes|deste mes|do mes atual|mes atual|este mes|esse mes|neste mes|nesse mes)\b"
    )
    .unwrap();

    static ref LAST_MONTH_PHRASE: Regex =
        Regex::new(r"\b(?:mes passado|ultimo mes|mes anterior)\b").unwrap();

    static ref DAY_OF_NAMED_MONTH: Regex =
        Regex::new(r"\b(\d{1,2})\s+de\s+([a-z]+)(?:\s+de\s+(\d{4}))?").unwrap();
    static ref MONTH_NAME_WITH_YEAR: Regex = Regex::new(
        r"\b(janeiro|fevereiro|marco|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)\b(?:\s+(?:de\s+)?(\d{4}))?"
    )
    .unwrap();
    static ref NUMERIC_MONTH_YEAR: Regex = Regex::new(r"\b(\d{1,2})/(\d{4})\b").unwrap();

    // Accent-tolerant patterns used to cut date phrases out of descriptions.
    static ref STRIP_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?\b").unwrap(),
        Regex::new(
            r"(?:\b(?:no|todo|até o|ate o)\s+)?(?:\b\d{1,2}\s*(?:º|°|ª|o)?|\b(?:primeiro|segundo|terceiro|quarto|quinto|sexto|s[eé]timo|oitavo|nono|d[eé]cimo))\s+dia\s+[uú]til(?:\s+d[oe]\s+m[eê]s(?:\s+que\s+vem)?)?"
        )
        .unwrap(),
        Regex::new(r"\bdia\s+\d{1,2}\s+[uú]til\b").unwrap(),
        Regex::new(
            r"\b\d{1,2}\s+de\s+(?:janeiro|fevereiro|mar[cç]o|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)(?:\s+de\s+\d{4})?"
        )
        .unwrap(),
        Regex::new(
            r"(?:\b(?:no|para o|pro|até o|ate o)\s+)?\bdia\s+\d{1,2}\b(?:\s+d[oe]\s+m[eê]s(?:\s+que\s+vem|\s+atual)?)?"
        )
        .unwrap(),
        Regex::new(r"\bdepois\s+de\s+amanh[aã]\b").unwrap(),
        Regex::new(r"\bamanh[aã]\b").unwrap(),
        Regex::new(r"\bhoje\b").unwrap(),
        Regex::new(r"(?:\bd[oe]\s+)?\bm[eê]s\s+que\s+vem\b").unwrap(),
        Regex::new(r"(?:\bn?o\s+)?\bpr[oó]ximo\s+m[eê]s\b").unwrap(),
        Regex::new(r"\b(?:desse|deste|nesse|neste|esse|este)\s+m[eê]s\b").unwrap(),
        Regex::new(r"\bm[eê]s\s+atual\b").unwrap(),
    ];
    static ref DANGLING_TAIL: Regex =
        Regex::new(r"(?:\s+(?:em|no|na|para|pro|pra|de|do|dia|até|ate|o|a))+$").unwrap();
}

enum RuleOutcome {
    Found(NaiveDate),
    Invalid,
    Absent,
}

fn prepare(text: &str) -> String {
    let t = normalize_for_match(text);
    collapse_whitespace(&PUNCTUATION.replace_all(&t, " "))
}

fn month_from_name(name: &str, allow_abbreviation: bool) -> Option<u32> {
    let name = normalize_for_match(name);
    MONTH_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .or_else(|| {
            if allow_abbreviation {
                MONTH_ABBREVIATIONS.iter().find(|(n, _)| *n == name)
            } else {
                None
            }
        })
        .map(|(_, idx)| *idx)
}

fn contains_month_name(normalized: &str) -> bool {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| MONTH_NAMES.iter().any(|(name, _)| *name == word))
}

/// (year, month) shifted by `delta` months. Month is 1-based.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let zero_based = year * 12 + month as i32 - 1 + delta;
    (zero_based.div_euclid(12), zero_based.rem_euclid(12) as u32 + 1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = shift_month(year, month, 1);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Capitalised pt-BR month name for a 1-based month.
pub fn month_display_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
        "Outubro", "Novembro", "Dezembro",
    ];
    NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

fn parse_number<T: std::str::FromStr>(caps: &regex::Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

/// Rules 2 and 3: numeric dates with or without a year.
fn numeric_date(t: &str, today: NaiveDate) -> RuleOutcome {
    if let Some(caps) = FULL_NUMERIC.captures(t) {
        let day: Option<u32> = parse_number(&caps, 1);
        let month: Option<u32> = parse_number(&caps, 2);
        let year: Option<i32> = parse_number(&caps, 3);
        let (Some(day), Some(month), Some(mut year)) = (day, month, year) else {
            return RuleOutcome::Invalid;
        };
        if year < 100 {
            year += 2000;
        }
        return match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) => RuleOutcome::Found(date),
            None => RuleOutcome::Invalid,
        };
    }

    for caps in SHORT_NUMERIC.captures_iter(t) {
        let Some(whole) = caps.get(0) else { continue };

        // "12/2025" style month/year and the tail of longer numeric runs
        let rest = &t[whole.end()..];
        let mut rest_chars = rest.chars();
        if matches!(rest_chars.next(), Some('/') | Some('-'))
            && rest_chars.next().is_some_and(|c| c.is_ascii_digit())
        {
            continue;
        }

        let (Some(day), Some(month)) = (parse_number::<u32>(&caps, 1), parse_number::<u32>(&caps, 2))
        else {
            return RuleOutcome::Invalid;
        };

        let Some(candidate) = NaiveDate::from_ymd_opt(today.year(), month, day) else {
            return RuleOutcome::Invalid;
        };
        if candidate >= today {
            return RuleOutcome::Found(candidate);
        }
        return match NaiveDate::from_ymd_opt(today.year() + 1, month, day) {
            Some(date) => RuleOutcome::Found(date),
            None => RuleOutcome::Invalid,
        };
    }

    RuleOutcome::Absent
}

/// First month, starting from the current one, that holds `day` on or after
/// `today`.
fn roll_day_forward(day: u32, today: NaiveDate) -> Option<NaiveDate> {
    if !(1..=31).contains(&day) {
        return None;
    }
    (0..=12).find_map(|delta| {
        let (year, month) = shift_month(today.year(), today.month(), delta);
        NaiveDate::from_ymd_opt(year, month, day).filter(|d| *d >= today)
    })
}

fn bare_day_in_text(t: &str) -> Option<u32> {
    let day = DAY_MARKER
        .captures(t)
        .and_then(|caps| parse_number::<u32>(&caps, 1))
        .or_else(|| LONE_DAY.captures(t).and_then(|caps| parse_number::<u32>(&caps, 1)))?;
    (1..=31).contains(&day).then_some(day)
}

/// Resolve a pt-BR date expression relative to `today`.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let t = prepare(text);
    if t.is_empty() {
        return None;
    }

    // 1. relative tokens, unless an explicit numeric date is present
    let relative = if DAY_AFTER_TOMORROW.is_match(&t) {
        Some(2)
    } else if TOMORROW.is_match(&t) {
        Some(1)
    } else if TODAY.is_match(&t) {
        Some(0)
    } else {
        None
    };

    // 2 + 3. numeric dates
    match numeric_date(&t, today) {
        RuleOutcome::Found(date) => return Some(date),
        RuleOutcome::Invalid => return None,
        RuleOutcome::Absent => {}
    }

    if let Some(days) = relative {
        return today.checked_add_signed(Duration::days(days));
    }

    // 4. bare day, only without month context
    let has_next_month = NEXT_MONTH_PHRASE.is_match(&t);
    let has_this_month = THIS_MONTH_PHRASE.is_match(&t);
    if !has_next_month
        && !has_this_month
        && !t.contains('/')
        && !contains_month_name(&t)
        && extract_business_day_rule(&t).is_none()
    {
        if let Some(day) = bare_day_in_text(&t) {
            return roll_day_forward(day, today);
        }
    }

    // 5. next month, no past check; "dia N" beats any other number
    if has_next_month {
        let day = DAY_MARKER
            .captures(&t)
            .or_else(|| DAY_THEN_NEXT_MONTH.captures(&t))
            .or_else(|| NEXT_MONTH_THEN_DAY.captures(&t))
            .and_then(|caps| parse_number::<u32>(&caps, 1));
        if let Some(day) = day {
            let (year, month) = shift_month(today.year(), today.month(), 1);
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }

    // 6. this month, no rollover
    if has_this_month {
        if let Some(caps) = DAY_MARKER.captures(&t).or_else(|| DAY_THEN_THIS_MONTH.captures(&t)) {
            let day: u32 = parse_number(&caps, 1)?;
            return NaiveDate::from_ymd_opt(today.year(), today.month(), day);
        }
    }

    // 7. "5 de março [de 2026]"
    if let Some(caps) = DAY_OF_NAMED_MONTH.captures(&t) {
        let day: u32 = parse_number(&caps, 1)?;
        let month = month_from_name(caps.get(2)?.as_str(), false)? + 1;
        let explicit_year: Option<i32> = parse_number(&caps, 3);
        let year = explicit_year.unwrap_or(today.year());

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        if explicit_year.is_none() && date < today {
            return NaiveDate::from_ymd_opt(year + 1, month, day);
        }
        return Some(date);
    }

    None
}

/// `parse_date`, falling back to ISO `YYYY-MM-DD` as written by the model.
pub fn parse_date_or_iso(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    parse_date(text, today).or_else(|| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
}

/// First and last day of `month` (1-based).
pub fn month_bounds(month: u32, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
    Some((first, last))
}

/// Day number when the whole message is only a day ("5", "dia 5", "no dia 5").
pub fn extract_bare_day(text: &str) -> Option<u32> {
    let t = prepare(text);
    if t.contains('/') || contains_month_name(&t) {
        return None;
    }
    let day: u32 = LONE_DAY.captures(&t).and_then(|caps| parse_number(&caps, 1))?;
    (1..=31).contains(&day).then_some(day)
}

/// Zero-based month index from "12", "dezembro" or "dez".
pub fn normalize_month(text: &str) -> Option<u32> {
    let t = prepare(text);
    if t.is_empty() {
        return None;
    }

    let digits: String = t.chars().filter(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        return match digits.parse::<u32>() {
            Ok(n) if (1..=12).contains(&n) => Some(n - 1),
            _ => None,
        };
    }

    month_from_name(&t, true)
}

/// Month (1-based) and year named by a report-style phrase.
///
/// Understands month names with optional year, `MM/YYYY`, "este mês",
/// "mês passado" and "mês que vem".
pub fn extract_month_year(text: &str, today: NaiveDate) -> Option<(u32, i32)> {
    let t = prepare(text);

    if let Some(caps) = NUMERIC_MONTH_YEAR.captures(&t) {
        let month: u32 = parse_number(&caps, 1)?;
        let year: i32 = parse_number(&caps, 2)?;
        if (1..=12).contains(&month) {
            return Some((month, year));
        }
    }

    if LAST_MONTH_PHRASE.is_match(&t) {
        let (year, month) = shift_month(today.year(), today.month(), -1);
        return Some((month, year));
    }

    if NEXT_MONTH_PHRASE.is_match(&t) {
        let (year, month) = shift_month(today.year(), today.month(), 1);
        return Some((month, year));
    }

    if THIS_MONTH_PHRASE.is_match(&t) {
        return Some((today.month(), today.year()));
    }

    let caps = MONTH_NAME_WITH_YEAR.captures(&t)?;
    let month = month_from_name(caps.get(1)?.as_str(), false)? + 1;
    let year = parse_number(&caps, 2).unwrap_or(today.year());
    Some((month, year))
}

/// Remove date phrases from a sentence, keeping the remaining words.
pub fn strip_temporal_phrases(text: &str) -> String {
    let mut out = text.to_lowercase();
    for re in STRIP_PATTERNS.iter() {
        out = re.replace_all(&out, " ").into_owned();
    }
    let out = collapse_whitespace(&out);
    DANGLING_TAIL.replace(&out, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_full_numeric_date_anywhere() {
        let today = d(2026, 6, 1);
        assert_eq!(parse_date("25/12/2025", today), Some(d(2025, 12, 25)));
        assert_eq!(
            parse_date("lembra de pagar a internet dia 25/12/2025", today),
            Some(d(2025, 12, 25))
        );
        assert_eq!(parse_date("vence 05-01-27", today), Some(d(2027, 1, 5)));
    }

    #[test]
    fn test_short_numeric_date_rolls_year() {
        assert_eq!(parse_date("10/02", d(2026, 3, 1)), Some(d(2027, 2, 10)));
        assert_eq!(parse_date("10/02", d(2026, 2, 10)), Some(d(2026, 2, 10)));
        assert_eq!(parse_date("10/02", d(2026, 1, 5)), Some(d(2026, 2, 10)));
    }

    #[test]
    fn test_impossible_dates_are_rejected() {
        let today = d(2026, 1, 1);
        assert_eq!(parse_date("31/02/2026", today), None);
        assert_eq!(parse_date("35/01", today), None);
        assert_eq!(parse_date("sem data nenhuma", today), None);
        assert_eq!(parse_date("", today), None);
    }

    #[test]
    fn test_relative_tokens() {
        let today = d(2026, 3, 31);
        assert_eq!(parse_date("amanhã", today), Some(d(2026, 4, 1)));
        assert_eq!(parse_date("me lembra amanha cedo", today), Some(d(2026, 4, 1)));
        assert_eq!(parse_date("depois de amanhã", today), Some(d(2026, 4, 2)));
        assert_eq!(parse_date("hoje", today), Some(today));
        assert_eq!(parse_date("amanhã, dia 21/01/26", today), Some(d(2026, 1, 21)));
    }

    #[test]
    fn test_bare_day_rolls_month() {
        let today = d(2026, 3, 10);
        assert_eq!(parse_date("dia 15", today), Some(d(2026, 3, 15)));
        assert_eq!(parse_date("dia 5", today), Some(d(2026, 4, 5)));
        assert_eq!(parse_date("10", today), Some(d(2026, 3, 10)));
        // April has no 31st
        assert_eq!(parse_date("dia 31", d(2026, 4, 10)), Some(d(2026, 5, 31)));
    }

    #[test]
    fn test_next_and_this_month_phrases() {
        let today = d(2026, 3, 20);
        assert_eq!(parse_date("dia 5 do mês que vem", today), Some(d(2026, 4, 5)));
        assert_eq!(parse_date("próximo mês dia 7", today), Some(d(2026, 4, 7)));
        assert_eq!(parse_date("dia 2 desse mês", today), Some(d(2026, 3, 2)));
        assert_eq!(parse_date("dia 31 do mês que vem", today), None);
    }

    #[test]
    fn test_marked_day_wins_over_other_numbers() {
        let today = d(2026, 3, 20);
        assert_eq!(
            parse_date("me lembra de pagar 20 reais dia 5 do mês que vem", today),
            Some(d(2026, 4, 5))
        );
        assert_eq!(
            parse_date("pagar 3 boletos dia 25 desse mês", today),
            Some(d(2026, 3, 25))
        );
    }

    #[test]
    fn test_month_names_match_whole_words_only() {
        let today = d(2026, 3, 5);
        assert_eq!(parse_date("pagar dia 10 a parcela maior", today), Some(d(2026, 3, 10)));
        assert_eq!(parse_date("dia 10 de maio", today), Some(d(2026, 5, 10)));
    }

    #[test]
    fn test_day_of_named_month() {
        let today = d(2026, 3, 20);
        assert_eq!(parse_date("5 de março", today), Some(d(2027, 3, 5)));
        assert_eq!(parse_date("25 de março", today), Some(d(2026, 3, 25)));
        assert_eq!(parse_date("5 de março de 2025", today), Some(d(2025, 3, 5)));
        assert_eq!(parse_date("dia 10 de dezembro", today), Some(d(2026, 12, 10)));
        assert_eq!(parse_date("5 de batata", today), None);
    }

    #[test]
    fn test_extract_bare_day() {
        assert_eq!(extract_bare_day("dia 5"), Some(5));
        assert_eq!(extract_bare_day("no dia 21"), Some(21));
        assert_eq!(extract_bare_day("7"), Some(7));
        assert_eq!(extract_bare_day("5 de maio"), None);
        assert_eq!(extract_bare_day("05/10"), None);
        assert_eq!(extract_bare_day("32"), None);
        assert_eq!(extract_bare_day("pagar dia 5"), None);
    }

    #[test]
    fn test_normalize_month() {
        assert_eq!(normalize_month("12"), Some(11));
        assert_eq!(normalize_month("01"), Some(0));
        assert_eq!(normalize_month("dez"), Some(11));
        assert_eq!(normalize_month("Março"), Some(2));
        assert_eq!(normalize_month("13"), None);
        assert_eq!(normalize_month("xyz"), None);
    }

    #[test]
    fn test_extract_month_year() {
        let today = d(2026, 1, 15);
        assert_eq!(extract_month_year("gastos de dezembro de 2025", today), Some((12, 2025)));
        assert_eq!(extract_month_year("despesas de março", today), Some((3, 2026)));
        assert_eq!(extract_month_year("gastos do mês passado", today), Some((12, 2025)));
        assert_eq!(extract_month_year("receitas do mês que vem", today), Some((2, 2026)));
        assert_eq!(extract_month_year("gastos deste mês", today), Some((1, 2026)));
        assert_eq!(extract_month_year("03/2026", today), Some((3, 2026)));
        assert_eq!(extract_month_year("meus gastos", today), None);
    }

    #[test]
    fn test_strip_temporal_phrases() {
        assert_eq!(strip_temporal_phrases("pagar a internet dia 25/12/2025"), "pagar a internet");
        assert_eq!(strip_temporal_phrases("pagar o aluguel amanhã"), "pagar o aluguel");
        assert_eq!(
            strip_temporal_phrases("pagar a luz no 5º dia útil do mês que vem"),
            "pagar a luz"
        );
        assert_eq!(strip_temporal_phrases("comprar ração dia 10 do mês"), "comprar ração");
    }

    #[test]
    fn test_shift_month_wraps_years() {
        assert_eq!(shift_month(2026, 12, 1), (2027, 1));
        assert_eq!(shift_month(2026, 1, -1), (2025, 12));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2026, 4), 30);
    }

    #[test]
    fn test_iso_fallback_and_month_bounds() {
        let today = d(2026, 3, 1);
        assert_eq!(parse_date_or_iso("2026-04-15", today), Some(d(2026, 4, 15)));
        assert_eq!(parse_date_or_iso("amanhã", today), Some(d(2026, 3, 2)));
        assert_eq!(parse_date_or_iso("qualquer dia", today), None);
        assert_eq!(month_bounds(2, 2028), Some((d(2028, 2, 1), d(2028, 2, 29))));
        assert_eq!(month_bounds(13, 2028), None);
    }
}
