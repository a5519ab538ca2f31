//! Text helpers shared by the heuristics and dialogue handlers
//!
//! Everything here is pure: normalisation for keyword matching, pt-BR money
//! parsing and formatting, and the yes/no vocabulary used by confirmation
//! stages.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const YES_WORDS: &[&str] = &["sim", "s", "confirmo", "pode", "ok", "fechado", "isso"];
const NO_WORDS: &[&str] = &["nao", "n", "cancela", "cancelar", "negativo"];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    // Substrings that carry digits but are never money.
    static ref NUMERIC_DATE: Regex =
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?\b").unwrap();
    static ref MONTH_YEAR: Regex = Regex::new(r"\b\d{1,2}/\d{4}\b").unwrap();
    static ref BUSINESS_DAY: Regex =
        Regex::new(r"\b\d{1,2}\s*(?:º|°|o|ª)?\s*dia\s+ut(?:il|eis)\b|\bdia\s+\d{1,2}\s+ut(?:il|eis)\b")
            .unwrap();
    static ref DAY_MARKER: Regex = Regex::new(r"\bdia\s+\d{1,2}\b").unwrap();
    static ref DAY_OF_NAMED_MONTH: Regex = Regex::new(
        r"\b\d{1,2}\s+de\s+(?:janeiro|fevereiro|marco|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)(?:\s+de\s+\d{4})?\b"
    )
    .unwrap();
    static ref YEAR_SUFFIX: Regex = Regex::new(r"\bde\s+\d{4}\b").unwrap();
    static ref NAMED_MONTH_YEAR: Regex = Regex::new(
        r"\b(?:janeiro|fevereiro|marco|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)\s+20\d{2}\b"
    )
    .unwrap();

    static ref AMOUNT: Regex = Regex::new(
        r"(?i)(?:\br\$?\s*|\b)(\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d+,\d{1,2}|\d+\.\d{1,2}|\d+)\s*(mil|k)?\b(?:\s*(?:reais|real|conto|contos))?"
    )
    .unwrap();
    static ref CURRENCY_PREFIXED: Regex = Regex::new(r"\br\$?\s*\d").unwrap();
}

/// Drop characters that have no business in a chat message.
pub fn sanitize_input(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '<' | '>' | '$' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Lowercase, strip diacritics and collapse whitespace.
pub fn normalize_for_match(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    WHITESPACE.replace_all(folded.trim(), " ").into_owned()
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn normalized_word(text: &str) -> String {
    normalize_for_match(text)
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

pub fn is_yes(text: &str) -> bool {
    YES_WORDS.contains(&normalized_word(text).as_str())
}

pub fn is_no(text: &str) -> bool {
    NO_WORDS.contains(&normalized_word(text).as_str())
}

/// Blank out date-like substrings so their digits are not read as money.
fn mask_dates(normalized: &str) -> String {
    let mut masked = normalized.to_string();
    for re in [
        &*BUSINESS_DAY,
        &*DAY_OF_NAMED_MONTH,
        &*NUMERIC_DATE,
        &*MONTH_YEAR,
        &*DAY_MARKER,
        &*YEAR_SUFFIX,
        &*NAMED_MONTH_YEAR,
    ] {
        masked = re.replace_all(&masked, " ").into_owned();
    }
    masked
}

fn parse_amount_token(number: &str, multiplier: Option<&str>) -> Option<Decimal> {
    let canonical = if number.contains(',') {
        number.replace('.', "").replace(',', ".")
    } else if number.matches('.').count() == 1 && number.split('.').nth(1)?.len() <= 2 {
        number.to_string()
    } else {
        number.replace('.', "")
    };

    let mut value = Decimal::from_str(&canonical).ok()?;
    if multiplier.is_some() {
        value *= Decimal::from(1000);
    }
    Some(value)
}

/// Extract the monetary amount from free pt-BR text.
///
/// Handles "1.500,50", "50,90", "5 mil", "2k" and "R$ 30". Date and
/// business-day fragments are masked first. A currency-prefixed number wins
/// over a bare one.
pub fn extract_amount(text: &str) -> Option<Decimal> {
    let masked = mask_dates(&normalize_for_match(text));

    let mut first: Option<Decimal> = None;
    for caps in AMOUNT.captures_iter(&masked) {
        let Some(number) = caps.get(1) else { continue };
        let value = parse_amount_token(number.as_str(), caps.get(2).map(|m| m.as_str()));
        let Some(value) = value else { continue };

        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if CURRENCY_PREFIXED.is_match(whole) {
            return Some(value);
        }
        if first.is_none() {
            first = Some(value);
        }
    }
    first
}

/// Remove money fragments, leaving the descriptive words.
pub fn strip_amounts(text: &str) -> String {
    let cleaned = AMOUNT.replace_all(text, " ");
    collapse_whitespace(&cleaned)
}

/// "R$ 1.500,00"
pub fn format_brl(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// "25/12/2025"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_match() {
        assert_eq!(normalize_for_match("  Mês   QUE vem "), "mes que vem");
        assert_eq!(normalize_for_match("Não"), "nao");
    }

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input(" <b>R$ 50</b>\\ "), "bR 50/b");
    }

    #[test]
    fn test_yes_no_vocabulary() {
        assert!(is_yes("Sim"));
        assert!(is_yes("ok!"));
        assert!(is_no("Não"));
        assert!(is_no("cancelar"));
        assert!(!is_yes("talvez"));
        assert!(!is_no("sim"));
    }

    #[test]
    fn test_extract_amount_formats() {
        assert_eq!(extract_amount("gastei 50 no mercado"), Some(Decimal::from(50)));
        assert_eq!(
            extract_amount("paguei 1.500,50 de aluguel"),
            Some(Decimal::new(150050, 2))
        );
        assert_eq!(extract_amount("uber 23,90"), Some(Decimal::new(2390, 2)));
        assert_eq!(extract_amount("recebi 5 mil"), Some(Decimal::from(5000)));
        assert_eq!(extract_amount("freela de 2k"), Some(Decimal::from(2000)));
    }

    #[test]
    fn test_extract_amount_ignores_dates() {
        assert_eq!(
            extract_amount("pagar aluguel todo mês dia 10 1500"),
            Some(Decimal::from(1500))
        );
        assert_eq!(extract_amount("lembra de pagar a internet dia 25/12/2025"), None);
        assert_eq!(extract_amount("pagar no 5º dia útil 300"), Some(Decimal::from(300)));
        assert_eq!(extract_amount("despesas de março 2026"), None);
        assert_eq!(extract_amount("luz de março 2026 r$ 180"), Some(Decimal::from(180)));
    }

    #[test]
    fn test_extract_amount_prefers_currency() {
        assert_eq!(
            extract_amount("2 boletos de r 80"),
            Some(Decimal::from(80))
        );
    }

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(Decimal::from(1500)), "R$ 1.500,00");
        assert_eq!(format_brl(Decimal::new(239, 1)), "R$ 23,90");
        assert_eq!(format_brl(Decimal::from(1234567)), "R$ 1.234.567,00");
        assert_eq!(format_brl(Decimal::from(-10)), "-R$ 10,00");
    }

    #[test]
    fn test_strip_amounts() {
        assert_eq!(strip_amounts("pagar aluguel 1500 reais"), "pagar aluguel");
    }
}
