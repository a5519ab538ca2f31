//! Input validation for the guided flows
//!
//! Validators return `bool`; a failed check makes the active stage re-prompt
//! and never surfaces as an error.

use crate::text::normalize_for_match;
use rust_decimal::Decimal;

/// Upper bound accepted for a single transaction or reminder amount.
pub const MAX_AMOUNT: i64 = 1_000_000;

/// Words that show the user answered with a greeting instead of a name.
const FORBIDDEN_NAME_WORDS: &[&str] = &[
    "oi", "ola", "bom", "boa", "dia", "tarde", "noite", "tudo", "bem", "ok", "sim", "nao",
];

pub fn is_valid_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO && amount <= Decimal::from(MAX_AMOUNT)
}

/// First and last name, letters only, at least five characters.
pub fn is_valid_person_name(name: &str) -> bool {
    let name = name.trim();

    if name.chars().count() < 5 {
        return false;
    }
    if !name.contains(' ') {
        return false;
    }
    if !name.chars().all(|c| c.is_alphabetic() || c.is_whitespace()) {
        return false;
    }

    !normalize_for_match(name)
        .split_whitespace()
        .any(|part| FORBIDDEN_NAME_WORDS.contains(&part))
}

/// Brazilian CPF (11 digits) or CNPJ (14 digits) with valid check digits.
/// Punctuation is ignored.
pub fn is_valid_tax_id(document: &str) -> bool {
    let digits: Vec<u32> = document.chars().filter_map(|c| c.to_digit(10)).collect();

    match digits.len() {
        11 => is_valid_cpf(&digits),
        14 => is_valid_cnpj(&digits),
        _ => false,
    }
}

/// Digits-only form stored on the user record.
pub fn normalize_tax_id(document: &str) -> String {
    document.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn is_valid_cpf(digits: &[u32]) -> bool {
    if all_same(digits) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let digit = 11 - (sum % 11);
        if digit >= 10 {
            0
        } else {
            digit
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

fn is_valid_cnpj(digits: &[u32]) -> bool {
    if all_same(digits) {
        return false;
    }

    const FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

    let check = |weights: &[u32]| -> u32 {
        let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
        let rest = sum % 11;
        if rest < 2 {
            0
        } else {
            11 - rest
        }
    };

    check(&FIRST) == digits[12] && check(&SECOND) == digits[13]
}
