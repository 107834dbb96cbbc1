// SPDX-License-Identifier: AGPL-3.0-or-later
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Bet shorthand parser.
//!
//! Converts one free-text message into an ordered [`BetBatch`]. The grammar
//! is a fixed-priority cascade over whitespace tokens: at each position every
//! rule is tried in order and the first match wins, consuming one to three
//! tokens. A token no rule matches is dropped and parsing continues.
//!
//! Rule priority at each position:
//!
//! 1. three numeric tokens `N1 N2 AMT` -> `N1@AMT`, `N2@AMT`
//! 2. slash list `n1/n2/../amt`
//! 3. hyphen pair `nn-amt`
//! 4. bare reverse `nnRamt` -> number and its reverse at the same stake
//! 5. hyphen+reverse `nn-amt1Ramt2`
//! 6. split reverse: numeric token followed by `amt1Ramt2`
//! 7. permutation combo: digit string plus a combo marker, stake follows
//! 8. fixed named sets (ten numbers each), stake follows
//! 9. prefix categories: digit plus a category marker, stake follows
//! 10. bare number, stake from the next token or [`DEFAULT_STAKE`]
//!
//! Parsing is pure: no ledger access, deterministic, order-stable.

use crate::base::Number;
use crate::bet::{BetBatch, BetEntry};
use crate::error::BetError;

/// Stake assumed for a bare number with no following amount token.
pub const DEFAULT_STAKE: i64 = 500;

/// Characters that reject the whole message before any rule runs.
const FORBIDDEN: [char; 4] = ['%', '&', '*', '$'];

/// Permutation-combo marker (all ordered digit pairs of the base).
const COMBO_MARKER: &str = "ahtwe";
/// Combo variant that also includes each digit doubled.
const COMBO_DOUBLES_MARKER: &str = "apupaahtwe";

/// Closed table of named number sets, ten numbers each.
const NAMED_SETS: [(&str, [u8; 10]); 5] = [
    // doubles
    ("apu", [0, 11, 22, 33, 44, 55, 66, 77, 88, 99]),
    // "power" series
    ("pawa", [5, 16, 27, 38, 49, 50, 61, 72, 83, 94]),
    // "nakhat" series
    ("nakhat", [7, 18, 24, 35, 42, 53, 69, 70, 81, 96]),
    // ascending consecutive digits
    ("nyiko", [1, 12, 23, 34, 45, 56, 67, 78, 89, 90]),
    // descending consecutive digits
    ("konyi", [9, 10, 21, 32, 43, 54, 65, 76, 87, 98]),
];

/// Prefix-category markers: `<digit><marker>` selects ten or nineteen numbers.
const TENS_MARKER: &str = "htate";
const UNITS_MARKER: &str = "pate";
const DIGIT_SUM_MARKER: &str = "brake";
const AROUND_MARKER: &str = "apar";

const CATEGORY_MARKERS: [&str; 4] = [TENS_MARKER, UNITS_MARKER, DIGIT_SUM_MARKER, AROUND_MARKER];

/// Parses one message into a batch.
///
/// # Errors
///
/// - [`BetError::InputRejected`] if the text contains any of `% & * $`;
///   checked wholesale before tokenization.
/// - [`BetError::ParseEmpty`] if the cascade matched no entries.
pub fn parse(text: &str) -> Result<BetBatch, BetError> {
    if text.chars().any(|c| FORBIDDEN.contains(&c)) {
        return Err(BetError::InputRejected);
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut entries = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        match match_at(&tokens[i..]) {
            Some(m) => {
                entries.extend(m.entries);
                i += m.consumed;
            }
            None => i += 1,
        }
    }

    if entries.is_empty() {
        return Err(BetError::ParseEmpty);
    }
    Ok(BetBatch::new(entries))
}

/// One successful rule application.
struct RuleMatch {
    entries: Vec<BetEntry>,
    consumed: usize,
}

impl RuleMatch {
    fn one(entry: BetEntry, consumed: usize) -> Self {
        RuleMatch { entries: vec![entry], consumed }
    }
}

/// Tries every rule at the head of `rest`, in priority order.
fn match_at(rest: &[&str]) -> Option<RuleMatch> {
    match_triple_digit(rest)
        .or_else(|| match_slash_list(rest))
        .or_else(|| match_hyphen_pair(rest))
        .or_else(|| match_bare_reverse(rest))
        .or_else(|| match_hyphen_reverse(rest))
        .or_else(|| match_split_reverse(rest))
        .or_else(|| match_combo(rest))
        .or_else(|| match_named_set(rest))
        .or_else(|| match_prefix_category(rest))
        .or_else(|| match_bare_number(rest))
}

/// True if the token is a non-empty run of ASCII digits.
fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Interprets a digit run as a number in `[0, 99]`, tolerating leading zeros.
fn parse_number(token: &str) -> Option<Number> {
    if !is_digits(token) {
        return None;
    }
    let trimmed = token.trim_start_matches('0');
    if trimmed.len() > 2 {
        return None;
    }
    let value: u8 = if trimmed.is_empty() { 0 } else { trimmed.parse().ok()? };
    Number::new(value)
}

/// Interprets a digit run as a stake amount.
fn parse_amount(token: &str) -> Option<i64> {
    if !is_digits(token) {
        return None;
    }
    token.parse().ok()
}

/// Rule 1: `N1 N2 AMT`, three numeric tokens, first two in range.
fn match_triple_digit(rest: &[&str]) -> Option<RuleMatch> {
    let [a, b, c, ..] = rest else { return None };
    if !is_digits(a) || !is_digits(b) || !is_digits(c) {
        return None;
    }
    let n1 = parse_number(a)?;
    let n2 = parse_number(b)?;
    let amount = parse_amount(c)?;
    Some(RuleMatch {
        entries: vec![BetEntry::new(n1, amount), BetEntry::new(n2, amount)],
        consumed: 3,
    })
}

/// Rule 2: `n1/n2/../amt` with at least three numeric parts.
///
/// Out-of-range leading numbers are skipped individually rather than
/// invalidating the whole token, so a slash token can match yet yield
/// fewer entries than parts.
fn match_slash_list(rest: &[&str]) -> Option<RuleMatch> {
    let token = rest.first()?;
    if !token.contains('/') {
        return None;
    }
    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() < 3 || !parts.iter().all(|p| is_digits(p)) {
        return None;
    }
    let (amount_part, number_parts) = parts.split_last()?;
    let amount = parse_amount(amount_part)?;
    let entries = number_parts
        .iter()
        .filter_map(|p| parse_number(p))
        .map(|n| BetEntry::new(n, amount))
        .collect();
    Some(RuleMatch { entries, consumed: 1 })
}

/// Rule 3: `nn-amt`, no reverse marker present.
fn match_hyphen_pair(rest: &[&str]) -> Option<RuleMatch> {
    let token = rest.first()?;
    if !token.contains('-') || token.contains('r') {
        return None;
    }
    let (num_part, amount_part) = split_once_exact(token, '-')?;
    let number = parse_number(num_part)?;
    let amount = parse_amount(amount_part)?;
    Some(RuleMatch::one(BetEntry::new(number, amount), 1))
}

/// Rule 4: `nnRamt` places the number and its reverse at the same stake.
fn match_bare_reverse(rest: &[&str]) -> Option<RuleMatch> {
    let token = rest.first()?;
    if !token.contains('r') || token.contains('-') {
        return None;
    }
    let (num_part, amount_part) = split_once_exact(token, 'r')?;
    let number = parse_number(num_part)?;
    let amount = parse_amount(amount_part)?;
    Some(RuleMatch {
        entries: vec![
            BetEntry::new(number, amount),
            BetEntry::new(number.reverse(), amount),
        ],
        consumed: 1,
    })
}

/// Rule 5: `nn-amt1Ramt2` with distinct stakes for the number and its reverse.
fn match_hyphen_reverse(rest: &[&str]) -> Option<RuleMatch> {
    let token = rest.first()?;
    if !token.contains('r') || !token.contains('-') {
        return None;
    }
    let (main, reverse_amount_part) = token.split_once('r')?;
    let (num_part, amount_part) = split_once_exact(main, '-')?;
    let number = parse_number(num_part)?;
    let amount = parse_amount(amount_part)?;
    let reverse_amount = parse_amount(reverse_amount_part)?;
    Some(RuleMatch {
        entries: vec![
            BetEntry::new(number, amount),
            BetEntry::new(number.reverse(), reverse_amount),
        ],
        consumed: 1,
    })
}

/// Rule 6: a numeric token followed by `amt1Ramt2`.
fn match_split_reverse(rest: &[&str]) -> Option<RuleMatch> {
    let [num_token, amount_token, ..] = rest else { return None };
    if !is_digits(num_token) {
        return None;
    }
    let (first_part, second_part) = split_once_exact(amount_token, 'r')?;
    let number = parse_number(num_token)?;
    let amount = parse_amount(first_part)?;
    let reverse_amount = parse_amount(second_part)?;
    Some(RuleMatch {
        entries: vec![
            BetEntry::new(number, amount),
            BetEntry::new(number.reverse(), reverse_amount),
        ],
        consumed: 2,
    })
}

/// Rule 7: permutation combo over the digits of a numeric base.
///
/// `123ahtwe 100` yields every distinct ordered digit pair of `1 2 3`
/// (12 13 21 23 31 32) at 100 each; the `apupaahtwe` variant appends each
/// digit doubled (11 22 33). The stake token must follow.
fn match_combo(rest: &[&str]) -> Option<RuleMatch> {
    let token = rest.first()?;
    let (base, include_doubles) = if let Some(base) = token.strip_suffix(COMBO_DOUBLES_MARKER) {
        (base, true)
    } else if let Some(base) = token.strip_suffix(COMBO_MARKER) {
        (base, false)
    } else {
        return None;
    };
    if !is_digits(base) || base.len() < 2 {
        return None;
    }
    let amount = parse_amount(rest.get(1)?)?;

    let digits: Vec<u8> = base.bytes().map(|b| b - b'0').collect();
    let mut numbers: Vec<u8> = Vec::new();
    for (j, &tens) in digits.iter().enumerate() {
        for (k, &units) in digits.iter().enumerate() {
            if j != k {
                let combo = tens * 10 + units;
                if !numbers.contains(&combo) {
                    numbers.push(combo);
                }
            }
        }
    }
    if include_doubles {
        for &d in &digits {
            let double = d * 10 + d;
            if !numbers.contains(&double) {
                numbers.push(double);
            }
        }
    }

    let entries = numbers
        .into_iter()
        .filter_map(Number::new)
        .map(|n| BetEntry::new(n, amount))
        .collect();
    Some(RuleMatch { entries, consumed: 2 })
}

/// Rule 8: exact match against the closed table of named sets.
fn match_named_set(rest: &[&str]) -> Option<RuleMatch> {
    let token = rest.first()?;
    let (_, numbers) = NAMED_SETS.iter().find(|(name, _)| name == token)?;
    let amount = parse_amount(rest.get(1)?)?;
    let entries = numbers
        .iter()
        .filter_map(|&v| Number::new(v))
        .map(|n| BetEntry::new(n, amount))
        .collect();
    Some(RuleMatch { entries, consumed: 2 })
}

/// Rule 9: `<digit><marker>` selecting a derived set of numbers.
///
/// Markers: tens place, units place, digit-sum mod 10, and the union of the
/// first two. Marker probing stops at the first marker whose prefix is a
/// single digit; a missing stake token then fails the rule outright.
fn match_prefix_category(rest: &[&str]) -> Option<RuleMatch> {
    let token = rest.first()?;
    for marker in CATEGORY_MARKERS {
        let Some(prefix) = token.strip_suffix(marker) else {
            continue;
        };
        if !is_digits(prefix) {
            continue;
        }
        let trimmed = prefix.trim_start_matches('0');
        if trimmed.len() > 1 {
            continue;
        }
        let digit: u8 = if trimmed.is_empty() { 0 } else { trimmed.parse().ok()? };

        let amount = parse_amount(rest.get(1)?)?;
        let numbers = category_numbers(marker, digit);
        let entries = numbers.into_iter().map(|n| BetEntry::new(n, amount)).collect();
        return Some(RuleMatch { entries, consumed: 2 });
    }
    None
}

/// The number set a category marker selects for a digit.
fn category_numbers(marker: &str, digit: u8) -> Vec<Number> {
    let mut numbers = Vec::new();
    match marker {
        TENS_MARKER => {
            numbers.extend((0..10).filter_map(|u| Number::new(digit * 10 + u)));
        }
        UNITS_MARKER => {
            numbers.extend((0..10).filter_map(|t| Number::new(t * 10 + digit)));
        }
        DIGIT_SUM_MARKER => {
            numbers.extend(Number::all().filter(|n| (n.tens() + n.units()) % 10 == digit));
        }
        AROUND_MARKER => {
            // tens row first, then the units column, duplicates removed
            numbers.extend((0..10).filter_map(|u| Number::new(digit * 10 + u)));
            for n in (0..10).filter_map(|t| Number::new(t * 10 + digit)) {
                if !numbers.contains(&n) {
                    numbers.push(n);
                }
            }
        }
        _ => unreachable!("unknown category marker"),
    }
    numbers
}

/// Rule 10: a bare in-range number, staked by the next numeric token or at
/// [`DEFAULT_STAKE`] when none follows.
fn match_bare_number(rest: &[&str]) -> Option<RuleMatch> {
    let number = parse_number(rest.first()?)?;
    if let Some(amount) = rest.get(1).and_then(|t| parse_amount(t)) {
        return Some(RuleMatch::one(BetEntry::new(number, amount), 2));
    }
    Some(RuleMatch::one(BetEntry::new(number, DEFAULT_STAKE), 1))
}

/// Splits on a separator that must occur exactly once.
fn split_once_exact(token: &str, separator: char) -> Option<(&str, &str)> {
    let (left, right) = token.split_once(separator)?;
    if right.contains(separator) {
        return None;
    }
    Some((left, right))
}
