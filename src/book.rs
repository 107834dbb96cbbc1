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

//! The book: global ledger, per-bettor histories, and operator settings.
//!
//! [`Book`] owns the whole betting-state consistency domain behind one mutex:
//! the number aggregates, the per-bettor per-period entry lists, the period
//! open flags, the commission terms, the power number, and the break limit.
//! Every mutating operation runs as a single critical section, and validation
//! completes before any mutation begins, so the ledger and the histories can
//! never diverge.
//!
//! # Invariants
//!
//! - A ledger key is present iff its aggregate is `> 0`; an aggregate that
//!   drops to `<= 0` removes the key.
//! - Entry lists preserve insertion order; an empty list is pruned along with
//!   its `(bettor, period)` key.
//! - For every number, the ledger aggregate equals the sum of all retained
//!   entries for it across bettors and periods.

use crate::base::{Number, PeriodKey, Username};
use crate::bet::BetEntry;
use crate::error::BetError;
use crate::settlement::{settle_bettor, CommissionTerms, SettlementSheet};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct BookData {
    /// Aggregate stake per number for the open betting window.
    ledger: BTreeMap<Number, i64>,
    /// Ordered entry history keyed by bettor and period.
    entries: BTreeMap<(Username, PeriodKey), Vec<BetEntry>>,
    /// Explicit open/closed flag per period; absent means closed.
    periods: BTreeMap<PeriodKey, bool>,
    /// Per-bettor settlement terms.
    terms: BTreeMap<Username, CommissionTerms>,
    power_number: Option<Number>,
    break_limit: Option<i64>,
}

impl BookData {
    /// Adds `amount` (possibly negative) to a number's aggregate, removing
    /// the key when the result is no longer positive.
    fn credit(&mut self, number: Number, amount: i64) {
        let total = self.ledger.entry(number).or_insert(0);
        *total += amount;
        if *total <= 0 {
            self.ledger.remove(&number);
        }
    }

    /// Applies entries to ledger and history together. Callers have already
    /// validated; this cannot fail.
    fn record(&mut self, bettor: &Username, period: PeriodKey, entries: &[BetEntry]) {
        let list = self.entries.entry((bettor.clone(), period)).or_default();
        list.extend_from_slice(entries);
        for entry in entries {
            self.credit(entry.number, entry.amount);
        }
    }
}

/// The combined ledger and history state, safe to share across threads.
pub struct Book {
    inner: Mutex<BookData>,
}

impl Book {
    pub fn new() -> Self {
        Book { inner: Mutex::new(BookData::default()) }
    }

    // === Period control ===

    pub fn open_period(&self, period: PeriodKey) {
        self.inner.lock().periods.insert(period, true);
    }

    pub fn close_period(&self, period: PeriodKey) {
        self.inner.lock().periods.insert(period, false);
    }

    /// Whether new bets may be recorded for `period`. Unknown periods are
    /// closed.
    pub fn is_open(&self, period: PeriodKey) -> bool {
        self.inner.lock().periods.get(&period).copied().unwrap_or(false)
    }

    // === Batch application ===

    /// Records a batch for a bettor: every entry lands in both the ledger
    /// and the bettor's history, atomically.
    ///
    /// # Errors
    ///
    /// [`BetError::PeriodClosed`] if the period is not open; nothing is
    /// recorded.
    pub fn apply(
        &self,
        bettor: &Username,
        period: PeriodKey,
        entries: &[BetEntry],
    ) -> Result<(), BetError> {
        let mut data = self.inner.lock();
        if !data.periods.get(&period).copied().unwrap_or(false) {
            return Err(BetError::PeriodClosed);
        }
        data.record(bettor, period, entries);
        Ok(())
    }

    /// Reverses a previously applied batch: removes each entry from the
    /// bettor's history (first exact `(number, amount)` match in insertion
    /// order, duplicates in the batch claiming successive occurrences) and
    /// subtracts it from the ledger.
    ///
    /// # Errors
    ///
    /// [`BetError::NotFound`] if any entry has no remaining match; the book
    /// is left untouched in that case.
    pub fn reverse(
        &self,
        bettor: &Username,
        period: PeriodKey,
        entries: &[BetEntry],
    ) -> Result<(), BetError> {
        let mut data = self.inner.lock();
        let key = (bettor.clone(), period);
        let list = data.entries.get(&key).ok_or(BetError::NotFound)?;

        // Validate the full multiset before touching anything.
        let mut claimed: Vec<usize> = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut found = None;
            for (index, existing) in list.iter().enumerate() {
                if existing == entry && !claimed.contains(&index) {
                    found = Some(index);
                    break;
                }
            }
            match found {
                Some(index) => claimed.push(index),
                None => return Err(BetError::NotFound),
            }
        }

        let list = data.entries.get_mut(&key).expect("validated above");
        claimed.sort_unstable();
        for &index in claimed.iter().rev() {
            list.remove(index);
        }
        if data.entries.get(&key).is_some_and(|l| l.is_empty()) {
            data.entries.remove(&key);
        }
        for entry in entries {
            data.credit(entry.number, -entry.amount);
        }
        Ok(())
    }

    // === Operator settings ===

    pub fn set_power_number(&self, number: Number) {
        self.inner.lock().power_number = Some(number);
    }

    pub fn power_number(&self) -> Option<Number> {
        self.inner.lock().power_number
    }

    pub fn set_break_limit(&self, limit: i64) {
        self.inner.lock().break_limit = Some(limit);
    }

    pub fn break_limit(&self) -> Option<i64> {
        self.inner.lock().break_limit
    }

    pub fn set_terms(&self, bettor: Username, terms: CommissionTerms) {
        self.inner.lock().terms.insert(bettor, terms);
    }

    pub fn terms(&self, bettor: &Username) -> CommissionTerms {
        self.inner.lock().terms.get(bettor).copied().unwrap_or_default()
    }

    // === Limit enforcement ===

    /// Numbers whose aggregate exceeds the break limit, mapped to the excess.
    ///
    /// # Errors
    ///
    /// [`BetError::LimitNotSet`] when no break limit has been set.
    pub fn overage(&self) -> Result<BTreeMap<Number, i64>, BetError> {
        let data = self.inner.lock();
        let limit = data.break_limit.ok_or(BetError::LimitNotSet)?;
        Ok(data
            .ledger
            .iter()
            .filter(|&(_, &amount)| amount > limit)
            .map(|(&number, &amount)| (number, amount - limit))
            .collect())
    }

    /// Applies a confirmed overbuy selection: for each `(number, overage)`,
    /// appends `(number, -overage)` to the carrier's history for `period`
    /// and subtracts the overage from the ledger. Returns the compensating
    /// entries in application order.
    ///
    /// Overbuy bypasses the period-open gate: it is operator bookkeeping,
    /// not a new bet.
    pub fn apply_overbuy(
        &self,
        carrier: &Username,
        period: PeriodKey,
        selection: &BTreeMap<Number, i64>,
    ) -> Vec<BetEntry> {
        let compensating: Vec<BetEntry> = selection
            .iter()
            .map(|(&number, &overage)| BetEntry::new(number, -overage))
            .collect();
        let mut data = self.inner.lock();
        data.record(carrier, period, &compensating);
        compensating
    }

    // === Reporting ===

    /// The current number aggregates, sorted by number.
    pub fn ledger_snapshot(&self) -> BTreeMap<Number, i64> {
        self.inner.lock().ledger.clone()
    }

    /// All bettors with retained entries, sorted, deduplicated.
    pub fn bettors(&self) -> Vec<Username> {
        let data = self.inner.lock();
        let mut names: Vec<Username> = Vec::new();
        for (bettor, _) in data.entries.keys() {
            if names.last() != Some(bettor) {
                names.push(bettor.clone());
            }
        }
        names
    }

    /// One bettor's history grouped by period, or `None` if they have no
    /// retained entries.
    pub fn history(&self, bettor: &Username) -> Option<BTreeMap<PeriodKey, Vec<BetEntry>>> {
        let data = self.inner.lock();
        let mut grouped: BTreeMap<PeriodKey, Vec<BetEntry>> = BTreeMap::new();
        for ((name, period), list) in &data.entries {
            if name == bettor {
                grouped.insert(*period, list.clone());
            }
        }
        (!grouped.is_empty()).then_some(grouped)
    }

    /// Per-bettor stake on the power number, restricted to positive totals.
    ///
    /// # Errors
    ///
    /// [`BetError::PowerNumberNotSet`] when no power number has been chosen.
    pub fn power_stakes(&self) -> Result<Vec<(Username, i64)>, BetError> {
        let data = self.inner.lock();
        let power = data.power_number.ok_or(BetError::PowerNumberNotSet)?;
        let mut totals: BTreeMap<&Username, i64> = BTreeMap::new();
        for ((bettor, _), list) in &data.entries {
            let staked: i64 = list.iter().filter(|e| e.number == power).map(|e| e.amount).sum();
            *totals.entry(bettor).or_default() += staked;
        }
        Ok(totals
            .into_iter()
            .filter(|(_, total)| *total > 0)
            .map(|(bettor, total)| (bettor.clone(), total))
            .collect())
    }

    /// Settles every bettor with retained entries against the power number.
    ///
    /// Compensating overbuy entries carry negative amounts and therefore
    /// reduce the carrier's apparent stake; that is the intended carrying
    /// convention, not an accident.
    ///
    /// # Errors
    ///
    /// [`BetError::PowerNumberNotSet`] when no power number has been chosen.
    pub fn settle(&self) -> Result<SettlementSheet, BetError> {
        let data = self.inner.lock();
        let power = data.power_number.ok_or(BetError::PowerNumberNotSet)?;
        let mut totals: BTreeMap<&Username, (i64, i64)> = BTreeMap::new();
        for ((bettor, _), list) in &data.entries {
            let slot = totals.entry(bettor).or_default();
            for entry in list {
                slot.0 += entry.amount;
                if entry.number == power {
                    slot.1 += entry.amount;
                }
            }
        }
        let reports: Vec<_> = totals
            .into_iter()
            .map(|(bettor, (total_staked, power_staked))| {
                let terms = data.terms.get(bettor).copied().unwrap_or_default();
                settle_bettor(bettor.clone(), total_staked, power_staked, terms)
            })
            .collect();
        let total_net = reports.iter().map(|r| r.net).sum();
        Ok(SettlementSheet { power_number: power, reports, total_net })
    }

    /// Clears ledger, histories, terms, period flags, and the break limit.
    /// The power number survives a reset, matching the operator workflow of
    /// settling one draw and immediately opening the next.
    pub fn reset(&self) {
        let mut data = self.inner.lock();
        data.ledger.clear();
        data.entries.clear();
        data.terms.clear();
        data.periods.clear();
        data.break_limit = None;
    }
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::base::Session;

    fn n(v: u8) -> Number {
        Number::new(v).unwrap()
    }

    fn period() -> PeriodKey {
        PeriodKey::new(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(), Session::Am)
    }

    fn open_book() -> Book {
        let book = Book::new();
        book.open_period(period());
        book
    }

    #[test]
    fn closed_period_rejects_bets() {
        let book = Book::new();
        let result = book.apply(&"u".into(), period(), &[BetEntry::new(n(12), 500)]);
        assert_eq!(result, Err(BetError::PeriodClosed));
        assert!(book.ledger_snapshot().is_empty());
    }

    #[test]
    fn apply_updates_ledger_and_history() {
        let book = open_book();
        book.apply(
            &"u".into(),
            period(),
            &[BetEntry::new(n(12), 500), BetEntry::new(n(12), 300)],
        )
        .unwrap();
        assert_eq!(book.ledger_snapshot().get(&n(12)), Some(&800));
        let history = book.history(&"u".into()).unwrap();
        assert_eq!(history.get(&period()).unwrap().len(), 2);
    }

    #[test]
    fn reverse_restores_prior_state() {
        let book = open_book();
        let batch = [BetEntry::new(n(12), 500), BetEntry::new(n(34), 200)];
        book.apply(&"u".into(), period(), &batch).unwrap();
        book.reverse(&"u".into(), period(), &batch).unwrap();
        assert!(book.ledger_snapshot().is_empty());
        assert!(book.history(&"u".into()).is_none());
        assert!(book.bettors().is_empty());
    }

    #[test]
    fn reverse_removes_first_match_only() {
        let book = open_book();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(12), 500)]).unwrap();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(12), 500)]).unwrap();
        book.reverse(&"u".into(), period(), &[BetEntry::new(n(12), 500)]).unwrap();
        assert_eq!(book.ledger_snapshot().get(&n(12)), Some(&500));
        let history = book.history(&"u".into()).unwrap();
        assert_eq!(history.get(&period()).unwrap().len(), 1);
    }

    #[test]
    fn reverse_with_missing_entry_is_all_or_nothing() {
        let book = open_book();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(12), 500)]).unwrap();
        let result = book.reverse(
            &"u".into(),
            period(),
            &[BetEntry::new(n(12), 500), BetEntry::new(n(34), 200)],
        );
        assert_eq!(result, Err(BetError::NotFound));
        // nothing was removed
        assert_eq!(book.ledger_snapshot().get(&n(12)), Some(&500));
        assert_eq!(book.history(&"u".into()).unwrap().get(&period()).unwrap().len(), 1);
    }

    #[test]
    fn reverse_duplicate_entries_claims_two_occurrences() {
        let book = open_book();
        let batch = [BetEntry::new(n(7), 100), BetEntry::new(n(7), 100)];
        book.apply(&"u".into(), period(), &batch).unwrap();
        book.reverse(&"u".into(), period(), &batch).unwrap();
        assert!(book.ledger_snapshot().is_empty());
    }

    #[test]
    fn ledger_key_removed_at_zero_or_below() {
        let book = open_book();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(5), 100)]).unwrap();
        let selection = BTreeMap::from([(n(5), 100)]);
        book.apply_overbuy(&"carrier".into(), period(), &selection);
        assert!(!book.ledger_snapshot().contains_key(&n(5)));
    }

    #[test]
    fn overage_requires_limit() {
        let book = open_book();
        assert_eq!(book.overage(), Err(BetError::LimitNotSet));
    }

    #[test]
    fn overage_reports_excess_only() {
        let book = open_book();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(23), 7_000)]).unwrap();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(40), 5_000)]).unwrap();
        book.set_break_limit(5_000);
        let overage = book.overage().unwrap();
        assert_eq!(overage, BTreeMap::from([(n(23), 2_000)]));
    }

    #[test]
    fn overbuy_confirmation_leaves_limit_on_the_ledger() {
        // 7000 staked against a 5000 limit: carrier takes -2000, the
        // ledger keeps 5000
        let book = open_book();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(23), 7_000)]).unwrap();
        book.set_break_limit(5_000);
        let overage = book.overage().unwrap();
        let entries = book.apply_overbuy(&"x".into(), period(), &overage);
        assert_eq!(entries, vec![BetEntry::new(n(23), -2_000)]);
        assert_eq!(book.ledger_snapshot().get(&n(23)), Some(&5_000));
        let history = book.history(&"x".into()).unwrap();
        assert_eq!(history.get(&period()).unwrap(), &vec![BetEntry::new(n(23), -2_000)]);
    }

    #[test]
    fn settle_requires_power_number() {
        let book = open_book();
        assert_eq!(book.settle().unwrap_err(), BetError::PowerNumberNotSet);
    }

    #[test]
    fn settle_per_bettor_and_aggregate() {
        let book = open_book();
        book.apply(&"a".into(), period(), &[BetEntry::new(n(15), 1_000)]).unwrap();
        book.apply(&"b".into(), period(), &[BetEntry::new(n(20), 2_000)]).unwrap();
        book.set_power_number(n(15));
        book.set_terms("a".into(), CommissionTerms::new(10, 80).unwrap());

        let sheet = book.settle().unwrap();
        assert_eq!(sheet.reports.len(), 2);
        let a = &sheet.reports[0];
        assert_eq!(a.commission, 100);
        assert_eq!(a.payout, 80_000);
        assert_eq!(a.net, 900 - 80_000);
        let b = &sheet.reports[1];
        assert_eq!(b.net, 2_000);
        assert_eq!(sheet.total_net, a.net + b.net);
    }

    #[test]
    fn power_stakes_skips_non_positive_totals() {
        let book = open_book();
        book.apply(&"a".into(), period(), &[BetEntry::new(n(15), 700)]).unwrap();
        book.apply(&"b".into(), period(), &[BetEntry::new(n(16), 700)]).unwrap();
        book.set_power_number(n(15));
        let stakes = book.power_stakes().unwrap();
        assert_eq!(stakes, vec![("a".into(), 700)]);
    }

    #[test]
    fn reset_clears_state_but_keeps_power_number() {
        let book = open_book();
        book.apply(&"u".into(), period(), &[BetEntry::new(n(1), 100)]).unwrap();
        book.set_break_limit(5_000);
        book.set_power_number(n(42));
        book.reset();
        assert!(book.ledger_snapshot().is_empty());
        assert!(book.bettors().is_empty());
        assert_eq!(book.break_limit(), None);
        assert!(!book.is_open(period()));
        assert_eq!(book.power_number(), Some(n(42)));
    }
}
