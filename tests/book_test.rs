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

//! Book public API integration tests.

use betbook::{BetEntry, Book, CommissionTerms, Number, PeriodKey, Session, Username, parser};
use chrono::NaiveDate;
use std::collections::BTreeMap;

fn n(v: u8) -> Number {
    Number::new(v).unwrap()
}

fn am(day: u32) -> PeriodKey {
    PeriodKey::new(NaiveDate::from_ymd_opt(2025, 3, day).unwrap(), Session::Am)
}

fn pm(day: u32) -> PeriodKey {
    PeriodKey::new(NaiveDate::from_ymd_opt(2025, 3, day).unwrap(), Session::Pm)
}

/// Asserts the ledger equals the positive per-number sums over all retained
/// entries, and that nothing non-positive is on the ledger.
fn assert_reconciled(book: &Book) {
    let mut computed: BTreeMap<Number, i64> = BTreeMap::new();
    for bettor in book.bettors() {
        for (_, entries) in book.history(&bettor).unwrap() {
            for entry in entries {
                *computed.entry(entry.number).or_default() += entry.amount;
            }
        }
    }
    computed.retain(|_, total| *total > 0);
    assert_eq!(book.ledger_snapshot(), computed);
}

#[test]
fn periods_open_and_close_independently() {
    let book = Book::new();
    book.open_period(am(7));
    book.open_period(pm(7));
    book.close_period(am(7));

    assert!(!book.is_open(am(7)));
    assert!(book.is_open(pm(7)));
    assert!(!book.is_open(am(8)));

    let entry = [BetEntry::new(n(12), 500)];
    assert!(book.apply(&"u".into(), am(7), &entry).is_err());
    assert!(book.apply(&"u".into(), pm(7), &entry).is_ok());
}

#[test]
fn histories_are_kept_per_period() {
    let book = Book::new();
    book.open_period(am(7));
    book.open_period(pm(7));
    book.apply(&"u".into(), am(7), &[BetEntry::new(n(12), 500)]).unwrap();
    book.apply(&"u".into(), pm(7), &[BetEntry::new(n(12), 300)]).unwrap();

    let history = book.history(&"u".into()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[&am(7)], vec![BetEntry::new(n(12), 500)]);
    assert_eq!(history[&pm(7)], vec![BetEntry::new(n(12), 300)]);
    assert_eq!(book.ledger_snapshot()[&n(12)], 800);
    assert_reconciled(&book);
}

#[test]
fn parsed_batches_flow_through_the_book() {
    let book = Book::new();
    book.open_period(am(7));

    let batch = parser::parse("123 45-1000 67r500").unwrap();
    book.apply(&"mg_mg".into(), am(7), batch.entries()).unwrap();

    let snapshot = book.ledger_snapshot();
    // "123" is the pair 12 with amount 3000 by the triple-digit shorthand
    assert_eq!(snapshot[&n(12)], 3_000);
    assert_eq!(snapshot[&n(45)], 1_000);
    assert_eq!(snapshot[&n(67)], 500);
    assert_eq!(snapshot[&n(76)], 500);
    assert_reconciled(&book);
}

#[test]
fn reverse_after_overbuy_still_reconciles() {
    let book = Book::new();
    book.open_period(am(7));
    let batch = [BetEntry::new(n(23), 7_000)];
    book.apply(&"u".into(), am(7), &batch).unwrap();
    book.set_break_limit(5_000);

    let overage = book.overage().unwrap();
    book.apply_overbuy(&"carrier".into(), am(7), &overage);
    assert_reconciled(&book);

    // the original bet can still be reversed; the ledger goes negative on 23
    // and the key disappears
    book.reverse(&"u".into(), am(7), &batch).unwrap();
    assert!(!book.ledger_snapshot().contains_key(&n(23)));
    assert_reconciled(&book);
}

#[test]
fn settlement_covers_all_periods_of_a_bettor() {
    let book = Book::new();
    book.open_period(am(7));
    book.open_period(pm(7));
    book.apply(&"a".into(), am(7), &[BetEntry::new(n(15), 4_000)]).unwrap();
    book.apply(&"a".into(), pm(7), &[BetEntry::new(n(15), 6_000), BetEntry::new(n(20), 0)])
        .unwrap();
    book.set_power_number(n(15));
    book.set_terms("a".into(), CommissionTerms::new(15, 80).unwrap());

    let sheet = book.settle().unwrap();
    assert_eq!(sheet.reports.len(), 1);
    let report = &sheet.reports[0];
    assert_eq!(report.total_staked, 10_000);
    assert_eq!(report.power_staked, 10_000);
    assert_eq!(report.commission, 1_500);
    assert_eq!(report.payout, 800_000);
    assert_eq!(report.net, 8_500 - 800_000);
    assert!(report.house_owes());
    assert_eq!(sheet.total_net, report.net);
}

#[test]
fn carrier_with_only_negative_entries_settles_negative() {
    let book = Book::new();
    book.open_period(am(7));
    book.apply(&"u".into(), am(7), &[BetEntry::new(n(23), 7_000)]).unwrap();
    book.set_break_limit(5_000);
    let overage = book.overage().unwrap();
    book.apply_overbuy(&"carrier".into(), am(7), &overage);
    book.set_power_number(n(50));

    let sheet = book.settle().unwrap();
    let carrier = sheet
        .reports
        .iter()
        .find(|r| r.bettor == Username::new("carrier"))
        .unwrap();
    assert_eq!(carrier.total_staked, -2_000);
    assert_eq!(carrier.net, -2_000);
}

#[test]
fn concurrent_applies_agree_with_the_ledger() {
    let book = Book::new();
    book.open_period(am(7));

    crossbeam::thread::scope(|s| {
        for worker in 0..8 {
            let book = &book;
            s.spawn(move |_| {
                let bettor = Username::new(format!("user{worker}"));
                for _ in 0..50 {
                    let batch = parser::parse("12-100 34r50").unwrap();
                    book.apply(&bettor, am(7), batch.entries()).unwrap();
                }
            });
        }
    })
    .unwrap();

    let snapshot = book.ledger_snapshot();
    assert_eq!(snapshot[&n(12)], 8 * 50 * 100);
    assert_eq!(snapshot[&n(34)], 8 * 50 * 50);
    assert_eq!(snapshot[&n(43)], 8 * 50 * 50);
    assert_reconciled(&book);
}

#[test]
fn concurrent_apply_and_reverse_never_lose_entries() {
    let book = Book::new();
    book.open_period(am(7));
    let batch = [BetEntry::new(n(7), 100)];

    // seed entries, then race reversals against fresh applies
    for _ in 0..100 {
        book.apply(&"u".into(), am(7), &batch).unwrap();
    }
    crossbeam::thread::scope(|s| {
        let book = &book;
        let batch = &batch;
        s.spawn(move |_| {
            for _ in 0..100 {
                book.reverse(&"u".into(), am(7), batch).unwrap();
            }
        });
        s.spawn(move |_| {
            for _ in 0..100 {
                book.apply(&"u".into(), am(7), batch).unwrap();
            }
        });
    })
    .unwrap();

    assert_eq!(book.ledger_snapshot()[&n(7)], 100 * 100);
    assert_reconciled(&book);
}
