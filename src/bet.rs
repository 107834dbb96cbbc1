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

//! Bet entries and batches.
//!
//! A [`BetEntry`] is the atomic wager unit. A [`BetBatch`] is the ordered
//! result of parsing one message; its entries are applied to the book as a
//! single unit and reversed as a single unit.

use crate::base::Number;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One wager: a two-digit number and a stake.
///
/// The amount is strictly positive for ordinary bets. Compensating overbuy
/// entries are the only negative-amount entries in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BetEntry {
    pub number: Number,
    pub amount: i64,
}

impl BetEntry {
    pub fn new(number: Number, amount: i64) -> Self {
        BetEntry { number, amount }
    }
}

impl fmt::Display for BetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.amount)
    }
}

/// Ordered sequence of entries produced by one successful parse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BetBatch {
    entries: Vec<BetEntry>,
    total_amount: i64,
}

impl BetBatch {
    /// Builds a batch from parsed entries. The total is the sum of absolute
    /// amounts, so compensating entries still count toward volume.
    pub fn new(entries: Vec<BetEntry>) -> Self {
        let total_amount = entries.iter().map(|e| e.amount.abs()).sum();
        BetBatch { entries, total_amount }
    }

    pub fn entries(&self) -> &[BetEntry] {
        &self.entries
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for BetBatch {
    /// One entry per line, the receipt format shown back to the bettor.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        write!(f, "total {}", self.total_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u8) -> Number {
        Number::new(v).unwrap()
    }

    #[test]
    fn entry_display_is_padded_pair() {
        assert_eq!(BetEntry::new(n(7), 300).to_string(), "07-300");
    }

    #[test]
    fn batch_total_sums_absolute_amounts() {
        let batch = BetBatch::new(vec![
            BetEntry::new(n(23), 500),
            BetEntry::new(n(32), -200),
        ]);
        assert_eq!(batch.total_amount(), 700);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn batch_display_lists_entries_then_total() {
        let batch = BetBatch::new(vec![BetEntry::new(n(5), 500), BetEntry::new(n(50), 500)]);
        assert_eq!(batch.to_string(), "05-500\n50-500\ntotal 1000");
    }
}
