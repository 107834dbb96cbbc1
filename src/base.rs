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

//! Core identifier and value types for bettors, messages, and betting periods.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A two-digit lottery number in `[0, 99]`.
///
/// Always rendered zero-padded (`5` displays as `05`). Construction is
/// checked; a `Number` in hand is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Number(u8);

impl Number {
    /// Creates a number, returning `None` if `value > 99`.
    pub fn new(value: u8) -> Option<Self> {
        (value <= 99).then_some(Number(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// The "reverse" of a number: its zero-padded two-digit rendering with
    /// the digits swapped, e.g. `05 -> 50`, `37 -> 73`, `22 -> 22`.
    pub fn reverse(self) -> Self {
        Number((self.0 % 10) * 10 + self.0 / 10)
    }

    /// The tens digit of the zero-padded rendering.
    pub fn tens(self) -> u8 {
        self.0 / 10
    }

    /// The units digit of the zero-padded rendering.
    pub fn units(self) -> u8 {
        self.0 % 10
    }

    /// Iterator over all one hundred numbers, in order.
    pub fn all() -> impl Iterator<Item = Number> {
        (0..=99).map(Number)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Transport-level identity of a chat participant.
///
/// Distinct from [`Username`]: the actor id identifies who is pressing
/// buttons and issuing commands; the username keys the betting history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an inbound message, used to correlate a bet batch with the
/// message that produced it (for undo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle a bettor's history is recorded under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(name: impl Into<String>) -> Self {
        Username(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(name: &str) -> Self {
        Username(name.to_owned())
    }
}

/// Half-day session of a betting period. The boundary is local noon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Session {
    Am,
    Pm,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Session::Am => "AM",
            Session::Pm => "PM",
        })
    }
}

/// A betting period: one half-day window, independently opened and closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct PeriodKey {
    pub date: NaiveDate,
    pub session: Session,
}

impl PeriodKey {
    pub fn new(date: NaiveDate, session: Session) -> Self {
        PeriodKey { date, session }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%d/%m/%Y"), self.session)
    }
}
