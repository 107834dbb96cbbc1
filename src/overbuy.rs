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

//! Overbuy selection sessions.
//!
//! When numbers exceed the break limit, an operator opens a session naming a
//! carrier, toggles a subset of the over-limit numbers, and confirms. The
//! confirmation applies compensating negative entries to the carrier's
//! history and subtracts the overage from the ledger, atomically.
//!
//! Sessions are keyed by the acting operator, so concurrent operators cannot
//! clobber each other's in-progress selection. A session is cleared on
//! confirm and can be replaced at any time by opening a new one.

use crate::base::{ActorId, Number, PeriodKey, Username};
use crate::bet::BetEntry;
use crate::book::Book;
use crate::error::BetError;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// One in-progress selection, owned by a single operator.
#[derive(Debug, Clone)]
struct OverbuySession {
    carrier: Username,
    selection: BTreeMap<Number, i64>,
}

/// Rendered state of a session: every currently over-limit number with its
/// overage and whether the operator has it selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverbuyView {
    pub carrier: Username,
    pub limit: i64,
    pub rows: Vec<OverbuyRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverbuyRow {
    pub number: Number,
    pub overage: i64,
    pub selected: bool,
}

/// Per-operator overbuy sessions.
pub struct OverbuyDesk {
    sessions: DashMap<ActorId, OverbuySession>,
}

impl OverbuyDesk {
    pub fn new() -> Self {
        OverbuyDesk { sessions: DashMap::new() }
    }

    /// Opens a session for `operator` targeting `carrier`, with every
    /// over-limit number preselected.
    ///
    /// # Errors
    ///
    /// - [`BetError::LimitNotSet`] when no break limit exists.
    /// - [`BetError::NotFound`] when no number exceeds the limit; no session
    ///   is created.
    pub fn open(
        &self,
        operator: ActorId,
        carrier: Username,
        book: &Book,
    ) -> Result<OverbuyView, BetError> {
        let overage = book.overage()?;
        if overage.is_empty() {
            return Err(BetError::NotFound);
        }
        let session = OverbuySession { carrier, selection: overage };
        let view = self.render(&session, book)?;
        self.sessions.insert(operator, session);
        Ok(view)
    }

    /// Toggles one number in the operator's selection.
    ///
    /// # Errors
    ///
    /// [`BetError::NotFound`] if the operator has no session, or the number
    /// is not currently over the limit when selecting it.
    pub fn toggle(
        &self,
        operator: ActorId,
        number: Number,
        book: &Book,
    ) -> Result<OverbuyView, BetError> {
        let mut session = self.sessions.get_mut(&operator).ok_or(BetError::NotFound)?;
        if session.selection.remove(&number).is_none() {
            let overage = book.overage()?;
            let amount = overage.get(&number).copied().ok_or(BetError::NotFound)?;
            session.selection.insert(number, amount);
        }
        self.render(&session, book)
    }

    /// Selects every currently over-limit number.
    pub fn select_all(&self, operator: ActorId, book: &Book) -> Result<OverbuyView, BetError> {
        let mut session = self.sessions.get_mut(&operator).ok_or(BetError::NotFound)?;
        session.selection = book.overage()?;
        self.render(&session, book)
    }

    /// Clears the operator's selection without closing the session.
    pub fn unselect_all(&self, operator: ActorId, book: &Book) -> Result<OverbuyView, BetError> {
        let mut session = self.sessions.get_mut(&operator).ok_or(BetError::NotFound)?;
        session.selection.clear();
        self.render(&session, book)
    }

    /// Confirms the selection: applies the compensating batch to the book
    /// for `period` and removes the session.
    ///
    /// # Errors
    ///
    /// - [`BetError::NotFound`] if the operator has no session.
    /// - [`BetError::EmptySelection`] if nothing is selected; the session is
    ///   kept so the operator can select and retry.
    pub fn confirm(
        &self,
        operator: ActorId,
        period: PeriodKey,
        book: &Book,
    ) -> Result<(Username, Vec<BetEntry>), BetError> {
        {
            let session = self.sessions.get(&operator).ok_or(BetError::NotFound)?;
            if session.selection.is_empty() {
                return Err(BetError::EmptySelection);
            }
        }
        let (_, session) = self.sessions.remove(&operator).ok_or(BetError::NotFound)?;
        let entries = book.apply_overbuy(&session.carrier, period, &session.selection);
        Ok((session.carrier, entries))
    }

    /// Drops every in-progress session (used on full reset).
    pub fn clear(&self) {
        self.sessions.clear();
    }

    fn render(&self, session: &OverbuySession, book: &Book) -> Result<OverbuyView, BetError> {
        let limit = book.break_limit().ok_or(BetError::LimitNotSet)?;
        let rows = book
            .overage()?
            .into_iter()
            .map(|(number, overage)| OverbuyRow {
                number,
                overage,
                selected: session.selection.contains_key(&number),
            })
            .collect();
        Ok(OverbuyView { carrier: session.carrier.clone(), limit, rows })
    }
}

impl Default for OverbuyDesk {
    fn default() -> Self {
        Self::new()
    }
}
