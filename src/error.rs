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

//! Error types for bet processing.
//!
//! Every variant is a recoverable, user-facing outcome. No operation that
//! fails with one of these leaves the ledger and the per-user histories in
//! divergent states: validation always completes before mutation begins.

use thiserror::Error;

/// Bet processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BetError {
    /// Message contains a forbidden character; rejected before parsing.
    #[error("message contains forbidden characters (% & * $)")]
    InputRejected,

    /// The grammar matched no bets in the message.
    #[error("no bets recognized in message")]
    ParseEmpty,

    /// The addressed period is not open for new bets.
    #[error("betting is closed for this period")]
    PeriodClosed,

    /// Privileged operation attempted by a non-privileged actor.
    #[error("operator privileges required")]
    NotAuthorized,

    /// Undo target, bettor, or named settlement subject does not exist.
    #[error("no matching record found")]
    NotFound,

    /// A bet message arrived without a usable bettor handle.
    #[error("a username is required to place bets")]
    MissingUsername,

    /// Overbuy or limit operation attempted before a break limit exists.
    #[error("break limit is not set")]
    LimitNotSet,

    /// Settlement attempted before a power number was chosen.
    #[error("power number is not set")]
    PowerNumberNotSet,

    /// Overbuy confirmation with nothing selected.
    #[error("no numbers selected")]
    EmptySelection,

    /// A batch for this (actor, message) pair was already recorded.
    #[error("a ticket for this message already exists")]
    DuplicateTicket,

    /// A number outside `[0, 99]` was supplied to an operator command.
    #[error("number out of range (0-99)")]
    InvalidNumber,

    /// Commission terms outside `0..=100` percent or a negative multiplier.
    #[error("invalid commission terms (expected e.g. 15/80)")]
    InvalidTerms,
}
