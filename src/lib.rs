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

//! A bet-tracking engine for two-digit lottery books.
//!
//! `betbook` parses free-form bet messages into entries, records them on a
//! shared ledger with per-bettor histories, enforces a per-number exposure
//! limit through operator-driven overbuy, and settles every bettor against
//! the winning "power" number.
//!
//! # Core Components
//!
//! - [`parser`]: the bet-message grammar; turns one message into a
//!   [`BetBatch`] of `(number, amount)` entries.
//! - [`Book`]: the ledger, histories, period flags, and operator settings,
//!   behind a single mutex.
//! - [`OverbuyDesk`]: per-operator selection sessions for moving over-limit
//!   exposure to a carrier.
//! - [`TicketStore`]: applied batches keyed by originating message, for undo.
//! - [`BetService`]: command and button-action routing over all of the above,
//!   transport-agnostic.
//!
//! # Example
//!
//! ```
//! use betbook::{Book, PeriodKey, Session, parser};
//! use chrono::NaiveDate;
//!
//! let period = PeriodKey::new(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(), Session::Am);
//! let book = Book::new();
//! book.open_period(period);
//!
//! let batch = parser::parse("12-500 34r300").unwrap();
//! book.apply(&"mg_mg".into(), period, batch.entries()).unwrap();
//! assert_eq!(book.ledger_snapshot().len(), 3); // 12, 34, 43
//! ```
//!
//! # Thread Safety
//!
//! Every shared structure is internally synchronized: [`Book`] serializes
//! all betting state behind one `parking_lot` mutex, while [`TicketStore`]
//! and [`OverbuyDesk`] use sharded concurrent maps. Hosts can drive the
//! engine from as many threads as they like.

pub mod auth;
pub mod base;
pub mod bet;
pub mod book;
pub mod clock;
pub mod error;
pub mod overbuy;
pub mod parser;
pub mod service;
pub mod settlement;
pub mod ticket;

pub use auth::{Authorizer, SingleAdmin};
pub use base::{ActorId, MessageId, Number, PeriodKey, Session, Username};
pub use bet::{BetBatch, BetEntry};
pub use book::Book;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::BetError;
pub use overbuy::{OverbuyDesk, OverbuyRow, OverbuyView};
pub use service::{Action, ActionEvent, BetService, Outbound, TextEvent};
pub use settlement::{CommissionTerms, SettlementReport, SettlementSheet};
pub use ticket::{Ticket, TicketStore};
