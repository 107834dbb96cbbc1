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

//! Ticket store for undo correlation.
//!
//! Every applied batch is retained as a [`Ticket`] keyed by the originating
//! `(actor, message)` pair. Undo looks the ticket up, reverses it against the
//! book, and removes it, so a message can be undone at most once. The ticket
//! records the bettor and the period the batch was applied to, which makes
//! undo correct even after a session boundary has passed.

use crate::base::{ActorId, MessageId, PeriodKey, Username};
use crate::bet::BetBatch;
use crate::error::BetError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// One applied batch and where it landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub bettor: Username,
    pub period: PeriodKey,
    pub batch: BetBatch,
}

/// Concurrent map of applied batches, keyed by originating message.
#[derive(Debug, Default)]
pub struct TicketStore {
    tickets: DashMap<(ActorId, MessageId), Arc<Ticket>>,
}

impl TicketStore {
    pub fn new() -> Self {
        TicketStore { tickets: DashMap::new() }
    }

    /// Records a ticket.
    ///
    /// # Errors
    ///
    /// [`BetError::DuplicateTicket`] if a ticket for this `(actor, message)`
    /// pair already exists; the existing ticket is untouched.
    pub fn push(
        &self,
        actor: ActorId,
        message: MessageId,
        ticket: Ticket,
    ) -> Result<(), BetError> {
        // entry API for an atomic check-and-insert
        match self.tickets.entry((actor, message)) {
            Entry::Occupied(_) => Err(BetError::DuplicateTicket),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(ticket));
                Ok(())
            }
        }
    }

    /// Looks a ticket up without removing it.
    pub fn get(&self, actor: ActorId, message: MessageId) -> Option<Arc<Ticket>> {
        self.tickets.get(&(actor, message)).map(|t| Arc::clone(&t))
    }

    /// Removes and returns a ticket. A second take of the same key yields
    /// `None`, which undo reports as [`BetError::NotFound`].
    pub fn take(&self, actor: ActorId, message: MessageId) -> Option<Arc<Ticket>> {
        self.tickets.remove(&(actor, message)).map(|(_, t)| t)
    }

    /// Drops every ticket (used on full reset; stale tickets must not
    /// outlive the state they reference).
    pub fn clear(&self) {
        self.tickets.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}
