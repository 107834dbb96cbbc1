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

//! Authorization collaborator: who is the operator?

use crate::base::ActorId;
use parking_lot::Mutex;

/// Privilege check for operator-only commands.
pub trait Authorizer: Send + Sync {
    fn is_privileged(&self, actor: ActorId) -> bool;
}

/// Single-operator registry: whoever claims it last is the operator.
///
/// Mirrors the claim-on-start workflow of small operator-run books. Explicit
/// object, no process-wide global.
#[derive(Debug, Default)]
pub struct SingleAdmin {
    admin: Mutex<Option<ActorId>>,
}

impl SingleAdmin {
    pub fn new() -> Self {
        SingleAdmin { admin: Mutex::new(None) }
    }

    /// Grants operator privileges to `actor`, replacing any previous holder.
    pub fn claim(&self, actor: ActorId) {
        *self.admin.lock() = Some(actor);
    }

    pub fn current(&self) -> Option<ActorId> {
        *self.admin.lock()
    }
}

impl Authorizer for SingleAdmin {
    fn is_privileged(&self, actor: ActorId) -> bool {
        *self.admin.lock() == Some(actor)
    }
}
