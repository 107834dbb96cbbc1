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

//! Settlement arithmetic.
//!
//! Computes each bettor's commission, payout, and net position against the
//! power number. All arithmetic is integer floor arithmetic; totals can be
//! negative when compensating overbuy entries dominate a history, so floor
//! division (`div_euclid`) is used rather than truncation.

use crate::base::{Number, Username};
use crate::error::BetError;
use serde::Serialize;

/// Per-bettor settlement terms.
///
/// `percent` is the commission share of total stake retained by the house;
/// `multiplier` is the payback applied to stake on the power number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommissionTerms {
    pub percent: u8,
    pub multiplier: i64,
}

impl CommissionTerms {
    /// Validates `0 <= percent <= 100` and `multiplier >= 0`.
    pub fn new(percent: i64, multiplier: i64) -> Result<Self, BetError> {
        if !(0..=100).contains(&percent) || multiplier < 0 {
            return Err(BetError::InvalidTerms);
        }
        Ok(CommissionTerms { percent: percent as u8, multiplier })
    }
}

impl Default for CommissionTerms {
    /// No commission, no payback. Bettors without recorded terms settle flat.
    fn default() -> Self {
        CommissionTerms { percent: 0, multiplier: 0 }
    }
}

/// One bettor's settled position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub bettor: Username,
    pub total_staked: i64,
    pub commission_percent: u8,
    pub commission: i64,
    pub after_commission: i64,
    pub power_staked: i64,
    pub payback_multiplier: i64,
    pub payout: i64,
    /// Negative means the house owes the bettor.
    pub net: i64,
}

impl SettlementReport {
    pub fn house_owes(&self) -> bool {
        self.net < 0
    }
}

/// Settlement of every bettor with recorded entries, plus the aggregate net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementSheet {
    pub power_number: Number,
    pub reports: Vec<SettlementReport>,
    pub total_net: i64,
}

/// Settles one bettor.
///
/// `commission = floor(total_staked * percent / 100)`,
/// `payout = power_staked * multiplier`,
/// `net = (total_staked - commission) - payout`.
pub fn settle_bettor(
    bettor: Username,
    total_staked: i64,
    power_staked: i64,
    terms: CommissionTerms,
) -> SettlementReport {
    let commission = (total_staked * i64::from(terms.percent)).div_euclid(100);
    let after_commission = total_staked - commission;
    let payout = power_staked * terms.multiplier;
    let net = after_commission - payout;
    SettlementReport {
        bettor,
        total_staked,
        commission_percent: terms.percent,
        commission,
        after_commission,
        power_staked,
        payback_multiplier: terms.multiplier,
        payout,
        net,
    }
}
