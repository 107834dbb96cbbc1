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

//! Command service: the transport-facing surface of the engine.
//!
//! Routes inbound text and button-action events to the book, the overbuy
//! desk, and the ticket store, and renders replies. The service performs no
//! I/O: the host feeds it [`TextEvent`] / [`ActionEvent`] values and delivers
//! the returned [`Outbound`] values over whatever chat transport it speaks.
//!
//! Engine errors are rendered as plain text replies; nothing here is fatal.

use crate::auth::{Authorizer, SingleAdmin};
use crate::base::{ActorId, MessageId, Number, Username};
use crate::bet::BetBatch;
use crate::book::Book;
use crate::clock::Clock;
use crate::error::BetError;
use crate::overbuy::{OverbuyDesk, OverbuyView};
use crate::parser;
use crate::settlement::{CommissionTerms, SettlementReport};
use crate::ticket::{Ticket, TicketStore};
use dashmap::DashMap;
use tracing::{debug, info};

/// Inbound free-text message.
#[derive(Debug, Clone)]
pub struct TextEvent {
    pub actor: ActorId,
    /// Bettor handle, if the transport knows one for this actor.
    pub handle: Option<Username>,
    pub message: MessageId,
    pub text: String,
}

/// Inbound button press carrying an opaque action token.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    pub actor: ActorId,
    /// The outbound message the pressed button is attached to.
    pub message: MessageId,
    pub token: String,
}

/// One labeled button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub label: String,
    pub token: String,
}

impl Action {
    fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Action { label: label.into(), token: token.into() }
    }
}

/// Outbound directives for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Plain text reply.
    Text(String),
    /// Text reply with button rows attached.
    Keyboard { text: String, actions: Vec<Vec<Action>> },
    /// Replace the content and buttons of a previously sent message.
    Edit { message: MessageId, text: String, actions: Vec<Vec<Action>> },
}

impl Outbound {
    fn text(s: impl Into<String>) -> Self {
        Outbound::Text(s.into())
    }
}

/// The assembled engine: book, ticket store, overbuy desk, and the pending
/// commission-terms selections, wired to the clock and operator registry.
pub struct BetService<C> {
    book: Book,
    tickets: TicketStore,
    desk: OverbuyDesk,
    /// Operators mid-way through `/comandza`: next text from them is terms.
    pending_terms: DashMap<ActorId, Username>,
    admin: SingleAdmin,
    clock: C,
}

impl<C: Clock> BetService<C> {
    pub fn new(clock: C) -> Self {
        BetService {
            book: Book::new(),
            tickets: TicketStore::new(),
            desk: OverbuyDesk::new(),
            pending_terms: DashMap::new(),
            admin: SingleAdmin::new(),
            clock,
        }
    }

    /// Direct access to the book, for hosts that render their own reports.
    pub fn book(&self) -> &Book {
        &self.book
    }

    /// Handles one inbound text message: a command, a pending terms entry,
    /// or a bet message. Errors come back as text replies.
    pub fn handle_text(&self, event: &TextEvent) -> Vec<Outbound> {
        let result = if event.text.starts_with('/') {
            self.dispatch_command(event)
        } else if self.pending_terms.contains_key(&event.actor) {
            self.enter_terms(event)
        } else {
            self.place_bets(event)
        };
        result.unwrap_or_else(|e| vec![Outbound::text(e.to_string())])
    }

    /// Handles one button press. Errors edit the message into a text notice.
    pub fn handle_action(&self, event: &ActionEvent) -> Vec<Outbound> {
        self.dispatch_action(event).unwrap_or_else(|e| {
            vec![Outbound::Edit { message: event.message, text: e.to_string(), actions: vec![] }]
        })
    }

    // === Commands ===

    fn dispatch_command(&self, event: &TextEvent) -> Result<Vec<Outbound>, BetError> {
        let mut words = event.text.split_whitespace();
        let command = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        match command {
            "/start" => {
                self.admin.claim(event.actor);
                info!(actor = %event.actor, "operator claimed");
                Ok(vec![Outbound::text("operator privileges granted")])
            }
            "/dateopen" => {
                self.require_admin(event.actor)?;
                let period = self.clock.current_period();
                self.book.open_period(period);
                info!(%period, "period opened");
                Ok(vec![Outbound::text(format!("{period} is open for bets"))])
            }
            "/dateclose" => {
                self.require_admin(event.actor)?;
                let period = self.clock.current_period();
                self.book.close_period(period);
                info!(%period, "period closed");
                Ok(vec![Outbound::text(format!("{period} is closed"))])
            }
            "/ledger" => {
                self.require_admin(event.actor)?;
                Ok(vec![Outbound::text(self.render_ledger())])
            }
            "/break" => {
                self.require_admin(event.actor)?;
                self.set_break_limit(args.first().copied())
            }
            "/overbuy" => {
                self.require_admin(event.actor)?;
                let carrier = args.first().ok_or(BetError::MissingUsername)?;
                let view = self.desk.open(event.actor, Username::new(*carrier), &self.book)?;
                Ok(vec![overbuy_keyboard(&view)])
            }
            "/pnumber" => {
                self.require_admin(event.actor)?;
                self.set_power_number(args.first().copied())
            }
            "/comandza" => {
                self.require_admin(event.actor)?;
                let bettors = self.book.bettors();
                if bettors.is_empty() {
                    return Ok(vec![Outbound::text("no bettors recorded yet")]);
                }
                let actions = bettors
                    .iter()
                    .map(|u| vec![Action::new(u.as_str(), format!("comza:{u}"))])
                    .collect();
                Ok(vec![Outbound::Keyboard { text: "choose a bettor".into(), actions }])
            }
            "/total" => {
                self.require_admin(event.actor)?;
                let sheet = self.book.settle()?;
                if sheet.reports.is_empty() {
                    return Ok(vec![Outbound::text("no entries to settle")]);
                }
                let mut lines: Vec<String> = sheet.reports.iter().map(render_settlement).collect();
                let side = if sheet.total_net < 0 { "house owes" } else { "house collects" };
                lines.push(format!("grand net: {} ({side})", sheet.total_net.abs()));
                Ok(vec![Outbound::text(lines.join("\n"))])
            }
            "/tsent" => {
                self.require_admin(event.actor)?;
                let mut replies: Vec<Outbound> = self
                    .book
                    .bettors()
                    .iter()
                    .filter_map(|u| self.render_history(u).map(Outbound::Text))
                    .collect();
                if replies.is_empty() {
                    return Ok(vec![Outbound::text("no bettors recorded yet")]);
                }
                replies.push(Outbound::text("all statements sent"));
                Ok(replies)
            }
            "/alldata" => {
                self.require_admin(event.actor)?;
                let bettors = self.book.bettors();
                if bettors.is_empty() {
                    return Ok(vec![Outbound::text("no bettors recorded yet")]);
                }
                let mut lines = vec!["recorded bettors:".to_string()];
                lines.extend(bettors.iter().map(|u| format!("- {u}")));
                Ok(vec![Outbound::text(lines.join("\n"))])
            }
            "/reset" => {
                self.require_admin(event.actor)?;
                self.book.reset();
                self.tickets.clear();
                self.desk.clear();
                self.pending_terms.clear();
                info!("full reset");
                Ok(vec![Outbound::text("all data cleared")])
            }
            "/posthis" => self.post_history(event, &args),
            _ => Ok(vec![]),
        }
    }

    fn set_break_limit(&self, arg: Option<&str>) -> Result<Vec<Outbound>, BetError> {
        let Some(arg) = arg else {
            let text = match self.book.break_limit() {
                Some(limit) => format!("usage: /break [limit]\ncurrent break limit: {limit}"),
                None => "usage: /break [limit]\nno break limit set".to_string(),
            };
            return Ok(vec![Outbound::text(text)]);
        };
        let Ok(limit) = arg.parse::<i64>() else {
            return Ok(vec![Outbound::text("usage: /break [limit]")]);
        };
        self.book.set_break_limit(limit);
        info!(limit, "break limit set");

        let overage = self.book.overage()?;
        if overage.is_empty() {
            return Ok(vec![Outbound::text(format!(
                "break limit set to {limit}\nno numbers exceed it"
            ))]);
        }
        let mut lines = vec![format!("break limit set to {limit}\nnumbers over the limit:")];
        lines.extend(overage.iter().map(|(n, over)| format!("{n} -> {over}")));
        Ok(vec![Outbound::text(lines.join("\n"))])
    }

    fn set_power_number(&self, arg: Option<&str>) -> Result<Vec<Outbound>, BetError> {
        let Some(arg) = arg else {
            return Ok(vec![Outbound::text("usage: /pnumber [number]")]);
        };
        let number = arg
            .parse::<u8>()
            .ok()
            .and_then(Number::new)
            .ok_or(BetError::InvalidNumber)?;
        self.book.set_power_number(number);
        info!(%number, "power number set");

        let stakes = self.book.power_stakes()?;
        if stakes.is_empty() {
            return Ok(vec![Outbound::text(format!("no bets on {number}"))]);
        }
        let lines: Vec<String> = stakes
            .iter()
            .map(|(bettor, total)| format!("{bettor}: {number} -> {total}"))
            .collect();
        Ok(vec![Outbound::text(lines.join("\n"))])
    }

    fn post_history(&self, event: &TextEvent, args: &[&str]) -> Result<Vec<Outbound>, BetError> {
        let is_admin = self.admin.is_privileged(event.actor);
        if is_admin && args.is_empty() {
            let bettors = self.book.bettors();
            if bettors.is_empty() {
                return Ok(vec![Outbound::text("no bettors recorded yet")]);
            }
            let actions = bettors
                .iter()
                .map(|u| vec![Action::new(u.as_str(), format!("posthis:{u}"))])
                .collect();
            return Ok(vec![Outbound::Keyboard {
                text: "whose record book?".into(),
                actions,
            }]);
        }
        let bettor = if is_admin {
            Username::new(args[0])
        } else {
            event.handle.clone().ok_or(BetError::MissingUsername)?
        };
        let text = self.render_history(&bettor).ok_or(BetError::NotFound)?;
        Ok(vec![Outbound::Text(text)])
    }

    // === Bet placement and terms entry ===

    fn place_bets(&self, event: &TextEvent) -> Result<Vec<Outbound>, BetError> {
        let bettor = event.handle.clone().ok_or(BetError::MissingUsername)?;
        let period = self.clock.current_period();
        if !self.book.is_open(period) {
            return Err(BetError::PeriodClosed);
        }

        let batch = parser::parse(&event.text)?;
        debug!(%bettor, entries = batch.len(), total = batch.total_amount(), "batch parsed");

        // Record the ticket first so a duplicate message cannot apply twice,
        // then apply; a failed apply takes the ticket back out.
        let ticket = Ticket { bettor: bettor.clone(), period, batch: batch.clone() };
        self.tickets.push(event.actor, event.message, ticket)?;
        if let Err(e) = self.book.apply(&bettor, period, batch.entries()) {
            self.tickets.take(event.actor, event.message);
            return Err(e);
        }

        Ok(vec![Outbound::Keyboard {
            text: batch.to_string(),
            actions: vec![vec![delete_button(event.actor, event.message)]],
        }])
    }

    fn enter_terms(&self, event: &TextEvent) -> Result<Vec<Outbound>, BetError> {
        let bettor = self
            .pending_terms
            .get(&event.actor)
            .map(|u| u.clone())
            .ok_or(BetError::NotFound)?;
        let (com, za) = event.text.trim().split_once('/').ok_or(BetError::InvalidTerms)?;
        let percent: i64 = com.trim().parse().map_err(|_| BetError::InvalidTerms)?;
        let multiplier: i64 = za.trim().parse().map_err(|_| BetError::InvalidTerms)?;
        let terms = CommissionTerms::new(percent, multiplier)?;
        // the pending selection survives a malformed entry; only success
        // clears it
        self.book.set_terms(bettor.clone(), terms);
        self.pending_terms.remove(&event.actor);
        info!(%bettor, percent, multiplier, "terms recorded");
        Ok(vec![Outbound::text(format!(
            "com {percent}%, za {multiplier} recorded for {bettor}"
        ))])
    }

    // === Actions ===

    fn dispatch_action(&self, event: &ActionEvent) -> Result<Vec<Outbound>, BetError> {
        let (kind, rest) = match event.token.split_once(':') {
            Some((kind, rest)) => (kind, rest),
            None => (event.token.as_str(), ""),
        };
        match kind {
            "delete" => self.action_delete(event, rest),
            "confirm_delete" => self.action_confirm_delete(event, rest),
            "cancel_delete" => self.action_cancel_delete(event, rest),
            "overbuy_select" => {
                let number = rest
                    .parse::<u8>()
                    .ok()
                    .and_then(Number::new)
                    .ok_or(BetError::InvalidNumber)?;
                let view = self.desk.toggle(event.actor, number, &self.book)?;
                Ok(vec![edit_to_overbuy(event.message, &view)])
            }
            "overbuy_select_all" => {
                let view = self.desk.select_all(event.actor, &self.book)?;
                Ok(vec![edit_to_overbuy(event.message, &view)])
            }
            "overbuy_unselect_all" => {
                let view = self.desk.unselect_all(event.actor, &self.book)?;
                Ok(vec![edit_to_overbuy(event.message, &view)])
            }
            "overbuy_confirm" => {
                let period = self.clock.current_period();
                let (carrier, entries) = self.desk.confirm(event.actor, period, &self.book)?;
                info!(%carrier, count = entries.len(), "overbuy confirmed");
                let batch = BetBatch::new(entries);
                Ok(vec![Outbound::Edit {
                    message: event.message,
                    text: format!("{carrier}\n{batch}"),
                    actions: vec![],
                }])
            }
            "comza" => {
                self.require_admin(event.actor)?;
                let bettor = Username::new(rest);
                self.pending_terms.insert(event.actor, bettor.clone());
                Ok(vec![Outbound::Edit {
                    message: event.message,
                    text: format!("{bettor} selected; send terms like 15/80"),
                    actions: vec![],
                }])
            }
            "posthis" => {
                let bettor = Username::new(rest);
                let text = self.render_history(&bettor).ok_or(BetError::NotFound)?;
                Ok(vec![Outbound::Edit { message: event.message, text, actions: vec![] }])
            }
            _ => Err(BetError::NotFound),
        }
    }

    fn action_delete(&self, event: &ActionEvent, rest: &str) -> Result<Vec<Outbound>, BetError> {
        let (actor, message) = parse_ticket_token(rest)?;
        if !self.admin.is_privileged(event.actor) {
            // show the receipt again with a notice: only the operator deletes
            let text = match self.tickets.get(actor, message) {
                Some(ticket) => {
                    format!("only the operator can delete; ask them\n\n{}", ticket.batch)
                }
                None => "only the operator can delete; ask them".to_string(),
            };
            return Ok(vec![Outbound::Edit {
                message: event.message,
                text,
                actions: vec![vec![delete_button(actor, message)]],
            }]);
        }
        Ok(vec![Outbound::Edit {
            message: event.message,
            text: "really delete this bet?".into(),
            actions: vec![
                vec![Action::new("OK", format!("confirm_delete:{actor}:{message}"))],
                vec![Action::new("Cancel", format!("cancel_delete:{actor}:{message}"))],
            ],
        }])
    }

    fn action_confirm_delete(
        &self,
        event: &ActionEvent,
        rest: &str,
    ) -> Result<Vec<Outbound>, BetError> {
        self.require_admin(event.actor)?;
        let (actor, message) = parse_ticket_token(rest)?;
        let ticket = self.tickets.take(actor, message).ok_or(BetError::NotFound)?;
        if let Err(e) = self.book.reverse(&ticket.bettor, ticket.period, ticket.batch.entries()) {
            // nothing was removed; keep the ticket for another attempt
            let restored = Ticket {
                bettor: ticket.bettor.clone(),
                period: ticket.period,
                batch: ticket.batch.clone(),
            };
            let _ = self.tickets.push(actor, message, restored);
            return Err(e);
        }
        info!(bettor = %ticket.bettor, "bet deleted");
        Ok(vec![Outbound::Edit {
            message: event.message,
            text: "bet deleted".into(),
            actions: vec![],
        }])
    }

    fn action_cancel_delete(
        &self,
        event: &ActionEvent,
        rest: &str,
    ) -> Result<Vec<Outbound>, BetError> {
        let (actor, message) = parse_ticket_token(rest)?;
        let text = match self.tickets.get(actor, message) {
            Some(ticket) => ticket.batch.to_string(),
            None => "already deleted".to_string(),
        };
        Ok(vec![Outbound::Edit {
            message: event.message,
            text,
            actions: vec![vec![delete_button(actor, message)]],
        }])
    }

    // === Rendering ===

    fn render_ledger(&self) -> String {
        let snapshot = self.book.ledger_snapshot();
        if snapshot.is_empty() {
            return "no bets on the ledger".to_string();
        }
        let power = self.book.power_number();
        let mut lines = vec!["ledger".to_string()];
        for (number, total) in &snapshot {
            if power == Some(*number) {
                lines.push(format!("* {number} -> {total} *"));
            } else {
                lines.push(format!("{number} -> {total}"));
            }
        }
        if let Some(power) = power {
            let on_power = snapshot.get(&power).copied().unwrap_or(0);
            lines.push(format!("\npower number: {power} -> {on_power}"));
        }
        lines.join("\n")
    }

    fn render_history(&self, bettor: &Username) -> Option<String> {
        let history = self.book.history(bettor)?;
        let power = self.book.power_number();
        let mut lines = vec![format!("record book for {bettor}")];
        let mut total = 0i64;
        let mut power_total = 0i64;
        for (period, entries) in &history {
            lines.push(format!("\n{period}:"));
            for entry in entries {
                if power == Some(entry.number) {
                    lines.push(format!("* {} *", entry));
                    power_total += entry.amount;
                } else {
                    lines.push(entry.to_string());
                }
                total += entry.amount;
            }
        }
        lines.push(format!("\ntotal: {total}"));
        if let Some(power) = power {
            lines.push(format!("power number ({power}) total: {power_total}"));
        }
        Some(lines.join("\n"))
    }

    fn require_admin(&self, actor: ActorId) -> Result<(), BetError> {
        if self.admin.is_privileged(actor) {
            Ok(())
        } else {
            Err(BetError::NotAuthorized)
        }
    }
}

fn delete_button(actor: ActorId, message: MessageId) -> Action {
    Action::new("Delete", format!("delete:{actor}:{message}"))
}

fn parse_ticket_token(rest: &str) -> Result<(ActorId, MessageId), BetError> {
    let (actor, message) = rest.split_once(':').ok_or(BetError::NotFound)?;
    let actor = actor.parse().map(ActorId).map_err(|_| BetError::NotFound)?;
    let message = message.parse().map(MessageId).map_err(|_| BetError::NotFound)?;
    Ok((actor, message))
}

fn render_settlement(report: &SettlementReport) -> String {
    let side = if report.house_owes() { "house owes" } else { "house collects" };
    format!(
        "{}\ntotal staked: {}\ncom ({}%) -> {}\nafter com: {}\npower stake -> {}\nza ({}) -> {}\nnet: {} ({side})\n-----------------",
        report.bettor,
        report.total_staked,
        report.commission_percent,
        report.commission,
        report.after_commission,
        report.power_staked,
        report.payback_multiplier,
        report.payout,
        report.net.abs(),
    )
}

fn overbuy_text(view: &OverbuyView) -> String {
    format!("numbers to move to {} (limit {}):", view.carrier, view.limit)
}

fn overbuy_actions(view: &OverbuyView) -> Vec<Vec<Action>> {
    let mut actions: Vec<Vec<Action>> = view
        .rows
        .iter()
        .map(|row| {
            let mark = if row.selected { "[x]" } else { "[ ]" };
            vec![Action::new(
                format!("{} -> {} {mark}", row.number, row.overage),
                format!("overbuy_select:{}", row.number),
            )]
        })
        .collect();
    actions.push(vec![
        Action::new("Select All", "overbuy_select_all"),
        Action::new("Unselect All", "overbuy_unselect_all"),
    ]);
    actions.push(vec![Action::new("OK", "overbuy_confirm")]);
    actions
}

fn overbuy_keyboard(view: &OverbuyView) -> Outbound {
    Outbound::Keyboard { text: overbuy_text(view), actions: overbuy_actions(view) }
}

fn edit_to_overbuy(message: MessageId, view: &OverbuyView) -> Outbound {
    Outbound::Edit { message, text: overbuy_text(view), actions: overbuy_actions(view) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{PeriodKey, Session};
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn service() -> BetService<FixedClock> {
        let period =
            PeriodKey::new(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(), Session::Am);
        BetService::new(FixedClock(period))
    }

    fn text(actor: u64, message: u64, text: &str) -> TextEvent {
        TextEvent {
            actor: ActorId(actor),
            handle: Some(Username::new(format!("user{actor}"))),
            message: MessageId(message),
            text: text.to_string(),
        }
    }

    #[test]
    fn start_claims_operator() {
        let svc = service();
        let replies = svc.handle_text(&text(1, 1, "/start"));
        assert_eq!(replies, vec![Outbound::text("operator privileges granted")]);
        let replies = svc.handle_text(&text(1, 2, "/dateopen"));
        assert_eq!(replies, vec![Outbound::text("07/03/2025 AM is open for bets")]);
    }

    #[test]
    fn admin_commands_reject_others() {
        let svc = service();
        svc.handle_text(&text(1, 1, "/start"));
        let replies = svc.handle_text(&text(2, 2, "/dateopen"));
        assert_eq!(replies, vec![Outbound::text(BetError::NotAuthorized.to_string())]);
    }

    #[test]
    fn bets_rejected_while_closed() {
        let svc = service();
        let replies = svc.handle_text(&text(2, 1, "12-500"));
        assert_eq!(replies, vec![Outbound::text(BetError::PeriodClosed.to_string())]);
    }

    #[test]
    fn bet_receipt_carries_delete_button() {
        let svc = service();
        svc.handle_text(&text(1, 1, "/start"));
        svc.handle_text(&text(1, 2, "/dateopen"));
        let replies = svc.handle_text(&text(2, 3, "12-500"));
        let Outbound::Keyboard { text: receipt, actions } = &replies[0] else {
            panic!("expected keyboard reply, got {replies:?}");
        };
        assert_eq!(receipt, "12-500\ntotal 500");
        assert_eq!(actions[0][0].token, "delete:2:3");
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let svc = service();
        assert!(svc.handle_text(&text(1, 1, "/frobnicate")).is_empty());
    }
}
