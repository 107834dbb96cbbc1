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

use betbook::{ActorId, BetService, Clock, FixedClock, MessageId, Outbound, PeriodKey, Session,
    SystemClock, TextEvent, Username};
use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Betbook - replay a chat transcript through the betting engine
///
/// Reads messages from a CSV file, runs each through the engine in order,
/// and outputs the resulting ledger to stdout. Replies and errors that the
/// engine would send back are printed to stderr.
#[derive(Parser, Debug)]
#[command(name = "betbook")]
#[command(about = "Replays a bet-message transcript and prints the ledger", long_about = None)]
struct Args {
    /// Path to CSV file with messages
    ///
    /// Expected format: actor,user,text
    /// Example: cargo run -- transcript.csv > ledger.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Pin the betting period to this date's AM session instead of using
    /// the wall clock (useful for replaying old transcripts).
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };
    let reader = BufReader::new(file);

    match args.date {
        Some(date) => {
            let clock = FixedClock(PeriodKey::new(date, Session::Am));
            run(reader, clock)
        }
        None => run(reader, SystemClock::yangon()),
    }
}

fn run<R: Read, C: Clock>(reader: R, clock: C) {
    let service = match replay_transcript(reader, clock) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error processing transcript: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_ledger(&service, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `actor, user, text`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    actor: u64,
    user: String,
    text: String,
}

impl CsvRecord {
    fn into_event(self, message: u64) -> TextEvent {
        let handle =
            (!self.user.is_empty()).then(|| Username::new(self.user));
        TextEvent {
            actor: ActorId(self.actor),
            handle,
            message: MessageId(message),
            text: self.text,
        }
    }
}

/// Replays every message of a transcript through a fresh engine.
///
/// Message ids are assigned sequentially from the row order, so delete
/// buttons in replies correlate the way they would live. Replies the engine
/// produces are echoed to stderr; they do not affect the replay.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
/// Malformed rows are skipped.
pub fn replay_transcript<R: Read, C: Clock>(
    reader: R,
    clock: C,
) -> Result<BetService<C>, csv::Error> {
    let service = BetService::new(clock);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (row, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        match result {
            Ok(record) => {
                let event = record.into_event(row as u64 + 1);
                for reply in service.handle_text(&event) {
                    if let Outbound::Text(text) | Outbound::Keyboard { text, .. } = reply {
                        eprintln!("-> {}", text.replace('\n', " | "));
                    }
                }
            }
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(service)
}

/// One output row: a number and its aggregate stake.
#[derive(Debug, Serialize)]
struct LedgerRow {
    number: String,
    amount: i64,
}

/// Writes the final ledger to a CSV writer.
///
/// Columns: `number, amount`, sorted by number, zero-padded.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_ledger<W: Write, C: Clock>(
    service: &BetService<C>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for (number, amount) in service.book().ledger_snapshot() {
        wtr.serialize(LedgerRow { number: number.to_string(), amount })?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fixed_clock() -> FixedClock {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        FixedClock(PeriodKey::new(date, Session::Am))
    }

    #[test]
    fn replay_simple_transcript() {
        let csv = "actor,user,text\n\
                   1,,/start\n\
                   1,,/dateopen\n\
                   2,mg_mg,12-500\n";
        let service = replay_transcript(Cursor::new(csv), fixed_clock()).unwrap();

        let mut out = Vec::new();
        write_ledger(&service, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "number,amount\n12,500\n");
    }

    #[test]
    fn bets_before_dateopen_are_dropped() {
        let csv = "actor,user,text\n\
                   1,,/start\n\
                   2,mg_mg,12-500\n\
                   1,,/dateopen\n\
                   2,mg_mg,34-200\n";
        let service = replay_transcript(Cursor::new(csv), fixed_clock()).unwrap();

        let mut out = Vec::new();
        write_ledger(&service, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "number,amount\n34,200\n");
    }

    #[test]
    fn reverse_bets_land_both_numbers() {
        let csv = "actor,user,text\n\
                   1,,/start\n\
                   1,,/dateopen\n\
                   2,mg_mg,12r500\n";
        let service = replay_transcript(Cursor::new(csv), fixed_clock()).unwrap();

        let mut out = Vec::new();
        write_ledger(&service, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "number,amount\n12,500\n21,500\n");
    }
}
