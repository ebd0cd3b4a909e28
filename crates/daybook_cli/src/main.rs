//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `daybook_core` linkage.
//! - Optionally resolve one day against a database file and print it.
//!
//! Usage: `daybook_cli [DB_PATH [YYYY-MM-DD]]`. The date defaults to today.

use chrono::{Local, NaiveDate};
use daybook_core::{open_db, DayService, SqliteDayRepository};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("daybook_core ping={}", daybook_core::ping());
    println!("daybook_core version={}", daybook_core::core_version());

    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next() else {
        return ExitCode::SUCCESS;
    };
    let date = match args.next() {
        Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => date,
            Err(err) => {
                eprintln!("invalid date `{raw}`: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Local::now().date_naive(),
    };

    match print_day(&db_path, date) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn print_day(db_path: &str, date: NaiveDate) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let service = DayService::new(SqliteDayRepository::try_new(&conn)?);
    let day = service.get_day(date)?;

    println!("day={} entries={}", day.note.note_date, day.entries.len());
    for item in &day.entries {
        println!(
            "{} [{}]{} {}",
            item.entry.uuid,
            if item.entry.is_completed { 'x' } else { ' ' },
            if item.pinned { " (pinned)" } else { "" },
            item.entry.title
        );
    }
    Ok(())
}
