use std::path::PathBuf;

use chrono::{Local, Utc};
use clap::Subcommand;
use checkin_core::storage::{Database, HistoryStore};
use checkin_core::{format_duration, merge_history, CheckInRecord, HistorySummary};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List completed check-ins, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one check-in by id
    Delete {
        id: String,
    },
    /// Delete all check-ins
    Clear,
    /// Totals for today and all time
    Stats,
    /// Write the history as JSON
    Export {
        /// File to write; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge check-ins from a JSON export. Imported records win on conflict
    /// unless the local copy started later.
    Import {
        file: PathBuf,
    },
}

fn print_table(records: &[CheckInRecord]) {
    if records.is_empty() {
        println!("no check-ins recorded");
        return;
    }
    println!("{:<36}  {:<16}  {:<16}  {:>9}", "ID", "START", "END", "DURATION");
    for record in records {
        println!(
            "{:<36}  {:<16}  {:<16}  {:>9}",
            record.id,
            record.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            record.effective_end_time().with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            format_duration(record.duration),
        );
    }
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { json } => {
            let records = db.list_records()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_table(&records);
            }
        }
        HistoryAction::Delete { id } => {
            if !db.delete_record(&id)? {
                return Err(format!("no check-in with id {id}").into());
            }
            println!("deleted {id}");
        }
        HistoryAction::Clear => {
            let removed = db.clear_records()?;
            println!("deleted {removed} check-ins");
        }
        HistoryAction::Stats => {
            let records = db.list_records()?;
            let summary = HistorySummary::from_records(&records, Utc::now().date_naive());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        HistoryAction::Export { output } => {
            let json = serde_json::to_string_pretty(&db.list_records()?)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        HistoryAction::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let imported: Vec<CheckInRecord> = serde_json::from_str(&content)?;
            let local = db.list_records()?;
            let merged = merge_history(&local, &imported);
            db.replace_records(&merged)?;
            println!(
                "imported {} records ({} total)",
                imported.len(),
                merged.len()
            );
        }
    }
    Ok(())
}
