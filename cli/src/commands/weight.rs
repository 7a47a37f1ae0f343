use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weighin_core::service::PlannerService;

use super::helpers::{WeightUnit, json_error, parse_date};

pub(crate) fn cmd_weight_log(
    svc: &PlannerService,
    user: &str,
    value: f64,
    unit: WeightUnit,
    date: Option<String>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let weight_lbs = unit.to_lbs(value);
    if unit == WeightUnit::Kg {
        eprintln!("Converting {value:.1} kg to {weight_lbs:.1} lbs");
    }

    let date = parse_date(date)?;
    let result = svc.log_weight(user, date, weight_lbs, notes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Logged {} for {}", unit.format(result.weight_lbs), result.date);
        if let Some(ref n) = result.notes {
            println!("  Notes: {n}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_weight_show(
    svc: &PlannerService,
    user: &str,
    date: Option<String>,
    unit: WeightUnit,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;

    if let Some(e) = svc.get_weight(user, date)? {
        if json {
            println!("{}", serde_json::to_string_pretty(&e)?);
        } else {
            println!("{}: {}", e.date, unit.format(e.weight_lbs));
            if let Some(ref n) = e.notes {
                println!("  Notes: {n}");
            }
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("No weight entry for {date}")));
        } else {
            eprintln!("No weight entry for {date}");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_weight_history(
    svc: &PlannerService,
    user: &str,
    days: Option<u32>,
    unit: WeightUnit,
    json: bool,
) -> Result<()> {
    let entries = svc.weight_history(user, days.map(i64::from))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `weighin weight log` to record your weight.");
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight")]
            weight: String,
            #[tabled(rename = "Change")]
            change: String,
            #[tabled(rename = "Notes")]
            notes: String,
        }

        // newest first; change is against the previous (older) entry
        let rows: Vec<WeightRow> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| WeightRow {
                date: e.date.to_string(),
                weight: unit.format(e.weight_lbs),
                change: entries.get(i + 1).map_or_else(String::new, |prev| {
                    let delta = unit.from_lbs(e.weight_lbs - prev.weight_lbs);
                    format!("{delta:+.1}")
                }),
                notes: e.notes.clone().unwrap_or_default(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_weight_delete(
    svc: &PlannerService,
    user: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    if svc.delete_weight(user, date)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": date }));
        } else {
            println!("Deleted weight entry for {date}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("No weight entry for {date}")));
        } else {
            eprintln!("No weight entry for {date}");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_weight_import(
    svc: &PlannerService,
    user: &str,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = svc.import_weights(user, file, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!("{}", json_error("No rows found in CSV file"));
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "rows_parsed": summary.rows_parsed,
                "imported": summary.imported,
                "dates_spanned": summary.dates_spanned,
            })
        );
    } else if dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Entries to save: {}", summary.imported);
        println!("  Dates spanned:   {}", summary.dates_spanned);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:   {}", summary.rows_parsed);
        println!("  Entries saved: {}", summary.imported);
        println!("  Dates spanned: {}", summary.dates_spanned);
    }

    Ok(())
}
