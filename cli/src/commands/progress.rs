use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weighin_core::models::ProgressReport;
use weighin_core::service::PlannerService;

use super::helpers::{WeightUnit, json_error};
use super::require_profile;

#[derive(Tabled)]
struct ProgressRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Diff")]
    diff: String,
}

pub(crate) fn cmd_progress(
    svc: &PlannerService,
    user: &str,
    unit: WeightUnit,
    json: bool,
) -> Result<()> {
    require_profile(svc, user)?;
    let Some(report) = svc.progress(user)? else {
        if json {
            println!("{}", json_error("No weight entries logged"));
        } else {
            eprintln!("No weight entries logged. Use `weighin weight log` first.");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report, unit);
    Ok(())
}

/// Goal reached within a tenth of a pound.
const GOAL_TOLERANCE_LBS: f64 = 0.1;

fn rate_summary(r: &ProgressReport) -> Option<String> {
    if r.remaining_to_goal_lbs.abs() < GOAL_TOLERANCE_LBS {
        return Some("Target weight reached".to_string());
    }
    match r.predicted_days_to_goal {
        Some(days) => Some(format!("At this rate: about {days} more days")),
        None if r.avg_change_per_day.is_some() => {
            Some("At this rate: trending away from the target".to_string())
        }
        None => None,
    }
}

fn print_report(r: &ProgressReport, unit: WeightUnit) {
    println!("  Start:     {}", unit.format(r.starting_weight_lbs));
    println!("  Current:   {}", unit.format(r.current_weight_lbs));
    println!("  Target:    {}", unit.format(r.target_weight_lbs));
    let change = unit.from_lbs(r.weight_change_lbs);
    let label = unit.label();
    println!("  Change:    {change:+.1} {label}");
    println!("  Remaining: {}", unit.format(r.remaining_to_goal_lbs.abs()));
    if let Some(pct) = r.progress_percentage {
        println!("  Progress:  {pct:.0}%");
    }
    if let Some(avg) = r.avg_change_per_day {
        let avg = unit.from_lbs(avg);
        println!("  Average:   {avg:+.2} {label}/day");
    }
    if let Some(line) = rate_summary(r) {
        println!("  {line}");
    }
    println!();

    // only days with a logged weight; the curve itself is in --json
    let rows: Vec<ProgressRow> = r
        .entries
        .iter()
        .map(|e| {
            let expected = r
                .progression
                .iter()
                .find(|p| p.date == e.date)
                .map(|p| p.expected_weight_lbs);
            ProgressRow {
                date: e.date.to_string(),
                actual: unit.format(e.weight_lbs),
                expected: expected.map_or_else(|| "-".to_string(), |w| unit.format(w)),
                diff: expected.map_or_else(String::new, |w| {
                    format!("{:+.1}", unit.from_lbs(e.weight_lbs - w))
                }),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(remaining: f64, avg: Option<f64>, predicted: Option<i64>) -> ProgressReport {
        ProgressReport {
            starting_weight_lbs: 180.0,
            current_weight_lbs: 175.0 - remaining,
            weight_change_lbs: -5.0 - remaining,
            target_weight_lbs: 175.0,
            remaining_to_goal_lbs: remaining,
            progress_percentage: Some(100.0),
            avg_change_per_day: avg,
            predicted_days_to_goal: predicted,
            entries: Vec::new(),
            progression: Vec::new(),
        }
    }

    #[test]
    fn test_rate_summary_at_goal() {
        let r = report(0.0, Some(-1.0), None);
        assert_eq!(rate_summary(&r).unwrap(), "Target weight reached");
    }

    #[test]
    fn test_rate_summary_cases() {
        let on_pace = report(-3.0, Some(-1.0), Some(2));
        assert_eq!(rate_summary(&on_pace).unwrap(), "At this rate: about 2 more days");

        let away = report(-3.0, Some(0.5), None);
        assert!(rate_summary(&away).unwrap().contains("trending away"));

        let single_entry = report(-3.0, None, None);
        assert!(rate_summary(&single_entry).is_none());
    }
}
