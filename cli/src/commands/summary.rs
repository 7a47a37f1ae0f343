use anyhow::Result;
use std::process;

use weighin_core::models::DayLog;
use weighin_core::service::PlannerService;

use super::helpers::{format_nutrients, parse_date};

pub(crate) fn cmd_summary(
    svc: &PlannerService,
    user: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let day = svc.day_log(user, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&day)?);
        return Ok(());
    }

    if day.meals.is_empty() && day.targets.is_none() {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    print_day(&day);
    Ok(())
}

fn print_day(day: &DayLog) {
    let date = &day.date;
    println!("=== {date} ===\n");

    if day.meals.is_empty() {
        println!("  Nothing logged yet.\n");
    }

    for meal in &day.meals {
        let meal_label = meal.meal_type.to_uppercase();
        let sub_cal = meal.subtotal.calories;
        println!("  {meal_label} ({sub_cal:.0} kcal)");
        for e in &meal.entries {
            let id = e.id;
            let name = &e.food_name;
            let n = &e.nutrients;
            let (cal, p, f, c) = (n.calories, n.protein, n.fat, n.carbs);
            println!("    [{id}] {name}: {cal:.0} kcal | P:{p:.0}g F:{f:.0}g C:{c:.0}g");
        }
        println!();
    }

    println!("  TOTAL:     {}", format_nutrients(&day.total));

    if let (Some(targets), Some(remaining)) = (&day.targets, &day.remaining) {
        println!("  TARGET:    {}", format_nutrients(&targets.as_nutrients()));
        println!("  REMAINING: {}", format_nutrients(remaining));
        if targets.adjustment.needs_weight_log {
            eprintln!("\nNo weight logged yet. Targets use the unadjusted base.");
        }
    }
}
