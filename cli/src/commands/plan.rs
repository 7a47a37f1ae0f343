use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weighin_core::models::{AdjustmentStatus, DailyTargets};
use weighin_core::service::PlannerService;

use super::helpers::{no_neg_zero, parse_date};
use super::no_profile;

#[derive(Tabled)]
struct MacroRow {
    #[tabled(rename = "Macro")]
    name: &'static str,
    #[tabled(rename = "Grams")]
    grams: String,
    #[tabled(rename = "kcal")]
    calories: String,
    #[tabled(rename = "Share")]
    share: String,
}

pub(crate) fn cmd_plan(
    svc: &PlannerService,
    user: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let targets = svc
        .daily_targets(user, date)?
        .ok_or_else(|| no_profile(user))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    print_plan(&targets);
    Ok(())
}

fn print_plan(t: &DailyTargets) {
    let days = t.days_to_goal;
    println!("=== {} ({days} days to weigh-in) ===\n", t.date);

    let bmr = t.bmr;
    let formula = t.bmr_formula.label();
    println!("  BMR:         {bmr:.0} kcal ({formula})");
    if let Some(lbm) = t.lean_body_mass_lbs {
        println!("  Lean mass:   {lbm:.1} lbs");
    }
    let mult = t.tier.multiplier;
    let base = t.base_calories;
    println!("  Activity:    x{mult} = {base:.0} kcal");

    let adj = &t.adjustment;
    match adj.status {
        AdjustmentStatus::ReduceCalories | AdjustmentStatus::IncreaseCalories => {
            let delta = adj.delta_calories;
            println!("  Adjustment:  {delta:+.0} kcal. {}", adj.reason);
        }
        _ => println!("  Adjustment:  none. {}", adj.reason),
    }
    let cal = t.calories;
    println!("  Calories:    {cal:.0} kcal\n");

    let m = &t.macros;
    let share = |kcal: f64| {
        if t.calories > 0.0 {
            format!("{:.0}%", no_neg_zero(kcal / t.calories * 100.0))
        } else {
            "-".to_string()
        }
    };
    let rows = vec![
        MacroRow {
            name: "Protein",
            grams: format!("{:.0}g", m.protein_grams),
            calories: format!("{:.0}", m.protein_calories),
            share: share(m.protein_calories),
        },
        MacroRow {
            name: "Fat",
            grams: format!("{:.0}g", m.fat_grams),
            calories: format!("{:.0}", m.fat_calories),
            share: share(m.fat_calories),
        },
        MacroRow {
            name: "Carbs",
            grams: format!("{:.0}g", no_neg_zero(m.carb_grams)),
            calories: format!("{:.0}", no_neg_zero(m.carb_calories)),
            share: share(m.carb_calories),
        },
    ];
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let fiber = t.micros.fiber_grams;
    let sodium = t.micros.sodium_mg;
    println!("\n  Fiber: {fiber:.0}g   Sodium: {sodium:.0}mg");

    if m.carb_calories < 0.0 {
        eprintln!("\nNote: protein and fat exceed the calorie target; carbs are negative.");
    }
    if adj.needs_weight_log {
        eprintln!("\nLog today's weight with `weighin weight log <value>` to enable adjustments.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_without_profile_is_an_error() {
        let svc = PlannerService::new_in_memory().unwrap();
        let err = cmd_plan(&svc, "alex", Some("2024-06-10".to_string()), true).unwrap_err();
        assert!(err.to_string().contains("weighin profile set"));
    }
}
