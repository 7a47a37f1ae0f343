use anyhow::Result;

use weighin_core::models::Profile;
use weighin_core::service::PlannerService;

use super::helpers::{WeightUnit, parse_date};
use super::require_profile;

/// Values collected by `profile set`. Weights are in `unit`, height in inches.
pub(crate) struct ProfileArgs {
    pub(crate) weight: f64,
    pub(crate) target_weight: f64,
    pub(crate) height_inches: f64,
    pub(crate) body_fat: Option<f64>,
    pub(crate) target_date: String,
    pub(crate) today: Option<String>,
}

pub(crate) fn cmd_profile_set(
    svc: &PlannerService,
    user: &str,
    args: ProfileArgs,
    unit: WeightUnit,
    json: bool,
) -> Result<()> {
    let profile = Profile {
        username: user.to_string(),
        weight_lbs: unit.to_lbs(args.weight),
        target_weight_lbs: unit.to_lbs(args.target_weight),
        height_inches: args.height_inches,
        body_fat_percentage: args.body_fat,
        today_date: parse_date(args.today)?,
        target_date: parse_date(Some(args.target_date))?,
    };
    let saved = svc.save_profile(&profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!("Saved profile for {user}");
        print_profile(&saved, unit);
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(
    svc: &PlannerService,
    user: &str,
    unit: WeightUnit,
    json: bool,
) -> Result<()> {
    let profile = require_profile(svc, user)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        print_profile(&profile, unit);
    }
    Ok(())
}

fn print_profile(p: &Profile, unit: WeightUnit) {
    println!("  Weight:        {}", unit.format(p.weight_lbs));
    println!("  Target weight: {}", unit.format(p.target_weight_lbs));
    println!("  Height:        {:.1} in", p.height_inches);
    match p.known_body_fat() {
        Some(bf) => println!("  Body fat:      {bf:.1}%"),
        None => println!("  Body fat:      not set"),
    }
    println!("  Start date:    {}", p.today_date);
    let days = p.days_to_goal(chrono::Local::now().date_naive());
    println!("  Weigh-in:      {} ({days} days away)", p.target_date);
}
