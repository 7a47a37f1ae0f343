use chrono::{NaiveDate, TimeDelta};

use crate::adjust::EXPECTED_WEIGHT_MARGIN;
use crate::models::{MAX_PLAN_DAYS, Profile, ProgressReport, ProgressionPoint, WeightEntry};

/// Where the weight should be with `days_until_target` days left.
#[must_use]
pub fn expected_weight(target_weight_lbs: f64, days_until_target: i64) -> f64 {
    let margin = match days_until_target {
        d if d >= 3 => EXPECTED_WEIGHT_MARGIN,
        2 => 1.039,
        1 => 1.021,
        _ => 1.0,
    };
    target_weight_lbs * margin
}

/// One expected-weight point per day from `start` through `end`, inclusive.
#[must_use]
pub fn progression_curve(
    target_weight_lbs: f64,
    target_date: NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<ProgressionPoint> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| ProgressionPoint {
            date,
            expected_weight_lbs: expected_weight(target_weight_lbs, (target_date - date).num_days()),
        })
        .collect()
}

/// Summarize logged weights against the profile's goal.
///
/// Entries may come in any order. Returns `None` when nothing is logged.
#[must_use]
pub fn build_progress_report(profile: &Profile, entries: &[WeightEntry]) -> Option<ProgressReport> {
    let mut entries = entries.to_vec();
    entries.sort_by_key(|e| e.date);

    let first = entries.first()?;
    let last = entries.last()?;

    let starting_weight_lbs = first.weight_lbs;
    let current_weight_lbs = last.weight_lbs;
    let weight_change_lbs = current_weight_lbs - starting_weight_lbs;
    let target_weight_lbs = profile.target_weight_lbs;
    let remaining_to_goal_lbs = target_weight_lbs - current_weight_lbs;

    let progress_percentage = (starting_weight_lbs != target_weight_lbs).then(|| {
        let pct = weight_change_lbs / (target_weight_lbs - starting_weight_lbs) * 100.0;
        pct.clamp(0.0, 100.0)
    });

    let days_tracked = (last.date - first.date).num_days();
    #[allow(clippy::cast_precision_loss)]
    let avg_change_per_day =
        (entries.len() > 1 && days_tracked > 0).then(|| weight_change_lbs / days_tracked as f64);

    let predicted_days_to_goal = avg_change_per_day.and_then(|avg| {
        let same_direction = (remaining_to_goal_lbs > 0.0 && avg > 0.0)
            || (remaining_to_goal_lbs < 0.0 && avg < 0.0);
        // the estimate counts the current day as already spent
        same_direction.then(|| ((remaining_to_goal_lbs / avg).abs() - 1.0).trunc() as i64)
    });

    // the curve runs on to the target date, but never more than
    // MAX_PLAN_DAYS past the last entry
    let horizon = last
        .date
        .checked_add_signed(TimeDelta::days(MAX_PLAN_DAYS))
        .unwrap_or(NaiveDate::MAX);
    let progression = progression_curve(
        target_weight_lbs,
        profile.target_date,
        first.date,
        last.date.max(profile.target_date.min(horizon)),
    );

    Some(ProgressReport {
        starting_weight_lbs,
        current_weight_lbs,
        weight_change_lbs,
        target_weight_lbs,
        remaining_to_goal_lbs,
        progress_percentage,
        avg_change_per_day,
        predicted_days_to_goal,
        entries,
        progression,
    })
}
