use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

use crate::models::{AdjustmentInfo, AdjustmentStatus};
use crate::planner::WeightHistory;

/// Days before the target date during which targets follow the fixed
/// final-days protocol and are never adjusted.
pub const FINAL_DAYS_WINDOW: i64 = 3;

/// Expected weight at four or more days out, as a multiple of the goal.
pub const EXPECTED_WEIGHT_MARGIN: f64 = 1.05;

/// Logged weight within this many pounds of the expected weight is on track.
pub const ON_TRACK_BAND_LBS: f64 = 1.0;

/// Fixed calorie step applied when off track. Not scaled by the size of the miss.
pub const ADJUSTMENT_STEP_KCAL: f64 = 200.0;

#[derive(Debug, Clone)]
pub struct AdjustmentRequest<'a> {
    pub username: &'a str,
    pub base_calories: f64,
    /// Profile weight; reported in traces, never substituted for a log.
    pub current_weight_lbs: f64,
    pub target_weight_lbs: f64,
    pub days_to_goal: i64,
    pub evaluation_date: NaiveDate,
}

/// Nudge `base_calories` by comparing the latest logged weight against the
/// expected progression. Returns the adjusted calories and what was done.
pub fn adjust_calories(
    request: &AdjustmentRequest<'_>,
    history: &dyn WeightHistory,
) -> Result<(f64, AdjustmentInfo)> {
    if request.days_to_goal <= FINAL_DAYS_WINDOW {
        return Ok((
            request.base_calories,
            AdjustmentInfo {
                status: AdjustmentStatus::FinalDays,
                adjusted: false,
                delta_calories: 0.0,
                reason: "Within 3 days of target - using standard protocol".to_string(),
                needs_weight_log: false,
                actual_weight_lbs: None,
                expected_weight_lbs: None,
                difference_lbs: None,
            },
        ));
    }

    let Some(latest) =
        history.latest_weight_on_or_before(request.username, request.evaluation_date)?
    else {
        debug!(
            username = request.username,
            profile_weight = request.current_weight_lbs,
            "no weight logged on or before {}",
            request.evaluation_date
        );
        return Ok((
            request.base_calories,
            AdjustmentInfo {
                status: AdjustmentStatus::NeedsWeightLog,
                adjusted: false,
                delta_calories: 0.0,
                reason: "No weight logged yet - log your weight to enable dynamic adjustments"
                    .to_string(),
                needs_weight_log: true,
                actual_weight_lbs: None,
                expected_weight_lbs: None,
                difference_lbs: None,
            },
        ));
    };

    let actual = latest.weight_lbs;
    let expected = request.target_weight_lbs * EXPECTED_WEIGHT_MARGIN;
    let difference = actual - expected;

    let (status, delta, reason) = if difference > ON_TRACK_BAND_LBS {
        (
            AdjustmentStatus::ReduceCalories,
            -ADJUSTMENT_STEP_KCAL,
            format!(
                "Weight {difference:.1} lbs above target progression ({actual:.1} vs {expected:.1} lbs)"
            ),
        )
    } else if difference < -ON_TRACK_BAND_LBS {
        (
            AdjustmentStatus::IncreaseCalories,
            ADJUSTMENT_STEP_KCAL,
            format!(
                "Weight {:.1} lbs below target progression ({actual:.1} vs {expected:.1} lbs)",
                difference.abs()
            ),
        )
    } else {
        (
            AdjustmentStatus::OnTrack,
            0.0,
            format!("Weight on track ({actual:.1} vs target {expected:.1} lbs)"),
        )
    };

    debug!(
        username = request.username,
        logged_on = %latest.date,
        actual,
        expected,
        difference,
        delta,
        "progress adjustment"
    );

    Ok((
        request.base_calories + delta,
        AdjustmentInfo {
            status,
            adjusted: delta != 0.0,
            delta_calories: delta,
            reason,
            needs_weight_log: false,
            actual_weight_lbs: Some(actual),
            expected_weight_lbs: Some(expected),
            difference_lbs: Some(difference),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeightEntry;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn history(weights: &[(NaiveDate, f64)]) -> Vec<WeightEntry> {
        weights
            .iter()
            .enumerate()
            .map(|(i, (date, w))| WeightEntry {
                id: i as i64 + 1,
                uuid: format!("uuid-{i}"),
                username: "alex".to_string(),
                date: *date,
                weight_lbs: *w,
                notes: None,
                created_at: String::new(),
                updated_at: String::new(),
            })
            .collect()
    }

    fn request(days_to_goal: i64) -> AdjustmentRequest<'static> {
        AdjustmentRequest {
            username: "alex",
            base_calories: 2500.0,
            current_weight_lbs: 165.0,
            target_weight_lbs: 150.0,
            days_to_goal,
            evaluation_date: date(2024, 6, 10),
        }
    }

    #[test]
    fn test_final_days_never_adjust() {
        let heavy = history(&[(date(2024, 6, 9), 200.0)]);
        let light = history(&[(date(2024, 6, 9), 100.0)]);
        let empty = history(&[]);
        for days in [3, 2, 1, 0, -4] {
            for h in [&heavy, &light, &empty] {
                let (calories, info) = adjust_calories(&request(days), h).unwrap();
                assert!((calories - 2500.0).abs() < f64::EPSILON);
                assert!(!info.adjusted);
                assert!(!info.needs_weight_log);
                assert_eq!(info.status, AdjustmentStatus::FinalDays);
            }
        }
    }

    #[test]
    fn test_no_history_needs_weight_log() {
        let (calories, info) = adjust_calories(&request(5), &history(&[])).unwrap();
        assert!((calories - 2500.0).abs() < f64::EPSILON);
        assert!(!info.adjusted);
        assert!(info.needs_weight_log);
        assert_eq!(info.status, AdjustmentStatus::NeedsWeightLog);
        assert!(info.reason.contains("log your weight"));
    }

    #[test]
    fn test_future_entries_are_ignored() {
        let h = history(&[(date(2024, 6, 11), 159.0)]);
        let (_, info) = adjust_calories(&request(5), &h).unwrap();
        assert!(info.needs_weight_log);
    }

    #[test]
    fn test_too_heavy_reduces() {
        // expected 157.5, diff +1.5
        let h = history(&[(date(2024, 6, 10), 159.0)]);
        let (calories, info) = adjust_calories(&request(5), &h).unwrap();
        assert!((calories - 2300.0).abs() < f64::EPSILON);
        assert!(info.adjusted);
        assert!((info.delta_calories - -200.0).abs() < f64::EPSILON);
        assert_eq!(info.status, AdjustmentStatus::ReduceCalories);
        assert!((info.expected_weight_lbs.unwrap() - 157.5).abs() < 1e-9);
        assert!((info.difference_lbs.unwrap() - 1.5).abs() < 1e-9);
        assert!(info.reason.contains("above target progression"));
    }

    #[test]
    fn test_too_light_increases() {
        // diff -1.5
        let h = history(&[(date(2024, 6, 7), 156.0)]);
        let (calories, info) = adjust_calories(&request(5), &h).unwrap();
        assert!((calories - 2700.0).abs() < f64::EPSILON);
        assert!(info.adjusted);
        assert!((info.delta_calories - 200.0).abs() < f64::EPSILON);
        assert_eq!(info.status, AdjustmentStatus::IncreaseCalories);
        assert!(info.reason.contains("1.5 lbs below"));
    }

    #[test]
    fn test_within_band_on_track() {
        // diff -0.5
        let h = history(&[(date(2024, 6, 10), 157.0)]);
        let (calories, info) = adjust_calories(&request(5), &h).unwrap();
        assert!((calories - 2500.0).abs() < f64::EPSILON);
        assert!(!info.adjusted);
        assert!(!info.needs_weight_log);
        assert_eq!(info.status, AdjustmentStatus::OnTrack);
        assert!(info.delta_calories.abs() < f64::EPSILON);
    }

    #[test]
    fn test_step_is_fixed_regardless_of_distance() {
        let h = history(&[(date(2024, 6, 10), 190.0)]);
        let (calories, _) = adjust_calories(&request(30), &h).unwrap();
        assert!((calories - 2300.0).abs() < f64::EPSILON);

        let h = history(&[(date(2024, 6, 10), 120.0)]);
        let (calories, _) = adjust_calories(&request(30), &h).unwrap();
        assert!((calories - 2700.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_latest_entry_wins() {
        let h = history(&[
            (date(2024, 6, 1), 170.0),
            (date(2024, 6, 9), 157.5),
            (date(2024, 6, 5), 140.0),
        ]);
        let (_, info) = adjust_calories(&request(5), &h).unwrap();
        assert_eq!(info.status, AdjustmentStatus::OnTrack);
        assert!((info.actual_weight_lbs.unwrap() - 157.5).abs() < f64::EPSILON);
    }
}
