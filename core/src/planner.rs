use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

use crate::adjust::{AdjustmentRequest, adjust_calories};
use crate::models::{
    ActivityTier, Bmr, BmrFormula, DailyTargets, MacroBreakdown, MicroTargets, Profile,
    WeightEntry,
};

const CM_PER_INCH: f64 = 2.54;
const KG_PER_LB: f64 = 0.453_592;
/// Mifflin-St Jeor is evaluated for a fixed reference age; no age is collected.
const MIFFLIN_REFERENCE_AGE: f64 = 30.0;

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;
const KCAL_PER_G_CARBS: f64 = 4.0;
const PROTEIN_G_PER_LB_LEAN_MASS: f64 = 1.2;

/// Weight history read needed by the progress adjuster.
///
/// Implemented by the SQLite store; the storage layer owns write
/// serialization (last write wins per user and date).
pub trait WeightHistory {
    /// The entry with the greatest date on or before `date`, if any.
    fn latest_weight_on_or_before(
        &self,
        username: &str,
        date: NaiveDate,
    ) -> Result<Option<WeightEntry>>;
}

impl WeightHistory for Vec<WeightEntry> {
    fn latest_weight_on_or_before(
        &self,
        username: &str,
        date: NaiveDate,
    ) -> Result<Option<WeightEntry>> {
        Ok(self
            .iter()
            .filter(|e| e.username == username && e.date <= date)
            .max_by_key(|e| e.date)
            .cloned())
    }
}

/// Basal metabolic rate in kcal/day.
///
/// Uses Katch-McArdle when a positive body fat percentage is given,
/// otherwise Mifflin-St Jeor for a 30 year old male.
#[must_use]
pub fn estimate_bmr(weight_lbs: f64, height_inches: f64, body_fat_percentage: Option<f64>) -> Bmr {
    let height_cm = height_inches * CM_PER_INCH;
    let weight_kg = weight_lbs * KG_PER_LB;

    match body_fat_percentage.filter(|bf| *bf > 0.0) {
        Some(bf) => {
            let lean_mass_kg = weight_kg * (1.0 - bf / 100.0);
            Bmr {
                value: 370.0 + 21.6 * lean_mass_kg,
                formula: BmrFormula::KatchMcArdle,
            }
        }
        None => Bmr {
            value: 10.0 * weight_kg + 6.25 * height_cm - 5.0 * MIFFLIN_REFERENCE_AGE + 5.0,
            formula: BmrFormula::MifflinStJeor,
        },
    }
}

/// Activity multiplier and fat share for a given distance to the goal date.
/// Exact matches only; everything else falls to the default row.
#[must_use]
pub fn select_activity_tier(days_to_goal: i64) -> ActivityTier {
    let (multiplier, fat_fraction) = match days_to_goal {
        3 => (1.725, 0.25),
        2 => (1.55, 0.35),
        1 => (1.375, 0.45),
        _ => (1.725, 0.25),
    };
    ActivityTier {
        multiplier,
        fat_fraction,
    }
}

/// Split a calorie target into macros. Carbs take whatever protein and fat
/// leave, which may be negative.
#[must_use]
pub fn allocate_macros(
    weight_lbs: f64,
    target_calories: f64,
    fat_fraction: f64,
    lean_body_mass_lbs: Option<f64>,
) -> MacroBreakdown {
    // 1 g per lb of body weight when body composition is unknown
    let protein_grams =
        lean_body_mass_lbs.map_or(weight_lbs, |lbm| lbm * PROTEIN_G_PER_LB_LEAN_MASS);
    let protein_calories = protein_grams * KCAL_PER_G_PROTEIN;
    let fat_calories = target_calories * fat_fraction;
    let carb_calories = target_calories - protein_calories - fat_calories;
    MacroBreakdown {
        protein_grams,
        protein_calories,
        fat_grams: fat_calories / KCAL_PER_G_FAT,
        fat_calories,
        carb_grams: carb_calories / KCAL_PER_G_CARBS,
        carb_calories,
    }
}

#[must_use]
pub fn allocate_micros(days_to_goal: i64) -> MicroTargets {
    let (fiber_grams, sodium_mg) = match days_to_goal {
        3 => (8.0, 1500.0),
        2 => (5.0, 1000.0),
        1 => (4.0, 800.0),
        _ => (30.0, 2300.0),
    };
    MicroTargets {
        fiber_grams,
        sodium_mg,
    }
}

/// Assemble one day's targets for `profile` as seen from `evaluation_date`.
///
/// Pure apart from the single weight-history read done by the adjuster.
pub fn compute_daily_targets(
    profile: &Profile,
    evaluation_date: NaiveDate,
    history: &dyn WeightHistory,
) -> Result<DailyTargets> {
    let days_to_goal = profile.days_to_goal(evaluation_date);
    let bmr = estimate_bmr(
        profile.weight_lbs,
        profile.height_inches,
        profile.body_fat_percentage,
    );
    let tier = select_activity_tier(days_to_goal);
    let base_calories = bmr.value * tier.multiplier;

    let (calories, adjustment) = adjust_calories(
        &AdjustmentRequest {
            username: &profile.username,
            base_calories,
            current_weight_lbs: profile.weight_lbs,
            target_weight_lbs: profile.target_weight_lbs,
            days_to_goal,
            evaluation_date,
        },
        history,
    )?;

    let lean_body_mass_lbs = profile.lean_body_mass_lbs();
    let macros = allocate_macros(
        profile.weight_lbs,
        calories,
        tier.fat_fraction,
        lean_body_mass_lbs,
    );
    let micros = allocate_micros(days_to_goal);

    debug!(
        username = %profile.username,
        date = %evaluation_date,
        days_to_goal,
        bmr = bmr.value,
        formula = bmr.formula.label(),
        base_calories,
        calories,
        "computed daily targets"
    );

    Ok(DailyTargets {
        date: evaluation_date,
        days_to_goal,
        bmr: bmr.value,
        bmr_formula: bmr.formula,
        tier,
        base_calories,
        calories,
        lean_body_mass_lbs,
        macros,
        micros,
        adjustment,
    })
}
