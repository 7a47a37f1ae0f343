use std::ops::{AddAssign, Sub};

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// --- Profile ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub weight_lbs: f64,
    pub target_weight_lbs: f64,
    pub height_inches: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_fat_percentage: Option<f64>,
    pub today_date: NaiveDate,
    pub target_date: NaiveDate,
}

impl Profile {
    /// Signed day count from `date` to the target date.
    #[must_use]
    pub fn days_to_goal(&self, date: NaiveDate) -> i64 {
        (self.target_date - date).num_days()
    }

    /// Body fat percentage, treating zero as "not provided".
    #[must_use]
    pub fn known_body_fat(&self) -> Option<f64> {
        self.body_fat_percentage.filter(|bf| *bf > 0.0)
    }

    #[must_use]
    pub fn lean_body_mass_lbs(&self) -> Option<f64> {
        self.known_body_fat()
            .map(|bf| self.weight_lbs * (1.0 - bf / 100.0))
    }
}

// --- Weight tracking types ---

#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub date: NaiveDate,
    pub weight_lbs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewWeightEntry {
    pub username: String,
    pub date: NaiveDate,
    pub weight_lbs: f64,
    pub notes: Option<String>,
}

// --- Planning engine outputs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmrFormula {
    KatchMcArdle,
    MifflinStJeor,
}

impl BmrFormula {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::KatchMcArdle => "Katch-McArdle",
            Self::MifflinStJeor => "Mifflin-St Jeor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bmr {
    pub value: f64,
    pub formula: BmrFormula,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivityTier {
    pub multiplier: f64,
    pub fat_fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroBreakdown {
    pub protein_grams: f64,
    pub protein_calories: f64,
    pub fat_grams: f64,
    pub fat_calories: f64,
    pub carb_grams: f64,
    pub carb_calories: f64,
}

impl MacroBreakdown {
    #[must_use]
    pub fn total_calories(&self) -> f64 {
        self.protein_calories + self.fat_calories + self.carb_calories
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MicroTargets {
    pub fiber_grams: f64,
    pub sodium_mg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    /// Three days or fewer out: the fixed final-days protocol applies.
    FinalDays,
    NeedsWeightLog,
    ReduceCalories,
    IncreaseCalories,
    OnTrack,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentInfo {
    pub status: AdjustmentStatus,
    pub adjusted: bool,
    pub delta_calories: f64,
    pub reason: String,
    pub needs_weight_log: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_weight_lbs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_weight_lbs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference_lbs: Option<f64>,
}

/// One day's derived targets. Recomputed on every request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTargets {
    pub date: NaiveDate,
    pub days_to_goal: i64,
    pub bmr: f64,
    pub bmr_formula: BmrFormula,
    pub tier: ActivityTier,
    pub base_calories: f64,
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lean_body_mass_lbs: Option<f64>,
    pub macros: MacroBreakdown,
    pub micros: MicroTargets,
    pub adjustment: AdjustmentInfo,
}

impl DailyTargets {
    /// The targets expressed as a nutrient budget, for comparison with a log.
    #[must_use]
    pub fn as_nutrients(&self) -> FoodNutrients {
        FoodNutrients {
            calories: self.calories,
            protein: self.macros.protein_grams,
            fat: self.macros.fat_grams,
            carbs: self.macros.carb_grams,
            fiber: self.micros.fiber_grams,
            sodium: self.micros.sodium_mg,
        }
    }
}

// --- Food logging types ---

/// Nutrient amounts. Per 100 g when read from the food database,
/// absolute once scaled to a portion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodNutrients {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
    /// Milligrams.
    pub sodium: f64,
}

impl FoodNutrients {
    /// Scale per-100 g values to a portion of `grams`.
    #[must_use]
    pub fn scaled(&self, grams: f64) -> Self {
        let m = grams / 100.0;
        Self {
            calories: self.calories * m,
            protein: self.protein * m,
            fat: self.fat * m,
            carbs: self.carbs * m,
            fiber: self.fiber * m,
            sodium: self.sodium * m,
        }
    }

    /// Build a manual entry. A missing or zero calorie count is derived
    /// from the macros at 4/9/4 kcal per gram.
    #[must_use]
    pub fn manual(
        calories: Option<f64>,
        protein: f64,
        fat: f64,
        carbs: f64,
        fiber: f64,
        sodium: f64,
    ) -> Self {
        let calories = calories
            .filter(|c| *c > 0.0)
            .unwrap_or(protein * 4.0 + fat * 9.0 + carbs * 4.0);
        Self {
            calories,
            protein,
            fat,
            carbs,
            fiber,
            sodium,
        }
    }
}

impl AddAssign for FoodNutrients {
    fn add_assign(&mut self, rhs: Self) {
        self.calories += rhs.calories;
        self.protein += rhs.protein;
        self.fat += rhs.fat;
        self.carbs += rhs.carbs;
        self.fiber += rhs.fiber;
        self.sodium += rhs.sodium;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FoodLogEntry {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub date: NaiveDate,
    pub meal_type: String,
    pub food_name: String,
    #[serde(flatten)]
    pub nutrients: FoodNutrients,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodLogEntry {
    pub username: String,
    pub date: NaiveDate,
    pub meal_type: String,
    pub food_name: String,
    pub nutrients: FoodNutrients,
}

/// Changes to a logged food. `None` keeps the current value.
///
/// Calories left at zero are derived from the resulting macros.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FoodLogUpdate {
    pub food_name: Option<String>,
    pub meal_type: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    pub fiber: Option<f64>,
    pub sodium: Option<f64>,
}

impl FoodLogUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.food_name.is_none()
            && self.meal_type.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.fat.is_none()
            && self.carbs.is_none()
            && self.fiber.is_none()
            && self.sodium.is_none()
    }

    /// Apply the changes on top of `current`.
    #[must_use]
    pub fn apply(&self, current: &FoodNutrients) -> FoodNutrients {
        FoodNutrients::manual(
            Some(self.calories.unwrap_or(current.calories)),
            self.protein.unwrap_or(current.protein),
            self.fat.unwrap_or(current.fat),
            self.carbs.unwrap_or(current.carbs),
            self.fiber.unwrap_or(current.fiber),
            self.sodium.unwrap_or(current.sodium),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal_type: String,
    pub entries: Vec<FoodLogEntry>,
    pub subtotal: FoodNutrients,
}

/// A day's food log grouped by meal, with the day's targets when a
/// profile exists.
#[derive(Debug, Clone, Serialize)]
pub struct DayLog {
    pub date: NaiveDate,
    pub meals: Vec<MealGroup>,
    pub total: FoodNutrients,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<DailyTargets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<FoodNutrients>,
}

/// A past meal that can be copied onto another day.
#[derive(Debug, Clone, Serialize)]
pub struct RecentMeal {
    pub date: NaiveDate,
    pub meal_type: String,
    pub entries: Vec<FoodLogEntry>,
    pub total: FoodNutrients,
}

impl Sub for FoodNutrients {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            calories: self.calories - rhs.calories,
            protein: self.protein - rhs.protein,
            fat: self.fat - rhs.fat,
            carbs: self.carbs - rhs.carbs,
            fiber: self.fiber - rhs.fiber,
            sodium: self.sodium - rhs.sodium,
        }
    }
}

// --- Food database types ---

#[derive(Debug, Clone, Serialize)]
pub struct Food {
    pub id: i64,
    pub description: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutrientAmount {
    pub name: String,
    pub amount: f64,
    pub unit_name: String,
}

// --- Progress types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressionPoint {
    pub date: NaiveDate,
    pub expected_weight_lbs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub starting_weight_lbs: f64,
    pub current_weight_lbs: f64,
    pub weight_change_lbs: f64,
    pub target_weight_lbs: f64,
    pub remaining_to_goal_lbs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_change_per_day: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_days_to_goal: Option<i64>,
    pub entries: Vec<WeightEntry>,
    pub progression: Vec<ProgressionPoint>,
}

// --- Validation ---

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

/// How far past the profile date a weigh-in may be planned.
pub const MAX_PLAN_DAYS: i64 = 730;

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.to_lowercase();
    let normalized = if lower == "snacks" { "snack".to_string() } else { lower };
    if MEAL_TYPES.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        bail!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn validate_weight(weight_lbs: f64) -> Result<()> {
    if !is_positive(weight_lbs) {
        bail!("Weight must be greater than 0");
    }
    Ok(())
}

/// Reject profiles the BMR formulas would turn into nonsense.
pub fn validate_profile(profile: &Profile) -> Result<()> {
    if profile.username.trim().is_empty() {
        bail!("Username must not be empty");
    }
    if !is_positive(profile.weight_lbs) {
        bail!("weight_lbs must be greater than 0");
    }
    if !is_positive(profile.target_weight_lbs) {
        bail!("target_weight_lbs must be greater than 0");
    }
    if !is_positive(profile.height_inches) {
        bail!("height_inches must be greater than 0");
    }
    if let Some(bf) = profile.body_fat_percentage {
        if !(0.0..=100.0).contains(&bf) {
            bail!("body_fat_percentage must be between 0 and 100");
        }
    }
    if profile.days_to_goal(profile.today_date) > MAX_PLAN_DAYS {
        bail!("target_date must be within {MAX_PLAN_DAYS} days of today_date");
    }
    Ok(())
}

pub fn validate_nutrients(nutrients: &FoodNutrients) -> Result<()> {
    let fields = [
        ("calories", nutrients.calories),
        ("protein", nutrients.protein),
        ("fat", nutrients.fat),
        ("carbs", nutrients.carbs),
        ("fiber", nutrients.fiber),
        ("sodium", nutrients.sodium),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            bail!("{name} must not be negative");
        }
    }
    Ok(())
}
