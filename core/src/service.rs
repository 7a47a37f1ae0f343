use std::io::Read;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::debug;

use crate::db::Database;
use crate::fooddb::FoodNutrientLookup;
use crate::models::{
    DailyTargets, DayLog, FoodLogEntry, FoodLogUpdate, FoodNutrients, NewFoodLogEntry,
    NewWeightEntry, Profile, ProgressReport, RecentMeal, WeightEntry, validate_meal_type,
    validate_nutrients, validate_profile, validate_weight,
};
use crate::planner::compute_daily_targets;
use crate::progress::build_progress_report;
use crate::weight_import::{self, WeightImportSummary};

/// Entry point for front ends. Validates input before anything is stored.
pub struct PlannerService {
    db: Database,
}

impl PlannerService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Profiles ---

    pub fn save_profile(&self, profile: &Profile) -> Result<Profile> {
        validate_profile(profile)?;
        self.db.save_profile(profile)
    }

    pub fn get_profile(&self, username: &str) -> Result<Option<Profile>> {
        self.db.get_profile(username)
    }

    // --- Targets ---

    /// The user's targets for `date`, or `None` without a profile.
    pub fn daily_targets(&self, username: &str, date: NaiveDate) -> Result<Option<DailyTargets>> {
        match self.db.get_profile(username)? {
            Some(profile) => Ok(Some(compute_daily_targets(&profile, date, &self.db)?)),
            None => Ok(None),
        }
    }

    // --- Weight ---

    pub fn log_weight(
        &self,
        username: &str,
        date: NaiveDate,
        weight_lbs: f64,
        notes: Option<String>,
    ) -> Result<WeightEntry> {
        validate_weight(weight_lbs)?;
        self.db.upsert_weight(&NewWeightEntry {
            username: username.to_string(),
            date,
            weight_lbs,
            notes,
        })
    }

    pub fn get_weight(&self, username: &str, date: NaiveDate) -> Result<Option<WeightEntry>> {
        self.db.get_weight(username, date)
    }

    pub fn weight_history(&self, username: &str, days: Option<i64>) -> Result<Vec<WeightEntry>> {
        self.db.get_weight_history(username, days)
    }

    pub fn delete_weight(&self, username: &str, date: NaiveDate) -> Result<bool> {
        self.db.delete_weight(username, date)
    }

    pub fn import_weights<R: Read>(
        &self,
        username: &str,
        reader: R,
        dry_run: bool,
    ) -> Result<WeightImportSummary> {
        let rows = weight_import::parse_weight_csv(reader)?;
        weight_import::import_weights(&self.db, username, &rows, dry_run)
    }

    // --- Food log ---

    /// Log a manually entered food.
    pub fn log_food(
        &self,
        username: &str,
        date: NaiveDate,
        meal_type: &str,
        food_name: &str,
        nutrients: FoodNutrients,
    ) -> Result<FoodLogEntry> {
        let meal_type = validate_meal_type(meal_type)?;
        let food_name = food_name.trim();
        if food_name.is_empty() {
            bail!("Food name must not be empty");
        }
        validate_nutrients(&nutrients)?;
        self.db.insert_food_log(&NewFoodLogEntry {
            username: username.to_string(),
            date,
            meal_type,
            food_name: food_name.to_string(),
            nutrients,
        })
    }

    /// Log `grams` of a food from the nutrient database, scaled from its
    /// per-100 g values.
    pub fn log_food_from_database(
        &self,
        lookup: &dyn FoodNutrientLookup,
        username: &str,
        date: NaiveDate,
        meal_type: &str,
        food_id: i64,
        grams: f64,
    ) -> Result<FoodLogEntry> {
        if !grams.is_finite() || grams <= 0.0 {
            bail!("Portion must be greater than 0 grams");
        }
        let Some(food) = lookup.get_food(food_id)? else {
            bail!("Food {food_id} not found");
        };
        let nutrients = lookup.macros_per_100g(food_id)?.scaled(grams);
        debug!(food_id, grams, calories = nutrients.calories, "scaled food portion");
        self.log_food(
            username,
            date,
            meal_type,
            &format!("{} ({grams}g)", food.description),
            nutrients,
        )
    }

    /// One of `username`'s entries. Other users' entries read as missing.
    pub fn get_food_log(&self, username: &str, id: i64) -> Result<Option<FoodLogEntry>> {
        Ok(self.db.get_food_log(id)?.filter(|e| e.username == username))
    }

    /// Edit a logged food in place. Fields left out keep their value, and
    /// calories set to 0 are derived from the macros again.
    ///
    /// Returns `None` when `username` has no entry `id`.
    pub fn update_food(
        &self,
        username: &str,
        id: i64,
        update: &FoodLogUpdate,
    ) -> Result<Option<FoodLogEntry>> {
        if update.is_empty() {
            bail!("Nothing to update");
        }
        let Some(current) = self.get_food_log(username, id)? else {
            return Ok(None);
        };

        let meal_type = match &update.meal_type {
            Some(meal) => validate_meal_type(meal)?,
            None => current.meal_type,
        };
        let food_name = match &update.food_name {
            Some(name) => name.trim().to_string(),
            None => current.food_name,
        };
        if food_name.is_empty() {
            bail!("Food name must not be empty");
        }
        let nutrients = update.apply(&current.nutrients);
        validate_nutrients(&nutrients)?;

        debug!(id, calories = nutrients.calories, "updating food log entry");
        self.db
            .update_food_log(username, id, &food_name, &meal_type, &nutrients)
    }

    pub fn delete_food(&self, username: &str, id: i64) -> Result<bool> {
        self.db.delete_food_log(username, id)
    }

    pub fn day_log(&self, username: &str, date: NaiveDate) -> Result<DayLog> {
        self.db.build_day_log(username, date)
    }

    pub fn recent_meals(&self, username: &str, before: NaiveDate, days: i64) -> Result<Vec<RecentMeal>> {
        self.db.recent_meals(username, before, days)
    }

    pub fn copy_meal(
        &self,
        username: &str,
        from_date: NaiveDate,
        from_meal: &str,
        to_date: NaiveDate,
        to_meal: &str,
    ) -> Result<Vec<FoodLogEntry>> {
        let from_meal = validate_meal_type(from_meal)?;
        let to_meal = validate_meal_type(to_meal)?;
        let copied = self
            .db
            .copy_meal(username, from_date, &from_meal, to_date, &to_meal)?;
        if copied.is_empty() {
            bail!("Nothing logged for {from_meal} on {from_date}");
        }
        Ok(copied)
    }

    // --- Progress ---

    /// `None` without a profile or without any logged weight.
    pub fn progress(&self, username: &str) -> Result<Option<ProgressReport>> {
        let Some(profile) = self.db.get_profile(username)? else {
            return Ok(None);
        };
        let entries = self.db.get_weight_history(username, None)?;
        Ok(build_progress_report(&profile, &entries))
    }
}
