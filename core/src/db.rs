use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeDelta};
use rusqlite::{Connection, params};
use tracing::info;
use uuid::Uuid;

use crate::models::{
    DayLog, FoodLogEntry, FoodNutrients, MEAL_TYPES, MealGroup, NewFoodLogEntry, NewWeightEntry,
    Profile, RecentMeal, WeightEntry,
};
use crate::planner::{WeightHistory, compute_daily_targets};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS profiles (
                    username TEXT PRIMARY KEY,
                    weight_lbs REAL NOT NULL,
                    target_weight_lbs REAL NOT NULL,
                    height_inches REAL NOT NULL,
                    body_fat_percentage REAL,
                    today_date TEXT NOT NULL,
                    target_date TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weight_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    username TEXT NOT NULL,
                    date TEXT NOT NULL,
                    weight_lbs REAL NOT NULL,
                    notes TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(username, date)
                );

                CREATE TABLE IF NOT EXISTS food_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    username TEXT NOT NULL,
                    date TEXT NOT NULL,
                    meal_type TEXT NOT NULL,
                    food_name TEXT NOT NULL,
                    calories REAL NOT NULL DEFAULT 0,
                    protein REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    fiber REAL NOT NULL DEFAULT 0,
                    sodium REAL NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_weight_entries_user_date
                    ON weight_entries(username, date);
                CREATE INDEX IF NOT EXISTS idx_food_logs_user_date
                    ON food_logs(username, date);

                PRAGMA user_version = 1;",
            )?;
            info!("migrated user store to schema version 1");
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
        let raw: String = row.get(idx)?;
        NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            username: row.get(0)?,
            weight_lbs: row.get(1)?,
            target_weight_lbs: row.get(2)?,
            height_inches: row.get(3)?,
            body_fat_percentage: row.get(4)?,
            today_date: Self::date_column(row, 5)?,
            target_date: Self::date_column(row, 6)?,
        })
    }

    fn weight_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        Ok(WeightEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            username: row.get(2)?,
            date: Self::date_column(row, 3)?,
            weight_lbs: row.get(4)?,
            notes: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    // Expects columns:
    // 0: id, 1: uuid, 2: username, 3: date, 4: meal_type, 5: food_name,
    // 6: calories, 7: protein, 8: fat, 9: carbs, 10: fiber, 11: sodium,
    // 12: created_at
    fn food_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodLogEntry> {
        Ok(FoodLogEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            username: row.get(2)?,
            date: Self::date_column(row, 3)?,
            meal_type: row.get(4)?,
            food_name: row.get(5)?,
            nutrients: FoodNutrients {
                calories: row.get(6)?,
                protein: row.get(7)?,
                fat: row.get(8)?,
                carbs: row.get(9)?,
                fiber: row.get(10)?,
                sodium: row.get(11)?,
            },
            created_at: row.get(12)?,
        })
    }

    // --- Profiles ---

    pub fn save_profile(&self, profile: &Profile) -> Result<Profile> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO profiles (username, weight_lbs, target_weight_lbs, height_inches,
                                   body_fat_percentage, today_date, target_date, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(username) DO UPDATE SET
                weight_lbs = excluded.weight_lbs,
                target_weight_lbs = excluded.target_weight_lbs,
                height_inches = excluded.height_inches,
                body_fat_percentage = excluded.body_fat_percentage,
                today_date = excluded.today_date,
                target_date = excluded.target_date,
                updated_at = excluded.updated_at",
            params![
                profile.username,
                profile.weight_lbs,
                profile.target_weight_lbs,
                profile.height_inches,
                profile.body_fat_percentage,
                profile.today_date.format(DATE_FORMAT).to_string(),
                profile.target_date.format(DATE_FORMAT).to_string(),
                now,
            ],
        )?;
        self.get_profile(&profile.username)?
            .context("Profile not found after save")
    }

    pub fn get_profile(&self, username: &str) -> Result<Option<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT username, weight_lbs, target_weight_lbs, height_inches,
                    body_fat_percentage, today_date, target_date
             FROM profiles WHERE username = ?1",
        )?;
        let mut rows = stmt.query(params![username])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::profile_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    // --- Weight Entries ---

    /// Insert or replace the entry for the user and date. Last write wins.
    pub fn upsert_weight(&self, entry: &NewWeightEntry) -> Result<WeightEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = entry.date.format(DATE_FORMAT).to_string();
        self.conn.execute(
            "INSERT INTO weight_entries (uuid, username, date, weight_lbs, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(username, date) DO UPDATE SET
                weight_lbs = excluded.weight_lbs,
                notes = excluded.notes,
                updated_at = excluded.updated_at",
            params![uuid, entry.username, date_str, entry.weight_lbs, entry.notes, now, now],
        )?;
        self.get_weight(&entry.username, entry.date)?
            .context("Weight entry not found after upsert")
    }

    pub fn get_weight(&self, username: &str, date: NaiveDate) -> Result<Option<WeightEntry>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, username, date, weight_lbs, notes, created_at, updated_at
             FROM weight_entries WHERE username = ?1 AND date = ?2",
        )?;
        let mut rows = stmt.query(params![username, date_str])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::weight_entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Most recent entries first. `days` caps the number of entries returned.
    pub fn get_weight_history(&self, username: &str, days: Option<i64>) -> Result<Vec<WeightEntry>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = days.unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, username, date, weight_lbs, notes, created_at, updated_at
             FROM weight_entries WHERE username = ?1
             ORDER BY date DESC LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![username, limit], Self::weight_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn delete_weight(&self, username: &str, date: NaiveDate) -> Result<bool> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let rows = self.conn.execute(
            "DELETE FROM weight_entries WHERE username = ?1 AND date = ?2",
            params![username, date_str],
        )?;
        Ok(rows > 0)
    }

    // --- Food Logs ---

    pub fn insert_food_log(&self, entry: &NewFoodLogEntry) -> Result<FoodLogEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = entry.date.format(DATE_FORMAT).to_string();
        let n = &entry.nutrients;
        self.conn.execute(
            "INSERT INTO food_logs (uuid, username, date, meal_type, food_name,
                                    calories, protein, fat, carbs, fiber, sodium, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                uuid,
                entry.username,
                date_str,
                entry.meal_type,
                entry.food_name,
                n.calories,
                n.protein,
                n.fat,
                n.carbs,
                n.fiber,
                n.sodium,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food_log(id)?
            .context("Food log entry not found after insert")
    }

    pub fn get_food_log(&self, id: i64) -> Result<Option<FoodLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, username, date, meal_type, food_name,
                    calories, protein, fat, carbs, fiber, sodium, created_at
             FROM food_logs WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_log_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Delete one of `username`'s entries. Entries of other users are untouched.
    pub fn delete_food_log(&self, username: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM food_logs WHERE id = ?1 AND username = ?2",
            params![id, username],
        )?;
        Ok(rows > 0)
    }

    /// Rewrite the name, meal and nutrients of one of `username`'s entries.
    /// Returns `None` when no such entry belongs to `username`.
    pub fn update_food_log(
        &self,
        username: &str,
        id: i64,
        food_name: &str,
        meal_type: &str,
        nutrients: &FoodNutrients,
    ) -> Result<Option<FoodLogEntry>> {
        let rows = self.conn.execute(
            "UPDATE food_logs
             SET food_name = ?1, meal_type = ?2, calories = ?3, protein = ?4,
                 fat = ?5, carbs = ?6, fiber = ?7, sodium = ?8
             WHERE id = ?9 AND username = ?10",
            params![
                food_name,
                meal_type,
                nutrients.calories,
                nutrients.protein,
                nutrients.fat,
                nutrients.carbs,
                nutrients.fiber,
                nutrients.sodium,
                id,
                username,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_food_log(id)
    }

    pub fn get_food_logs_for_date(&self, username: &str, date: NaiveDate) -> Result<Vec<FoodLogEntry>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, username, date, meal_type, food_name,
                    calories, protein, fat, carbs, fiber, sodium, created_at
             FROM food_logs
             WHERE username = ?1 AND date = ?2
             ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![username, date_str], Self::food_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn get_food_logs_between(
        &self,
        username: &str,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<FoodLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, username, date, meal_type, food_name,
                    calories, protein, fat, carbs, fiber, sodium, created_at
             FROM food_logs
             WHERE username = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date DESC, id",
        )?;
        let entries = stmt
            .query_map(
                params![
                    username,
                    from.format(DATE_FORMAT).to_string(),
                    until.format(DATE_FORMAT).to_string()
                ],
                Self::food_log_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Group a day's entries by meal, total them, and attach the day's
    /// targets when the user has a profile.
    pub fn build_day_log(&self, username: &str, date: NaiveDate) -> Result<DayLog> {
        let entries = self.get_food_logs_for_date(username, date)?;
        let meals = group_by_meal(&entries);

        let mut total = FoodNutrients::default();
        for meal in &meals {
            total += meal.subtotal;
        }

        let targets = match self.get_profile(username)? {
            Some(profile) => Some(compute_daily_targets(&profile, date, self)?),
            None => None,
        };
        let remaining = targets.as_ref().map(|t| t.as_nutrients() - total);

        Ok(DayLog {
            date,
            meals,
            total,
            targets,
            remaining,
        })
    }

    /// Meals logged in the `days` days before `before`, newest day first.
    /// A window reaching past the earliest representable date covers everything.
    pub fn recent_meals(&self, username: &str, before: NaiveDate, days: i64) -> Result<Vec<RecentMeal>> {
        let from = TimeDelta::try_days(days)
            .and_then(|window| before.checked_sub_signed(window))
            .unwrap_or(NaiveDate::MIN);
        let entries = self.get_food_logs_between(username, from, before)?;

        let mut meals: Vec<RecentMeal> = Vec::new();
        let mut day_start = 0;
        while day_start < entries.len() {
            let date = entries[day_start].date;
            let day_end = entries[day_start..]
                .iter()
                .position(|e| e.date != date)
                .map_or(entries.len(), |n| day_start + n);
            for group in group_by_meal(&entries[day_start..day_end]) {
                meals.push(RecentMeal {
                    date,
                    meal_type: group.meal_type,
                    entries: group.entries,
                    total: group.subtotal,
                });
            }
            day_start = day_end;
        }
        Ok(meals)
    }

    /// Duplicate every entry of one meal onto another date and meal.
    pub fn copy_meal(
        &self,
        username: &str,
        from_date: NaiveDate,
        from_meal: &str,
        to_date: NaiveDate,
        to_meal: &str,
    ) -> Result<Vec<FoodLogEntry>> {
        let source: Vec<FoodLogEntry> = self
            .get_food_logs_for_date(username, from_date)?
            .into_iter()
            .filter(|e| e.meal_type == from_meal)
            .collect();

        let mut copied = Vec::with_capacity(source.len());
        for entry in source {
            copied.push(self.insert_food_log(&NewFoodLogEntry {
                username: username.to_string(),
                date: to_date,
                meal_type: to_meal.to_string(),
                food_name: entry.food_name,
                nutrients: entry.nutrients,
            })?);
        }
        Ok(copied)
    }
}

impl WeightHistory for Database {
    fn latest_weight_on_or_before(
        &self,
        username: &str,
        date: NaiveDate,
    ) -> Result<Option<WeightEntry>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, username, date, weight_lbs, notes, created_at, updated_at
             FROM weight_entries
             WHERE username = ?1 AND date <= ?2
             ORDER BY date DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![username, date_str])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::weight_entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }
}

/// Split entries into meal groups in breakfast, lunch, dinner, snack order.
/// Empty meals are left out.
fn group_by_meal(entries: &[FoodLogEntry]) -> Vec<MealGroup> {
    let mut meals = Vec::new();
    for meal_type in MEAL_TYPES {
        let meal_entries: Vec<FoodLogEntry> = entries
            .iter()
            .filter(|e| e.meal_type == *meal_type)
            .cloned()
            .collect();

        if meal_entries.is_empty() {
            continue;
        }

        let mut subtotal = FoodNutrients::default();
        for e in &meal_entries {
            subtotal += e.nutrients;
        }

        meals.push(MealGroup {
            meal_type: (*meal_type).to_string(),
            entries: meal_entries,
            subtotal,
        });
    }
    meals
}
