use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};

use crate::models::{Food, FoodNutrients, NutrientAmount};

const NUTRIENT_ENERGY: i64 = 1008;
const NUTRIENT_PROTEIN: i64 = 1003;
const NUTRIENT_FAT: i64 = 1004;
const NUTRIENT_CARBS: i64 = 1005;
const NUTRIENT_FIBER: i64 = 1079;
const NUTRIENT_SODIUM: i64 = 1093;

/// Nutrient source for logging a food by portion weight.
pub trait FoodNutrientLookup {
    fn get_food(&self, food_id: i64) -> Result<Option<Food>>;

    /// Per-100 g amounts. Nutrients missing from the source are zero.
    fn macros_per_100g(&self, food_id: i64) -> Result<FoodNutrients>;
}

/// Read-only view over a FoodData Central style SQLite export
/// (`food`, `nutrient` and `food_nutrient` tables).
pub struct FoodDatabase {
    conn: Connection,
}

impl FoodDatabase {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open food database: {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Foods whose description contains `term`, foundation foods first.
    pub fn search_foods(&self, term: &str, limit: i64) -> Result<Vec<Food>> {
        let pattern = format!("%{term}%");
        let mut stmt = self.conn.prepare(
            "SELECT fdc_id, description, data_type
             FROM food
             WHERE description LIKE ?1
             ORDER BY
                CASE WHEN data_type = 'foundation_food' THEN 1 ELSE 2 END,
                description
             LIMIT ?2",
        )?;
        let foods = stmt
            .query_map(params![pattern, limit], |row| {
                Ok(Food {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    data_type: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Every recorded nutrient for a food, in the source's display order.
    pub fn get_food_nutrients(&self, food_id: i64) -> Result<Vec<NutrientAmount>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.name, fn.amount, n.unit_name
             FROM food_nutrient fn
             JOIN nutrient n ON fn.nutrient_id = n.id
             WHERE fn.fdc_id = ?1 AND fn.amount IS NOT NULL
             ORDER BY n.rank",
        )?;
        let nutrients = stmt
            .query_map(params![food_id], |row| {
                Ok(NutrientAmount {
                    name: row.get(0)?,
                    amount: row.get(1)?,
                    unit_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nutrients)
    }
}

impl FoodNutrientLookup for FoodDatabase {
    fn get_food(&self, food_id: i64) -> Result<Option<Food>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fdc_id, description, data_type FROM food WHERE fdc_id = ?1")?;
        let mut rows = stmt.query(params![food_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Food {
                id: row.get(0)?,
                description: row.get(1)?,
                data_type: row.get(2)?,
            }))
        } else {
            Ok(None)
        }
    }

    fn macros_per_100g(&self, food_id: i64) -> Result<FoodNutrients> {
        let mut stmt = self.conn.prepare(
            "SELECT nutrient_id, amount
             FROM food_nutrient
             WHERE fdc_id = ?1
               AND nutrient_id IN (?2, ?3, ?4, ?5, ?6, ?7)
               AND amount IS NOT NULL",
        )?;
        let rows = stmt
            .query_map(
                params![
                    food_id,
                    NUTRIENT_ENERGY,
                    NUTRIENT_PROTEIN,
                    NUTRIENT_FAT,
                    NUTRIENT_CARBS,
                    NUTRIENT_FIBER,
                    NUTRIENT_SODIUM
                ],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut n = FoodNutrients::default();
        for (nutrient_id, amount) in rows {
            match nutrient_id {
                NUTRIENT_ENERGY => n.calories = amount,
                NUTRIENT_PROTEIN => n.protein = amount,
                NUTRIENT_FAT => n.fat = amount,
                NUTRIENT_CARBS => n.carbs = amount,
                NUTRIENT_FIBER => n.fiber = amount,
                NUTRIENT_SODIUM => n.sodium = amount,
                _ => {}
            }
        }
        Ok(n)
    }
}
