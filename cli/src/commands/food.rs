use anyhow::{Result, bail};
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weighin_core::fooddb::{FoodDatabase, FoodNutrientLookup};
use weighin_core::models::{FoodLogUpdate, FoodNutrients};
use weighin_core::service::PlannerService;

use super::helpers::{
    format_nutrients, json_error, parse_date, parse_grams, parse_meal_ref, print_food_table,
};

/// Manually entered nutrients for `food add`.
pub(crate) struct ManualFood {
    pub(crate) name: String,
    pub(crate) calories: Option<f64>,
    pub(crate) protein: f64,
    pub(crate) fat: f64,
    pub(crate) carbs: f64,
    pub(crate) fiber: f64,
    pub(crate) sodium: f64,
}

pub(crate) fn cmd_food_search(
    foods: &FoodDatabase,
    query: &str,
    limit: u32,
    json: bool,
) -> Result<()> {
    let results = foods.search_foods(query, i64::from(limit))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        eprintln!("No foods match '{query}'");
        process::exit(2);
    } else {
        print_food_table(&results);
    }

    Ok(())
}

pub(crate) fn cmd_food_info(foods: &FoodDatabase, id: i64, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct NutrientRow {
        #[tabled(rename = "Nutrient")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let Some(food) = foods.get_food(id)? else {
        if json {
            println!("{}", json_error(&format!("Food {id} not found")));
        } else {
            eprintln!("Food {id} not found");
        }
        process::exit(2);
    };
    let nutrients = foods.get_food_nutrients(id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "food": food,
                "nutrients": nutrients,
            }))?
        );
        return Ok(());
    }

    println!("{} [{}]", food.description, food.data_type.replace('_', " "));
    println!("Per 100 g:\n");

    let rows: Vec<NutrientRow> = nutrients
        .iter()
        .map(|n| NutrientRow {
            name: n.name.clone(),
            amount: format!("{:.2} {}", n.amount, n.unit_name.to_lowercase()),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_food_log(
    svc: &PlannerService,
    foods: &FoodDatabase,
    user: &str,
    food_id: i64,
    portion: &str,
    meal: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let grams = parse_grams(portion)?;
    let date = parse_date(date)?;
    let entry = svc.log_food_from_database(foods, user, date, meal, food_id, grams)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let name = &entry.food_name;
        let meal_type = &entry.meal_type;
        let cal = entry.nutrients.calories;
        println!("Logged: {name} for {meal_type}, {cal:.0} kcal");
    }

    Ok(())
}

pub(crate) fn cmd_food_add(
    svc: &PlannerService,
    user: &str,
    food: &ManualFood,
    meal: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let nutrients = FoodNutrients::manual(
        food.calories,
        food.protein,
        food.fat,
        food.carbs,
        food.fiber,
        food.sodium,
    );
    let entry = svc.log_food(user, date, meal, &food.name, nutrients)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let id = entry.id;
        let name = &entry.food_name;
        let meal_type = &entry.meal_type;
        println!("Logged [{id}] {name} for {meal_type}");
        println!("  {}", format_nutrients(&entry.nutrients));
    }

    Ok(())
}

pub(crate) fn cmd_food_edit(
    svc: &PlannerService,
    user: &str,
    id: i64,
    update: &FoodLogUpdate,
    json: bool,
) -> Result<()> {
    if update.is_empty() {
        bail!(
            "Nothing to update. Provide at least one of --name, --meal, --calories, --protein, \
             --fat, --carbs, --fiber, --sodium"
        );
    }

    if let Some(entry) = svc.update_food(user, id, update)? {
        if json {
            println!("{}", serde_json::to_string_pretty(&entry)?);
        } else {
            let name = &entry.food_name;
            let meal_type = &entry.meal_type;
            println!("Updated [{id}] {name} for {meal_type}");
            println!("  {}", format_nutrients(&entry.nutrients));
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found")));
        } else {
            eprintln!("Entry {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_food_delete(svc: &PlannerService, user: &str, id: i64, json: bool) -> Result<()> {
    if svc.delete_food(user, id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted entry {id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found")));
        } else {
            eprintln!("Entry {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_food_copy(
    svc: &PlannerService,
    user: &str,
    from: &str,
    to: &str,
    json: bool,
) -> Result<()> {
    let (from_date, from_meal) = parse_meal_ref(from)?;
    let (to_date, to_meal) = parse_meal_ref(to)?;

    let copied = svc.copy_meal(user, from_date, &from_meal, to_date, &to_meal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&copied)?);
    } else {
        let count = copied.len();
        println!("Copied {count} entries from {from_date}:{from_meal} to {to_date}:{to_meal}");
    }

    Ok(())
}

pub(crate) fn cmd_food_recent(svc: &PlannerService, user: &str, days: u32, json: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let meals = svc.recent_meals(user, today, i64::from(days))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meals)?);
        return Ok(());
    }

    if meals.is_empty() {
        eprintln!("No meals logged in the last {days} days");
        return Ok(());
    }

    for meal in &meals {
        let date = meal.date;
        let label = meal.meal_type.to_uppercase();
        let cal = meal.total.calories;
        println!("  {date} {label} ({cal:.0} kcal)");
        for e in &meal.entries {
            println!("    {}", e.food_name);
        }
    }
    println!("\nCopy one with `weighin food copy <date>:<meal> today:<meal>`");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_edit_needs_a_field() {
        let svc = PlannerService::new_in_memory().unwrap();
        let err = cmd_food_edit(&svc, "alex", 1, &FoodLogUpdate::default(), true).unwrap_err();
        assert!(err.to_string().starts_with("Nothing to update"));
    }

    #[test]
    fn test_edit_updates_own_entry() {
        let svc = PlannerService::new_in_memory().unwrap();
        let entry = svc
            .log_food(
                "alex",
                NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
                "lunch",
                "Soup",
                FoodNutrients::manual(Some(250.0), 10.0, 5.0, 30.0, 3.0, 800.0),
            )
            .unwrap();
        let update = FoodLogUpdate {
            sodium: Some(400.0),
            ..FoodLogUpdate::default()
        };

        cmd_food_edit(&svc, "alex", entry.id, &update, true).unwrap();
        let stored = svc.get_food_log("alex", entry.id).unwrap().unwrap();
        assert!((stored.nutrients.sodium - 400.0).abs() < 1e-9);
        assert!((stored.nutrients.calories - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_edit_rejects_bad_meal() {
        let svc = PlannerService::new_in_memory().unwrap();
        let entry = svc
            .log_food(
                "alex",
                NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
                "lunch",
                "Soup",
                FoodNutrients::manual(Some(250.0), 10.0, 5.0, 30.0, 3.0, 800.0),
            )
            .unwrap();
        let update = FoodLogUpdate {
            meal_type: Some("brunch".to_string()),
            ..FoodLogUpdate::default()
        };
        assert!(cmd_food_edit(&svc, "alex", entry.id, &update, true).is_err());
    }
}
