use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use weighin_core::models::{Food, FoodNutrients};

const LBS_PER_KG: f64 = 2.204_62;
const KG_PER_LB: f64 = 0.453_592;

/// Unit used for weights typed on and printed to the terminal.
/// Everything is stored in pounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WeightUnit {
    Lbs,
    Kg,
}

impl WeightUnit {
    pub(crate) fn parse(unit: &str) -> Result<Self> {
        match unit.to_lowercase().as_str() {
            "lbs" | "lb" => Ok(Self::Lbs),
            "kg" => Ok(Self::Kg),
            _ => bail!("Invalid unit '{unit}'. Use 'lbs' or 'kg'"),
        }
    }

    pub(crate) fn to_lbs(self, value: f64) -> f64 {
        match self {
            Self::Lbs => value,
            Self::Kg => value * LBS_PER_KG,
        }
    }

    pub(crate) fn from_lbs(self, lbs: f64) -> f64 {
        match self {
            Self::Lbs => lbs,
            Self::Kg => lbs * KG_PER_LB,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Lbs => "lbs",
            Self::Kg => "kg",
        }
    }

    /// `lbs` rendered in this unit with one decimal.
    pub(crate) fn format(self, lbs: f64) -> String {
        format!("{:.1} {}", no_neg_zero(self.from_lbs(lbs)), self.label())
    }
}

/// Parse a portion like "150", "150g" or "150 g" into grams.
pub(crate) fn parse_grams(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches('g').trim();
    let value: f64 = trimmed
        .parse()
        .with_context(|| format!("Invalid portion: '{s}'. Use a number like '150' or '150g'"))?;
    if value <= 0.0 {
        bail!("Portion must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn parse_meal_ref(s: &str) -> Result<(NaiveDate, String)> {
    use weighin_core::models::validate_meal_type;

    let parts: Vec<&str> = s.splitn(2, ':').collect();
    if parts.len() != 2 {
        bail!("Invalid meal reference '{s}'. Use format 'date:meal' (e.g. 'yesterday:lunch')");
    }
    let date = parse_date(Some(parts[0].to_string()))?;
    let meal = validate_meal_type(parts[1])?;
    Ok((date, meal))
}

pub(crate) fn print_food_table(foods: &[Food]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Type")]
        data_type: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            description: truncate(&f.description, 60),
            data_type: f.data_type.replace('_', " "),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

/// "520 kcal | P:30g F:20g C:45g | fiber 6g sodium 800mg"
pub(crate) fn format_nutrients(n: &FoodNutrients) -> String {
    let cal = no_neg_zero(n.calories);
    let p = no_neg_zero(n.protein);
    let f = no_neg_zero(n.fat);
    let c = no_neg_zero(n.carbs);
    let fiber = no_neg_zero(n.fiber);
    let sodium = no_neg_zero(n.sodium);
    format!("{cal:.0} kcal | P:{p:.0}g F:{f:.0}g C:{c:.0}g | fiber {fiber:.0}g sodium {sodium:.0}mg")
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
