mod commands;
mod config;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use crate::commands::{
    ManualFood, ProfileArgs, WeightUnit, cmd_food_add, cmd_food_copy, cmd_food_delete,
    cmd_food_edit, cmd_food_info, cmd_food_log, cmd_food_recent, cmd_food_search, cmd_plan,
    cmd_profile_set, cmd_profile_show, cmd_progress, cmd_summary, cmd_weight_delete,
    cmd_weight_history, cmd_weight_import, cmd_weight_log, cmd_weight_show,
};
use crate::config::Config;
use weighin_core::fooddb::FoodDatabase;
use weighin_core::models::FoodLogUpdate;
use weighin_core::service::PlannerService;

#[derive(Parser)]
#[command(
    name = "weighin",
    version,
    about = "Daily calorie and macro targets for hitting a weigh-in",
    long_about = "Daily calorie, macro, and micro targets for hitting a target weight on a \
                  target date. Targets adapt to the weight you log."
)]
struct Cli {
    /// User to act as (default: $WEIGHIN_USER or "default")
    #[arg(long, global = true)]
    user: Option<String>,
    /// Unit for weights shown and entered: lbs or kg
    #[arg(long, global = true, default_value = "lbs")]
    unit: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the weigh-in profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show calorie, macro, and micro targets for a day (default: today)
    Plan {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Search the food database and log what you eat
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Show a day's food log against its targets (default: today)
    Summary {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress toward the target weight
    Progress {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the JSON API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Create or replace the profile
    Set {
        /// Current weight
        #[arg(long)]
        weight: f64,
        /// Weight to reach on the target date
        #[arg(long)]
        target_weight: f64,
        /// Height in inches
        #[arg(long)]
        height: f64,
        /// Body fat percentage (enables Katch-McArdle)
        #[arg(long)]
        body_fat: Option<f64>,
        /// Weigh-in date (YYYY-MM-DD)
        #[arg(long)]
        target_date: String,
        /// Date the profile was taken (default: today)
        #[arg(long)]
        today: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry (replaces any entry for the same date)
    Log {
        /// Weight value
        value: f64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight for a specific date (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history, newest first
    History {
        /// Number of most recent entries to show (default: all)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the weight entry for a date
    Delete {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import weights from a CSV file with Date, Weight, and optional Notes columns
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Search the food nutrient database
    Search {
        /// Search term
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value = "25")]
        limit: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show every nutrient recorded for a food, per 100 g
    Info {
        /// Food ID from `food search`
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a portion of a food from the database
    Log {
        /// Food ID from `food search`
        food_id: i64,
        /// Portion in grams (e.g. "150" or "150g")
        portion: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food by entering its nutrients
    Add {
        /// Food name
        name: String,
        /// Calories (derived from macros when omitted or 0)
        #[arg(long)]
        calories: Option<f64>,
        /// Protein in grams
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Fat in grams
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Carbs in grams
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Fiber in grams
        #[arg(long, default_value = "0")]
        fiber: f64,
        /// Sodium in milligrams
        #[arg(long, default_value = "0")]
        sodium: f64,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a logged food in place; omitted fields keep their value
    Edit {
        /// Entry ID to edit
        id: i64,
        /// New food name
        #[arg(long)]
        name: Option<String>,
        /// New calories (0 derives them from the macros)
        #[arg(long)]
        calories: Option<f64>,
        /// New protein in grams
        #[arg(long)]
        protein: Option<f64>,
        /// New fat in grams
        #[arg(long)]
        fat: Option<f64>,
        /// New carbs in grams
        #[arg(long)]
        carbs: Option<f64>,
        /// New fiber in grams
        #[arg(long)]
        fiber: Option<f64>,
        /// New sodium in milligrams
        #[arg(long)]
        sodium: Option<f64>,
        /// New meal type: breakfast, lunch, dinner, snack
        #[arg(short, long)]
        meal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food log entry by ID
    Delete {
        /// Entry ID to delete
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy a meal from one date/meal to another
    Copy {
        /// Source in format "date:meal" (e.g. "yesterday:lunch" or "2024-01-15:breakfast")
        from: String,
        /// Destination in format "date:meal"
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List meals logged over the last N days
    Recent {
        /// Number of days to look back
        #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let filter = std::env::var("WEIGHIN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::debug!(%filter, "log filter");
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn open_food_db(path: &Path) -> Result<FoodDatabase> {
    FoodDatabase::open(path).with_context(|| {
        format!(
            "No food database at {}. Set WEIGHIN_FOOD_DB to a FoodData Central SQLite file",
            path.display()
        )
    })
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = PlannerService::new(&config.db_path)?;
    let unit = WeightUnit::parse(&cli.unit)?;
    let user = cli.user.unwrap_or(config.username);
    let user = user.as_str();

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                weight,
                target_weight,
                height,
                body_fat,
                target_date,
                today,
                json,
            } => {
                let args = ProfileArgs {
                    weight,
                    target_weight,
                    height_inches: height,
                    body_fat,
                    target_date,
                    today,
                };
                cmd_profile_set(&svc, user, args, unit, json)
            }
            ProfileCommands::Show { json } => cmd_profile_show(&svc, user, unit, json),
        },
        Commands::Plan { date, json } => cmd_plan(&svc, user, date, json),
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                date,
                notes,
                json,
            } => cmd_weight_log(&svc, user, value, unit, date, notes, json),
            WeightCommands::Show { date, json } => cmd_weight_show(&svc, user, date, unit, json),
            WeightCommands::History { days, json } => {
                cmd_weight_history(&svc, user, days, unit, json)
            }
            WeightCommands::Delete { date, json } => {
                cmd_weight_delete(&svc, user, Some(date), json)
            }
            WeightCommands::Import {
                file,
                dry_run,
                json,
            } => cmd_weight_import(&svc, user, &file, dry_run, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Search { query, limit, json } => {
                let foods = open_food_db(&config.food_db_path)?;
                cmd_food_search(&foods, &query, limit, json)
            }
            FoodCommands::Info { id, json } => {
                let foods = open_food_db(&config.food_db_path)?;
                cmd_food_info(&foods, id, json)
            }
            FoodCommands::Log {
                food_id,
                portion,
                meal,
                date,
                json,
            } => {
                let foods = open_food_db(&config.food_db_path)?;
                cmd_food_log(&svc, &foods, user, food_id, &portion, &meal, date, json)
            }
            FoodCommands::Add {
                name,
                calories,
                protein,
                fat,
                carbs,
                fiber,
                sodium,
                meal,
                date,
                json,
            } => {
                let food = ManualFood {
                    name,
                    calories,
                    protein,
                    fat,
                    carbs,
                    fiber,
                    sodium,
                };
                cmd_food_add(&svc, user, &food, &meal, date, json)
            }
            FoodCommands::Edit {
                id,
                name,
                calories,
                protein,
                fat,
                carbs,
                fiber,
                sodium,
                meal,
                json,
            } => {
                let update = FoodLogUpdate {
                    food_name: name,
                    meal_type: meal,
                    calories,
                    protein,
                    fat,
                    carbs,
                    fiber,
                    sodium,
                };
                cmd_food_edit(&svc, user, id, &update, json)
            }
            FoodCommands::Delete { id, json } => cmd_food_delete(&svc, user, id, json),
            FoodCommands::Copy { from, to, json } => cmd_food_copy(&svc, user, &from, &to, json),
            FoodCommands::Recent { days, json } => cmd_food_recent(&svc, user, days, json),
        },
        Commands::Summary { date, json } => cmd_summary(&svc, user, date, json),
        Commands::Progress { json } => cmd_progress(&svc, user, unit, json),
        Commands::Serve { port, bind } => {
            let foods = if config.food_db_path.exists() {
                Some(open_food_db(&config.food_db_path)?)
            } else {
                None
            };
            server::start_server(svc, foods, port, &bind).await
        }
    }
}
