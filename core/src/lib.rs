//! Daily calorie, macro and micronutrient targets for hitting a goal
//! weight on a fixed date, adjusted against logged weigh-ins.

pub mod adjust;
pub mod db;
pub mod fooddb;
pub mod models;
pub mod planner;
pub mod progress;
pub mod service;
pub mod weight_import;
