mod food;
mod helpers;
mod plan;
mod profile;
mod progress;
mod summary;
mod weight;

use anyhow::{Result, anyhow};

use weighin_core::models::Profile;
use weighin_core::service::PlannerService;

pub(crate) use food::{
    ManualFood, cmd_food_add, cmd_food_copy, cmd_food_delete, cmd_food_edit, cmd_food_info,
    cmd_food_log, cmd_food_recent, cmd_food_search,
};
pub(crate) use helpers::WeightUnit;
pub(crate) use plan::cmd_plan;
pub(crate) use profile::{ProfileArgs, cmd_profile_set, cmd_profile_show};
pub(crate) use progress::cmd_progress;
pub(crate) use summary::cmd_summary;
pub(crate) use weight::{
    cmd_weight_delete, cmd_weight_history, cmd_weight_import, cmd_weight_log, cmd_weight_show,
};

pub(super) fn no_profile(user: &str) -> anyhow::Error {
    anyhow!("No profile for '{user}'. Use `weighin profile set` to create one.")
}

/// The user's profile, or an error pointing at `profile set`.
pub(super) fn require_profile(svc: &PlannerService, user: &str) -> Result<Profile> {
    svc.get_profile(user)?.ok_or_else(|| no_profile(user))
}
