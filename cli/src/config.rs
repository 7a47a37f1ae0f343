use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

const DEFAULT_USER: &str = "default";

pub struct Config {
    pub db_path: PathBuf,
    pub food_db_path: PathBuf,
    pub username: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "weighin").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("weighin.db");
        let food_db_path = std::env::var_os("WEIGHIN_FOOD_DB")
            .map_or_else(|| data_dir.join("food_nutrition.db"), PathBuf::from);
        let username = resolve_username(std::env::var("WEIGHIN_USER").ok());

        Ok(Config {
            db_path,
            food_db_path,
            username,
        })
    }
}

fn resolve_username(from_env: Option<String>) -> String {
    from_env
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_USER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_username() {
        assert_eq!(resolve_username(None), "default");
        assert_eq!(resolve_username(Some("  ".to_string())), "default");
        assert_eq!(resolve_username(Some(" alex ".to_string())), "alex");
    }
}
