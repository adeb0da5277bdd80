use dotenv::dotenv;
use std::env;

/// Database used when `GRADEBOOK_DB` isn't set.
pub const DEFAULT_DB_PATH: &str = "gradebook.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite file to open. `:memory:` gives a throwaway in-memory database.
    pub db_path: String,
}

impl Config {
    /// Reads configuration from the environment, after loading `.env` if there is one.
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("GRADEBOOK_DB")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| String::from(DEFAULT_DB_PATH));

        Self { db_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_the_default_path() {
        assert_eq!(Config::from_lookup(|_| None).db_path, DEFAULT_DB_PATH);
        assert_eq!(Config::from_lookup(|_| Some(String::from("  "))).db_path, DEFAULT_DB_PATH);
    }

    #[test]
    fn reads_the_path_from_gradebook_db() {
        let config = Config::from_lookup(|key| (key == "GRADEBOOK_DB").then(|| String::from("/tmp/grades.db")));
        assert_eq!(config.db_path, "/tmp/grades.db");
    }
}
