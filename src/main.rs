use std::io::{self, BufRead};

use gradebook::commands::Commands;
use gradebook::config::Config;
use gradebook::gradedb::GradeDb;

use anyhow::{Context, Result};

fn main() -> Result<()> {
    // Begin logger
    env_logger::init();

    let config = Config::from_env();

    // Initialize database
    let mut db = GradeDb::open(&config.db_path)
        .with_context(|| format!("Could not open database at {}", config.db_path))?;
    log::info!("Using database at {}", config.db_path);

    for line in io::stdin().lock().lines() {
        let line = line.context("Could not read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = Commands::run_command(&mut db, &line)
            .unwrap_or_else(|err| format!("ERROR: {err:#}"));
        println!("{response}");
    }

    db.close()?;
    Ok(())
}
