//! Interactive setup wizard.
//!
//! Prompts for input and output locations, checks that the crash CSV has
//! the expected shape, and writes the answers to the config file.

use std::path::{Path, PathBuf};

use crash_map_source::crash_csv::validate_crash_csv;
use dialoguer::{Confirm, Input};

use crate::config::PipelineConfig;

/// Runs the setup wizard and saves the result to `config_path`.
///
/// Existing values in `config_path` are offered as defaults.
///
/// # Errors
///
/// Returns an error if a prompt fails, the crash CSV does not validate, or
/// the config file cannot be written.
pub fn run(config_path: &Path) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let current = PipelineConfig::load(config_path)?;

    println!("Crash map setup");
    println!();

    let mut config = PipelineConfig {
        crash_csv: prompt_path("Raw crash CSV", &current.crash_csv)?,
        centerlines: prompt_path("Street centerlines GeoJSON", &current.centerlines)?,
        intersections: prompt_path("Intersections GeoJSON", &current.intersections)?,
        output_dir: prompt_path("Output directory", &current.output_dir)?,
        duckdb_path: prompt_path("DuckDB file", &current.duckdb_path)?,
        ..current
    };

    let municipality: String = Input::new()
        .with_prompt("Municipality code filter (empty for none)")
        .with_initial_text(config.municipality.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    config.municipality = Some(municipality.trim().to_string()).filter(|m| !m.is_empty());

    config.split_on_classification = Confirm::new()
        .with_prompt("Split roads where the street classification changes?")
        .default(config.split_on_classification)
        .interact()?;

    let rows = validate_crash_csv(&config.crash_csv, &config.crash_layout).map_err(|e| {
        format!(
            "Crash CSV {} is not properly formatted: {e}",
            config.crash_csv.display()
        )
    })?;
    println!(
        "Crash CSV OK: {rows} rows with {} fields each",
        config.crash_layout.field_count
    );

    config.save(config_path)?;
    Ok(config)
}

fn prompt_path(prompt: &str, default: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(default.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(input.trim()))
}
