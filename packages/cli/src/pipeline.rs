//! Pipeline stages.
//!
//! Each command loads what it needs, computes every result in memory, and
//! only then writes outputs. A failing stage is reported as a
//! [`StageError`] naming the stage. A failure while loading or computing
//! writes nothing. Each output file is replaced atomically, so an export
//! failure can leave files from earlier in the same export but never a
//! truncated one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crash_map_analytics::aggregate::{SegmentStatsTable, aggregate_crashes};
use crash_map_analytics::roads::{RoadBuilder, RoadBuilderOptions};
use crash_map_analytics_models::Road;
use crash_map_cli_utils::{IndicatifProgress, MultiProgress};
use crash_map_crash_models::{CrashId, NormalizedCrash};
use crash_map_geocoder::network::NetworkGeocoder;
use crash_map_geocoder::{CrashLocation, locate_all};
use crash_map_source::crash_csv::read_crash_csv;
use crash_map_source::progress::ProgressCallback;
use crash_map_source::streets::StreetNetwork;

use crate::config::PipelineConfig;

/// Named pipeline stage, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading and normalizing the crash CSV.
    LoadCrashes,
    /// Reading the centerline and intersection `GeoJSON`.
    LoadStreets,
    /// Geocoding crashes onto segments.
    AggregateSegments,
    /// Grouping segments into roads.
    BuildRoads,
    /// Writing output files.
    Export,
    /// Loading `roads.csv` into `DuckDB`.
    LoadDatabase,
}

impl Stage {
    /// Lowercase name used in error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LoadCrashes => "load crashes",
            Self::LoadStreets => "load streets",
            Self::AggregateSegments => "aggregate segments",
            Self::BuildRoads => "build roads",
            Self::Export => "export",
            Self::LoadDatabase => "load database",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure attributed to a pipeline stage.
#[derive(Debug, thiserror::Error)]
#[error("Stage '{stage}' failed: {source}")]
pub struct StageError {
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying error.
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

trait StageResultExt<T> {
    fn stage(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E> StageResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn stage(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError {
            stage,
            source: Box::new(e),
        })
    }
}

/// Everything loaded from the configured inputs.
struct Inputs {
    crashes: BTreeMap<CrashId, NormalizedCrash>,
    network: StreetNetwork,
}

fn load_inputs(config: &PipelineConfig) -> Result<Inputs, StageError> {
    let crashes = read_crash_csv(&config.crash_csv, &config.crash_layout).stage(Stage::LoadCrashes)?;
    let network = StreetNetwork::load(
        &config.centerlines,
        &config.intersections,
        config.municipality.as_deref(),
    )
    .stage(Stage::LoadStreets)?;
    Ok(Inputs { crashes, network })
}

fn locate(
    inputs: &Inputs,
    progress: &Arc<dyn ProgressCallback>,
) -> BTreeMap<CrashId, Option<CrashLocation>> {
    let geocoder = NetworkGeocoder::new(&inputs.network);
    locate_all(&inputs.crashes, &geocoder, progress)
}

fn aggregate(inputs: &Inputs, progress: &Arc<dyn ProgressCallback>) -> SegmentStatsTable {
    let geocoder = NetworkGeocoder::new(&inputs.network);
    aggregate_crashes(&inputs.crashes, &geocoder, &inputs.network, progress)
}

fn build_roads(
    config: &PipelineConfig,
    inputs: &Inputs,
    stats: &SegmentStatsTable,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<Road>, StageError> {
    RoadBuilder::new(RoadBuilderOptions {
        split_on_classification: config.split_on_classification,
    })
    .build_roads(inputs.network.segments(), stats, &inputs.network, progress)
    .stage(Stage::BuildRoads)
}

/// Geocodes crashes and writes the crash location outputs.
///
/// # Errors
///
/// Returns [`StageError`] if inputs cannot be loaded or outputs written.
pub fn run_locate(config: &PipelineConfig, multi: &MultiProgress) -> Result<Vec<PathBuf>, StageError> {
    let inputs = load_inputs(config)?;
    let locations = locate(&inputs, &IndicatifProgress::stage(multi, "Locating crashes"));

    crash_map_export::crashes::write_crash_outputs(&config.output_dir, &inputs.crashes, &locations)
        .stage(Stage::Export)
}

/// Aggregates crashes onto segments and writes the segment outputs.
///
/// # Errors
///
/// Returns [`StageError`] if inputs cannot be loaded or outputs written.
pub fn run_segments(config: &PipelineConfig, multi: &MultiProgress) -> Result<Vec<PathBuf>, StageError> {
    let inputs = load_inputs(config)?;
    let stats = aggregate(&inputs, &IndicatifProgress::stage(multi, "Aggregating segments"));

    crash_map_export::segments::write_segment_outputs(&config.output_dir, &stats)
        .stage(Stage::Export)
}

/// Builds roads and writes the road outputs.
///
/// # Errors
///
/// Returns [`StageError`] if inputs cannot be loaded, roads cannot be
/// built, or outputs cannot be written.
pub fn run_roads(config: &PipelineConfig, multi: &MultiProgress) -> Result<Vec<PathBuf>, StageError> {
    let inputs = load_inputs(config)?;
    let stats = aggregate(&inputs, &IndicatifProgress::stage(multi, "Aggregating segments"));
    let roads = build_roads(config, &inputs, &stats, &IndicatifProgress::stage(multi, "Building roads"))?;

    crash_map_export::roads::write_road_outputs(&config.output_dir, &roads).stage(Stage::Export)
}

/// Loads the exported `roads.csv` into `DuckDB`.
///
/// # Errors
///
/// Returns [`StageError`] if the file is invalid or the load fails.
pub fn run_upload(config: &PipelineConfig) -> Result<u64, StageError> {
    let csv_path = config.output_dir.join(crash_map_export::ROADS_CSV);
    let conn = crash_map_database::roads_db::open(&config.duckdb_path).stage(Stage::LoadDatabase)?;
    crash_map_database::roads_db::load_roads_csv(&conn, &csv_path).stage(Stage::LoadDatabase)
}

/// Runs every stage: locate, aggregate, build roads, export, and
/// optionally load the road table into `DuckDB`.
///
/// # Errors
///
/// Returns [`StageError`] naming the first stage that fails.
pub fn run_all(
    config: &PipelineConfig,
    multi: &MultiProgress,
    upload: bool,
) -> Result<(), StageError> {
    let start = Instant::now();
    let total = if upload { 6 } else { 5 };
    let overall = IndicatifProgress::stages(multi, total);

    overall.set_message("Loading inputs".to_string());
    let inputs = load_inputs(config)?;
    overall.inc(2);

    overall.set_message("Locating crashes".to_string());
    let locations = locate(&inputs, &IndicatifProgress::stage(multi, "Locating crashes"));
    let stats = aggregate(&inputs, &IndicatifProgress::stage(multi, "Aggregating segments"));
    overall.inc(1);

    overall.set_message("Building roads".to_string());
    let roads = build_roads(config, &inputs, &stats, &IndicatifProgress::stage(multi, "Building roads"))?;
    overall.inc(1);

    overall.set_message("Writing outputs".to_string());
    let dir = &config.output_dir;
    let mut written = crash_map_export::crashes::write_crash_outputs(dir, &inputs.crashes, &locations)
        .stage(Stage::Export)?;
    written.extend(crash_map_export::segments::write_segment_outputs(dir, &stats).stage(Stage::Export)?);
    written.extend(crash_map_export::roads::write_road_outputs(dir, &roads).stage(Stage::Export)?);
    overall.inc(1);

    if upload {
        overall.set_message("Loading DuckDB".to_string());
        run_upload(config)?;
        overall.inc(1);
    }

    overall.finish(format!(
        "Wrote {} files ({} roads) in {:.1}s",
        written.len(),
        roads.len(),
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}
