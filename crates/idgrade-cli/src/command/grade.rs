use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use idgrade_address::{
    gazetteer::StaticGazetteer,
    geocode::{FixtureGeocoder, Geocoder, UnavailableGeocoder},
};
use idgrade_core::Round;
use idgrade_round::{GradingConfig, grade_round};

use crate::util;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct GradeArg {
    /// Round JSON: seeds, scoring spec and submissions
    #[arg(long)]
    pub(crate) round: PathBuf,
    /// Grading config JSON; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `round_seed` from the config
    #[arg(long)]
    pub(crate) round_seed: Option<u64>,
    /// Gazetteer JSON (country → cities); the built-in table is used otherwise
    #[arg(long)]
    gazetteer: Option<PathBuf>,
    /// Recorded geocoder responses keyed by query
    #[arg(long)]
    geocode_fixture: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

pub(crate) fn run(arg: &GradeArg) -> anyhow::Result<()> {
    let round: Round = util::read_json_file("round", &arg.round)?;
    let mut config = match &arg.config {
        Some(path) => util::read_json_file("config", path)?,
        None => GradingConfig::default(),
    };
    if let Some(seed) = arg.round_seed {
        config.round_seed = seed;
    }

    let gazetteer = match &arg.gazetteer {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open gazetteer file: {}", path.display()))?;
            StaticGazetteer::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to load gazetteer: {}", path.display()))?
        }
        None => StaticGazetteer::builtin(),
    };
    let geocoder: Arc<dyn Geocoder> = match &arg.geocode_fixture {
        Some(path) => {
            let fixture: FixtureGeocoder = util::read_json_file("geocode fixture", path)?;
            tracing::info!(responses = fixture.len(), "loaded geocode fixture");
            Arc::new(fixture)
        }
        None => {
            tracing::warn!("no geocoder configured; geocoded addresses will soft-fail");
            Arc::new(UnavailableGeocoder)
        }
    };

    let report = grade_round(&round, &config, geocoder, &gazetteer)
        .with_context(|| format!("Failed to grade round: {}", arg.round.display()))?;
    util::write_json(&report, arg.output.as_deref())?;
    Ok(())
}
