use std::path::PathBuf;

use anyhow::Context as _;
use idgrade_core::Round;

use crate::util;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CheckSpecArg {
    /// Round JSON whose scoring spec is checked
    #[arg(long)]
    round: PathBuf,
}

pub(crate) fn run(arg: &CheckSpecArg) -> anyhow::Result<()> {
    let round: Round = util::read_json_file("round", &arg.round)?;
    let spec = &round.spec;
    spec.validate()
        .with_context(|| format!("Invalid scoring spec in {}", arg.round.display()))?;
    println!(
        "scoring spec is valid: {} variations, {} rules at {:.0}%",
        spec.variation_count,
        spec.rule_set.len(),
        spec.rule_percentage * 100.0,
    );
    Ok(())
}
