use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::{check_spec::CheckSpecArg, grade::GradeArg};

mod check_spec;
mod grade;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log filter directives, e.g. `info` or `idgrade_address=debug`
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Grade every submission of a round and write the report as JSON
    Grade(#[clap(flatten)] GradeArg),
    /// Validate the scoring spec of a round
    CheckSpec(#[clap(flatten)] CheckSpecArg),
}

fn init_logging(directives: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(directives)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_logging(&args.log)?;
    match args.mode {
        Mode::Grade(arg) => grade::run(&arg)?,
        Mode::CheckSpec(arg) => check_spec::run(&arg)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition_is_consistent() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_grade_arguments() {
        let args = CommandArgs::try_parse_from([
            "idgrade",
            "grade",
            "--round",
            "round.json",
            "--round-seed",
            "7",
            "--log",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.log, "debug");
        let Mode::Grade(arg) = args.mode else {
            panic!("expected grade");
        };
        assert_eq!(arg.round.to_str(), Some("round.json"));
        assert_eq!(arg.round_seed, Some(7));
        assert!(arg.output.is_none());
    }

    #[test]
    fn test_round_is_required() {
        assert!(CommandArgs::try_parse_from(["idgrade", "check-spec"]).is_err());
    }
}
