use resalloc_replay::{logging, Experiment, ExperimentConfig};

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_CONFIG: &str = "resalloc.yaml";

fn run(config_path: PathBuf) -> resalloc_replay::Result<()> {
  let config = ExperimentConfig::from_file(&config_path)?;
  logging::init(config.log_level)?;
  tracing::info!(config = %config_path.display(), policies = config.policies.len(), "starting experiment");

  let experiment = Experiment::load(config)?;
  for run in experiment.run_all()? {
    println!("{}", run.summary());
  }
  Ok(())
}

fn main() -> ExitCode {
  let config_path = env::args_os()
    .nth(1)
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

  match run(config_path) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("[resalloc:ERROR] {e}");
      ExitCode::FAILURE
    }
  }
}
