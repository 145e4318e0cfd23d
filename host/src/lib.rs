pub mod scenario;

use clap::ArgMatches;
use pocket_svm_core::config::SimulatorConfig;

/// Builds the simulator config from, in increasing precedence, the `--config`
/// file, `POCKET_SVM_*` environment variables and the remaining flags.
pub fn load_config(options: &ArgMatches) -> anyhow::Result<SimulatorConfig> {
    let config = match options.value_of("config") {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };
    let mut config = config.with_environment()?;

    if let Some(lamports) = options.value_of("lamports_per_signature") {
        config.lamports_per_signature = lamports.parse()?;
    }
    if options.is_present("skip_sig_verify") {
        config.sig_verify = false;
    }
    Ok(config)
}
