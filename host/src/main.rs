use clap::{crate_version, App, AppSettings, Arg, SubCommand};
use log::info;
use tracing_subscriber::EnvFilter;

use host::load_config;
use host::scenario::{Scenario, ScenarioRunner};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = App::new("pocket-svm")
        .version(crate_version!())
        .about("Replays transaction scenarios against an in-memory ledger")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("run")
                .about("Run a JSON scenario and print one record per transaction")
                .arg(
                    Arg::with_name("scenario")
                        .help("Scenario file")
                        .value_name("FILE")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("config")
                        .help("Simulator config file (JSON)")
                        .short("c")
                        .long("config")
                        .value_name("FILE")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("lamports_per_signature")
                        .help("Fee charged per required signature")
                        .long("lamports-per-signature")
                        .value_name("LAMPORTS")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("skip_sig_verify")
                        .help("Treat every required signer as verified")
                        .long("skip-sig-verify"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("run", Some(options)) => {
            let config = load_config(options)?;
            let path = options.value_of("scenario").unwrap_or_default();
            let scenario = Scenario::load(path)?;

            let mut runner = ScenarioRunner::new(config)?;
            let records = runner.run(&scenario)?;
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            info!("{path}: {} transactions", records.len());
            Ok(())
        }
        (name, _) => anyhow::bail!("unknown command {name}"),
    }
}
