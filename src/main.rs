use flowsynth::config;
use flowsynth::export;
use flowsynth::pcap2profile::PcapSource;
use flowsynth::profile::ProfileRegistry;
use flowsynth::synth::Synthesizer;
use flowsynth::ui;
mod cmd;

use std::io;
use std::process;
use std::time::{Duration, UNIX_EPOCH};

use clap::Parser;
use rand_core::SeedableRng;
use rand_pcg::Pcg32;

/// The entry point of the application.
///
/// Every error is fatal: it is logged and the process exits with status 1.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cmd::Args::parse();

    if let Err(e) = run(args.command) {
        log::error!("{e}");
        process::exit(1);
    }
}

fn run(command: cmd::Command) -> flowsynth::Result<()> {
    match command {
        cmd::Command::Generate {
            input_pcap,
            output_csv,
            records,
            seed,
            config,
            port_threshold,
            quiet,
        } => {
            let run_config = match config {
                Some(path) => config::load_config(path)?,
                None => config::RunConfig::default(),
            }
            .with_overrides(records, seed, port_threshold, quiet);

            let registry = profile(&input_pcap)?;

            let mut rng = match run_config.synthesis.seed {
                Some(s) => {
                    log::info!("Generating with seed {s}");
                    Pcg32::seed_from_u64(s)
                }
                None => Pcg32::from_entropy(),
            };
            let synthesizer = Synthesizer::new(&registry)
                .with_port_threshold(run_config.synthesis.port_threshold);
            let records = synthesizer.generate(run_config.synthesis.records, &mut rng);

            export::export_csv(&output_csv, &records)?;
            if run_config.output.console {
                export::print_records(io::stdout().lock(), &records).map_err(|source| {
                    flowsynth::Error::Output {
                        path: "<stdout>".into(),
                        source,
                    }
                })?;
            }
        }
        cmd::Command::Summary { input_pcap } => {
            let registry = profile(&input_pcap)?;
            if let Some((first, last)) = registry.time_span() {
                println!(
                    "Capture from {} to {} ({})",
                    humantime::format_rfc3339_seconds(UNIX_EPOCH + first),
                    humantime::format_rfc3339_seconds(UNIX_EPOCH + last),
                    humantime::format_duration(Duration::from_secs((last - first).as_secs()))
                );
            }
            println!(
                "{} subnets, {} hosts",
                registry.subnet_stats.len(),
                registry.host_stats.len()
            );
            for line in registry.summary() {
                println!("{line}");
            }
        }
        cmd::Command::Profile {
            input_pcap,
            output_json,
        } => {
            let registry = profile(&input_pcap)?;
            export::export_profile(&output_json, &registry)?;
        }
    }
    Ok(())
}

/// Open the capture, failing before any profiling, and build the profile
fn profile(input_pcap: &str) -> flowsynth::Result<ProfileRegistry> {
    let mut source = PcapSource::open(input_pcap)?;
    let registry = ui::profile_with_progress(source.by_ref());
    log::debug!("{} frames read from {input_pcap}", source.packets_read());
    if registry.is_empty() {
        log::warn!("No IPv4 packet in {input_pcap}: only random records can be generated");
    }
    Ok(registry)
}
