use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Profile a pcap file and synthesize flow records from it
    Generate {
        #[arg(short, long, required = true, help = "Pcap file to profile")]
        input_pcap: String,
        #[arg(short, long, required = true, help = "Csv file for the synthetic records")]
        output_csv: String,
        #[arg(
            short = 'n',
            long,
            default_value = None,
            help = "Number of draws. Records with two ports above the threshold are dropped, so fewer records are usually written. Default: 100"
        )]
        records: Option<u64>,
        #[arg(short, long, help = "Seed for random number generation")]
        seed: Option<u64>,
        #[arg(short, long, default_value = None, help = "Path to a TOML configuration file")]
        config: Option<String>,
        #[arg(
            long,
            default_value = None,
            help = "Keep records with a port at or below this value. Default: 10000"
        )]
        port_threshold: Option<u16>,
        #[arg(
            short,
            long,
            default_value_t = false,
            help = "Do not print the records on the standard output"
        )]
        quiet: bool,
    },
    /// Print per-subnet statistics of a pcap file
    Summary {
        #[arg(short, long, required = true, help = "Pcap file to profile")]
        input_pcap: String,
    },
    /// Export the profile of a pcap file to a json file
    Profile {
        #[arg(short, long, required = true, help = "Pcap file to profile")]
        input_pcap: String,
        #[arg(short, long, required = true, help = "Json file to export the profile into")]
        output_json: String,
    },
}
