use std::path::PathBuf;

use clap::{ArgAction, Parser};
use clap_complete::Shell;
use corebalance::portfolio::Provider;

#[derive(Parser, Debug)]
#[command(version, about = "Work out the trades that bring an account back to its target allocation")]
pub(crate) struct Cli {
    #[arg(short, long, help = "Target allocation")]
    pub target: Option<PathBuf>,
    #[arg(
        required_unless_present = "completions",
        help = "Current allocation CSV downloaded from your provider"
    )]
    pub current_allocations: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Ignore the specified holdings when calculating target allocations"
    )]
    pub ignore: Vec<String>,
    #[arg(short, long, value_enum, default_value_t = Provider::Fidelity, help = "Investment provider")]
    pub provider: Provider,
    #[arg(short, long, action = ArgAction::Count, help = "More logging, repeat for more detail")]
    pub verbose: u8,
    #[arg(long, value_enum, help = "Print a shell completion script and exit")]
    pub completions: Option<Shell>,
}
