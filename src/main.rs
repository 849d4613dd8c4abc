// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use pose_labels::cli::args::{Cli, Commands};
use pose_labels::cli::commands::{run_convert, run_dataset, run_export, run_skeleton};
use pose_labels::{error, logging};

fn main() {
    let cli = Cli::parse();
    logging::set_verbose(cli.verbose);

    let result = match &cli.command {
        Commands::Skeleton(args) => run_skeleton(args),
        Commands::Dataset(args) => run_dataset(args),
        Commands::Convert(args) => run_convert(args),
        Commands::Export(args) => run_export(args),
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}
