use clap::Parser;
use schedsync_cli::cli_args::Cli;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = schedsync_cli::run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
