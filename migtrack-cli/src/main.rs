use clap::Parser;
use colored::*;

use migtrack::cli::{self, Cli};
use migtrack::config::Config;

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match Config::load() {
        Ok(config) => cli::run(cli, config).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        eprintln!("{} {}", "Error:".bright_red().bold(), err);
        for cause in err.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        std::process::exit(1);
    }
}
