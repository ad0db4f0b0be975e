use clap::Parser;
use log::*;

use release_pilot::{Args, release};

fn initialize_logger(debug: bool) -> color_eyre::Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("release_pilot")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    match release::execute(&cli_args).await {
        Ok(outcome) => {
            info!("{outcome}");
            Ok(())
        }
        Err(err) => {
            error!("{err}");
            std::process::exit(err.exit_code());
        }
    }
}
