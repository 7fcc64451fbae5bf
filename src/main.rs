use anyhow::{Context, Result};
use bayesopt::{
    bayesopt_ego::{CancellationToken, BAYESOPT_LOG},
    gp_ei, gp_mean_var, next_points, NextPointsRoute,
};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON request file, read from stdin when missing
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,
    /// Pretty-print the JSON response
    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select the next points to sample
    NextPoints {
        #[arg(long, value_enum, default_value_t = NextPointsRoute::ConstantLiar)]
        route: NextPointsRoute,
    },
    /// GP posterior mean and covariance at given points
    MeanVar,
    /// Expected improvement of given points
    Ei,
}

fn read_request<T: DeserializeOwned>(input: &Option<PathBuf>) -> Result<T> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&content).context("malformed JSON request")
}

fn write_response<T: Serialize>(response: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    let env = Env::new().filter_or(BAYESOPT_LOG, "info");
    Builder::from_env(env).target(env_logger::Target::Stderr).init();
    let cli = Cli::parse();

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(ctrlc::Error::MultipleHandlers) = ctrlc::set_handler(move || {
        warn!("Cancellation requested");
        handler_token.cancel();
    }) {
        // ignore multiple handlers error
    };

    match cli.command {
        Command::NextPoints { route } => {
            let request = read_request(&cli.input)?;
            let response = next_points(route, &request, Some(&token))?;
            write_response(&response, cli.pretty)
        }
        Command::MeanVar => {
            let request = read_request(&cli.input)?;
            write_response(&gp_mean_var(&request)?, cli.pretty)
        }
        Command::Ei => {
            let request = read_request(&cli.input)?;
            write_response(&gp_ei(&request)?, cli.pretty)
        }
    }
}
