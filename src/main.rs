#![recursion_limit = "256"]

mod api;
mod application;
mod cli;
mod config;
mod data;
mod domain;
mod infra;
mod ml;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::infra::logging::init_logging;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("warning: ignoring unreadable configuration: {e}");
        AppConfig::default()
    });
    init_logging(&config.logging);

    Cli::parse().run(&config)
}
