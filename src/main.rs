mod app;
mod climatology;
mod color;
mod config;
mod data;
mod figures;
mod render;
mod state;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    app::run(app::Cli::parse())
}
