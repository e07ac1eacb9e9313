#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Binary entry point for the farm map API server.

use std::path::PathBuf;

use clap::Parser;
use farm_map_server::{ServerConfig, run_server};

#[derive(Parser)]
#[command(name = "farm_map_server", about = "Farm map discovery API server")]
struct Cli {
    /// Address to bind (overrides `BIND_ADDR`)
    #[arg(long)]
    bind_addr: Option<String>,

    /// Port to listen on (overrides `PORT`)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the farm directory snapshot (overrides `FARM_MAP_FARMS_FILE`)
    #[arg(long)]
    farms_file: Option<PathBuf>,
}

impl Cli {
    /// Environment configuration with CLI flags layered on top.
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(farms_file) = self.farms_file {
            config.farms_file = farms_file;
        }
        config
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    run_server(cli.into_config()).await
}
