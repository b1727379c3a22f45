use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "deltacloudd")]
#[command(about = "REST API server in front of cloud provider APIs")]
pub struct ServerArgs {
    #[arg(long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'i', long, help = "Driver to use: mock, openstack, rhevm")]
    pub driver: Option<String>,

    #[arg(short = 'P', long, help = "Provider API endpoint for the driver")]
    pub provider: Option<String>,

    #[arg(short = 'r', long, help = "Address to bind to")]
    pub host: Option<String>,

    #[arg(short = 'p', long, help = "Port to listen on")]
    pub port: Option<u16>,

    #[arg(short = 'v', long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "deltacloud-db-upgrade")]
#[command(about = "Apply pending database migrations")]
pub struct UpgradeArgs {
    #[arg(long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long, help = "Enable verbose output")]
    pub verbose: bool,
}
