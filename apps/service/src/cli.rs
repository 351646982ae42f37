use clap::Parser;
use std::path::PathBuf;

use crate::config::{Mode, Overrides};

/// Interval-driven device health monitor
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/fleetwatch/config.toml
    #[arg(short, long, env = "FLEETWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Monitor every device of the central document, or only this room's
    #[arg(long, value_enum, env = "FLEETWATCH_MODE")]
    pub mode: Option<Mode>,

    /// Identifier of this system, BLDG-ROOM-CPn
    #[arg(long, env = "SYSTEM_ID")]
    pub system_id: Option<String>,

    /// Default log filter, RUST_LOG still wins
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, env = "DB_ADDRESS")]
    pub db_address: Option<String>,

    #[arg(long, env = "DB_USERNAME")]
    pub db_username: Option<String>,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, env = "HUB_ADDRESS")]
    pub eventhub_address: Option<String>,

    #[arg(long, env = "HEALTH_API_ADDRESS")]
    pub health_api_address: Option<String>,

    /// Listen address of the status API
    #[arg(long)]
    pub listen: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            mode: self.mode,
            system_id: self.system_id.clone(),
            log_level: self.log_level.clone(),
            db_address: self.db_address.clone(),
            db_username: self.db_username.clone(),
            db_password: self.db_password.clone(),
            eventhub_address: self.eventhub_address.clone(),
            health_api_address: self.health_api_address.clone(),
            listen: self.listen.clone(),
        }
    }
}
