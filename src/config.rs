use std::{net::SocketAddr, path::PathBuf};

use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};

use crate::{skill::Settings, stops::DEFAULT_STOP};

pub const DEFAULT_API_URL: &str = "https://cdt.hafas.de/opendata/apiserver/departureBoard";

#[derive(Debug, Parser)]
#[command(name = "next_bus", version, about = "When is my next bus?")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Args)]
pub struct Config {
    /// Departure board endpoint.
    #[arg(long, env = "NEXT_BUS_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Access key for the departure board.
    #[arg(long, env = "NEXT_BUS_ACCESS_ID", hide_env_values = true)]
    pub access_id: String,

    /// Time zone the board's dates and times are in.
    #[arg(long, env = "NEXT_BUS_TIMEZONE", default_value = "Europe/Luxembourg", value_parser = parse_tz)]
    pub timezone: Tz,

    /// Origin used when neither a stop nor a favourite is known.
    #[arg(long, env = "NEXT_BUS_DEFAULT_STOP", default_value = DEFAULT_STOP)]
    pub default_stop: String,

    /// How many minutes ahead the board should look.
    #[arg(long, env = "NEXT_BUS_DURATION")]
    pub duration: Option<u32>,

    #[arg(long, env = "NEXT_BUS_MAX_JOURNEYS")]
    pub max_journeys: Option<u32>,

    /// Where favourite stops are kept.
    #[arg(long, env = "NEXT_BUS_STORE", default_value = "next_bus_attributes.bin")]
    pub store: PathBuf,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Answer voice-platform requests over HTTP.
    Serve {
        #[arg(long, env = "NEXT_BUS_LISTEN", default_value = "127.0.0.1:3000")]
        listen: SocketAddr,
    },
    /// Ask for the next departure once and print the answer.
    Next {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        line: Option<String>,
        /// Whose favourite stop to use.
        #[arg(long, default_value = "cli")]
        user: String,
    },
}

fn parse_tz(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>().map_err(|_| format!("unknown time zone: {s}"))
}

impl Config {
    pub fn settings(&self) -> Settings {
        Settings {
            tz: self.timezone,
            default_stop: self.default_stop.clone(),
            duration: self.duration,
            max_journeys: self.max_journeys,
        }
    }
}
