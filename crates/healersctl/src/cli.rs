//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use healers_common::dispatch::Variant;
use std::path::PathBuf;

/// Highway Healers CLI
#[derive(Parser, Debug)]
#[command(name = "healersctl")]
#[command(about = "Highway Healers - Roadside emergency assistance", long_about = None)]
#[command(version = env!("HEALERS_VERSION"))]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Path to config file (overrides user and system config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Open the emergency flow
    Sos {
        /// Flow variant (roadside or vitals); defaults to the configured one
        #[arg(long)]
        variant: Option<Variant>,
    },

    /// Ask the assistance bot for first-aid instructions
    FirstAid {
        /// What happened, in at least 10 characters
        situation: String,
    },

    /// Predict ambulance, drone and doctor needs for a scenario
    Predict {
        /// Location, time and nature of the emergency
        #[arg(long)]
        scenario: String,

        #[arg(long, default_value_t = 5)]
        ambulances: u32,

        #[arg(long, default_value_t = 10)]
        drones: u32,

        #[arg(long, default_value_t = 8)]
        doctors: u32,
    },

    /// Send a single SMS
    Sms {
        /// Recipient in E.164 format, e.g. +919876543210
        #[arg(long)]
        to: String,

        #[arg(long)]
        message: String,
    },

    /// Find medicine pickup points along the highway
    Medicine {
        /// Filter by location name or medicine
        search: Option<String>,

        /// Pre-order at the named location
        #[arg(long, value_name = "LOCATION")]
        preorder: Option<String>,

        /// Skip the pre-order confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show the map around your position
    Map {
        /// Re-centre on the device location
        #[arg(long)]
        locate: bool,
    },
}

impl Commands {
    /// Short name used in the invocation log
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Sos { .. } => "sos",
            Commands::FirstAid { .. } => "first-aid",
            Commands::Predict { .. } => "predict",
            Commands::Sms { .. } => "sms",
            Commands::Medicine { .. } => "medicine",
            Commands::Map { .. } => "map",
        }
    }
}
