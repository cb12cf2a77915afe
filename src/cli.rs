/// CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::{Action, ExportFormat, RejectReason};

// Build timestamp injected at compile time
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

pub fn get_version() -> &'static str {
    VERSION_WITH_BUILD
}

#[derive(Parser)]
#[command(name = "receiving-dash")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/receiving-dash/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding data.json, events.db and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Receiving facility to work as
    #[arg(long, global = true)]
    pub facility: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the incoming queue
    Queue,

    /// Accept a referral
    Accept { id: String },

    /// Mark a referral en route
    Enroute { id: String },

    /// Mark a referral arrived at this facility
    Arrive { id: String },

    /// Complete handover
    Handover { id: String },

    /// Reject a referral
    Reject {
        id: String,

        /// Reason for rejection
        #[arg(short, long, value_enum)]
        reason: ReasonArg,
    },

    /// Record a set of vitals
    Vitals {
        id: String,

        #[arg(long)]
        hr: u16,

        #[arg(long)]
        sbp: u16,

        #[arg(long)]
        rr: u16,

        #[arg(long)]
        spo2: u16,

        /// Temperature in °C
        #[arg(long)]
        temp: f64,

        #[arg(long, default_value = "A")]
        avpu: String,
    },

    /// Record completed interventions
    Interventions {
        id: String,

        /// Intervention names, e.g. Oxygen "IV Access"
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the ISBAR handover text
    Isbar { id: String },

    /// KPIs and analytics summary for today
    Stats,

    /// Export today's referrals for the facility
    Export {
        #[arg(short, long, value_enum, default_value = "csv")]
        format: FormatArg,

        /// Output file (default: receiving_today.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the event log
    Events {
        /// Only events after this id
        #[arg(long, default_value = "0")]
        since: i64,

        /// Only events for this referral
        #[arg(long = "case")]
        case_id: Option<String>,

        #[arg(short = 'n', long, default_value = "200")]
        limit: i64,
    },

    /// Set open ICU beds for the facility
    Icu { beds: u32 },

    /// Replace today's load with a freshly seeded day
    NewDay {
        /// Seed (default: derived from the clock)
        #[arg(long)]
        seed: Option<u64>,

        /// Number of referrals
        #[arg(long)]
        count: Option<usize>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run HTTP API server mode
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default from config)
        #[arg(long)]
        host: Option<String>,

        /// Enable CORS for cross-origin requests
        #[arg(long)]
        cors: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// View configuration
    View,

    /// Validate configuration
    Validate,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReasonArg {
    NoIcuBed,
    NoSpecialist,
    EquipmentDown,
    OverCapacity,
    OutsideScope,
    PatientDiverted,
}

impl From<ReasonArg> for RejectReason {
    fn from(arg: ReasonArg) -> Self {
        match arg {
            ReasonArg::NoIcuBed => RejectReason::NoIcuBed,
            ReasonArg::NoSpecialist => RejectReason::NoSpecialist,
            ReasonArg::EquipmentDown => RejectReason::EquipmentDown,
            ReasonArg::OverCapacity => RejectReason::OverCapacity,
            ReasonArg::OutsideScope => RejectReason::OutsideScope,
            ReasonArg::PatientDiverted => RejectReason::PatientDiverted,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

impl Commands {
    /// Workflow action for the status subcommands
    pub fn action(&self) -> Option<(&str, Action)> {
        match self {
            Commands::Accept { id } => Some((id.as_str(), Action::Accept)),
            Commands::Enroute { id } => Some((id.as_str(), Action::EnRoute)),
            Commands::Arrive { id } => Some((id.as_str(), Action::Arrive)),
            Commands::Handover { id } => Some((id.as_str(), Action::Handover)),
            Commands::Reject { id, reason } => Some((id.as_str(), Action::Reject((*reason).into()))),
            _ => None,
        }
    }
}
