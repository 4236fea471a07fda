use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::sync::reconcile::{MatchMode, ReplacePolicy};

#[derive(Parser, Debug)]
#[command(name = "vipsync")]
#[command(about = "Sync VIP lists across game servers over RCON", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: <config dir>/vipsync/config.toml if present)
    #[arg(long, global = true, env = "VIPSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server registry file (overrides config)
    #[arg(long, global = true)]
    pub servers: Option<PathBuf>,

    /// VIP record file (overrides config)
    #[arg(long, global = true)]
    pub vips: Option<PathBuf>,

    /// Treat a VIP as present only when its id equals a live entry's id,
    /// instead of appearing anywhere in the live entry text
    #[arg(long, global = true)]
    pub exact_match: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull VIPs from every server, merge them and write the record file
    Export,

    /// Push the record file's VIPs to every server
    Import(ImportArgs),

    /// Re-run the import on a fixed interval until interrupted
    Serve(ServeArgs),

    /// Manage registered servers
    #[command(subcommand)]
    Server(ServerCommand),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Delete every VIP on each server before adding the record file's VIPs.
    /// Make sure ALL desired VIPs are in the record file.
    #[arg(long)]
    pub replace_all: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Minutes between passes (overrides config)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// Register a server
    Add {
        /// Server IP or hostname
        address: String,
        /// RCON port
        port: u16,
        /// RCON password
        password: String,
    },
    /// List registered servers
    List,
    /// Remove a registered server by id
    Remove {
        /// Id as shown by `server list`
        id: String,
    },
}

impl Cli {
    /// tracing filter directive for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Fold command-line overrides into a loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.servers {
            config.servers_file = path.clone();
        }
        if let Some(path) = &self.vips {
            config.vip_file = path.clone();
        }
        if self.exact_match {
            config.match_mode = MatchMode::Exact;
        }
        if let Command::Serve(ServeArgs {
            interval: Some(minutes),
        }) = &self.command
        {
            config.interval_minutes = *minutes;
        }
    }
}

impl ImportArgs {
    pub fn policy(&self) -> ReplacePolicy {
        if self.replace_all {
            ReplacePolicy::ReplaceAll
        } else {
            ReplacePolicy::Additive
        }
    }
}
