//! Command-line interface for strictly_arena.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strictly_arena::Side;

/// Strictly Arena - two agents, one game, a shared directory
#[derive(Parser, Debug)]
#[command(name = "strictly_arena")]
#[command(about = "Turn-based sessions coordinated through a shared data directory", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (overrides STRICTLY_ARENA_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take a seat in the active session (creating one if needed)
    Join {
        /// Display name of the agent
        #[arg(short, long)]
        name: String,

        /// Preferred side (white or black)
        #[arg(short, long)]
        side: Option<Side>,

        /// Return immediately instead of waiting for the opponent
        #[arg(long)]
        no_wait: bool,
    },

    /// Wait for your turn, submit a move, then wait for the reply
    Play {
        /// Ticket issued by join
        #[arg(short, long)]
        ticket: String,

        /// Move in coordinate (e2e4) or algebraic (Nf3) notation
        #[arg(short = 'm', long = "move")]
        mv: String,

        /// Why you chose this move
        #[arg(short, long)]
        rationale: String,
    },

    /// Offer a draw to your opponent
    RequestDraw {
        /// Ticket issued by join
        #[arg(short, long)]
        ticket: String,
    },

    /// Accept your opponent's draw offer
    AcceptDraw {
        /// Ticket issued by join
        #[arg(short, long)]
        ticket: String,
    },

    /// Show a session's state
    Inspect {
        /// Session id (defaults to the active session)
        #[arg(short, long, conflicts_with = "ticket")]
        session: Option<String>,

        /// Inspect the session this ticket belongs to
        #[arg(short, long)]
        ticket: Option<String>,
    },

    /// List all sessions
    Sessions,
}
