//! Strictly Arena - command-line shell over the session engine.

#![warn(missing_docs)]

mod cli;
mod report;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;
use strictly_arena::{Arena, ArenaConfig, ArenaError, MoveNotes, PlayOutcome, Side, WaitOutcome};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

/// Exit code when a wait ran out of time.
const EXIT_TIMEOUT: u8 = 2;

/// Exit code when a draw prompt was shown instead of submitting the move.
const EXIT_DRAW_PROMPT: u8 = 3;

/// Exit code after ctrl-c.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<ArenaError>() {
                Some(arena_err) => eprintln!("{}: {}", arena_err.kind, arena_err.message),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = ArenaConfig::resolve(cli.config)?;
    let arena = Arena::with_chess(config)?;

    match cli.command {
        Command::Join {
            name,
            side,
            no_wait,
        } => run_join(&arena, name, side, no_wait).await,
        Command::Play {
            ticket,
            mv,
            rationale,
        } => run_play(&arena, ticket, mv, rationale).await,
        Command::RequestDraw { ticket } => {
            let session = arena.offer_draw(&ticket)?;
            println!("Draw offered in session {}.", session.id);
            println!("Your opponent will be asked on their next move.");
            Ok(ExitCode::SUCCESS)
        }
        Command::AcceptDraw { ticket } => {
            let session = arena.accept_draw(&ticket)?;
            report::print_session(&session);
            Ok(ExitCode::SUCCESS)
        }
        Command::Inspect { session, ticket } => run_inspect(&arena, session, ticket),
        Command::Sessions => {
            report::print_listing(&arena.list_sessions()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Join, then wait for an opponent unless told not to.
#[instrument(skip(arena))]
async fn run_join(
    arena: &Arena,
    name: String,
    side: Option<Side>,
    no_wait: bool,
) -> Result<ExitCode> {
    if no_wait {
        let receipt = arena.join(&name, side)?;
        report::print_join(&receipt);
        return Ok(ExitCode::SUCCESS);
    }

    let deadline = arena.config().move_wait();
    tokio::select! {
        result = arena.join_and_wait(&name, side, deadline) => {
            let (receipt, outcome) = result?;
            report::print_join(&receipt);
            match outcome {
                WaitOutcome::Ready(session) => {
                    println!("Opponent joined.");
                    report::print_session(&session);
                    Ok(ExitCode::SUCCESS)
                }
                WaitOutcome::Finished(session) => {
                    report::print_session(&session);
                    Ok(ExitCode::SUCCESS)
                }
                WaitOutcome::TimedOut => {
                    println!("No opponent joined in time; your seat was released.");
                    Ok(ExitCode::from(EXIT_TIMEOUT))
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            // Dropping the join future released the seat.
            info!("Interrupted while waiting for opponent");
            eprintln!("Interrupted; seat released.");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

/// Wait for the turn, submit, then wait for the reply.
#[instrument(skip(arena, rationale))]
async fn run_play(arena: &Arena, ticket: String, mv: String, rationale: String) -> Result<ExitCode> {
    if rationale.trim().is_empty() {
        return Err(ArenaError::validation("--rationale must not be empty").into());
    }
    let deadline = arena.config().move_wait();

    match arena.wait_for_turn(&ticket, deadline).await? {
        WaitOutcome::Ready(_) => {}
        WaitOutcome::Finished(session) => {
            report::print_session(&session);
            return Ok(ExitCode::SUCCESS);
        }
        WaitOutcome::TimedOut => {
            println!("Timed out waiting for your turn.");
            return Ok(ExitCode::from(EXIT_TIMEOUT));
        }
    }

    let receipt = match arena.play(&ticket, &mv, &MoveNotes::new(rationale)) {
        Ok(PlayOutcome::Moved(receipt)) => receipt,
        Ok(PlayOutcome::DrawPending(session)) => {
            report::print_draw_prompt(&session);
            return Ok(ExitCode::from(EXIT_DRAW_PROMPT));
        }
        Err(e) => {
            // A rejected move may have forfeited the game.
            if let Ok(view) = arena.session_for_ticket(&ticket) {
                if !view.session.is_active() {
                    report::print_session(&view.session);
                }
            }
            return Err(e.into());
        }
    };

    report::print_move(&receipt.record);
    if !receipt.session.is_active() {
        report::print_session(&receipt.session);
        return Ok(ExitCode::SUCCESS);
    }

    match arena
        .wait_for_reply(&ticket, receipt.record.ply as usize, deadline)
        .await?
    {
        WaitOutcome::Ready(session) => {
            if let Some(reply) = session.history.last() {
                report::print_move(reply);
            }
            report::print_session(&session);
            Ok(ExitCode::SUCCESS)
        }
        WaitOutcome::Finished(session) => {
            report::print_session(&session);
            Ok(ExitCode::SUCCESS)
        }
        WaitOutcome::TimedOut => {
            println!("Timed out waiting for your opponent's reply.");
            Ok(ExitCode::from(EXIT_TIMEOUT))
        }
    }
}

fn run_inspect(arena: &Arena, session: Option<String>, ticket: Option<String>) -> Result<ExitCode> {
    let snapshot = match (session, ticket) {
        (_, Some(ticket)) => {
            let view = arena.session_for_ticket(&ticket)?;
            println!(
                "Ticket {} ({}, {}): {}",
                view.ticket.ticket_id,
                view.ticket.agent,
                view.ticket.side,
                if view.seated { "seated" } else { "no longer seated" }
            );
            view.session
        }
        (Some(id), None) => arena.get_session(&id)?,
        (None, None) => match arena.active_session()? {
            Some(session) => session,
            None => {
                println!("No active session.");
                return Ok(ExitCode::SUCCESS);
            }
        },
    };

    report::print_session(&snapshot);
    Ok(ExitCode::SUCCESS)
}
