use std::io::{BufRead, Write};

use clap::Parser;
use fasternet_core::error::AppError;
use fasternet_core::lifecycle::IncidentBoard;
use tracing::debug;

use crate::app::App;
use crate::cli::{Command, ShellLine};

const PROMPT: &str = "fasternet> ";

fn io_error(e: std::io::Error) -> AppError {
    AppError::new("SHELL_IO_FAILED", "Shell input/output failed").with_details(e.to_string())
}

/// Interactive loop. The board is loaded once; card commands go through it so the listing
/// reflects each returned record without refetching.
pub fn run_shell(
    app: &mut App,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<(), AppError> {
    app.require_session()?;
    let mut board = IncidentBoard::load(app.backend.store())?;
    writeln!(
        out,
        "{} card(s) loaded. Type `help` for commands, `exit` to leave.",
        board.len()
    )
    .map_err(io_error)?;

    let mut line = String::new();
    loop {
        write!(out, "{PROMPT}").map_err(io_error)?;
        out.flush().map_err(io_error)?;

        line.clear();
        if input.read_line(&mut line).map_err(io_error)? == 0 {
            break;
        }
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "exit" | "quit" => break,
            "reload" => {
                board = IncidentBoard::load(app.backend.store())?;
                writeln!(out, "{} card(s) loaded.", board.len()).map_err(io_error)?;
                continue;
            }
            _ => {}
        }

        let Some(words) = shlex::split(trimmed) else {
            writeln!(out, "[SHELL_PARSE_FAILED] Unbalanced quotes").map_err(io_error)?;
            continue;
        };
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) => {
                write!(out, "{}", e.render()).map_err(io_error)?;
                continue;
            }
        };

        debug!(command = ?parsed.command, "shell command");
        match dispatch_on_board(app, &mut board, &parsed.command) {
            Ok(text) => write!(out, "{text}").map_err(io_error)?,
            Err(e) => writeln!(out, "{e}").map_err(io_error)?,
        }
    }
    Ok(())
}

fn dispatch_on_board(
    app: &mut App,
    board: &mut IncidentBoard,
    command: &Command,
) -> Result<String, AppError> {
    match command {
        Command::List(now) => {
            app.require_session()?;
            let now = app.instant(now.now.as_deref())?;
            app.show_board(board.cards(), now)
        }
        Command::Create(args) => {
            app.require_session()?;
            let draft = app.draft(args)?;
            let lifecycle = app.lifecycle();
            let card = board.create(&lifecycle, &draft)?;
            app.show_card(card)
        }
        Command::Edit(args) => {
            app.require_session()?;
            let form = App::edit_form(board.ensure_active(args.id)?, args);
            let lifecycle = app.lifecycle();
            let card = board.edit(&lifecycle, args.id, &form)?;
            app.show_card(card)
        }
        Command::Update { id, text } => {
            app.require_session()?;
            let lifecycle = app.lifecycle();
            let entry = board.append_update(&lifecycle, *id, text)?;
            app.show_update(&entry)
        }
        Command::Delete { id, confirm } => {
            app.require_session()?;
            let lifecycle = app.lifecycle();
            board.delete(&lifecycle, *id, confirm)?;
            Ok(format!("Deleted card #{id}\n"))
        }
        Command::History { id } => {
            board.ensure_active(*id)?;
            app.dispatch(command)
        }
        Command::Login { .. } => {
            let text = app.dispatch(command)?;
            *board = IncidentBoard::load(app.backend.store())?;
            Ok(text)
        }
        Command::Logout => {
            let text = app.dispatch(command)?;
            *board = IncidentBoard::default();
            Ok(text)
        }
        other => app.dispatch(other),
    }
}
