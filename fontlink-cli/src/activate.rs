//! The long-running `activate` session.
//!
//! Enabled fonts stay linked while the session runs. Commands arrive on
//! STDIN, one shell-quoted line each, using the same grammar as the
//! one-shot CLI. The session ends on EOF, `quit`/`exit`, SIGINT or SIGTERM;
//! all of these go through the same ordered shutdown.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{info, warn};

use fontlink_core::session::Session;

use crate::{execute, Command};

/// What the owning thread is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Line(String),
    InputClosed,
    Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// One session command line, parsed without a binary name.
#[derive(Debug, Parser)]
#[command(name = "fontlink", no_binary_name = true, disable_version_flag = true)]
struct SessionLine {
    #[command(subcommand)]
    command: Command,
}

/// Wire up STDIN and the termination signals, then serve until told to stop.
pub(crate) fn run(session: &mut Session) -> Result<()> {
    let (tx, rx) = mpsc::channel();

    let signals = tx.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = signals.send(Event::Signal);
    }) {
        warn!(error = %err, "could not install the termination handler");
    }

    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Event::InputClosed);
    });

    session.catalog_mut().observe(|set, active| {
        info!(set = ?set, active, "active fonts changed");
    });

    let stdout = io::stdout();
    let tty = stdout.is_terminal();
    serve(session, rx, &mut stdout.lock(), tty)
}

/// Handle events until the session should end, then close it.
pub(crate) fn serve(
    session: &mut Session,
    events: Receiver<Event>,
    out: &mut impl Write,
    tty: bool,
) -> Result<()> {
    writeln!(
        out,
        "{} font link(s) active; type `quit` or press Ctrl-C to stop",
        session.engine().len()
    )?;
    out.flush()?;

    for event in events {
        match event {
            Event::Line(line) => match handle_line(session, &line, out, tty) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => eprintln!("error: {err:#}"),
            },
            Event::InputClosed => break,
            Event::Signal => {
                info!("termination requested");
                break;
            }
        }
        out.flush()?;
    }

    session.close();
    writeln!(out, "all font links removed")?;
    Ok(())
}

/// Run one command line.
pub(crate) fn handle_line(
    session: &mut Session,
    line: &str,
    out: &mut impl Write,
    tty: bool,
) -> Result<Flow> {
    let words = shell_words::split(line)?;
    match words.first().map(String::as_str) {
        None => return Ok(Flow::Continue),
        Some("quit" | "exit") => return Ok(Flow::Quit),
        Some(_) => {}
    }

    let parsed = match SessionLine::try_parse_from(words) {
        Ok(parsed) => parsed,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp) => {
            write!(out, "{}", err.render())?;
            return Ok(Flow::Continue);
        }
        Err(err) => return Err(err.into()),
    };

    // Paths cannot come from STDIN here; it carries the command lines.
    execute(session, parsed.command, &mut io::empty(), out, tty)?;
    Ok(Flow::Continue)
}
