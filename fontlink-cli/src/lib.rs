//! fontlink CLI: manage font sets and keep their fonts linked while a
//! session is active.

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use regex::Regex;
use tracing_subscriber::EnvFilter;

use fontlink_core::catalog::{SetId, DEFAULT_SET_NAME};
use fontlink_core::config::Paths;
use fontlink_core::discovery::{FcListDiscovery, FontDiscovery, NoDiscovery, PathDiscovery};
use fontlink_core::font_set::FontSet;
use fontlink_core::link::LinkEngine;
use fontlink_core::output::{
    summarize_fonts, summarize_sets, write_json_pretty, write_ndjson, FontSummary, SetState,
    SetSummary,
};
use fontlink_core::session::Session;

mod activate;

/// CLI entrypoint for fontlink.
#[derive(Debug, Parser)]
#[command(
    name = "fontlink",
    version,
    about = "Temporarily activate fonts by linking them into your font directory"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Directory holding sets.json and settings.json
    #[arg(long = "config-dir", env = "FONTLINK_CONFIG_DIR", global = true, value_hint = ValueHint::DirPath)]
    config_dir: Option<PathBuf>,

    /// Directory the font links are created in
    #[arg(long = "fonts-dir", env = "FONTLINK_FONTS_DIR", global = true, value_hint = ValueHint::DirPath)]
    fonts_dir: Option<PathBuf>,

    /// Do not ask the host which fonts are already installed
    #[arg(long = "no-system-fonts", action = ArgAction::SetTrue, global = true, conflicts_with = "system_font_dirs")]
    no_system_fonts: bool,

    /// Scan these directories for installed fonts instead of asking fc-list
    #[arg(long = "system-font-dirs", value_delimiter = ',', global = true, value_hint = ValueHint::DirPath)]
    system_font_dirs: Vec<PathBuf>,

    /// Follow symlinks while scanning --system-font-dirs
    #[arg(long = "follow-symlinks", action = ArgAction::SetTrue, global = true)]
    follow_symlinks: bool,

    /// Log more (repeat for more detail); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List font sets
    Sets(FormatArgs),
    /// Create an empty font set
    New {
        /// Name of the new set
        name: Option<String>,
        /// Place the new set right after this one
        #[arg(long = "after", value_hint = ValueHint::Other)]
        after: Option<String>,
    },
    /// Copy a font set
    Duplicate {
        /// Set name or 1-based index
        set: String,
    },
    /// Rename a font set
    Rename {
        /// Set name or 1-based index
        set: String,
        /// New name
        name: String,
    },
    /// Delete a font set and unlink its fonts
    Delete {
        /// Set name or 1-based index
        set: String,
    },
    /// Make a font set the default target of font commands
    Select {
        /// Set name or 1-based index
        set: String,
    },
    /// Move a font set to another position
    Move {
        /// Set name or 1-based index
        set: String,
        /// New 1-based position
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        index: u64,
    },
    /// List the fonts of a set
    List(ListArgs),
    /// Add font files to a set
    Add(AddArgs),
    /// Remove fonts from a set
    Remove(FontSelection),
    /// Flip fonts between enabled and disabled
    Toggle(FontSelection),
    /// Enable fonts
    Enable(FontSelection),
    /// Disable fonts
    Disable(FontSelection),
    /// Link every enabled font and keep the links until quit or Ctrl-C
    Activate,
}

#[derive(Debug, Clone, Args)]
struct FormatArgs {
    /// Emit a single JSON array
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit newline-delimited JSON
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,

    /// Control colorized output (auto|always|never)
    #[arg(long = "color", default_value_t = ColorChoice::Auto, value_enum)]
    color: ColorChoice,
}

#[derive(Debug, Clone, Args)]
struct ListArgs {
    /// Set name or 1-based index; defaults to the selected set
    #[arg(long = "set", value_hint = ValueHint::Other)]
    set: Option<String>,

    /// Regex patterns that must match the font filename
    #[arg(short = 'n', long = "name", value_hint = ValueHint::Other)]
    name_patterns: Vec<String>,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Debug, Clone, Args)]
struct AddArgs {
    /// Set name or 1-based index; defaults to the selected set
    #[arg(long = "set", value_hint = ValueHint::Other)]
    set: Option<String>,

    /// Add the fonts disabled
    #[arg(long = "disabled", action = ArgAction::SetTrue)]
    disabled: bool,

    /// Read newline-delimited paths from STDIN
    #[arg(long = "stdin-paths", action = ArgAction::SetTrue)]
    stdin_paths: bool,

    /// Font files to add (`-` reads paths from STDIN)
    #[arg(value_hint = ValueHint::FilePath, required_unless_present = "stdin_paths")]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct FontSelection {
    /// Set name or 1-based index; defaults to the selected set
    #[arg(long = "set", value_hint = ValueHint::Other)]
    set: Option<String>,

    /// Every font in the set
    #[arg(long = "all", action = ArgAction::SetTrue, conflicts_with_all = ["names", "patterns"])]
    all: bool,

    /// Regex patterns selecting fonts by filename
    #[arg(short = 'm', long = "match", value_hint = ValueHint::Other)]
    patterns: Vec<String>,

    /// Font filenames, as shown by `list`
    #[arg(required_unless_present_any = ["all", "patterns"])]
    names: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Command::Activate => {
            let mut session = open_session(&cli.global, LinkEngine::new())?;
            activate::run(&mut session)
        }
        command => {
            // One-shot edits never touch the filesystem links, so they are
            // safe to run next to an active session.
            let mut session = open_session(&cli.global, LinkEngine::detached())?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            let tty = stdout.is_terminal();
            let result = execute(&mut session, command, &mut stdin.lock(), &mut stdout.lock(), tty);
            session.close();
            result
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second initialisation (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn open_session(global: &GlobalArgs, engine: LinkEngine) -> Result<Session> {
    let paths = Paths::resolve(global.config_dir.clone(), global.fonts_dir.clone())?;
    let discovery = discovery_for(global);
    Session::open(paths, discovery.as_ref(), engine)
}

fn discovery_for(global: &GlobalArgs) -> Box<dyn FontDiscovery> {
    if global.no_system_fonts {
        Box::new(NoDiscovery)
    } else if !global.system_font_dirs.is_empty() {
        Box::new(
            PathDiscovery::new(global.system_font_dirs.iter().cloned())
                .follow_symlinks(global.follow_symlinks),
        )
    } else {
        Box::new(FcListDiscovery::new())
    }
}

/// Run one command against an open session.
fn execute(
    session: &mut Session,
    command: Command,
    input: &mut impl BufRead,
    out: &mut impl Write,
    tty: bool,
) -> Result<()> {
    match command {
        Command::Sets(format) => {
            let rows = summarize_sets(session.catalog(), Some(session.selected()));
            write_rows(&rows, &format, out, tty, write_sets_plain)
        }
        Command::New { name, after } => {
            let after = after
                .map(|raw| resolve_set(session, Some(&raw)))
                .transpose()?;
            let id = session.add_set(name.as_deref().unwrap_or(DEFAULT_SET_NAME), after);
            session.select(id);
            writeln!(out, "{}", set_name(session, id))?;
            Ok(())
        }
        Command::Duplicate { set } => {
            let source = resolve_set(session, Some(&set))?;
            let id = session
                .duplicate_set(source)
                .ok_or_else(|| anyhow!("no font set {set:?}"))?;
            session.select(id);
            writeln!(out, "{}", set_name(session, id))?;
            Ok(())
        }
        Command::Rename { set, name } => {
            let id = resolve_set(session, Some(&set))?;
            let renamed = session
                .catalog_mut()
                .rename(id, &name)
                .ok_or_else(|| anyhow!("no font set {set:?}"))?;
            writeln!(out, "{renamed}")?;
            Ok(())
        }
        Command::Delete { set } => {
            let id = resolve_set(session, Some(&set))?;
            session.remove_set(id);
            Ok(())
        }
        Command::Select { set } => {
            let id = resolve_set(session, Some(&set))?;
            session.select(id);
            Ok(())
        }
        Command::Move { set, index } => {
            let id = resolve_set(session, Some(&set))?;
            let index = usize::try_from(index - 1).unwrap_or(usize::MAX);
            session.catalog_mut().move_to(id, index);
            Ok(())
        }
        Command::List(args) => {
            let id = resolve_set(session, args.set.as_deref())?;
            let patterns = compile_patterns(&args.name_patterns)?;
            let rows: Vec<FontSummary> = summarize_fonts(font_set(session, id)?)
                .into_iter()
                .filter(|row| {
                    patterns.is_empty() || patterns.iter().any(|re| re.is_match(&row.name))
                })
                .collect();
            write_rows(&rows, &args.format, out, tty, write_fonts_plain)
        }
        Command::Add(args) => {
            let id = resolve_set(session, args.set.as_deref())?;
            let paths = gather_paths(&args.paths, args.stdin_paths, input)?;
            let requested = paths.len();
            let enabled = !args.disabled;
            let added = session.add_fonts(id, paths.into_iter().map(|path| (path, enabled)));
            writeln!(
                out,
                "added {added} of {requested} font(s) to {}",
                set_name(session, id)
            )?;
            Ok(())
        }
        Command::Remove(selection) => {
            let id = resolve_set(session, selection.set.as_deref())?;
            let picked = select_fonts(font_set(session, id)?, &selection)?;
            session.remove_fonts(id, picked.as_deref());
            Ok(())
        }
        Command::Toggle(selection) => {
            let id = resolve_set(session, selection.set.as_deref())?;
            let Some(indices) = select_fonts(font_set(session, id)?, &selection)? else {
                session.toggle_all(id);
                return Ok(());
            };
            for index in indices {
                if !session.toggle_font(id, index) {
                    report_locked(session, id, index, out)?;
                }
            }
            Ok(())
        }
        Command::Enable(selection) => switch_fonts(session, selection, true, out),
        Command::Disable(selection) => switch_fonts(session, selection, false, out),
        Command::Activate => bail!("a session is already active"),
    }
}

fn switch_fonts(
    session: &mut Session,
    selection: FontSelection,
    enabled: bool,
    out: &mut impl Write,
) -> Result<()> {
    let id = resolve_set(session, selection.set.as_deref())?;
    let Some(indices) = select_fonts(font_set(session, id)?, &selection)? else {
        session.set_all(id, enabled);
        return Ok(());
    };

    for index in indices {
        let Some(entry) = font_set(session, id)?.get(index) else {
            continue;
        };
        if entry.is_enabled() == enabled {
            continue;
        }
        if !session.toggle_font(id, index) {
            report_locked(session, id, index, out)?;
        }
    }
    Ok(())
}

fn report_locked(session: &Session, id: SetId, index: usize, out: &mut impl Write) -> Result<()> {
    let name = font_name(session, id, index);
    writeln!(out, "{name}: already installed or missing; left enabled")?;
    Ok(())
}

/// Find a set by exact name, then by 1-based index; `None` means the
/// selected set.
fn resolve_set(session: &Session, raw: Option<&str>) -> Result<SetId> {
    let Some(raw) = raw else {
        return Ok(session.selected());
    };

    let catalog = session.catalog();
    if let Some(id) = catalog.find_by_name(raw) {
        return Ok(id);
    }
    raw.trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| catalog.id_at(index))
        .ok_or_else(|| anyhow!("no font set named {raw:?}"))
}

fn font_set(session: &Session, id: SetId) -> Result<&FontSet> {
    session
        .set(id)
        .ok_or_else(|| anyhow!("font set disappeared"))
}

fn set_name(session: &Session, id: SetId) -> String {
    session.catalog().name(id).unwrap_or_default().to_string()
}

fn font_name(session: &Session, id: SetId, index: usize) -> String {
    session
        .set(id)
        .and_then(|set| set.get(index))
        .map(|entry| entry.name().to_string())
        .unwrap_or_default()
}

/// Indices picked by `selection`, or `None` for the whole set.
fn select_fonts(set: &FontSet, selection: &FontSelection) -> Result<Option<Vec<usize>>> {
    if selection.all {
        return Ok(None);
    }

    let mut indices = Vec::new();
    for name in &selection.names {
        let index = set
            .find(name)
            .ok_or_else(|| anyhow!("no font named {name:?} in this set"))?;
        indices.push(index);
    }

    let patterns = compile_patterns(&selection.patterns)?;
    if !patterns.is_empty() {
        indices.extend(
            set.entries()
                .iter()
                .enumerate()
                .filter(|(_, entry)| patterns.iter().any(|re| re.is_match(entry.name())))
                .map(|(index, _)| index),
        );
    }

    indices.sort_unstable();
    indices.dedup();
    Ok(Some(indices))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("invalid regex: {p}")))
        .collect()
}

fn gather_paths(
    raw_paths: &[PathBuf],
    read_stdin: bool,
    stdin: &mut impl BufRead,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    if read_stdin {
        paths.extend(read_paths_from(stdin)?);
    }

    for path in raw_paths {
        if path == Path::new("-") {
            paths.extend(read_paths_from(stdin)?);
        } else {
            paths.push(path.clone());
        }
    }

    // Links point at the source path verbatim; relative ones would dangle.
    let cwd = env::current_dir().context("resolving the current directory")?;
    Ok(paths
        .into_iter()
        .map(|path| if path.is_absolute() { path } else { cwd.join(path) })
        .collect())
}

fn read_paths_from(reader: &mut impl BufRead) -> Result<Vec<PathBuf>> {
    let mut buf = String::new();
    let mut paths = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_line(&mut buf)?;
        if read == 0 {
            break;
        }

        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            paths.push(PathBuf::from(trimmed));
        }
    }

    Ok(paths)
}

type PlainWriter<T> = fn(&[T], &mut dyn Write, bool) -> Result<()>;

fn write_rows<T: serde::Serialize>(
    rows: &[T],
    format: &FormatArgs,
    out: &mut impl Write,
    tty: bool,
    plain: PlainWriter<T>,
) -> Result<()> {
    let use_color = match format.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => tty,
    };

    if format.ndjson {
        write_ndjson(rows, out)
    } else if format.json {
        write_json_pretty(rows, out)
    } else {
        plain(rows, out, use_color)
    }
}

fn write_sets_plain(rows: &[SetSummary], w: &mut dyn Write, color: bool) -> Result<()> {
    let name_width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(0, 60);

    for row in rows {
        let marker = if row.selected { '*' } else { ' ' };
        let padded_name = format!("{:<name_width$}", row.name);
        let rendered_name = apply_color(&padded_name, color, AnsiColor::Yellow);
        let counts = format!("{}/{}", row.active, row.total);
        let rendered_counts = apply_color(&counts, color, AnsiColor::Green);

        writeln!(
            w,
            "{marker}{:>3} {} {rendered_name}  {rendered_counts}",
            row.index,
            check_box(row.state),
        )?;
    }
    Ok(())
}

fn check_box(state: SetState) -> &'static str {
    match state {
        SetState::On => "[x]",
        SetState::Off => "[ ]",
        SetState::Mixed => "[-]",
    }
}

fn write_fonts_plain(rows: &[FontSummary], w: &mut dyn Write, color: bool) -> Result<()> {
    let name_width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(0, 60);

    for row in rows {
        let check = if row.enabled { "[x]" } else { "[ ]" };
        let padded_name = format!("{:<name_width$}", row.name);
        let rendered_name = apply_color(&padded_name, color, AnsiColor::Yellow);
        let rendered_path = apply_color(&row.path.display().to_string(), color, AnsiColor::Cyan);
        let note = match (&row.installed_in, row.linkable) {
            (Some(dir), _) => format!("  (installed in {})", dir.display()),
            (None, false) => "  (missing)".to_string(),
            (None, true) => String::new(),
        };

        writeln!(w, "{check} {rendered_name}  {rendered_path}{note}")?;
    }
    Ok(())
}

#[derive(Copy, Clone)]
enum AnsiColor {
    Cyan,
    Yellow,
    Green,
}

fn apply_color(text: &str, color: bool, code: AnsiColor) -> String {
    if !color {
        return text.to_string();
    }

    let code_str = match code {
        AnsiColor::Cyan => "36",
        AnsiColor::Yellow => "33",
        AnsiColor::Green => "32",
    };

    format!("\u{1b}[{}m{}\u{1b}[0m", code_str, text)
}
