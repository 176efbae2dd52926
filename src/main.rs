//! Purpose: `pathstate` CLI entry point.
//! Role: Binary crate root; parses args, runs commands against a state file, emits JSON on stdout.
//! Invariants: Successful commands print exactly one JSON document on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All state mutations go through `api::Store` with a persistor attached.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod state_paths;

use pathstate::api::{
    Error, ErrorKind, FileBackend, Persistor, SetOptions, Store, StoreConfig, load, parse_or_raw,
    to_exit_code,
};
use state_paths::{RootNameError, default_state_file, validate_root_name};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[derive(Parser)]
#[command(
    name = "pathstate",
    version,
    about = "Read and write a path-addressable JSON state tree",
    after_help = r#"Examples:
  $ pathstate set app.user.name '"Ada"'
  $ pathstate set app.list '[1, 2, 3]'
  $ pathstate get app.user
  $ pathstate rm app.list[1]
  $ pathstate flatten app.user"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        env = "PATHSTATE_FILE",
        help = "State file (default: ~/.pathstate/state.json)",
        value_hint = ValueHint::FilePath
    )]
    file: Option<PathBuf>,
    #[arg(long, default_value = "app", help = "Name of the fixed root node")]
    root: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Print the value at a path")]
    Get {
        #[arg(help = "Path expression, e.g. app.list[0].name")]
        path: String,
    },
    #[command(about = "Write a value at a path and persist the change")]
    Set {
        #[arg(help = "Path expression, e.g. app.list[0].name")]
        path: String,
        #[arg(help = "JSON value; text that is not valid JSON is stored as a string")]
        value: String,
        #[arg(long, help = "Persist containers as a single record")]
        immutable: bool,
    },
    #[command(about = "Remove the node at a path")]
    Rm {
        #[arg(help = "Path expression, e.g. app.list[1]")]
        path: String,
    },
    #[command(about = "Print the stored records under a path (default: the root)")]
    Flatten {
        #[arg(help = "Path expression")]
        path: Option<String>,
    },
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `pathstate --help`."));
            }
        },
    };

    init_tracing();

    validate_root_name(&cli.root).map_err(|err| match err {
        RootNameError::Empty => Error::new(ErrorKind::Usage).with_message("--root cannot be empty"),
        RootNameError::ContainsSeparator => Error::new(ErrorKind::Usage)
            .with_message(format!("--root `{}` must be a single name", cli.root))
            .with_hint("Use a plain name without `.` or `[`, e.g. --root app."),
    })?;
    let state_file = cli.file.unwrap_or_else(default_state_file);

    command_dispatch::dispatch_command(cli.command, &state_file, &cli.root)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Load the state file into a fresh store.
fn open_store(state_file: &Path, root: &str) -> Result<(Store, Arc<FileBackend>), Error> {
    let backend = Arc::new(FileBackend::new(state_file));
    let mut store = Store::with_config(StoreConfig::new(root));
    let outcome = load(&mut store, backend.as_ref())?;
    if outcome.skipped > 0 {
        tracing::warn!(
            skipped = outcome.skipped,
            file = %state_file.display(),
            "some stored records could not be restored"
        );
    }
    Ok((store, backend))
}

/// Run `change` against the loaded store with a persistor attached, then wait for the writes.
fn mutate<F>(state_file: &Path, root: &str, change: F) -> Result<Store, Error>
where
    F: FnOnce(&mut Store) -> Result<(), Error>,
{
    let (mut store, backend) = open_store(state_file, root)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })?;
    runtime.block_on(async {
        let persistor = Persistor::attach(&mut store, backend);
        let result = change(&mut store);
        persistor.shutdown(&mut store).await?;
        result
    })?;
    Ok(store)
}

fn set_options(immutable: bool) -> SetOptions {
    SetOptions::new().with_immutable(immutable)
}

fn emit_json(value: Value) {
    let text = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    match text {
        Ok(text) => println!("{text}"),
        Err(err) => emit_error(
            &Error::new(ErrorKind::Internal)
                .with_message("json encode failed")
                .with_source(err),
        ),
    }
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::InvalidPath => "invalid path".to_string(),
        ErrorKind::TypeMismatch => "type mismatch".to_string(),
        ErrorKind::AliasCycle => "alias cycle".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Busy => "resource is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.state_path() {
        inner.insert("path".to_string(), json!(path));
    }
    if let Some(file) = err.file() {
        inner.insert("file".to_string(), json!(file.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.state_path() {
        lines.push(format!("path: {path}"));
    }
    if let Some(file) = err.file() {
        lines.push(format!("file: {}", file.display()));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => err.with_hint(
            "Permission denied. Check file permissions or use --file to a writable location.",
        ),
        ErrorKind::Busy => {
            err.with_hint("State file is busy (another writer holds the lock). Retry shortly.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("State file appears corrupt. Move it aside to start fresh.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share the output if it persists.",
    )
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
