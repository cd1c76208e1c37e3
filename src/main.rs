//! Purpose: `baasline` CLI entry point and command definitions.
//! Role: Binary crate root; parses args, runs commands, emits reports on stdout.
//! Invariants: Human-readable output on TTYs, JSON envelopes otherwise.
//! Invariants: Errors are emitted as JSON on non-interactive stderr.
//! Invariants: The check suite exits 0 iff zero failures were recorded;
//! Invariants: fatal pre-run errors exit via `api::to_exit_code`.
#![allow(clippy::result_large_err)]

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod command_dispatch;

use baasline::api::{Error, ErrorKind, to_exit_code};
use baasline::config::{ENV_EMAIL, ENV_PASSWORD};

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

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
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
                return Err((
                    Error::new(ErrorKind::Usage).with_message(err.to_string()),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli).map_err(|err| (err, color_mode))
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "baasline",
    version,
    about = "Verify a hosted Postgres REST backend end to end",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Runs create/read/update/delete chains, junction-table integrity checks,
and storage probes against a backend's auto-generated REST surface, then
prints a pass/fail report.

Every row the harness creates is deleted in the same run."#,
    after_help = r#"EXAMPLES
  $ export BAASLINE_URL=https://abc123.supabase.co
  $ export BAASLINE_ANON_KEY=...
  $ baasline check
  $ baasline check --table blog_posts --table tags --json
  $ baasline migrate migrations/20250130_add_tags.sql

LEARN MORE
  $ baasline <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, help = "Backend base url (default: $BAASLINE_URL)")]
    base_url: Option<String>,
    #[arg(long, global = true, help = "Anon api key (default: $BAASLINE_ANON_KEY)")]
    apikey: Option<String>,
    #[arg(long, global = true, help = "Per-call timeout in seconds (default: 10)")]
    timeout: Option<u64>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Run the full verification suite",
        long_about = r#"Run CRUD chains for every content table, junction-table integrity
checks, and storage-bucket probes; print the aggregated report.

Credentials (flags or $BAASLINE_EMAIL / $BAASLINE_PASSWORD) are optional;
when present, the run authenticates first and aborts if that fails."#,
        after_help = r#"EXAMPLES
  $ baasline check
  $ baasline check --table blog_posts --table tags
  $ baasline check --json --report results.json
  $ baasline check --skip-storage

NOTES
  - Exit code is 0 only when every recorded check passed.
  - --report writes the same JSON envelope that --json prints."#
    )]
    Check {
        #[arg(
            long = "table",
            value_name = "TABLE",
            help = "Restrict CRUD chains to this table (repeatable)"
        )]
        tables: Vec<String>,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
        #[arg(
            long,
            value_name = "PATH",
            help = "Also write the JSON report to this file",
            value_hint = ValueHint::FilePath
        )]
        report: Option<PathBuf>,
        #[arg(long, help = "Skip storage-bucket probes")]
        skip_storage: bool,
        #[arg(long, help = "Skip junction/uniqueness/counter checks")]
        skip_relations: bool,
        #[arg(long, help = "Never authenticate, even when credentials are configured")]
        skip_auth: bool,
        #[arg(long, help = "Login email (default: $BAASLINE_EMAIL)")]
        email: Option<String>,
        #[arg(long, help = "Login password (default: $BAASLINE_PASSWORD)")]
        password: Option<String>,
        #[arg(
            long = "bucket",
            value_name = "BUCKET",
            help = "Probe this storage bucket (repeatable; default: images videos documents avatars)"
        )]
        buckets: Vec<String>,
    },
    #[command(
        about = "Probe the authentication endpoint",
        long_about = r#"Authenticate with the password grant and report the session.

With --expect-failure the command passes only when the backend rejects the
credentials; a transport fault still fails either way."#,
        after_help = r#"EXAMPLES
  $ baasline auth --email dev@example.com --password secret
  $ baasline auth --email dev@example.com --password wrong --expect-failure"#
    )]
    Auth {
        #[arg(long, help = "Login email (default: $BAASLINE_EMAIL)")]
        email: Option<String>,
        #[arg(long, help = "Login password (default: $BAASLINE_PASSWORD)")]
        password: Option<String>,
        #[arg(long, help = "Pass when the backend rejects the credentials")]
        expect_failure: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Apply SQL migration files through the exec_sql RPC",
        long_about = r#"Split each file on ';' and POST the statements one at a time to
rpc/exec_sql. Individual statement failures (IF EXISTS guards and the
like) are tolerated and counted, not fatal."#,
        after_help = r#"EXAMPLES
  $ baasline migrate migrations/20250130_add_tags.sql
  $ baasline migrate a.sql b.sql --json"#
    )]
    Migrate {
        #[arg(required = true, help = "Migration file path(s), applied in order", value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        about = "Probe storage buckets for accessibility",
        after_help = r#"EXAMPLES
  $ baasline storage
  $ baasline storage --bucket images --bucket avatars"#
    )]
    Storage {
        #[arg(
            long = "bucket",
            value_name = "BUCKET",
            help = "Bucket to probe (repeatable; default: images videos documents avatars)"
        )]
        buckets: Vec<String>,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(about = "Print version info")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ baasline completion bash > ~/.local/share/bash-completion/completions/baasline"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("baasline {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "baasline",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(status) = err.status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("status:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(table) = err.table() {
        lines.push(format!(
            "{} {table}",
            colorize_label("table:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(table) = err.table() {
        inner.insert("table".to_string(), json!(table));
    }
    if let Some(body) = err.body() {
        inner.insert("body".to_string(), json!(body));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    causes
}

#[derive(Copy, Clone)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, use_color: bool, color: AnsiColor) -> String {
    if !use_color {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn credentials_hint() -> String {
    format!("Pass --email/--password or set {ENV_EMAIL} and {ENV_PASSWORD}.")
}

#[cfg(test)]
mod tests {
    use super::{AnsiColor, colorize_label, error_json, error_text};
    use baasline::api::{Error, ErrorKind};

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Usage).with_message("bad input");
        let colored = error_text(&err, true);
        let plain = error_text(&err, false);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(plain.starts_with("error: bad input"));
    }

    #[test]
    fn error_json_keeps_http_context() {
        let err = Error::new(ErrorKind::Api)
            .with_message("insert rejected")
            .with_status(409)
            .with_table("tags")
            .with_body("{\"message\":\"duplicate\"}");
        let value = error_json(&err);
        assert_eq!(
            value.pointer("/error/status").and_then(|v| v.as_u64()),
            Some(409)
        );
        assert_eq!(
            value.pointer("/error/table").and_then(|v| v.as_str()),
            Some("tags")
        );
    }

    #[test]
    fn labels_pass_through_without_color() {
        assert_eq!(colorize_label("hint:", false, AnsiColor::Yellow), "hint:");
    }
}
