//! Purpose: Hold top-level CLI command dispatch for `baasline`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: The check suite's exit code comes from the report verdict, never
//! from individual check errors.

use super::*;

use baasline::api::RestClient;
use baasline::config::Config;
use baasline::harness::{self, HarnessOptions, storage};
use baasline::migrate::{self, MigrationOutcome};
use baasline::report::Report;

pub(super) fn dispatch_command(cli: Cli) -> Result<RunOutcome, Error> {
    let Cli {
        base_url,
        apikey,
        timeout,
        color: _,
        command,
    } = cli;

    match command {
        Command::Completion { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::aot::generate(shell, &mut cmd, "baasline", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Check {
            tables,
            json,
            report,
            skip_storage,
            skip_relations,
            skip_auth,
            email,
            password,
            buckets,
        } => {
            let config = Config::resolve(base_url, apikey, email, password, timeout)?;
            let client = build_client(&config)?;
            let credentials = if skip_auth { None } else { config.credentials() };
            let options = HarnessOptions {
                tables,
                skip_storage,
                skip_relations,
                credentials,
                buckets,
            };

            let run_report = harness::run(&client, &options);
            emit_report(&run_report, json);
            if let Some(path) = report {
                run_report.save(&path).map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message(format!("failed to write report {}", path.display()))
                        .with_source(err)
                })?;
            }
            Ok(RunOutcome::with_code(run_report.exit_code()))
        }
        Command::Auth {
            email,
            password,
            expect_failure,
        } => {
            let config = Config::resolve(base_url, apikey, email, password, timeout)?;
            let Some((email, password)) = config.credentials() else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("auth requires an email and password")
                    .with_hint(credentials_hint()));
            };
            let client = build_client(&config)?;
            match client.authenticate(&email, &password) {
                Ok(session) => {
                    if expect_failure {
                        return Err(Error::new(ErrorKind::Auth)
                            .with_message("authentication unexpectedly succeeded"));
                    }
                    emit_json(json!({
                        "auth": {
                            "user_id": session.user_id,
                            "email": session.user_email,
                            "expires_at": session.expires_at,
                        }
                    }));
                    Ok(RunOutcome::ok())
                }
                // A rejection is the asserted-for outcome under --expect-failure;
                // a transport fault never is.
                Err(err) if expect_failure && err.kind() == ErrorKind::Auth => {
                    emit_json(json!({
                        "auth": {
                            "rejected": true,
                            "message": err.message(),
                        }
                    }));
                    Ok(RunOutcome::ok())
                }
                Err(err) => Err(err),
            }
        }
        Command::Migrate { files, json } => {
            let config = Config::resolve(base_url, apikey, None, None, timeout)?;
            let client = build_client(&config)?;
            let mut outcomes = Vec::with_capacity(files.len());
            for file in &files {
                outcomes.push(migrate::apply_file(&client, file)?);
            }
            emit_migrations(&outcomes, json);
            Ok(RunOutcome::ok())
        }
        Command::Storage { buckets, json } => {
            let config = Config::resolve(base_url, apikey, None, None, timeout)?;
            let client = build_client(&config)?;
            let buckets = if buckets.is_empty() {
                storage::DEFAULT_BUCKETS
                    .iter()
                    .map(|bucket| bucket.to_string())
                    .collect()
            } else {
                buckets
            };
            let mut probe_report = Report::new();
            probe_report.begin();
            storage::verify_buckets(&client, &mut probe_report, &buckets);
            probe_report.complete();
            emit_report(&probe_report, json);
            Ok(RunOutcome::with_code(probe_report.exit_code()))
        }
    }
}

fn build_client(config: &Config) -> Result<RestClient, Error> {
    Ok(RestClient::new(&config.base_url, &config.apikey)?.with_timeout(config.timeout))
}

fn emit_report(report: &Report, json: bool) {
    if json || !io::stdout().is_terminal() {
        emit_json(report.to_json());
    } else {
        println!("{}", report.render_text());
    }
}

fn emit_migrations(outcomes: &[MigrationOutcome], json: bool) {
    if json || !io::stdout().is_terminal() {
        let values = outcomes
            .iter()
            .map(|outcome| {
                json!({
                    "file": outcome.file.display().to_string(),
                    "statements": outcome.statements,
                    "applied": outcome.applied,
                    "failed": outcome.failed,
                })
            })
            .collect::<Vec<_>>();
        emit_json(json!({ "migrations": values }));
        return;
    }
    for outcome in outcomes {
        if outcome.failed == 0 {
            println!(
                "{}: {}/{} statements applied",
                outcome.file.display(),
                outcome.applied,
                outcome.statements
            );
        } else {
            println!(
                "{}: {}/{} statements applied ({} tolerated failures)",
                outcome.file.display(),
                outcome.applied,
                outcome.statements,
                outcome.failed
            );
        }
    }
}
