//! Purpose: Orchestrate one verification run end to end.
//! Exports: `HarnessOptions`, `run`.
//! Role: Sequences auth → per-table CRUD → relational checks → storage probes.
//! Invariants: Checks run one at a time; later phases consume ids from earlier ones.
//! Invariants: Only an outright authentication failure aborts; everything else accumulates.

pub mod crud;
pub mod relations;
pub mod storage;
pub mod tables;

use crate::api::{RestClient, run_tag};
use crate::report::Report;

#[derive(Clone, Debug, Default)]
pub struct HarnessOptions {
    /// Restrict CRUD chains to these tables; empty means the full set.
    pub tables: Vec<String>,
    pub skip_storage: bool,
    pub skip_relations: bool,
    /// Password-grant credentials; when present, authentication gates the run.
    pub credentials: Option<(String, String)>,
    pub buckets: Vec<String>,
}

pub fn run(client: &RestClient, options: &HarnessOptions) -> Report {
    let mut report = Report::new();
    report.begin();
    let tag = run_tag();
    tracing::info!(%tag, base_url = %client.base_url(), "starting verification run");

    let client = match &options.credentials {
        Some((email, password)) => match client.authenticate(email, password) {
            Ok(session) => {
                report.pass("auth::password_grant");
                tracing::info!(user = session.user_email.as_deref(), "authenticated");
                client.clone().with_token(session.access_token)
            }
            Err(err) => {
                report.fail("auth::password_grant", format!("{err}"));
                report.abort();
                tracing::warn!("authentication failed; aborting run");
                return report;
            }
        },
        None => client.clone(),
    };

    for spec in tables::CONTENT_TABLES {
        if !options.tables.is_empty()
            && !options.tables.iter().any(|name| name.as_str() == spec.table)
        {
            continue;
        }
        crud::verify_table(&client, spec, &tag, &mut report);
    }

    if !options.skip_relations {
        relations::verify_tag_roundtrip(&client, &mut report, &tag);
        relations::verify_referential_integrity(&client, &mut report, &tag);
        relations::verify_slug_uniqueness(&client, &mut report, &tag);
        relations::verify_counters(&client, &mut report, &tag);
        relations::verify_published_filter(&client, &mut report, &tag);
        relations::verify_idempotent_delete(&client, &mut report);
    }

    if !options.skip_storage {
        let buckets = if options.buckets.is_empty() {
            storage::DEFAULT_BUCKETS
                .iter()
                .map(|bucket| bucket.to_string())
                .collect()
        } else {
            options.buckets.clone()
        };
        storage::verify_buckets(&client, &mut report, &buckets);
    }

    report.complete();
    let totals = report.totals();
    tracing::info!(
        total = totals.total,
        passed = totals.passed,
        failed = totals.failed,
        "verification run finished"
    );
    report
}
