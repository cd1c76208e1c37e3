//! Purpose: Run the create→read→update→delete chain for one table.
//! Exports: `verify_table`.
//! Role: Core sequencer; later phases consume the id the insert produced.
//! Invariants: A create failure fails all four phases and stops the chain.
//! Invariants: Once an id exists, delete runs even when read or update failed.

use crate::api::{Query, RestClient, extract_id};
use crate::harness::tables::{TableSpec, patch_record, seed_record};
use crate::report::Report;
use serde_json::Value;

pub fn verify_table(client: &RestClient, spec: &TableSpec, tag: &str, report: &mut Report) {
    let table = spec.table;
    tracing::info!(table, "verifying crud chain");

    let seed = seed_record(spec, tag);
    let created = match client.insert(table, &seed) {
        Ok(created) => created,
        Err(err) => {
            fail_whole_chain(report, table, &format!("insert failed: {err}"));
            return;
        }
    };
    // A 2xx with an unrecognizable body is still a create failure.
    let id = match extract_id(&created) {
        Ok(id) => id,
        Err(err) => {
            fail_whole_chain(report, table, &format!("insert response: {err}"));
            return;
        }
    };
    report.pass(phase(table, "create"));

    match client.select(table, &Query::new().eq("id", &id)) {
        Ok(rows) => match rows.as_slice() {
            [row] if row_id(row) == Some(id.as_str()) => report.pass(phase(table, "read")),
            [row] => report.fail(
                phase(table, "read"),
                format!("read back id {:?}, expected {id}", row_id(row)),
            ),
            [] => report.fail(phase(table, "read"), "created row not found on read-back"),
            rows => report.fail(
                phase(table, "read"),
                format!("expected exactly one row, got {}", rows.len()),
            ),
        },
        Err(err) => report.fail(phase(table, "read"), format!("read failed: {err}")),
    }

    let patch = patch_record(spec, tag);
    match client.update(table, &id, &patch) {
        Ok(()) => report.pass(phase(table, "update")),
        Err(err) => report.fail(phase(table, "update"), format!("update failed: {err}")),
    }

    match client.delete(table, &id) {
        Ok(()) => report.pass(phase(table, "delete")),
        Err(err) => report.fail(phase(table, "delete"), format!("delete failed: {err}")),
    }
}

fn fail_whole_chain(report: &mut Report, table: &str, message: &str) {
    report.fail(phase(table, "create"), message.to_string());
    for name in ["read", "update", "delete"] {
        report.fail(phase(table, name), "skipped: create failed");
    }
}

fn phase(table: &str, name: &str) -> String {
    format!("{table}::{name}")
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}
