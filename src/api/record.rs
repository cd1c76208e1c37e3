//! Purpose: Helpers for schemaless table rows carried as JSON values.
//! Exports: `Record`, `extract_id`, `fresh_id`, `run_tag`, `ZERO_UUID`.
//! Role: Shape checks at the REST boundary; one generic row type serves every table.
//! Invariants: Insert responses are either a row object or a single-element list of one.

use crate::core::error::{Error, ErrorKind};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type Record = Map<String, Value>;

/// All-zero UUID sentinel for referential-integrity negative probes.
pub const ZERO_UUID: &str = "00000000-0000-0000-0000-000000000000";

pub fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// Short run-scoped suffix for slugs and titles so parallel invocations
/// cannot collide on unique columns.
pub fn run_tag() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Pull the primary key out of an insert response.
///
/// With `Prefer: return=representation` the backend answers with either the
/// created row or a one-element list of it. Anything else is a shape error
/// even when the status was 2xx.
pub fn extract_id(created: &Value) -> Result<String, Error> {
    let row = match created {
        Value::Array(rows) if rows.len() == 1 => &rows[0],
        Value::Array(rows) => {
            return Err(Error::new(ErrorKind::Shape).with_message(format!(
                "expected a single created row, got a list of {}",
                rows.len()
            )));
        }
        Value::Object(_) => created,
        other => {
            return Err(Error::new(ErrorKind::Shape)
                .with_message(format!("expected created row object, got {other}")));
        }
    };
    row.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::new(ErrorKind::Shape).with_message("created row is missing a string id")
        })
}
