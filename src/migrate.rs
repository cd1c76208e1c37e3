//! Purpose: Apply raw SQL migration text through the `exec_sql` RPC.
//! Exports: `MigrationOutcome`, `split_statements`, `apply_file`, `apply_sql`.
//! Role: Statement-by-statement application; individual failures are tolerated
//! (guarded `IF EXISTS` statements routinely fail on re-runs).
//! Invariants: Statements execute in file order; an unreadable file is fatal.

use crate::api::{ApiResult, RestClient};
use crate::core::error::{Error, ErrorKind};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct MigrationOutcome {
    pub file: PathBuf,
    pub statements: usize,
    pub applied: usize,
    pub failed: usize,
}

/// Naive `;` split: trims whitespace and drops empty fragments. Splitting
/// inside quoted literals or function bodies surfaces as per-statement
/// failures, which the runner tolerates.
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn apply_file(client: &RestClient, path: &Path) -> ApiResult<MigrationOutcome> {
    let sql = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read migration file {}", path.display()))
            .with_source(err)
    })?;
    let (statements, applied, failed) = apply_sql(client, &sql);
    Ok(MigrationOutcome {
        file: path.to_path_buf(),
        statements,
        applied,
        failed,
    })
}

/// Returns `(statements, applied, failed)`.
pub fn apply_sql(client: &RestClient, sql: &str) -> (usize, usize, usize) {
    let statements = split_statements(sql);
    let total = statements.len();
    let mut applied = 0;
    let mut failed = 0;
    for (index, statement) in statements.iter().enumerate() {
        tracing::info!("executing statement {}/{total}", index + 1);
        match client.rpc("exec_sql", &json!({ "sql": statement })) {
            Ok(_) => applied += 1,
            Err(err) => {
                failed += 1;
                tracing::warn!("statement {}/{total} failed: {err}", index + 1);
            }
        }
    }
    (total, applied, failed)
}
