//! Purpose: Public API boundary for backend access.
//! Exports: Client, query builder, and record helpers used by the harness and CLI.
//! Invariants: This module is the only public path to the HTTP transport.

mod client;
mod query;
mod record;

pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use client::{ApiResult, RestClient, Session};
pub use query::Query;
pub use record::{Record, ZERO_UUID, extract_id, fresh_id, run_tag};
