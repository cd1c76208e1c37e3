//! Purpose: Probe storage buckets for accessibility.
//! Exports: `DEFAULT_BUCKETS`, `verify_buckets`.
//! Role: Reachability checks only; object contents are out of scope.

use crate::api::RestClient;
use crate::report::Report;

pub const DEFAULT_BUCKETS: &[&str] = &["images", "videos", "documents", "avatars"];

pub fn verify_buckets(client: &RestClient, report: &mut Report, buckets: &[String]) {
    for bucket in buckets {
        tracing::info!(%bucket, "probing storage bucket");
        match client.list_bucket(bucket) {
            Ok(_) => report.pass(format!("storage::{bucket}")),
            Err(err) => report.fail(
                format!("storage::{bucket}"),
                format!("bucket probe failed: {err}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_BUCKETS;

    #[test]
    fn default_bucket_set_is_stable() {
        assert_eq!(DEFAULT_BUCKETS, &["images", "videos", "documents", "avatars"]);
    }
}
