//! Purpose: Verify server-enforced relational behavior through the junction tables.
//! Exports: `verify_tag_roundtrip`, `verify_referential_integrity`, `verify_slug_uniqueness`,
//! `verify_counters`, `verify_published_filter`, `verify_idempotent_delete`.
//! Role: The harness asserts the backend enforces constraints; it never enforces them itself.
//! Invariants: A rejected bad insert is a PASS; an accepted one is a recorded failure.
//! Invariants: Cleanup deletes junction rows before their parents and never aborts the run.

use crate::api::{Query, RestClient, ZERO_UUID, extract_id, fresh_id};
use crate::harness::tables::{CONTENT_TABLES, TableSpec, seed_record};
use crate::report::Report;
use serde_json::{Value, json};

/// Create a tag, a blog post, and a project; associate the tag with both
/// parents through the junction tables; read each association back with an
/// embedded-relation selector; then tear everything down junction-first.
pub fn verify_tag_roundtrip(client: &RestClient, report: &mut Report, tag: &str) {
    tracing::info!("verifying tag association round-trip");
    let tag_name = format!("Harness Tag {tag}");

    let Some(tag_id) = create_row(client, report, "tags", tag, "relations::create_tag") else {
        return;
    };
    let Some(post_id) = create_row(client, report, "blog_posts", tag, "relations::create_post")
    else {
        best_effort_delete(client, "tags", &tag_id);
        return;
    };
    let Some(project_id) =
        create_row(client, report, "projects", tag, "relations::create_project")
    else {
        best_effort_delete(client, "blog_posts", &post_id);
        best_effort_delete(client, "tags", &tag_id);
        return;
    };

    associate_and_read_through(
        client,
        report,
        "blog_post_tags",
        "blog_post_id",
        &post_id,
        &tag_id,
        &tag_name,
    );
    associate_and_read_through(
        client,
        report,
        "project_tags",
        "project_id",
        &project_id,
        &tag_id,
        &tag_name,
    );

    // Junction rows first, then parents.
    best_effort_delete_where(
        client,
        "blog_post_tags",
        &Query::new().eq("blog_post_id", &post_id),
    );
    best_effort_delete_where(
        client,
        "project_tags",
        &Query::new().eq("project_id", &project_id),
    );
    best_effort_delete(client, "blog_posts", &post_id);
    best_effort_delete(client, "projects", &project_id);
    best_effort_delete(client, "tags", &tag_id);
}

fn associate_and_read_through(
    client: &RestClient,
    report: &mut Report,
    junction: &str,
    parent_column: &str,
    parent_id: &str,
    tag_id: &str,
    tag_name: &str,
) {
    let row = json!({ parent_column: parent_id, "tag_id": tag_id });
    match client.insert(junction, &row) {
        Ok(_) => report.pass(format!("{junction}::associate")),
        Err(err) => {
            report.fail(
                format!("{junction}::associate"),
                format!("association rejected: {err}"),
            );
            report.fail(
                format!("{junction}::read_through"),
                "skipped: association failed",
            );
            return;
        }
    }

    let query = Query::new().eq(parent_column, parent_id).select("*,tags(*)");
    match client.select(junction, &query) {
        Ok(rows) => {
            let expanded = rows
                .iter()
                .filter_map(|row| row.get("tags"))
                .filter(|tags| tags.is_object())
                .collect::<Vec<_>>();
            if expanded.len() != 1 {
                report.fail(
                    format!("{junction}::read_through"),
                    format!("expected 1 expanded tag, got {}", expanded.len()),
                );
            } else if expanded[0].get("name").and_then(Value::as_str) != Some(tag_name) {
                report.fail(
                    format!("{junction}::read_through"),
                    format!("expanded tag name mismatch: {}", expanded[0]),
                );
            } else {
                report.pass(format!("{junction}::read_through"));
            }
        }
        Err(err) => report.fail(
            format!("{junction}::read_through"),
            format!("embedded read failed: {err}"),
        ),
    }
}

/// Negative probes: a junction row pointing at a non-existent parent or tag
/// must be rejected server-side. The all-zero UUID is the sentinel.
pub fn verify_referential_integrity(client: &RestClient, report: &mut Report, tag: &str) {
    tracing::info!("verifying referential integrity enforcement");

    let Some(tag_id) = create_row(client, report, "tags", tag, "integrity::create_tag") else {
        return;
    };
    let Some(post_id) = create_row(client, report, "blog_posts", tag, "integrity::create_post")
    else {
        best_effort_delete(client, "tags", &tag_id);
        return;
    };

    expect_rejected(
        client,
        report,
        "blog_post_tags::reject_unknown_parent",
        "blog_post_tags",
        &json!({ "blog_post_id": ZERO_UUID, "tag_id": tag_id }),
    );
    expect_rejected(
        client,
        report,
        "blog_post_tags::reject_unknown_tag",
        "blog_post_tags",
        &json!({ "blog_post_id": post_id, "tag_id": ZERO_UUID }),
    );

    // If the backend wrongly accepted either probe, sweep the junction too.
    best_effort_delete_where(
        client,
        "blog_post_tags",
        &Query::new().eq("tag_id", &tag_id),
    );
    best_effort_delete_where(
        client,
        "blog_post_tags",
        &Query::new().eq("blog_post_id", &post_id),
    );
    best_effort_delete(client, "blog_posts", &post_id);
    best_effort_delete(client, "tags", &tag_id);
}

fn expect_rejected(
    client: &RestClient,
    report: &mut Report,
    check: &str,
    table: &str,
    row: &Value,
) {
    match client.insert(table, row) {
        Err(_) => report.pass(check.to_string()),
        Ok(_) => report.fail(
            check.to_string(),
            "backend accepted a row that violates the foreign-key constraint",
        ),
    }
}

/// A second insert with an already-used slug must fail; the first row must
/// be findable by its slug.
pub fn verify_slug_uniqueness(client: &RestClient, report: &mut Report, tag: &str) {
    tracing::info!("verifying slug uniqueness enforcement");
    let slug = format!("harness-dup-{tag}");
    let first = json!({
        "id": fresh_id(),
        "title": format!("Slug Probe {tag}"),
        "slug": slug,
        "content": "First row for the duplicate-slug probe.",
        "published": false,
    });
    if let Err(err) = client.insert("blog_posts", &first) {
        report.fail(
            "blog_posts::query_by_slug",
            format!("setup insert failed: {err}"),
        );
        report.fail("blog_posts::reject_duplicate_slug", "skipped: setup failed");
        return;
    }

    // limit 2 is enough to tell "exactly one" from "more than one"
    match client.select("blog_posts", &Query::new().eq("slug", &slug).limit(2)) {
        Ok(rows) if rows.len() == 1 => report.pass("blog_posts::query_by_slug"),
        Ok(rows) => report.fail(
            "blog_posts::query_by_slug",
            format!("expected exactly one row for slug, got {}", rows.len()),
        ),
        Err(err) => report.fail(
            "blog_posts::query_by_slug",
            format!("slug query failed: {err}"),
        ),
    }

    let duplicate = json!({
        "id": fresh_id(),
        "title": format!("Slug Probe Duplicate {tag}"),
        "slug": slug,
        "content": "Second row that must be rejected.",
        "published": false,
    });
    match client.insert("blog_posts", &duplicate) {
        Err(_) => report.pass("blog_posts::reject_duplicate_slug"),
        Ok(created) => {
            report.fail(
                "blog_posts::reject_duplicate_slug",
                "backend accepted a duplicate slug",
            );
            if let Ok(id) = extract_id(&created) {
                best_effort_delete(client, "blog_posts", &id);
            }
        }
    }

    best_effort_delete_where(client, "blog_posts", &Query::new().eq("slug", &slug));
}

/// Patch a counter column and read the new value back.
pub fn verify_counters(client: &RestClient, report: &mut Report, tag: &str) {
    tracing::info!("verifying counter columns");
    verify_counter(client, report, "projects", "views", tag);
    verify_counter(client, report, "blog_posts", "likes", tag);
}

fn verify_counter(client: &RestClient, report: &mut Report, table: &str, field: &str, tag: &str) {
    let check = format!("{table}::{field}_increment");
    let Some(spec) = table_spec(table) else {
        report.fail(check, format!("unknown table {table}"));
        return;
    };
    let seed = seed_record(spec, tag);
    let id = match client.insert(table, &seed).and_then(|created| extract_id(&created)) {
        Ok(id) => id,
        Err(err) => {
            report.fail(check, format!("setup insert failed: {err}"));
            return;
        }
    };

    let outcome = client
        .update(table, &id, &json!({ field: 1 }))
        .and_then(|()| client.select(table, &Query::new().eq("id", &id)));
    match outcome {
        Ok(rows) => {
            let counted = rows
                .first()
                .and_then(|row| row.get(field))
                .and_then(Value::as_i64);
            if counted == Some(1) {
                report.pass(check);
            } else {
                report.fail(check, format!("counter read back {counted:?}, expected 1"));
            }
        }
        Err(err) => report.fail(check, format!("{err}")),
    }

    best_effort_delete(client, table, &id);
}

/// Drafts must not leak into a `published=eq.true` listing, and the
/// published row created by this run must appear in it.
pub fn verify_published_filter(client: &RestClient, report: &mut Report, tag: &str) {
    tracing::info!("verifying published/draft filtering");
    let draft = json!({
        "id": fresh_id(),
        "title": format!("Draft Probe {tag}"),
        "slug": format!("harness-draft-{tag}"),
        "content": "Draft row; must not appear in published listings.",
        "published": false,
    });
    let published = json!({
        "id": fresh_id(),
        "title": format!("Published Probe {tag}"),
        "slug": format!("harness-published-{tag}"),
        "content": "Published row; must appear in published listings.",
        "published": true,
    });

    let draft_id = client
        .insert("blog_posts", &draft)
        .and_then(|created| extract_id(&created));
    let published_id = client
        .insert("blog_posts", &published)
        .and_then(|created| extract_id(&created));

    match (&draft_id, &published_id) {
        (Ok(draft_id), Ok(published_id)) => {
            let listing = Query::new().eq("published", "true").order("created_at");
            match client.select("blog_posts", &listing) {
                Ok(rows) => {
                    let all_published = rows
                        .iter()
                        .all(|row| row.get("published").and_then(Value::as_bool) == Some(true));
                    let contains_ours = rows
                        .iter()
                        .any(|row| row.get("id").and_then(Value::as_str) == Some(published_id.as_str()));
                    if !all_published {
                        report.fail(
                            "blog_posts::published_filter",
                            "listing contained an unpublished row",
                        );
                    } else if !contains_ours {
                        report.fail(
                            "blog_posts::published_filter",
                            "listing is missing the published probe row",
                        );
                    } else {
                        report.pass("blog_posts::published_filter");
                    }
                }
                Err(err) => report.fail(
                    "blog_posts::published_filter",
                    format!("published query failed: {err}"),
                ),
            }
            best_effort_delete(client, "blog_posts", draft_id);
            best_effort_delete(client, "blog_posts", published_id);
        }
        _ => {
            report.fail(
                "blog_posts::published_filter",
                "setup insert failed for draft or published probe",
            );
            if let Ok(id) = &draft_id {
                best_effort_delete(client, "blog_posts", id);
            }
            if let Ok(id) = &published_id {
                best_effort_delete(client, "blog_posts", id);
            }
        }
    }
}

/// Deleting an id that was never created is a successful no-op; cleanup
/// code relies on that.
pub fn verify_idempotent_delete(client: &RestClient, report: &mut Report) {
    match client.delete("blog_posts", &fresh_id()) {
        Ok(()) => report.pass("blog_posts::delete_unknown_id"),
        Err(err) => report.fail(
            "blog_posts::delete_unknown_id",
            format!("delete of an unknown id failed: {err}"),
        ),
    }
}

fn create_row(
    client: &RestClient,
    report: &mut Report,
    table: &str,
    tag: &str,
    check: &str,
) -> Option<String> {
    let Some(spec) = table_spec(table) else {
        report.fail(check.to_string(), format!("unknown table {table}"));
        return None;
    };
    let seed = seed_record(spec, tag);
    match client.insert(table, &seed).and_then(|created| extract_id(&created)) {
        Ok(id) => Some(id),
        Err(err) => {
            report.fail(check.to_string(), format!("insert failed: {err}"));
            None
        }
    }
}

fn table_spec(table: &str) -> Option<&'static TableSpec> {
    CONTENT_TABLES.iter().find(|spec| spec.table == table)
}

fn best_effort_delete(client: &RestClient, table: &str, id: &str) {
    if let Err(err) = client.delete(table, id) {
        tracing::warn!(table, id, "cleanup delete failed: {err}");
    }
}

fn best_effort_delete_where(client: &RestClient, table: &str, query: &Query) {
    if let Err(err) = client.delete_where(table, query) {
        tracing::warn!(table, "cleanup delete failed: {err}");
    }
}
