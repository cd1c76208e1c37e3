//! Purpose: Declarative table set driving the CRUD sequencer.
//! Exports: `TableSpec`, `CONTENT_TABLES`, `seed_record`, `patch_record`.
//! Role: One parameterized seed table replaces per-entity test scripts.
//! Invariants: Seeds carry fresh UUID primary keys and run-scoped slugs;
//! Invariants: the patch field is never a key or unique column.

use crate::api::fresh_id;
use serde_json::{Value, json};

#[derive(Clone, Copy, Debug)]
pub struct TableSpec {
    pub table: &'static str,
    /// Non-key field patched during the update phase.
    pub patch_field: &'static str,
    pub slug_field: Option<&'static str>,
}

pub const CONTENT_TABLES: &[TableSpec] = &[
    TableSpec {
        table: "profile",
        patch_field: "name",
        slug_field: None,
    },
    TableSpec {
        table: "projects",
        patch_field: "title",
        slug_field: None,
    },
    TableSpec {
        table: "blog_posts",
        patch_field: "title",
        slug_field: Some("slug"),
    },
    TableSpec {
        table: "tags",
        patch_field: "name",
        slug_field: Some("slug"),
    },
    TableSpec {
        table: "categories",
        patch_field: "name",
        slug_field: Some("slug"),
    },
    TableSpec {
        table: "series",
        patch_field: "title",
        slug_field: Some("slug"),
    },
    TableSpec {
        table: "site_settings",
        patch_field: "value",
        slug_field: None,
    },
];

/// Build one disposable seed row for a table. `tag` scopes unique columns
/// (slugs, setting keys) to the current run.
pub fn seed_record(spec: &TableSpec, tag: &str) -> Value {
    let id = fresh_id();
    match spec.table {
        "profile" => json!({
            "id": id,
            "name": format!("Harness Profile {tag}"),
            "title": "Integration Test Fixture",
            "bio": "Disposable profile row created by the verification harness.",
            "skills": ["Rust", "SQL", "PostgREST"],
            "stats": json!({
                "projectsLed": "25+",
                "hoursAnalyzed": "2000+",
                "clientsServed": "150+",
            }).to_string(),
        }),
        "projects" => json!({
            "id": id,
            "title": format!("Harness Project {tag}"),
            "description": "Disposable project row created by the verification harness.",
            "category": "Testing",
            "tags": ["Rust", "Integration"],
            "featured": false,
            "views": 0,
            "likes": 0,
            "comments": 0,
        }),
        "blog_posts" => json!({
            "id": id,
            "title": format!("Harness Post {tag}"),
            "slug": format!("harness-post-{tag}"),
            "content": "Disposable blog post created by the verification harness.",
            "published": false,
            "reading_time": 4,
            "views": 0,
            "likes": 0,
        }),
        "tags" => json!({
            "id": id,
            "name": format!("Harness Tag {tag}"),
            "slug": format!("harness-tag-{tag}"),
            "color": "#3B82F6",
        }),
        "categories" => json!({
            "id": id,
            "name": format!("Harness Category {tag}"),
            "slug": format!("harness-category-{tag}"),
            "description": "Disposable category created by the verification harness.",
            "color": "#10b981",
            "featured": false,
        }),
        "series" => json!({
            "id": id,
            "title": format!("Harness Series {tag}"),
            "slug": format!("harness-series-{tag}"),
            "description": "Disposable series created by the verification harness.",
            "status": "active",
            "featured": false,
        }),
        "site_settings" => json!({
            "id": id,
            "key": format!("harness_{tag}"),
            "value": { "probe": tag },
        }),
        other => json!({ "id": id, "name": format!("Harness {other} {tag}") }),
    }
}

pub fn patch_record(spec: &TableSpec, tag: &str) -> Value {
    match spec.table {
        "site_settings" => json!({ "value": { "probe": tag, "updated": true } }),
        _ => json!({
            spec.patch_field: format!("Harness {} {tag} updated", spec.table)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{CONTENT_TABLES, patch_record, seed_record};
    use serde_json::Value;
    use std::collections::HashSet;

    #[test]
    fn table_names_are_unique() {
        let names: HashSet<_> = CONTENT_TABLES.iter().map(|spec| spec.table).collect();
        assert_eq!(names.len(), CONTENT_TABLES.len());
    }

    #[test]
    fn every_seed_carries_a_fresh_string_id() {
        for spec in CONTENT_TABLES {
            let seed = seed_record(spec, "deadbeef");
            let id = seed.get("id").and_then(Value::as_str).expect("id");
            assert!(!id.is_empty(), "{} seed id", spec.table);
        }
    }

    #[test]
    fn sluggy_seeds_scope_the_slug_to_the_run() {
        for spec in CONTENT_TABLES {
            let Some(slug_field) = spec.slug_field else {
                continue;
            };
            let seed = seed_record(spec, "deadbeef");
            let slug = seed
                .get(slug_field)
                .and_then(Value::as_str)
                .expect("slug field");
            assert!(slug.contains("deadbeef"), "{} slug {slug}", spec.table);
        }
    }

    #[test]
    fn patch_touches_the_declared_field_only() {
        for spec in CONTENT_TABLES {
            let patch = patch_record(spec, "deadbeef");
            let object = patch.as_object().expect("patch object");
            assert_eq!(object.len(), 1, "{} patch", spec.table);
            assert!(object.contains_key(spec.patch_field), "{} patch", spec.table);
            assert_ne!(spec.patch_field, "id");
        }
    }

    #[test]
    fn seeds_for_the_same_table_never_share_ids() {
        let spec = &CONTENT_TABLES[0];
        let a = seed_record(spec, "aaaa1111");
        let b = seed_record(spec, "aaaa1111");
        assert_ne!(a.get("id"), b.get("id"));
    }
}
