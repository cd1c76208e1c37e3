//! Purpose: Build PostgREST-style query strings without per-table compiled types.
//! Exports: `Query`.
//! Role: Thin filter builder applied to request URLs (`column=eq.value`, `select`, `order`, `limit`).
//! Invariants: Pairs are appended in insertion order; values are percent-encoded by the `url` crate.

use url::Url;

#[derive(Clone, Debug, Default)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality filter: `column=eq.value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((column.into(), format!("eq.{}", value.into())));
        self
    }

    /// Column/embedded-relation selection, e.g. `*,tags(*)`.
    pub fn select(mut self, expr: impl Into<String>) -> Self {
        self.pairs.push(("select".to_string(), expr.into()));
        self
    }

    pub fn order(mut self, column: impl Into<String>) -> Self {
        self.pairs.push(("order".to_string(), column.into()));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.pairs.push(("limit".to_string(), n.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn apply(&self, url: &mut Url) {
        if self.pairs.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in &self.pairs {
            query.append_pair(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Query;
    use url::Url;

    #[test]
    fn eq_filter_uses_postgrest_operator_syntax() {
        let mut url = Url::parse("https://db.example.com/rest/v1/blog_posts").expect("url");
        Query::new().eq("slug", "react-mastery").apply(&mut url);
        assert_eq!(url.query(), Some("slug=eq.react-mastery"));
    }

    #[test]
    fn pairs_keep_insertion_order() {
        let mut url = Url::parse("https://db.example.com/rest/v1/tags").expect("url");
        Query::new()
            .select("*,tags(*)")
            .order("created_at")
            .limit(5)
            .apply(&mut url);
        assert_eq!(
            url.query(),
            Some("select=*%2Ctags%28*%29&order=created_at&limit=5")
        );
    }

    #[test]
    fn empty_query_leaves_url_untouched() {
        let mut url = Url::parse("https://db.example.com/rest/v1/profile").expect("url");
        Query::new().apply(&mut url);
        assert_eq!(url.query(), None);
    }
}
