//! Purpose: HTTP client for a hosted backend's auth, REST, RPC, and storage surface.
//! Exports: `RestClient`, `Session`, `ApiResult`.
//! Role: The only network boundary; every check in the harness goes through it.
//! Invariants: Requests carry the `apikey` header plus a bearer token (session or anon key).
//! Invariants: Transport faults and HTTP error statuses fold into the same `Api` error kind;
//! Invariants: auth-endpoint rejections map to `Auth` so credential checks can assert on them.
#![allow(clippy::result_large_err)]

use crate::api::query::Query;
use crate::core::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub type ApiResult<T> = Result<T, Error>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    base_url: Url,
    apikey: String,
    token: Option<String>,
    agent: ureq::Agent,
}

/// Authenticated session returned by the password-grant token endpoint.
#[derive(Clone, Debug)]
pub struct Session {
    pub access_token: String,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub expires_at: Option<u64>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<u64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

#[derive(Deserialize)]
struct AuthUser {
    id: Option<String>,
    email: Option<String>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, apikey: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build();
        Ok(Self {
            inner: Arc::new(RestClientInner {
                base_url,
                apikey: apikey.into(),
                token: None,
                agent,
            }),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = Some(token);
        } else {
            self.inner = Arc::new(RestClientInner {
                base_url: self.inner.base_url.clone(),
                apikey: self.inner.apikey.clone(),
                token: Some(token),
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.agent = agent;
        } else {
            self.inner = Arc::new(RestClientInner {
                base_url: self.inner.base_url.clone(),
                apikey: self.inner.apikey.clone(),
                token: self.inner.token.clone(),
                agent,
            });
        }
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Password-grant authentication. Succeeds only on HTTP 200 with an
    /// `access_token` in the body; a rejected credential pair is an `Auth`
    /// error carrying the server's description, never a transport fault.
    pub fn authenticate(&self, email: &str, password: &str) -> ApiResult<Session> {
        let mut url = build_url(&self.inner.base_url, &["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let payload = AuthRequest { email, password };
        let body = serde_json::to_string(&payload).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode auth request json")
                .with_source(err)
        })?;

        let response = self
            .request("POST", &url)
            .set("Content-Type", "application/json")
            .send_string(&body);
        match response {
            Ok(resp) => {
                let text = read_body(resp)?;
                let parsed: AuthResponse = serde_json::from_str(&text).map_err(|err| {
                    Error::new(ErrorKind::Shape)
                        .with_message("invalid auth response json")
                        .with_source(err)
                })?;
                let Some(token) = parsed.access_token else {
                    return Err(Error::new(ErrorKind::Auth)
                        .with_message("auth response is missing access_token")
                        .with_body(text));
                };
                let user = parsed.user.unwrap_or(AuthUser {
                    id: None,
                    email: None,
                });
                Ok(Session {
                    access_token: token,
                    user_id: user.id,
                    user_email: user.email,
                    expires_at: parsed.expires_at,
                })
            }
            Err(ureq::Error::Status(status, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                let description = auth_error_description(&text)
                    .unwrap_or_else(|| format!("authentication rejected with status {status}"));
                Err(Error::new(ErrorKind::Auth)
                    .with_message(description)
                    .with_status(status)
                    .with_body(text))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Api)
                .with_message("auth request failed")
                .with_source(err)),
        }
    }

    /// Insert one row (or a batch, when `record` is a list) and return the
    /// created representation.
    pub fn insert(&self, table: &str, record: &Value) -> ApiResult<Value> {
        let url = self.table_url(table, &Query::new())?;
        self.request_json("POST", &url, Some(record), Some(table))
    }

    /// Filtered read. A 200 with an empty list is a successful empty match,
    /// distinct from a query error.
    pub fn select(&self, table: &str, query: &Query) -> ApiResult<Vec<Value>> {
        let url = self.table_url(table, query)?;
        let value = self.request_json("GET", &url, None, Some(table))?;
        match value {
            Value::Array(rows) => Ok(rows),
            other => Err(Error::new(ErrorKind::Shape)
                .with_message(format!("expected a row list, got {other}"))
                .with_table(table)),
        }
    }

    /// PATCH one row by primary key. 2xx (including 204 No Content) succeeds.
    pub fn update(&self, table: &str, id: &str, patch: &Value) -> ApiResult<()> {
        let url = self.table_url(table, &Query::new().eq("id", id))?;
        self.request_json("PATCH", &url, Some(patch), Some(table))?;
        Ok(())
    }

    /// DELETE by primary key. A filter that matches nothing still succeeds,
    /// which is what makes cleanup idempotent.
    pub fn delete(&self, table: &str, id: &str) -> ApiResult<()> {
        self.delete_where(table, &Query::new().eq("id", id))
    }

    pub fn delete_where(&self, table: &str, query: &Query) -> ApiResult<()> {
        let url = self.table_url(table, query)?;
        self.request_json("DELETE", &url, None, Some(table))?;
        Ok(())
    }

    pub fn rpc(&self, name: &str, payload: &Value) -> ApiResult<Value> {
        let url = build_url(&self.inner.base_url, &["rest", "v1", "rpc", name])?;
        self.request_json("POST", &url, Some(payload), None)
    }

    /// Probe a storage bucket for accessibility by listing its objects.
    pub fn list_bucket(&self, bucket: &str) -> ApiResult<Value> {
        let url = build_url(
            &self.inner.base_url,
            &["storage", "v1", "object", "list", bucket],
        )?;
        let payload = json!({ "prefix": "", "limit": 100 });
        self.request_json("POST", &url, Some(&payload), None)
    }

    fn table_url(&self, table: &str, query: &Query) -> ApiResult<Url> {
        let mut url = build_url(&self.inner.base_url, &["rest", "v1", table])?;
        query.apply(&mut url);
        Ok(url)
    }

    fn request_json(
        &self,
        method: &str,
        url: &Url,
        body: Option<&Value>,
        table: Option<&str>,
    ) -> ApiResult<Value> {
        let request = self.request(method, url).set("Accept", "application/json");
        let response = match body {
            Some(body) => {
                let payload = encode_body(body)?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
            None => request.call(),
        };

        match response {
            Ok(resp) => {
                if resp.status() == 204 {
                    return Ok(Value::Null);
                }
                let text = read_body(resp)?;
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(&text).map_err(|err| {
                    let mut shape = Error::new(ErrorKind::Shape)
                        .with_message("invalid response json")
                        .with_body(text)
                        .with_source(err);
                    if let Some(table) = table {
                        shape = shape.with_table(table);
                    }
                    shape
                })
            }
            Err(ureq::Error::Status(status, resp)) => {
                Err(parse_error_response(status, resp, table))
            }
            Err(ureq::Error::Transport(err)) => {
                let mut api = Error::new(ErrorKind::Api)
                    .with_message("request failed")
                    .with_source(err);
                if let Some(table) = table {
                    api = api.with_table(table);
                }
                Err(api)
            }
        }
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let bearer = self
            .inner
            .token
            .as_deref()
            .unwrap_or(self.inner.apikey.as_str());
        self.inner
            .agent
            .request(method, url.as_str())
            .set("apikey", &self.inner.apikey)
            .set("Authorization", &format!("Bearer {bearer}"))
            .set("Prefer", "return=representation")
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid backend base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("backend base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("backend base url must not include a path"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("backend base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn encode_body(body: &Value) -> ApiResult<String> {
    serde_json::to_string(body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode request json")
            .with_source(err)
    })
}

fn read_body(response: ureq::Response) -> ApiResult<String> {
    response.into_string().map_err(|err| {
        Error::new(ErrorKind::Api)
            .with_message("failed to read response body")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response, table: Option<&str>) -> Error {
    let body = response.into_string().unwrap_or_default();
    let message = rest_error_message(&body)
        .unwrap_or_else(|| format!("request rejected with status {status}"));
    let mut err = Error::new(ErrorKind::Api)
        .with_message(message)
        .with_status(status)
        .with_body(body);
    if let Some(table) = table {
        err = err.with_table(table);
    }
    err
}

/// PostgREST rejections carry `{"message", "code", "details", "hint"}`;
/// storage rejections use `{"error", "message"}`.
fn rest_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["message", "error", "msg"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

/// GoTrue rejections put the human text in `error_description` or `msg`.
fn auth_error_description(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["error_description", "msg", "message", "error"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{
        RestClient, auth_error_description, build_url, normalize_base_url, rest_error_message,
    };
    use crate::api::query::Query;
    use crate::core::error::ErrorKind;

    #[test]
    fn normalize_base_url_strips_trailing_parts() {
        let url = normalize_base_url("https://db.example.com?x=1#frag".to_string()).expect("url");
        assert_eq!(url.as_str(), "https://db.example.com/");
    }

    #[test]
    fn normalize_base_url_rejects_path() {
        let err = normalize_base_url("https://db.example.com/rest/v1".to_string()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn normalize_base_url_rejects_non_http_scheme() {
        let err = normalize_base_url("ftp://db.example.com".to_string()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn build_url_joins_segments() {
        let base = normalize_base_url("https://db.example.com".to_string()).expect("url");
        let url = build_url(&base, &["rest", "v1", "blog_posts"]).expect("url");
        assert_eq!(url.as_str(), "https://db.example.com/rest/v1/blog_posts");
    }

    #[test]
    fn table_url_carries_filters() {
        let client = RestClient::new("https://db.example.com", "anon-key").expect("client");
        let url = client
            .table_url("projects", &Query::new().eq("id", "abc").limit(1))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://db.example.com/rest/v1/projects?id=eq.abc&limit=1"
        );
    }

    #[test]
    fn rest_error_message_prefers_message_field() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        assert_eq!(
            rest_error_message(body).as_deref(),
            Some("duplicate key value violates unique constraint")
        );
        assert_eq!(rest_error_message("not json"), None);
    }

    #[test]
    fn auth_error_description_reads_gotrue_fields() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            auth_error_description(body).as_deref(),
            Some("Invalid login credentials")
        );
    }
}
