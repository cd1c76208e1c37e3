//! Purpose: Accumulate check outcomes into an ordered log with a single verdict.
//! Exports: `Report`, `CheckOutcome`, `RunState`, `Totals`.
//! Role: Every attempted operation yields exactly one recorded outcome here.
//! Invariants: Log order matches invocation order so runs diff cleanly.
//! Invariants: The exit verdict is nonzero iff at least one failure was recorded.

use serde_json::{Map, Value, json};
use std::io::Write;
use std::path::Path;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    /// Only an outright authentication failure aborts a run; individual
    /// check failures accumulate in `Running`.
    Aborted,
}

#[derive(Clone, Debug)]
pub struct CheckOutcome {
    pub name: String,
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Totals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct Report {
    state: RunState,
    timestamp: Option<String>,
    checks: Vec<CheckOutcome>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            state: RunState::NotStarted,
            timestamp: None,
            checks: Vec::new(),
        }
    }

    pub fn begin(&mut self) {
        if self.state == RunState::NotStarted {
            self.state = RunState::Running;
            self.timestamp = now_rfc3339();
        }
    }

    pub fn complete(&mut self) {
        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }
    }

    pub fn abort(&mut self) {
        if self.state == RunState::Running {
            self.state = RunState::Aborted;
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn record(&mut self, name: impl Into<String>, success: bool, message: Option<String>) {
        self.checks.push(CheckOutcome {
            name: name.into(),
            success,
            message,
        });
    }

    pub fn pass(&mut self, name: impl Into<String>) {
        self.record(name, true, None);
    }

    pub fn fail(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.record(name, false, Some(message.into()));
    }

    pub fn checks(&self) -> &[CheckOutcome] {
        &self.checks
    }

    pub fn totals(&self) -> Totals {
        let passed = self.checks.iter().filter(|check| check.success).count();
        Totals {
            total: self.checks.len(),
            passed,
            failed: self.checks.len() - passed,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.totals().failed > 0 { 1 } else { 0 }
    }

    pub fn render_text(&self) -> String {
        let totals = self.totals();
        let mut lines = Vec::with_capacity(self.checks.len() + 2);
        let name_width = self
            .checks
            .iter()
            .map(|check| check.name.len())
            .max()
            .unwrap_or(0);
        for check in &self.checks {
            let mark = if check.success { "✓" } else { "✗" };
            match &check.message {
                Some(message) => {
                    lines.push(format!("{mark} {:<name_width$}   {message}", check.name));
                }
                None => lines.push(format!("{mark} {}", check.name)),
            }
        }
        lines.push(String::new());
        let verdict = match self.state {
            RunState::Aborted => "aborted",
            _ if totals.failed == 0 => "ok",
            _ => "failed",
        };
        lines.push(format!(
            "{}: {} checks, {} passed, {} failed",
            verdict, totals.total, totals.passed, totals.failed
        ));
        lines.join("\n")
    }

    pub fn to_json(&self) -> Value {
        let totals = self.totals();
        let checks = self
            .checks
            .iter()
            .map(|check| {
                let mut map = Map::new();
                map.insert("name".to_string(), json!(check.name));
                map.insert("success".to_string(), json!(check.success));
                if let Some(message) = &check.message {
                    map.insert("error".to_string(), json!(message));
                }
                Value::Object(map)
            })
            .collect::<Vec<_>>();
        json!({
            "report": {
                "timestamp": self.timestamp,
                "state": state_label(self.state),
                "checks": checks,
                "summary": {
                    "total": totals.total,
                    "passed": totals.passed,
                    "failed": totals.failed,
                },
            }
        })
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        let json = serde_json::to_string_pretty(&self.to_json())?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

fn state_label(state: RunState) -> &'static str {
    match state {
        RunState::NotStarted => "not_started",
        RunState::Running => "running",
        RunState::Completed => "completed",
        RunState::Aborted => "aborted",
    }
}

fn now_rfc3339() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::{Report, RunState};

    #[test]
    fn log_preserves_invocation_order() {
        let mut report = Report::new();
        report.begin();
        report.pass("tags::create");
        report.fail("tags::read", "row not found");
        report.pass("tags::delete");
        let names = report
            .checks()
            .iter()
            .map(|check| check.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["tags::create", "tags::read", "tags::delete"]);
    }

    #[test]
    fn totals_add_up_and_flip_the_verdict() {
        let mut report = Report::new();
        report.begin();
        report.pass("a");
        report.pass("b");
        assert_eq!(report.exit_code(), 0);
        report.fail("c", "boom");
        let totals = report.totals();
        assert_eq!(totals.total, 3);
        assert_eq!(totals.passed, 2);
        assert_eq!(totals.failed, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn state_machine_transitions() {
        let mut report = Report::new();
        assert_eq!(report.state(), RunState::NotStarted);
        report.complete();
        assert_eq!(report.state(), RunState::NotStarted);
        report.begin();
        assert_eq!(report.state(), RunState::Running);
        report.abort();
        assert_eq!(report.state(), RunState::Aborted);
        report.complete();
        assert_eq!(report.state(), RunState::Aborted);
    }

    #[test]
    fn json_envelope_has_summary_and_check_errors() {
        let mut report = Report::new();
        report.begin();
        report.fail("blog_posts::create", "duplicate key");
        report.complete();
        let value = report.to_json();
        let inner = value.get("report").expect("report envelope");
        assert_eq!(
            inner.pointer("/summary/failed").and_then(|v| v.as_u64()),
            Some(1)
        );
        assert_eq!(
            inner.pointer("/checks/0/error").and_then(|v| v.as_str()),
            Some("duplicate key")
        );
        assert_eq!(inner.get("state").and_then(|v| v.as_str()), Some("completed"));
        assert!(inner.get("timestamp").is_some());
    }

    #[test]
    fn render_text_includes_verdict_line() {
        let mut report = Report::new();
        report.begin();
        report.pass("profile::create");
        report.complete();
        let text = report.render_text();
        assert!(text.contains("✓ profile::create"));
        assert!(text.ends_with("ok: 1 checks, 1 passed, 0 failed"));
    }
}
