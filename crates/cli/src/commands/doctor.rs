use std::fs::OpenOptions;
use std::path::Path;

use serde::Serialize;
use slack2doc_core::config::AppConfig;
use slack2doc_docs::document_url;

use super::{load_config, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(secrets: Option<&Path>, json_output: bool) -> CommandResult {
    let report = build_report(secrets);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(secrets: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();

    match load_config(secrets) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_document_target(&config));
            checks.push(check_user_lookup(&config));
            checks.push(check_log_destination(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["document_target", "user_lookup", "log_destination"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_document_target(config: &AppConfig) -> DoctorCheck {
    let document = &config.document;
    let doc_id = document.doc_id.trim();
    if doc_id.contains(['/', '?', '#']) || doc_id.contains(char::is_whitespace) {
        return DoctorCheck {
            name: "document_target",
            status: CheckStatus::Fail,
            details: format!(
                "doc_id `{doc_id}` is not a bare document id (hint: copy the id between `/d/` and `/edit` in the document URL)"
            ),
        };
    }

    DoctorCheck {
        name: "document_target",
        status: CheckStatus::Pass,
        details: format!(
            "{:?} document id is well formed: {} ({} monitored channel(s))",
            document.kind,
            document_url(document.kind, doc_id),
            config.slack.channels.len()
        ),
    }
}

fn check_user_lookup(config: &AppConfig) -> DoctorCheck {
    if config.slack.bot_token.is_some() {
        DoctorCheck {
            name: "user_lookup",
            status: CheckStatus::Pass,
            details: "authors resolved through slack users.info".to_string(),
        }
    } else {
        DoctorCheck {
            name: "user_lookup",
            status: CheckStatus::Skipped,
            details: "no slack_bot_token configured; authors are recorded as user ids".to_string(),
        }
    }
}

fn check_log_destination(config: &AppConfig) -> DoctorCheck {
    let Some(path) = config.logging.file.as_deref() else {
        return DoctorCheck {
            name: "log_destination",
            status: CheckStatus::Pass,
            details: "logging to stdout".to_string(),
        };
    };

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(_) => DoctorCheck {
            name: "log_destination",
            status: CheckStatus::Pass,
            details: format!("log file `{}` is writable", path.display()),
        },
        Err(error) => DoctorCheck {
            name: "log_destination",
            status: CheckStatus::Fail,
            details: format!("log file `{}` is not writable: {error}", path.display()),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
