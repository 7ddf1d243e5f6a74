use movely_client::ApiClient;
use movely_core::config::{AppConfig, LoadOptions};
use movely_db::{connect_drafts, migrations};
use serde::Serialize;

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

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_api_client(&config));
            checks.push(check_draft_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["api_client", "draft_database"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_api_client(config: &AppConfig) -> DoctorCheck {
    match ApiClient::from_config(&config.api) {
        Ok(client) => {
            let auth = if config.api.auth_token.is_some() { "with" } else { "without" };
            DoctorCheck {
                name: "api_client",
                status: CheckStatus::Pass,
                details: format!("client ready for `{}` {auth} bearer token", client.base_url()),
            }
        }
        Err(error) => {
            DoctorCheck { name: "api_client", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_draft_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "draft_database",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_drafts(&config.drafts)
            .await
            .map_err(|error| format!("failed to open draft database: {error}"))?;
        let applied = migrations::applied_count(&pool)
            .await
            .map_err(|error| format!("failed to read migration state: {error}"))?;
        pool.close().await;
        Ok::<usize, String>(applied)
    });

    let expected = migrations::MIGRATOR.iter().count();
    match result {
        Ok(applied) if applied >= expected => DoctorCheck {
            name: "draft_database",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.drafts.database_url),
        },
        Ok(applied) => DoctorCheck {
            name: "draft_database",
            status: CheckStatus::Fail,
            details: format!(
                "{applied} of {expected} migrations applied; run `movely migrate`"
            ),
        },
        Err(error) => {
            DoctorCheck { name: "draft_database", status: CheckStatus::Fail, details: error }
        }
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
