use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use movely_core::config::AppConfig;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::load_config;

struct Field<'a> {
    key: &'static str,
    value: String,
    env_keys: &'a [&'static str],
}

pub fn run() -> String {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure.output,
    };

    let config_file_path = AppConfig::resolved_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let auth_token = match &config.api.auth_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    let fields = [
        Field {
            key: "api.base_url",
            value: config.api.base_url.clone(),
            env_keys: &["MOVELY_API_BASE_URL"],
        },
        Field {
            key: "api.timeout_secs",
            value: config.api.timeout_secs.to_string(),
            env_keys: &["MOVELY_API_TIMEOUT_SECS"],
        },
        Field { key: "api.auth_token", value: auth_token, env_keys: &["MOVELY_API_AUTH_TOKEN"] },
        Field {
            key: "api.remote_drafts",
            value: config.api.remote_drafts.to_string(),
            env_keys: &["MOVELY_API_REMOTE_DRAFTS"],
        },
        Field {
            key: "drafts.database_url",
            value: config.drafts.database_url.clone(),
            env_keys: &["MOVELY_DRAFTS_DATABASE_URL", "MOVELY_DATABASE_URL"],
        },
        Field {
            key: "drafts.max_connections",
            value: config.drafts.max_connections.to_string(),
            env_keys: &["MOVELY_DRAFTS_MAX_CONNECTIONS"],
        },
        Field {
            key: "drafts.timeout_secs",
            value: config.drafts.timeout_secs.to_string(),
            env_keys: &["MOVELY_DRAFTS_TIMEOUT_SECS"],
        },
        Field {
            key: "drafts.autosave_debounce_ms",
            value: config.drafts.autosave_debounce_ms.to_string(),
            env_keys: &["MOVELY_DRAFTS_AUTOSAVE_DEBOUNCE_MS"],
        },
        Field {
            key: "pricing.currency",
            value: config.pricing.currency.clone(),
            env_keys: &["MOVELY_PRICING_CURRENCY"],
        },
        Field {
            key: "pricing.base_price",
            value: config.pricing.base_price.to_string(),
            env_keys: &["MOVELY_PRICING_BASE_PRICE"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["MOVELY_LOGGING_LEVEL", "MOVELY_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["MOVELY_LOGGING_FORMAT", "MOVELY_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible: String = trimmed.chars().take(4).collect();
    if trimmed.chars().count() > 8 {
        return format!("{visible}***");
    }

    "<redacted>".to_string()
}
