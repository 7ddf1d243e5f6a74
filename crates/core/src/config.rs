use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "movely.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub drafts: DraftsConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub auth_token: Option<SecretString>,
    /// Mirror drafts to `/drafts` on the backend in addition to the local store.
    pub remote_drafts: bool,
}

#[derive(Clone, Debug)]
pub struct DraftsConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    pub autosave_debounce_ms: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub currency: String,
    pub base_price: Decimal,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub api_auth_token: Option<String>,
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000/api".to_string(),
                timeout_secs: 30,
                auth_token: None,
                remote_drafts: false,
            },
            drafts: DraftsConfig {
                database_url: "sqlite://movely-drafts.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                autosave_debounce_ms: 1_000,
            },
            pricing: PricingConfig { currency: "GBP".to_string(), base_price: Decimal::ZERO },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Path the loader would read, if any.
    pub fn resolved_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
        resolve_config_path(explicit_path)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(api) = patch.api {
            if let Some(base_url) = api.base_url {
                self.api.base_url = base_url;
            }
            if let Some(timeout_secs) = api.timeout_secs {
                self.api.timeout_secs = timeout_secs;
            }
            if let Some(auth_token) = api.auth_token {
                self.api.auth_token = Some(SecretString::from(auth_token));
            }
            if let Some(remote_drafts) = api.remote_drafts {
                self.api.remote_drafts = remote_drafts;
            }
        }

        if let Some(drafts) = patch.drafts {
            if let Some(database_url) = drafts.database_url {
                self.drafts.database_url = database_url;
            }
            if let Some(max_connections) = drafts.max_connections {
                self.drafts.max_connections = max_connections;
            }
            if let Some(timeout_secs) = drafts.timeout_secs {
                self.drafts.timeout_secs = timeout_secs;
            }
            if let Some(autosave_debounce_ms) = drafts.autosave_debounce_ms {
                self.drafts.autosave_debounce_ms = autosave_debounce_ms;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(currency) = pricing.currency {
                self.pricing.currency = currency;
            }
            if let Some(base_price) = pricing.base_price {
                self.pricing.base_price = base_price;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MOVELY_API_BASE_URL") {
            self.api.base_url = value;
        }
        if let Some(value) = read_env("MOVELY_API_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_u64("MOVELY_API_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MOVELY_API_AUTH_TOKEN") {
            self.api.auth_token = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("MOVELY_API_REMOTE_DRAFTS") {
            self.api.remote_drafts = parse_bool("MOVELY_API_REMOTE_DRAFTS", &value)?;
        }

        let database_url =
            read_env("MOVELY_DRAFTS_DATABASE_URL").or_else(|| read_env("MOVELY_DATABASE_URL"));
        if let Some(value) = database_url {
            self.drafts.database_url = value;
        }
        if let Some(value) = read_env("MOVELY_DRAFTS_MAX_CONNECTIONS") {
            self.drafts.max_connections = parse_u32("MOVELY_DRAFTS_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MOVELY_DRAFTS_TIMEOUT_SECS") {
            self.drafts.timeout_secs = parse_u64("MOVELY_DRAFTS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MOVELY_DRAFTS_AUTOSAVE_DEBOUNCE_MS") {
            self.drafts.autosave_debounce_ms =
                parse_u64("MOVELY_DRAFTS_AUTOSAVE_DEBOUNCE_MS", &value)?;
        }

        if let Some(value) = read_env("MOVELY_PRICING_CURRENCY") {
            self.pricing.currency = value;
        }
        if let Some(value) = read_env("MOVELY_PRICING_BASE_PRICE") {
            self.pricing.base_price = parse_decimal("MOVELY_PRICING_BASE_PRICE", &value)?;
        }

        let log_level = read_env("MOVELY_LOGGING_LEVEL").or_else(|| read_env("MOVELY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MOVELY_LOGGING_FORMAT").or_else(|| read_env("MOVELY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_base_url) = overrides.api_base_url {
            self.api.base_url = api_base_url;
        }
        if let Some(api_auth_token) = overrides.api_auth_token {
            self.api.auth_token = Some(SecretString::from(api_auth_token));
        }
        if let Some(database_url) = overrides.database_url {
            self.drafts.database_url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_api(&self.api)?;
        validate_drafts(&self.drafts)?;
        validate_pricing(&self.pricing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_api(api: &ApiConfig) -> Result<(), ConfigError> {
    let base_url = api.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "api.base_url must start with http:// or https://".to_string(),
        ));
    }

    if api.timeout_secs == 0 || api.timeout_secs > 300 {
        return Err(ConfigError::Validation("api.timeout_secs must be in range 1..=300".to_string()));
    }

    if let Some(token) = &api.auth_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "api.auth_token must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_drafts(drafts: &DraftsConfig) -> Result<(), ConfigError> {
    let url = drafts.database_url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "drafts.database_url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if drafts.max_connections == 0 {
        return Err(ConfigError::Validation(
            "drafts.max_connections must be greater than zero".to_string(),
        ));
    }

    if drafts.timeout_secs == 0 || drafts.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "drafts.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if drafts.autosave_debounce_ms < 100 || drafts.autosave_debounce_ms > 60_000 {
        return Err(ConfigError::Validation(
            "drafts.autosave_debounce_ms must be in range 100..=60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    let currency = pricing.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "pricing.currency must be a three-letter ISO code such as GBP".to_string(),
        ));
    }

    if pricing.base_price.is_sign_negative() {
        return Err(ConfigError::Validation("pricing.base_price must not be negative".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    api: Option<ApiPatch>,
    drafts: Option<DraftsPatch>,
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    auth_token: Option<String>,
    remote_drafts: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct DraftsPatch {
    database_url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    autosave_debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    currency: Option<String>,
    base_price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.api.base_url == "http://localhost:8000/api", "default api base url")?;
        ensure(config.drafts.autosave_debounce_ms == 1_000, "default debounce is one second")?;
        ensure(config.pricing.currency == "GBP", "default currency")?;
        ensure(config.api.auth_token.is_none(), "no token by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_MOVELY_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("movely.toml");
            fs::write(
                &path,
                r#"
[api]
base_url = "https://api.movely.test"
auth_token = "${TEST_MOVELY_TOKEN}"

[pricing]
base_price = "499.00"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.api.auth_token.as_ref().map(|token| token.expose_secret().to_owned())
                    == Some("token-from-env".to_owned()),
                "auth token should be interpolated from environment",
            )?;
            ensure(config.api.base_url == "https://api.movely.test", "base url from file")?;
            ensure(config.pricing.base_price == Decimal::new(499, 0), "base price from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_MOVELY_TOKEN"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("movely.toml");
        fs::write(&path, "[api]\nauth_token = \"${MOVELY_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let error = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            .err()
            .ok_or_else(|| "expected interpolation failure".to_string())?;
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "MOVELY_TEST_UNSET_VAR"),
            "missing variable should be named",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MOVELY_LOG_LEVEL", "warn");
        env::set_var("MOVELY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["MOVELY_LOG_LEVEL", "MOVELY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MOVELY_DRAFTS_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("MOVELY_API_BASE_URL", "https://env.movely.test");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("movely.toml");
            fs::write(
                &path,
                r#"
[api]
base_url = "https://file.movely.test"
timeout_secs = 12

[drafts]
database_url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.drafts.database_url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.api.base_url == "https://env.movely.test",
                "env base url should win over file and defaults",
            )?;
            ensure(config.api.timeout_secs == 12, "file timeout should win over defaults")?;
            Ok(())
        })();

        clear_vars(&["MOVELY_DRAFTS_DATABASE_URL", "MOVELY_API_BASE_URL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MOVELY_API_BASE_URL", "ftp://api.movely.test");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("api.base_url")
            );
            ensure(has_message, "validation failure should mention api.base_url")
        })();

        clear_vars(&["MOVELY_API_BASE_URL"]);
        result
    }

    #[test]
    fn malformed_numeric_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MOVELY_PRICING_BASE_PRICE", "four hundred");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "expected invalid override".to_string())?;
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "MOVELY_PRICING_BASE_PRICE"),
                "invalid override should name the variable",
            )
        })();

        clear_vars(&["MOVELY_PRICING_BASE_PRICE"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MOVELY_API_AUTH_TOKEN", "bearer-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("bearer-secret-value"),
                "debug output should not contain the api token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["MOVELY_API_AUTH_TOKEN"]);
        result
    }
}
