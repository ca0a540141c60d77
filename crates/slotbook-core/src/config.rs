use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

const DEFAULT_GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_MICROSOFT_TOKEN_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const DEFAULT_MICROSOFT_SCOPE: &str = "User.Read Calendars.Read Calendars.ReadWrite";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Google OAuth app used for Google Calendar credentials
    #[serde(default)]
    pub google: GoogleConfig,

    /// Azure AD app used for Microsoft 365 credentials
    #[serde(default)]
    pub microsoft: MicrosoftConfig,

    /// Outbound mail relay. Confirmation emails are disabled when absent.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,

    #[serde(default)]
    pub branding: BrandingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON document holding users, their event types and calendar credentials
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: slotbook_config_dir().join("users.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base: String,
    pub token_url: String,
}

impl GoogleConfig {
    /// Check if credentials are configured (not placeholders)
    pub fn is_configured(&self) -> bool {
        is_real_secret(&self.client_id) && is_real_secret(&self.client_secret)
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            api_base: DEFAULT_GOOGLE_API_BASE.to_string(),
            token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrosoftConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Space separated scopes requested on refresh
    pub scope: String,
    pub graph_base: String,
    pub token_url: String,
}

impl MicrosoftConfig {
    pub fn is_configured(&self) -> bool {
        is_real_secret(&self.client_id) && is_real_secret(&self.client_secret)
    }
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            scope: DEFAULT_MICROSOFT_SCOPE.to_string(),
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
            token_url: DEFAULT_MICROSOFT_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Implicit TLS (SMTPS, usually port 465). STARTTLS is used otherwise.
    pub implicit_tls: bool,
    /// Sender mailbox, e.g. `"Acme" <no-reply@acme.test>`
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 465,
            username: String::new(),
            password: String::new(),
            implicit_tls: true,
            from: "Slotbook <no-reply@localhost>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingConfig {
    pub company_name: String,
    pub website: String,
    /// Prepended to event type titles when creating calendar events
    pub event_title_prefix: String,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            company_name: "Slotbook".to_string(),
            website: String::new(),
            event_title_prefix: String::new(),
        }
    }
}

/// Shape of the `GOOGLE_API_CREDENTIALS` variable (Google console "web" client download).
#[derive(Debug, Deserialize)]
struct GoogleApiCredentials {
    web: GoogleWebClient,
}

#[derive(Debug, Deserialize)]
struct GoogleWebClient {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl Config {
    /// Load configuration from the config file (defaults if missing), then apply
    /// process environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors. Warnings are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Read a TOML config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using `lookup` to resolve variables.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("GOOGLE_API_CREDENTIALS") {
            let creds: GoogleApiCredentials = serde_json::from_str(&raw).map_err(|e| {
                ConfigError::ParseError(format!("GOOGLE_API_CREDENTIALS: {}", e))
            })?;
            self.google.client_id = creds.web.client_id;
            self.google.client_secret = creds.web.client_secret;
            if let Some(uri) = creds.web.redirect_uris.into_iter().next() {
                self.google.redirect_uri = uri;
            }
        }

        if let Some(id) = lookup("MS_GRAPH_CLIENT_ID") {
            self.microsoft.client_id = id;
        }
        if let Some(secret) = lookup("MS_GRAPH_CLIENT_SECRET") {
            self.microsoft.client_secret = secret;
        }

        if let Some(host) = lookup("SMTP_HOST") {
            self.smtp.get_or_insert_with(SmtpConfig::default).host = host;
        }
        if let Some(port) = lookup("SMTP_PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("SMTP_PORT is not a port: {}", port)))?;
            let smtp = self.smtp.get_or_insert_with(SmtpConfig::default);
            smtp.port = port;
            smtp.implicit_tls = port == 465;
        }
        if let Some(user) = lookup("SMTP_USERNAME") {
            self.smtp.get_or_insert_with(SmtpConfig::default).username = user;
        }
        if let Some(pass) = lookup("SMTP_PASSWORD") {
            self.smtp.get_or_insert_with(SmtpConfig::default).password = pass;
        }
        if let Some(from) = lookup("SMTP_FROM") {
            self.smtp.get_or_insert_with(SmtpConfig::default).from = from;
        }

        if let Some(bind) = lookup("SLOTBOOK_BIND") {
            self.server.bind_addr = bind;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            result.add_error(
                "server.bind_addr",
                format!("Not a socket address: {}", self.server.bind_addr),
            );
        }

        validate_url(&self.google.api_base, "google.api_base", &mut result);
        validate_url(&self.google.token_url, "google.token_url", &mut result);
        validate_url(&self.microsoft.graph_base, "microsoft.graph_base", &mut result);
        validate_url(&self.microsoft.token_url, "microsoft.token_url", &mut result);

        if !self.google.is_configured() {
            result.add_warning(
                "google",
                "Google OAuth app not configured - Google calendars will fail to refresh",
            );
        }
        if !self.microsoft.is_configured() {
            result.add_warning(
                "microsoft",
                "Microsoft app not configured - Office 365 calendars will fail to refresh",
            );
        }

        match &self.smtp {
            Some(smtp) => {
                if smtp.host.is_empty() {
                    result.add_error("smtp.host", "SMTP host must not be empty");
                }
                if smtp.port == 0 {
                    result.add_error("smtp.port", "Port cannot be 0");
                }
                if !smtp.from.contains('@') {
                    result.add_error("smtp.from", "Sender must contain an email address");
                }
            }
            None => {
                result.add_warning("smtp", "SMTP not configured - confirmation emails disabled");
            }
        }

        result
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("SLOTBOOK_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("slotbook");

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }
            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}

fn is_real_secret(value: &str) -> bool {
    !value.is_empty() && !value.starts_with("YOUR_")
}

fn slotbook_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slotbook")
}
