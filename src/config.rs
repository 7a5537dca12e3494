//! Service configuration: a TOML file overlaid with environment variables.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NotifierError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "cider_github_status.toml";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8787";
pub const DEFAULT_API_URL: &str = "https://api.github.com/";
pub const DEFAULT_ACCEPT: &str = "application/vnd.github.she-hulk-preview+json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BUS_CAPACITY: usize = 256;
const DEFAULT_MAX_LOG_FILES: usize = 5;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub product: ProductProfile,
    pub github: GithubConfig,
    pub ingress: IngressConfig,
    pub bus: BusConfig,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            product: ProductProfile::default(),
            github: GithubConfig::default(),
            ingress: IngressConfig::default(),
            bus: BusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which build-automation product this deployment reports for.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProductProfile {
    /// Display name used in the fixed status messages.
    pub name: String,
    /// Events are consumed from `<topic_prefix>.build.enqueued` and
    /// `<topic_prefix>.build.finished`.
    pub topic_prefix: String,
    /// Status context label shared by pending and terminal updates.
    pub context: String,
}

impl Default for ProductProfile {
    fn default() -> Self {
        Self {
            name: "Cider".to_string(),
            topic_prefix: "cider".to_string(),
            context: "Cider CI".to_string(),
        }
    }
}

impl ProductProfile {
    pub fn enqueued_topic(&self) -> String {
        format!("{}.build.enqueued", self.topic_prefix)
    }

    pub fn finished_topic(&self) -> String {
        format!("{}.build.finished", self.topic_prefix)
    }

    pub fn pending_message(&self) -> String {
        "The build is enqueued or running".to_string()
    }

    pub fn success_message(&self) -> String {
        format!("{} build succeeded!", self.name)
    }

    pub fn failure_message(&self) -> String {
        format!("{} build failed!", self.name)
    }

    pub fn error_fallback_message(&self) -> String {
        format!("{} exploded, oops", self.name)
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub accept: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Only ever read from `GITHUB_TOKEN`.
    #[serde(skip)]
    pub token: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("cider_github_status/{}", env!("CARGO_PKG_VERSION")),
            token: String::new(),
        }
    }
}

impl GithubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_url", &self.api_url)
            .field("accept", &self.accept)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("token", &redact(&self.token))
            .finish()
    }
}

#[derive(Deserialize, Clone, Default)]
#[serde(default)]
pub struct IngressConfig {
    /// When set, publishers must sign request bodies with this secret.
    pub secret: Option<String>,
}

impl IngressConfig {
    /// Returns the secret only if it is non-empty.
    pub fn active_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for IngressConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngressConfig")
            .field("secret", &self.secret.as_deref().map(redact))
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BusConfig {
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Rolling log files are written here when set; console only otherwise.
    pub directory: Option<PathBuf>,
    pub max_files: usize,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_files: DEFAULT_MAX_LOG_FILES,
            file_prefix: "cider_github_status".to_string(),
        }
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() { "<unset>" } else { "<redacted>" }
}

impl ServiceConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay environment values. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.github.token = token;
        }
        if let Some(addr) = lookup("BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(secret) = lookup("INGRESS_SECRET") {
            self.ingress.secret = Some(secret);
        }
        if let Some(url) = lookup("GITHUB_API_URL") {
            self.github.api_url = url;
        }
    }

    /// Checks everything the service cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.github.token.is_empty() {
            return Err(NotifierError::MissingCredential("GITHUB_TOKEN"));
        }
        if self.product.topic_prefix.is_empty() {
            return Err(NotifierError::Config(
                "product.topic_prefix must not be empty".to_string(),
            ));
        }
        if self.github.timeout_secs == 0 {
            return Err(NotifierError::Config(
                "github.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(NotifierError::Config(
                "bus.capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read the configuration file. `Ok(None)` means there is no file at `path`.
///
/// Runs before logging is installed, so it does not log; the environment is
/// applied and validated afterwards with [`ServiceConfig::apply_env`] and
/// [`ServiceConfig::validate`].
pub fn read_config_file(path: impl AsRef<Path>) -> Result<Option<ServiceConfig>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| {
        NotifierError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    Ok(Some(ServiceConfig::from_toml(&text)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServiceConfig::from_toml("").unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.product, ProductProfile::default());
        assert_eq!(config.github.accept, DEFAULT_ACCEPT);
        assert_eq!(config.github.timeout(), Duration::from_secs(10));
        assert_eq!(config.bus.capacity, 256);
        assert!(config.ingress.active_secret().is_none());
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ServiceConfig::from_toml(
            r#"
            [product]
            name = "Jenkins"
            topic_prefix = "jenkins"

            [github]
            timeout_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.product.enqueued_topic(), "jenkins.build.enqueued");
        assert_eq!(config.product.finished_topic(), "jenkins.build.finished");
        assert_eq!(config.product.context, "Cider CI");
        assert_eq!(config.product.success_message(), "Jenkins build succeeded!");
        assert_eq!(config.github.timeout_secs, 3);
        assert_eq!(config.github.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let err = ServiceConfig::from_toml("bind_address = [").unwrap_err();
        assert!(matches!(err, NotifierError::TomlParse(_)));
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = ServiceConfig::from_toml(r#"bind_address = "0.0.0.0:1""#).unwrap();
        config.apply_env(env(&[
            ("GITHUB_TOKEN", "ghp_abc"),
            ("BIND_ADDRESS", "127.0.0.1:9999"),
            ("INGRESS_SECRET", "shh"),
            ("GITHUB_API_URL", "https://ghe.example.com/api/v3/"),
        ]));

        assert_eq!(config.github.token, "ghp_abc");
        assert_eq!(config.bind_address, "127.0.0.1:9999");
        assert_eq!(config.ingress.active_secret(), Some("shh"));
        assert_eq!(config.github.api_url, "https://ghe.example.com/api/v3/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn token_is_never_read_from_file() {
        let mut config = ServiceConfig::from_toml(
            r#"
            [github]
            token = "from-file"
            "#,
        )
        .unwrap();
        assert!(config.github.token.is_empty());

        config.apply_env(env(&[]));
        assert!(matches!(
            config.validate(),
            Err(NotifierError::MissingCredential("GITHUB_TOKEN"))
        ));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = ServiceConfig::from_toml("[bus]\ncapacity = 0").unwrap();
        config.apply_env(env(&[("GITHUB_TOKEN", "t")]));
        assert!(matches!(config.validate(), Err(NotifierError::Config(_))));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = ServiceConfig::default();
        config.apply_env(env(&[("GITHUB_TOKEN", "ghp_secret"), ("INGRESS_SECRET", "hush")]));
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("ghp_secret"));
        assert!(!rendered.contains("hush"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let path = std::env::temp_dir().join(format!("cider-missing-{}.toml", uuid::Uuid::now_v7()));
        assert!(read_config_file(&path).unwrap().is_none());
    }

    #[test]
    fn existing_file_is_parsed_without_validation() {
        let path = std::env::temp_dir().join(format!("cider-config-{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[product]\nname = \"Drone\"\n").unwrap();

        let config = read_config_file(&path).unwrap().expect("file present");
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.product.name, "Drone");
        // Token comes from the environment later; absence is reported by validate().
        assert!(matches!(
            config.validate(),
            Err(NotifierError::MissingCredential("GITHUB_TOKEN"))
        ));
    }

    #[test]
    fn empty_ingress_secret_is_inactive() {
        let config = ServiceConfig::from_toml("[ingress]\nsecret = \"\"").unwrap();
        assert!(config.ingress.active_secret().is_none());
    }
}
