//! Server configuration read from the environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `PORT` | `5000` | listen port |
//! | `HOST` | `0.0.0.0` | listen address |
//! | `TIMER_STORE_URL` | platform data dir | `memory:`, `file:///dir` or a directory path |
//! | `CORS_ALLOWED_ORIGINS` | Shopify storefronts and admin | comma-separated origin rules |

use core::net::{IpAddr, SocketAddr};
use core::str::FromStr;
use std::path::PathBuf;

use url::Url;

use crate::error::{Result, TimerError};

/// Listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 5000;
/// Listen address when `HOST` is unset.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Allowed origins when `CORS_ALLOWED_ORIGINS` is unset.
pub const DEFAULT_CORS_ORIGINS: &str = "https://*.myshopify.com,https://admin.shopify.com";

/// Environment variable holding the listen port.
const PORT_ENV: &str = "PORT";
/// Environment variable holding the listen address.
const HOST_ENV: &str = "HOST";
/// Environment variable selecting the timer store.
const STORE_ENV: &str = "TIMER_STORE_URL";
/// Environment variable holding the CORS origin rules.
const CORS_ENV: &str = "CORS_ALLOWED_ORIGINS";

/// Everything `serve` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket the API listens on.
    pub bind_address: SocketAddr,
    /// Where timers are kept.
    pub store: StoreLocation,
    /// Which browser origins may call the API.
    pub cors: CorsPolicy,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Config`] if a variable is malformed.
    #[inline]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Config`] if a variable is malformed.
    #[inline]
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|raw| !raw.trim().is_empty());

        let port = match value(PORT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|err| TimerError::Config(format!("{PORT_ENV}=\"{raw}\": {err}")))?,
            None => DEFAULT_PORT,
        };
        let host_raw = value(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let host = host_raw
            .trim()
            .parse::<IpAddr>()
            .map_err(|err| TimerError::Config(format!("{HOST_ENV}=\"{host_raw}\": {err}")))?;
        let store = match value(STORE_ENV) {
            Some(raw) => raw.parse()?,
            None => StoreLocation::platform_default()?,
        };
        let cors = CorsPolicy::parse(&value(CORS_ENV).unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_owned()))?;

        let config = Self {
            bind_address: SocketAddr::new(host, port),
            store,
            cors,
        };
        tracing::debug!(?config, "server configuration loaded");
        Ok(config)
    }
}

/// Backend holding the timer collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Process-local, lost on exit.
    Memory,
    /// JSON document under the given directory.
    File(PathBuf),
}

impl StoreLocation {
    /// The platform data directory when file storage is compiled in,
    /// memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be determined.
    #[inline]
    pub fn platform_default() -> Result<Self> {
        #[cfg(feature = "storage-file")]
        {
            crate::storage::FileStore::default_dir().map(Self::File)
        }
        #[cfg(not(feature = "storage-file"))]
        {
            Ok(Self::Memory)
        }
    }
}

impl FromStr for StoreLocation {
    type Err = TimerError;

    /// Accepts `memory:`, `file:///dir`, or a bare directory path. Other
    /// URL schemes are rejected.
    #[inline]
    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TimerError::Config(format!("{STORE_ENV} is empty")));
        }
        if trimmed == "memory" || trimmed == "memory:" {
            return Ok(Self::Memory);
        }
        match Url::parse(trimmed) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::File)
                .map_err(|()| TimerError::Config(format!("{STORE_ENV}=\"{trimmed}\" is not a local path"))),
            // Single-letter schemes are Windows drive letters.
            Ok(url) if url.scheme().len() > 1 => Err(TimerError::Config(format!(
                "unsupported timer store scheme \"{}\" in {STORE_ENV}",
                url.scheme()
            ))),
            Ok(_) | Err(_) => Ok(Self::File(PathBuf::from(trimmed))),
        }
    }
}

/// One allowed-origin rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRule {
    /// `*`: every origin.
    Any,
    /// One origin, e.g. `https://admin.shopify.com`.
    Exact(String),
    /// Any single- or multi-label subdomain, e.g. `https://*.myshopify.com`.
    Wildcard {
        /// Required scheme.
        scheme: String,
        /// Required host suffix, starting with a dot.
        suffix: String,
    },
}

impl OriginRule {
    /// Parses one rule.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Config`] if the rule has no `scheme://` part or
    /// a misplaced `*`.
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        let rule = raw.trim().trim_end_matches('/').to_ascii_lowercase();
        if rule == "*" {
            return Ok(Self::Any);
        }
        let Some((scheme, host)) = rule.split_once("://") else {
            return Err(TimerError::Config(format!("origin \"{raw}\" needs a scheme")));
        };
        if scheme.is_empty() || host.is_empty() {
            return Err(TimerError::Config(format!("origin \"{raw}\" is incomplete")));
        }
        if let Some(suffix) = host.strip_prefix('*') {
            if !suffix.starts_with('.') || suffix.len() < 2 || suffix.contains('*') {
                return Err(TimerError::Config(format!("origin \"{raw}\" has a malformed wildcard")));
            }
            return Ok(Self::Wildcard {
                scheme: scheme.to_owned(),
                suffix: suffix.to_owned(),
            });
        }
        if host.contains('*') {
            return Err(TimerError::Config(format!("origin \"{raw}\" has a malformed wildcard")));
        }
        Ok(Self::Exact(rule))
    }

    /// Returns `true` if `origin` satisfies this rule.
    #[inline]
    #[must_use]
    #[allow(clippy::pattern_type_mismatch, reason = "rule fields are only borrowed")]
    pub fn matches(&self, origin: &str) -> bool {
        let normalized = origin.trim().trim_end_matches('/').to_ascii_lowercase();
        match self {
            Self::Any => true,
            Self::Exact(allowed) => *allowed == normalized,
            Self::Wildcard { scheme, suffix } => normalized
                .split_once("://")
                .and_then(|(origin_scheme, host)| (origin_scheme == scheme.as_str()).then_some(host))
                .and_then(|host| host.strip_suffix(suffix.as_str()))
                .is_some_and(|label| !label.is_empty() && !label.contains(['/', ':'])),
        }
    }
}

/// Allowed browser origins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Rules in configuration order; an origin is allowed if any matches.
    rules: Vec<OriginRule>,
}

impl CorsPolicy {
    /// Parses a comma-separated rule list. Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Config`] for the first malformed rule.
    #[inline]
    pub fn parse(list: &str) -> Result<Self> {
        let rules = list
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(OriginRule::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// A policy allowing every origin.
    #[inline]
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            rules: vec![OriginRule::Any],
        }
    }

    /// Configured rules.
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[OriginRule] {
        &self.rules
    }

    /// Returns `true` if a `*` rule is present.
    #[inline]
    #[must_use]
    pub fn allows_any(&self) -> bool {
        self.rules.contains(&OriginRule::Any)
    }

    /// Returns `true` if `origin` is allowed.
    #[inline]
    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(origin))
    }
}
