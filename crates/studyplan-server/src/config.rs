//! Configuration file management for studyplan.
//!
//! Provides a TOML-based config file at `~/.config/studyplan/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use studyplan_core::catalog::CatalogConfig;
use studyplan_db::config::DbConfig;

pub const JWT_SECRET_ENV: &str = "STUDYPLAN_JWT_SECRET";
pub const CATALOG_URL_ENV: &str = "STUDYPLAN_CATALOG_URL";
pub const CATALOG_TIMEOUT_ENV: &str = "STUDYPLAN_CATALOG_TIMEOUT_MS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub catalog: CatalogSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// HMAC secret shared with the identity service. Used as raw bytes.
    pub jwt_secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogSection {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            url: CatalogConfig::DEFAULT_URL.to_string(),
            timeout_ms: CatalogConfig::DEFAULT_TIMEOUT_MS,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the studyplan config directory.
///
/// XDG layout on every platform: `$XDG_CONFIG_HOME/studyplan` or
/// `~/.config/studyplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("studyplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("studyplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file is readable by its owner only.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

/// 32 random bytes, hex-encoded (64 chars).
pub fn generate_jwt_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct StudyplanConfig {
    pub db_config: DbConfig,
    pub jwt_secret: Vec<u8>,
    pub catalog: CatalogConfig,
}

impl StudyplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `STUDYPLAN_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - JWT secret: `STUDYPLAN_JWT_SECRET` > `auth.jwt_secret` > error
    /// - Catalog: `STUDYPLAN_CATALOG_URL` / `STUDYPLAN_CATALOG_TIMEOUT_MS` > `[catalog]` > defaults
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::URL_ENV) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let jwt_secret = if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            secret
        } else if let Some(ref cfg) = file_config {
            cfg.auth.jwt_secret.clone()
        } else {
            bail!(
                "JWT secret not found; set {JWT_SECRET_ENV} or run `studyplan init` to create a config file"
            );
        };
        if jwt_secret.is_empty() {
            bail!("JWT secret must not be empty");
        }

        let file_catalog = file_config.map(|cfg| cfg.catalog).unwrap_or_default();
        let catalog_url = std::env::var(CATALOG_URL_ENV).unwrap_or(file_catalog.url);
        let timeout_ms = match std::env::var(CATALOG_TIMEOUT_ENV) {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{CATALOG_TIMEOUT_ENV} is not a number of milliseconds"))?,
            Err(_) => file_catalog.timeout_ms,
        };
        let mut catalog = CatalogConfig::new(catalog_url);
        catalog.timeout = Duration::from_millis(timeout_ms);

        Ok(Self {
            db_config: DbConfig::new(db_url),
            jwt_secret: jwt_secret.into_bytes(),
            catalog,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "XDG_CONFIG_HOME",
        DbConfig::URL_ENV,
        JWT_SECRET_ENV,
        CATALOG_URL_ENV,
        CATALOG_TIMEOUT_ENV,
    ];

    /// Holds the env lock, points the config dir at a temp dir and clears
    /// every variable the resolver reads. Restores them on drop.
    struct IsolatedEnv {
        _lock: std::sync::MutexGuard<'static, ()>,
        _tmp: tempfile::TempDir,
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl IsolatedEnv {
        fn new() -> Self {
            let lock = crate::test_util::lock_env();
            let tmp = tempfile::TempDir::new().unwrap();
            let saved = VARS.iter().map(|v| (*v, std::env::var(v).ok())).collect();
            for var in VARS {
                unsafe { std::env::remove_var(var) };
            }
            unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
            Self {
                _lock: lock,
                _tmp: tmp,
                saved,
            }
        }

        fn set(&self, var: &str, value: &str) {
            unsafe { std::env::set_var(var, value) };
        }
    }

    impl Drop for IsolatedEnv {
        fn drop(&mut self) {
            for (var, value) in &self.saved {
                match value {
                    Some(v) => unsafe { std::env::set_var(var, v) },
                    None => unsafe { std::env::remove_var(var) },
                }
            }
        }
    }

    fn sample_file() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: "postgresql://filehost:5432/filedb".to_string(),
            },
            auth: AuthSection {
                jwt_secret: "file-secret".to_string(),
            },
            catalog: CatalogSection {
                url: "http://catalog.file:9000".to_string(),
                timeout_ms: 750,
            },
        }
    }

    #[test]
    fn generate_jwt_secret_is_64_hex_chars() {
        let secret = generate_jwt_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_jwt_secret());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let _env = IsolatedEnv::new();
        let path = save_config(&sample_file()).unwrap();
        assert_eq!(path, config_path());

        let loaded = load_config().unwrap();
        assert_eq!(loaded.database.url, "postgresql://filehost:5432/filedb");
        assert_eq!(loaded.auth.jwt_secret, "file-secret");
        assert_eq!(loaded.catalog.timeout_ms, 750);
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _env = IsolatedEnv::new();
        let path = save_config(&sample_file()).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn catalog_section_is_optional() {
        let parsed: ConfigFile = toml::from_str(
            "[database]\nurl = \"postgresql://h/db\"\n\n[auth]\njwt_secret = \"s\"\n",
        )
        .unwrap();
        assert_eq!(parsed.catalog.url, CatalogConfig::DEFAULT_URL);
        assert_eq!(parsed.catalog.timeout_ms, CatalogConfig::DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn file_values_used_when_env_is_empty() {
        let _env = IsolatedEnv::new();
        save_config(&sample_file()).unwrap();

        let config = StudyplanConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://filehost:5432/filedb");
        assert_eq!(config.jwt_secret, b"file-secret");
        assert_eq!(config.catalog.base_url, "http://catalog.file:9000");
        assert_eq!(config.catalog.timeout, Duration::from_millis(750));
    }

    #[test]
    fn env_overrides_file_and_cli_overrides_env() {
        let env = IsolatedEnv::new();
        save_config(&sample_file()).unwrap();
        env.set(DbConfig::URL_ENV, "postgresql://env:5432/envdb");
        env.set(JWT_SECRET_ENV, "env-secret");
        env.set(CATALOG_URL_ENV, "http://catalog.env");
        env.set(CATALOG_TIMEOUT_ENV, "100");

        let config = StudyplanConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.jwt_secret, b"env-secret");
        assert_eq!(config.catalog.base_url, "http://catalog.env");
        assert_eq!(config.catalog.timeout, Duration::from_millis(100));

        let config = StudyplanConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
    }

    #[test]
    fn defaults_without_file() {
        let env = IsolatedEnv::new();
        env.set(JWT_SECRET_ENV, "s3cret");

        let config = StudyplanConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.catalog.base_url, CatalogConfig::DEFAULT_URL);
        assert_eq!(
            config.catalog.timeout,
            Duration::from_millis(CatalogConfig::DEFAULT_TIMEOUT_MS)
        );
    }

    #[test]
    fn missing_secret_is_an_error() {
        let _env = IsolatedEnv::new();
        let err = StudyplanConfig::resolve(None).unwrap_err();
        assert!(
            err.to_string().contains("JWT secret not found"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let env = IsolatedEnv::new();
        env.set(JWT_SECRET_ENV, "s3cret");
        env.set(CATALOG_TIMEOUT_ENV, "soon");
        assert!(StudyplanConfig::resolve(None).is_err());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        assert!(config_path().ends_with("studyplan/config.toml"));
    }
}
