//! HTTP client for the program catalog service.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CatalogClient, CatalogError, ModuleInfo, StudyProgram};

/// Connection settings for [`HttpCatalogClient`].
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Service root, e.g. `http://program-catalog-service:8080`.
    pub base_url: String,
    /// Bound on each request. There is exactly one attempt per lookup.
    pub timeout: Duration,
    /// How long a successful lookup is served from memory.
    pub cache_ttl: Duration,
    pub max_cache_entries: usize,
}

impl CatalogConfig {
    pub const DEFAULT_URL: &str = "http://program-catalog-service:8080";
    pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_URL.to_owned(),
            timeout: Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
            cache_ttl: Duration::from_secs(300),
            max_cache_entries: 1000,
        }
    }
}

struct TtlCache<K, V> {
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(expires_at, _)| *expires_at > Instant::now())
            .map(|(_, value)| value.clone())
    }

    async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            let now = Instant::now();
            entries.retain(|_, (expires_at, _)| *expires_at > now);
            if entries.len() >= self.capacity {
                entries.clear();
            }
        }
        entries.insert(key, (Instant::now() + self.ttl, value));
    }
}

/// [`CatalogClient`] backed by the catalog's REST API.
pub struct HttpCatalogClient {
    base_url: Url,
    http: reqwest::Client,
    programs: TtlCache<i64, StudyProgram>,
    modules: TtlCache<String, ModuleInfo>,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid catalog URL {:?}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("catalog URL {:?} cannot carry a path", config.base_url);
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("studyplan/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build catalog HTTP client")?;

        Ok(Self {
            base_url,
            http,
            programs: TtlCache::new(config.cache_ttl, config.max_cache_entries),
            modules: TtlCache::new(config.cache_ttl, config.max_cache_entries),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// One GET. 404 maps to `None`; every other failure is `Unavailable`.
    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, CatalogError> {
        debug!(%url, "catalog lookup");
        let response = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("GET {url}: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| CatalogError::Unavailable(format!("GET {url}: bad body: {e}"))),
            status => Err(CatalogError::Unavailable(format!("GET {url}: HTTP {status}"))),
        }
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn study_program(&self, id: i64) -> Result<Option<StudyProgram>, CatalogError> {
        if let Some(hit) = self.programs.get(&id).await {
            debug!(program_id = id, "study program served from cache");
            return Ok(Some(hit));
        }
        let url = self.endpoint(&["api", "v1", "study-programs", &id.to_string()]);
        let program: Option<StudyProgram> = self.fetch(url).await?;
        if let Some(program) = &program {
            self.programs.insert(id, program.clone()).await;
        }
        Ok(program)
    }

    async fn module(&self, course_id: &str) -> Result<Option<ModuleInfo>, CatalogError> {
        let key = course_id.to_owned();
        if let Some(hit) = self.modules.get(&key).await {
            debug!(course_id, "module served from cache");
            return Ok(Some(hit));
        }
        let url = self.endpoint(&["api", "v1", "modules", "module", course_id]);
        let module: Option<ModuleInfo> = self.fetch(url).await?;
        if let Some(module) = &module {
            self.modules.insert(key, module.clone()).await;
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_segments() {
        let client = HttpCatalogClient::new(&CatalogConfig::new("http://catalog:8080/")).unwrap();
        assert_eq!(
            client.endpoint(&["api", "v1", "modules", "module", "IN 2003"]).as_str(),
            "http://catalog:8080/api/v1/modules/module/IN%202003"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client =
            HttpCatalogClient::new(&CatalogConfig::new("http://gateway/catalog")).unwrap();
        assert_eq!(
            client.endpoint(&["api", "v1", "study-programs", "3"]).as_str(),
            "http://gateway/catalog/api/v1/study-programs/3"
        );
    }

    #[test]
    fn rejects_unusable_url() {
        assert!(HttpCatalogClient::new(&CatalogConfig::new("not a url")).is_err());
        assert!(HttpCatalogClient::new(&CatalogConfig::new("mailto:x@y")).is_err());
    }

    #[tokio::test]
    async fn cache_expires() {
        let cache = TtlCache::new(Duration::from_millis(20), 10);
        cache.insert(1, "a").await;
        assert_eq!(cache.get(&1).await, Some("a"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get(&1).await, None);
    }

    #[tokio::test]
    async fn cache_capacity_bounded() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(1, 1).await;
        cache.insert(2, 2).await;
        cache.insert(3, 3).await;
        assert!(cache.entries.read().await.len() <= 2);
        assert_eq!(cache.get(&3).await, Some(3));
    }
}
