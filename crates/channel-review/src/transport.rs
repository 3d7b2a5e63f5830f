use crate::config::CrawlerConfig;
use crate::errors::DownloadError;
use reqwest::Url;
use reqwest::blocking::Client;
use std::cell::RefCell;
use std::io::Read;
use std::time::Duration;

/// Blocking byte fetcher. `purpose` is a short phrase such as
/// "fetching package" that ends up in error messages.
pub trait Transport {
    fn fetch(&self, url: &str, purpose: &str) -> Result<Vec<u8>, DownloadError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(&self, url: &str, purpose: &str) -> Result<Vec<u8>, DownloadError> {
        (**self).fetch(url, purpose)
    }
}

/// Source of scoped transports. Whatever a returned transport opened is
/// closed when it is dropped.
pub trait Connector {
    fn connect(&self) -> Box<dyn Transport + '_>;
}

/// Owner of the pooled HTTP connections. Work happens through a
/// [`PoolLease`]; dropping the lease closes every connection it opened, so no
/// keep-alive socket outlives one resolution or download attempt.
pub struct ConnectionPool {
    settings: CrawlerConfig,
    client: RefCell<Option<Client>>,
}

impl ConnectionPool {
    pub fn new(settings: CrawlerConfig) -> Self {
        Self {
            settings,
            client: RefCell::new(None),
        }
    }

    pub fn settings(&self) -> &CrawlerConfig {
        &self.settings
    }

    pub fn lease(&self) -> PoolLease<'_> {
        PoolLease { pool: self }
    }

    pub fn is_idle(&self) -> bool {
        self.client.borrow().is_none()
    }

    fn client(&self, purpose: &str) -> Result<Client, DownloadError> {
        if let Some(client) = self.client.borrow().as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .user_agent(self.settings.user_agent.clone())
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .build()
            .map_err(|e| DownloadError::Client {
                purpose: purpose.to_string(),
                message: e.to_string(),
            })?;
        *self.client.borrow_mut() = Some(client.clone());
        Ok(client)
    }

    fn close_all_connections(&self) {
        if self.client.borrow_mut().take().is_some() {
            tracing::debug!("closed pooled connections");
        }
    }

    /// Same scheme, host and port as the API base, under its path, and no
    /// userinfo. Anything unparseable never gets the token.
    fn wants_token(&self, url: &str) -> bool {
        let (Ok(base), Ok(target)) = (Url::parse(&self.settings.github_api_base), Url::parse(url))
        else {
            return false;
        };
        if !target.username().is_empty() || target.password().is_some() {
            return false;
        }
        if target.scheme() != base.scheme()
            || target.host_str() != base.host_str()
            || target.port_or_known_default() != base.port_or_known_default()
        {
            return false;
        }
        let prefix = base.path().trim_end_matches('/');
        let path = target.path();
        prefix.is_empty() || path == prefix || path.starts_with(&format!("{prefix}/"))
    }
}

pub struct PoolLease<'a> {
    pool: &'a ConnectionPool,
}

impl Transport for PoolLease<'_> {
    fn fetch(&self, url: &str, purpose: &str) -> Result<Vec<u8>, DownloadError> {
        let client = self.pool.client(purpose)?;
        let mut request = client.get(url);
        if self.pool.wants_token(url)
            && let Some(token) = &self.pool.settings.github_token
        {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|e| DownloadError::Network {
            purpose: purpose.to_string(),
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                purpose: purpose.to_string(),
                url: url.to_string(),
            });
        }

        let max_bytes = self.pool.settings.max_download_bytes;
        let mut body = Vec::new();
        response
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| DownloadError::Network {
                purpose: purpose.to_string(),
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if body.len() as u64 > max_bytes {
            return Err(DownloadError::TooLarge {
                purpose: purpose.to_string(),
                url: url.to_string(),
                max_bytes,
            });
        }
        tracing::debug!(url, purpose, bytes = body.len(), "fetched");
        Ok(body)
    }
}

impl Connector for ConnectionPool {
    fn connect(&self) -> Box<dyn Transport + '_> {
        Box::new(self.lease())
    }
}

impl Drop for PoolLease<'_> {
    fn drop(&mut self) {
        self.pool.close_all_connections();
    }
}
