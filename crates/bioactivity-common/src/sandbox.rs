use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ReportError, Result};

/// Longest sleep between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Transport knobs for [`SandboxClient`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    /// Extra attempts after the first one for 429 / 5xx / transport failures.
    pub max_retries: u32,
    pub backoff_base: f64,
    pub user_agent: String,
    pub extra_allowed_hosts: Vec<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            backoff_base: 1.6,
            user_agent: format!("bioactivity-report/{}", env!("CARGO_PKG_VERSION")),
            extra_allowed_hosts: Vec::new(),
        }
    }
}

/// An HTTP client that only talks to approved hosts.
///
/// Every public bioactivity source the report uses is listed up front; anything
/// else has to be added explicitly with [`SandboxClient::allow_domain`] or through
/// `HttpSettings::extra_allowed_hosts`.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
    max_retries: u32,
    backoff_base: f64,
}

impl SandboxClient {
    /// Creates a client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_settings(&HttpSettings::default())
    }

    pub fn with_settings(settings: &HttpSettings) -> Result<Self> {
        let mut allowlist = HashSet::new();
        let domains = [
            "www.ebi.ac.uk",            // ChEMBL
            "pubchem.ncbi.nlm.nih.gov", // PubChem PUG REST
            "localhost",
            "127.0.0.1",
        ];
        for d in domains {
            allowlist.insert(d.to_string());
        }
        for d in &settings.extra_allowed_hosts {
            allowlist.insert(d.trim().to_string());
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain;q=0.5"),
        );
        let agent = HeaderValue::from_str(&settings.user_agent)
            .map_err(|e| ReportError::Config(format!("Invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, agent);

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            allowlist,
            max_retries: settings.max_retries,
            backoff_base: settings.backoff_base,
        })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current allowlist.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Builds a GET request for an allowed URL.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        if !self.is_allowed(url) {
            return Err(ReportError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }

    /// GET and decode a JSON body. A 404 comes back as `Ok(None)`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        match self.send_with_retry(url, query).await? {
            Some(resp) => Ok(Some(resp.json::<T>().await?)),
            None => Ok(None),
        }
    }

    /// GET a plain-text body. A 404 comes back as `Ok(None)`.
    pub async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<String>> {
        match self.send_with_retry(url, query).await? {
            Some(resp) => Ok(Some(resp.text().await?)),
            None => Ok(None),
        }
    }

    async fn send_with_retry(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<Response>> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.get(url)?.query(query).send().await;
            match outcome {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    debug!(url = url, "Remote returned 404");
                    return Ok(None);
                }
                Ok(resp) if resp.status().is_success() => return Ok(Some(resp)),
                Ok(resp) if is_retryable(resp.status()) && attempt < self.max_retries => {
                    warn!(url = url, status = %resp.status(), attempt, "Retrying request");
                }
                Ok(resp) => {
                    return Err(ReportError::Gateway(format!(
                        "HTTP {} from {}",
                        resp.status(),
                        url
                    )));
                }
                Err(e) if attempt < self.max_retries => {
                    warn!(url = url, error = %e, attempt, "Request failed, retrying");
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    /// `backoff_base^attempt` seconds, capped at [`MAX_BACKOFF`]. Non-finite
    /// or out-of-range delays also land on the cap.
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.backoff_base.powi(exponent))
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist_accepts_known_hosts() {
        let client = SandboxClient::new().unwrap();
        assert!(client.is_allowed("https://www.ebi.ac.uk/chembl/api/data/molecule.json"));
        assert!(client.is_allowed("https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/name/aspirin/cids/JSON"));
        assert!(client.is_allowed("http://127.0.0.1:8080/activity.json"));
    }

    #[test]
    fn test_allowlist_rejects_unknown_hosts() {
        let client = SandboxClient::new().unwrap();
        assert!(!client.is_allowed("https://example.com/"));
        assert!(!client.is_allowed("not a url"));
        let err = client.get("https://example.com/").unwrap_err();
        assert!(matches!(err, ReportError::Security(_)));
    }

    #[test]
    fn test_extra_hosts_and_allow_domain() {
        let settings = HttpSettings {
            extra_allowed_hosts: vec!["mirror.example.org".to_string()],
            ..HttpSettings::default()
        };
        let mut client = SandboxClient::with_settings(&settings).unwrap();
        assert!(client.is_allowed("https://mirror.example.org/chembl"));
        assert!(client.is_allowed("https://eu.mirror.example.org/chembl"));

        assert!(!client.is_allowed("https://other.example.net/"));
        client.allow_domain("other.example.net");
        assert!(client.is_allowed("https://other.example.net/"));
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let client = SandboxClient::new().unwrap();
        assert_eq!(client.backoff(0), Duration::from_secs(1));
        assert!(client.backoff(2) > client.backoff(1));
    }

    #[test]
    fn test_backoff_is_capped() {
        let client = SandboxClient::new().unwrap();
        assert_eq!(client.backoff(99), MAX_BACKOFF);
        assert_eq!(client.backoff(u32::MAX), MAX_BACKOFF);

        for base in [f64::NAN, f64::INFINITY, -2.0] {
            let settings = HttpSettings {
                backoff_base: base,
                ..HttpSettings::default()
            };
            let client = SandboxClient::with_settings(&settings).unwrap();
            assert!(client.backoff(3) <= MAX_BACKOFF);
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::OK));
    }
}
