use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::CitemillError;

/// An allowlist-capped HTTP client: requests are only permitted to
/// approved hosts, so a misconfigured source cannot reach arbitrary
/// domains from inside the pipeline.
#[derive(Debug, Clone)]
pub struct NetClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl NetClient {
    /// Build a client with the default allowlist (the OpenAlex API plus
    /// localhost for test servers), a request timeout, and the given
    /// User-Agent. OpenAlex asks polite clients to identify themselves
    /// with a mailto address in the User-Agent.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, CitemillError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "api.openalex.org", // concept search + works listing
            "localhost",        // test servers
            "127.0.0.1",        // localhost alt
        ];
        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| CitemillError::Ingestion(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current allowlist.
    /// Subdomains of an allowed domain are allowed too.
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

    /// Exposes the inner `reqwest::Client` builder pattern for GET requests.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, CitemillError> {
        if !self.is_allowed(url) {
            return Err(CitemillError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NetClient {
        NetClient::new("citemill-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_openalex_allowed() {
        let c = client();
        assert!(c.is_allowed("https://api.openalex.org/works?cursor=*"));
        assert!(c.is_allowed("http://localhost:8080/works"));
    }

    #[test]
    fn test_unlisted_domain_refused() {
        let c = client();
        assert!(!c.is_allowed("https://example.com/works"));
        assert!(c.get("https://example.com/works").is_err());
    }

    #[test]
    fn test_allow_domain_extends_allowlist() {
        let mut c = client();
        assert!(!c.is_allowed("https://api.example.org/x"));
        c.allow_domain("api.example.org");
        assert!(c.is_allowed("https://api.example.org/x"));
    }
}
