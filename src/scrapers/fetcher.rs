use std::time::Duration;

use reqwest::{redirect, Client, Method, RequestBuilder, StatusCode};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            timeout: Duration::from_secs(30),
            follow_redirects: true,
        }
    }
}

impl FetcherConfig {
    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// Thin wrapper around a configured HTTP client. Responses are drained into
/// owned [`FetchedPage`] values so callers never hold a live connection while
/// parsing.
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: Client,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: StatusCode,
    headers: Vec<(String, String)>,
    pub body: String,
}

impl FetchedPage {
    /// First header value with the given name, if any.
    pub fn header<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.headers_named(name).next()
    }

    /// All header values with the given name. Headers such as `Set-Cookie`
    /// legitimately repeat.
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn require_success(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(Error::Fetch(format!(
                "{} returned status {}",
                self.url, self.status
            )))
        }
    }
}

impl DocumentFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout);
        if !config.follow_redirects {
            builder = builder.redirect(redirect::Policy::none());
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.execute(self.client.get(url)).await
    }

    /// Builder entry point for requests that need extra headers, form bodies
    /// or a method other than GET.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub async fn execute(&self, builder: RequestBuilder) -> Result<FetchedPage> {
        let request = builder.build()?;
        let url = request.url().to_string();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| Error::Fetch(format!("request to {} failed: {}", url, e)))?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("reading body from {} failed: {}", url, e)))?;
        Ok(FetchedPage {
            url,
            status,
            headers,
            body,
        })
    }
}
