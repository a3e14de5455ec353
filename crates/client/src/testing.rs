//! Scripted [`Fetcher`] for tests.
//!
//! Routes map a URL to a canned outcome; every call is counted per URL so tests
//! can assert which hops happened. Unrouted URLs fail with a network error.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::fetch::{FetchError, Fetcher, IconResponse};

type Outcome = Result<IconResponse, FetchError>;

#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<HashMap<String, Vec<Duration>>>,
}

fn normalize(url: &str) -> String {
    Url::parse(url).map(String::from).unwrap_or_else(|_| url.to_string())
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, builder style.
    pub fn route(self, url: &str, outcome: Outcome) -> Self {
        self.set(url, outcome);
        self
    }

    /// Add or replace a route on a shared fetcher.
    pub fn set(&self, url: &str, outcome: Outcome) {
        self.routes.lock().unwrap().insert(normalize(url), outcome);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(&normalize(url)).map_or(0, Vec::len)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().map(Vec::len).sum()
    }

    /// Timeout passed on the most recent call to `url`.
    pub fn last_timeout(&self, url: &str) -> Option<Duration> {
        self.calls.lock().unwrap().get(&normalize(url)).and_then(|t| t.last().copied())
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<IconResponse, FetchError> {
        self.calls.lock().unwrap().entry(url.to_string()).or_default().push(timeout);

        let outcome = self.routes.lock().unwrap().get(url.as_str()).cloned();
        match outcome {
            Some(Ok(mut response)) => {
                response.final_url = Some(url.clone());
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None => Err(FetchError::Network(format!("no route for {url}"))),
        }
    }
}

/// A response with arbitrary status, headers and body.
pub fn respond(status: u16, headers: &[(&str, &str)], body: &[u8]) -> Outcome {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(HeaderName::from_bytes(name.as_bytes()).unwrap(), HeaderValue::from_str(value).unwrap());
    }
    Ok(IconResponse {
        final_url: None,
        status: StatusCode::from_u16(status).unwrap(),
        headers: map,
        body: Bytes::copy_from_slice(body),
    })
}

pub fn image(content_type: &str, body: &[u8]) -> Outcome {
    respond(200, &[("content-type", content_type)], body)
}

pub fn html(body: &str) -> Outcome {
    respond(200, &[("content-type", "text/html; charset=utf-8")], body.as_bytes())
}

pub fn status(code: u16) -> Outcome {
    respond(code, &[("content-type", "text/plain")], b"")
}

/// A bot-mitigation interstitial.
pub fn challenge() -> Outcome {
    respond(403, &[("content-type", "text/html"), ("cf-mitigated", "challenge"), ("server", "cloudflare")], b"<html>Just a moment...</html>")
}

pub fn network_error() -> Outcome {
    Err(FetchError::Network("connection refused".to_string()))
}

pub fn timeout() -> Outcome {
    Err(FetchError::Timeout(Duration::from_millis(8000)))
}

/// A body over the client's byte cap.
pub fn too_large() -> Outcome {
    Err(FetchError::TooLarge { limit: 5 * 1024 * 1024 })
}
