use std::fmt;
use std::time::{Duration, Instant};

use log::warn;
use reqwest::{Client, header, redirect};
use tokio::time::timeout;
use url::Url;

use crate::error::Error;

/// Redirect hops followed within one attempt before giving up.
const MAX_REDIRECTS: usize = 10;

/// Outcome of one GET attempt that got an HTTP response, redirects already
/// followed. Any status code counts, a 500 lands here too.
#[derive(Debug, Clone)]
pub struct ProbeSuccess {
    pub status: u16,
    pub final_url: String,
    /// Intermediate URLs that answered with a redirect, in traversal order.
    pub redirect_chain: Vec<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connect,
    Dns,
    Tls,
    TooManyRedirects,
    Request,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connect => "connection error",
            FailureKind::Dns => "dns error",
            FailureKind::Tls => "tls error",
            FailureKind::TooManyRedirects => "too many redirects",
            FailureKind::Request => "request error",
        };
        f.write_str(text)
    }
}

/// Outcome of one GET attempt that never produced an HTTP response.
#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
    pub elapsed: Duration,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Transport seam for the target checker, so tests can script attempt
/// outcomes without a network.
#[allow(async_fn_in_trait)]
pub trait Probe {
    async fn probe(&self, url: &str) -> Result<ProbeSuccess, ProbeFailure>;
}

pub struct Prober {
    client: Client,
    timeout: Duration,
}

impl Prober {
    /// Builds a prober whose timeout bounds each whole attempt, redirect
    /// hops included. Redirect following is manual so the chain can be
    /// recorded hop by hop.
    pub fn new(timeout_secs: u64) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    async fn follow_redirects(
        &self,
        url: &str,
    ) -> Result<(u16, String, Vec<String>), (FailureKind, String)> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = url.to_string();
        let mut hops = 0;

        loop {
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|e| classify(&e))?;

            let status = response.status().as_u16();
            if !matches!(status, 301 | 302 | 303 | 307 | 308) {
                return Ok((status, response.url().to_string(), chain));
            }

            let Some(location) = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
            else {
                // Redirect status without a Location header, nothing to chase
                warn!("Redirect status {status} from {current} without a Location header");
                return Ok((status, response.url().to_string(), chain));
            };

            if hops == MAX_REDIRECTS {
                return Err((
                    FailureKind::TooManyRedirects,
                    format!("stopped after {MAX_REDIRECTS} redirects"),
                ));
            }

            // Location may be absolute or relative to the current URL
            let next = match Url::parse(location) {
                Ok(next) => next,
                Err(_) => Url::parse(&current)
                    .and_then(|base| base.join(location))
                    .map_err(|e| {
                        (
                            FailureKind::Request,
                            format!("invalid Location header {location:?}: {e}"),
                        )
                    })?,
            };

            chain.push(current);
            current = next.to_string();
            hops += 1;
        }
    }
}

impl Probe for Prober {
    async fn probe(&self, url: &str) -> Result<ProbeSuccess, ProbeFailure> {
        let start = Instant::now();
        let outcome = timeout(self.timeout, self.follow_redirects(url)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok((status, final_url, redirect_chain))) => Ok(ProbeSuccess {
                status,
                final_url,
                redirect_chain,
                elapsed,
            }),
            Ok(Err((kind, message))) => Err(ProbeFailure {
                kind,
                message,
                elapsed,
            }),
            Err(_) => Err(ProbeFailure {
                kind: FailureKind::Timeout,
                message: format!("no response within {} seconds", self.timeout.as_secs()),
                elapsed,
            }),
        }
    }
}

/// Maps a reqwest error to a failure kind and a readable message.
fn classify(error: &reqwest::Error) -> (FailureKind, String) {
    if error.is_timeout() {
        return (FailureKind::Timeout, "request timed out".to_string());
    }
    if error.is_connect() {
        return (FailureKind::Connect, cause_text(error));
    }

    let text = cause_text(error);
    let lowered = text.to_lowercase();
    if lowered.contains("dns") {
        (FailureKind::Dns, text)
    } else if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl")
    {
        (FailureKind::Tls, text)
    } else {
        (FailureKind::Request, text)
    }
}

/// Innermost cause text; reqwest's own Display is just "error sending request".
fn cause_text(error: &reqwest::Error) -> String {
    let mut cause: &dyn std::error::Error = error;
    while let Some(source) = cause.source() {
        cause = source;
    }
    cause.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        let port = listener.local_addr().expect("Failed to read addr").port();
        drop(listener);
        format!("http://127.0.0.1:{port}/")
    }

    #[tokio::test]
    async fn test_plain_200_has_empty_chain() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;

        let prober = Prober::new(5).expect("Failed to build prober");
        let result = prober
            .probe(&format!("{}/health", server.url()))
            .await
            .expect("Expected a response");

        assert_eq!(result.status, 200);
        assert!(result.redirect_chain.is_empty());
        assert!(result.final_url.ends_with("/health"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_redirect_chain_is_recorded_in_order() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/a")
            .with_status(302)
            .with_header("Location", "/b")
            .create_async()
            .await;
        let second = server
            .mock("GET", "/b")
            .with_status(301)
            .with_header("Location", "/c")
            .create_async()
            .await;
        let landing = server
            .mock("GET", "/c")
            .with_status(200)
            .create_async()
            .await;

        let prober = Prober::new(5).expect("Failed to build prober");
        let start_url = format!("{}/a", server.url());
        let result = prober.probe(&start_url).await.expect("Expected a response");

        assert_eq!(result.status, 200);
        assert_eq!(
            result.redirect_chain,
            vec![start_url, format!("{}/b", server.url())]
        );
        assert_eq!(result.final_url, format!("{}/c", server.url()));
        first.assert_async().await;
        second.assert_async().await;
        landing.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_a_transport_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;

        let prober = Prober::new(5).expect("Failed to build prober");
        let result = prober
            .probe(&format!("{}/broken", server.url()))
            .await
            .expect("A 500 response is still a response");

        assert_eq!(result.status, 500);
        assert!(result.redirect_chain.is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_failure() {
        let prober = Prober::new(5).expect("Failed to build prober");
        let failure = prober
            .probe(&refused_url())
            .await
            .expect_err("Expected a transport failure");

        assert_eq!(failure.kind, FailureKind::Connect);
        assert!(!failure.message.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_loop_gives_up() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/loop")
            .with_status(302)
            .with_header("Location", "/loop")
            .expect_at_least(1)
            .create_async()
            .await;

        let prober = Prober::new(5).expect("Failed to build prober");
        let failure = prober
            .probe(&format!("{}/loop", server.url()))
            .await
            .expect_err("Expected the redirect limit to trip");

        assert_eq!(failure.kind, FailureKind::TooManyRedirects);
    }
}
