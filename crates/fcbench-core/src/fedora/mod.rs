//! HTTP clients for Fedora Commons repositories.

mod v3;
mod v4;

pub use v3::Fedora3Client;
pub use v4::Fedora4Client;

use crate::client::{elapsed_ms, RemoteClient};
use crate::error::{BenchError, Result};
use crate::types::RepositoryVersion;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const FCREPO3_MARKERS: &[&str] = &[
    "<meta http-equiv=\"refresh\" content=\"0;url=describe\">",
    "<title>Redirecting...</title>",
    "<a href=\"describe\">Redirecting...</a>",
];

const FCREPO4_MARKERS: &[&str] = &[
    "<title>Fedora Commons Repository 4.0</title>",
    "You probably want to visit something a little more interesting, such as:",
    "the Fedora REST API endpoint",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Http
// ---------------------------------------------------------------------------

/// Blocking HTTP plumbing shared by both repository generations.
#[derive(Debug, Clone)]
pub(crate) struct Http {
    client: Client,
    base: String,
    credentials: Option<Credentials>,
}

impl Http {
    pub(crate) fn new(base: &str, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| BenchError::Transport {
                operation: "build http client".to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let rb = self.client.request(method, url);
        match &self.credentials {
            Some(c) => rb.basic_auth(&c.user, c.password.as_deref()),
            None => rb,
        }
    }

    /// Send `rb` and return the time until the response headers arrived.
    /// The body is drained afterwards so the connection can be reused.
    pub(crate) fn timed(&self, operation: &str, rb: RequestBuilder, expected: &[u16]) -> Result<u64> {
        let start = Instant::now();
        let mut resp = send(operation, rb, expected)?;
        let ms = elapsed_ms(start);
        drain(operation, &mut resp)?;
        Ok(ms)
    }

    /// Like [`Http::timed`], but the measured time includes reading the body.
    pub(crate) fn timed_read(
        &self,
        operation: &str,
        rb: RequestBuilder,
        expected: &[u16],
    ) -> Result<u64> {
        let start = Instant::now();
        let mut resp = send(operation, rb, expected)?;
        drain(operation, &mut resp)?;
        Ok(elapsed_ms(start))
    }

    /// Send `rb` and hand back the response for inspection together with
    /// the time until its headers arrived.
    pub(crate) fn timed_response(
        &self,
        operation: &str,
        rb: RequestBuilder,
        expected: &[u16],
    ) -> Result<(Response, u64)> {
        let start = Instant::now();
        let resp = send(operation, rb, expected)?;
        Ok((resp, elapsed_ms(start)))
    }

    pub(crate) fn text(&self, operation: &str, rb: RequestBuilder, expected: &[u16]) -> Result<String> {
        send(operation, rb, expected)?
            .text()
            .map_err(|source| BenchError::Transport {
                operation: operation.to_string(),
                source,
            })
    }
}

fn send(operation: &str, rb: RequestBuilder, expected: &[u16]) -> Result<Response> {
    let resp = rb.send().map_err(|source| BenchError::Transport {
        operation: operation.to_string(),
        source,
    })?;
    let status = resp.status().as_u16();
    if !expected.contains(&status) {
        return Err(BenchError::OperationFailed {
            operation: operation.to_string(),
            status,
        });
    }
    Ok(resp)
}

fn drain(operation: &str, resp: &mut Response) -> Result<()> {
    resp.copy_to(&mut io::sink())
        .map(|_| ())
        .map_err(|source| BenchError::Transport {
            operation: operation.to_string(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Version detection and construction
// ---------------------------------------------------------------------------

/// Identify the repository generation from the landing page at `base`.
pub fn detect_version(base: &str, credentials: Option<Credentials>) -> Result<RepositoryVersion> {
    let http = Http::new(base, credentials)?;
    let html = http.text(
        "fetch repository landing page",
        http.request(Method::GET, http.base()),
        &[200],
    )?;
    if FCREPO3_MARKERS.iter().all(|m| html.contains(m)) {
        info!("found Fedora 3 at {}", http.base());
        Ok(RepositoryVersion::Fcrepo3)
    } else if FCREPO4_MARKERS.iter().all(|m| html.contains(m)) {
        info!("found Fedora 4 at {}", http.base());
        Ok(RepositoryVersion::Fcrepo4)
    } else {
        Err(BenchError::VersionUndetected(http.base().to_string()))
    }
}

/// Build the client for `base`, detecting the generation unless `version`
/// is given.
pub fn connect(
    base: &str,
    version: Option<RepositoryVersion>,
    credentials: Option<Credentials>,
) -> Result<Arc<dyn RemoteClient>> {
    let version = match version {
        Some(v) => v,
        None => detect_version(base, credentials.clone())?,
    };
    let client: Arc<dyn RemoteClient> = match version {
        RepositoryVersion::Fcrepo3 => Arc::new(Fedora3Client::new(base, credentials)?),
        RepositoryVersion::Fcrepo4 => Arc::new(Fedora4Client::new(base, credentials)?),
    };
    Ok(client)
}
