use super::{Credentials, Http};
use crate::client::RemoteClient;
use crate::error::{BenchError, Result};
use crate::payload::RandomPayload;
use crate::transaction::TransactionState;
use crate::types::RepositoryVersion;
use reqwest::blocking::Body;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;

const FOXML: &str = "info:fedora/fedora-system:FOXML-1.1";

/// Client for the Fedora 3 REST API. Fedora 3 has no transactions and no
/// linked-data API, so only object and datastream calls are available.
#[derive(Debug, Clone)]
pub struct Fedora3Client {
    http: Http,
}

impl Fedora3Client {
    pub fn new(base: &str, credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            http: Http::new(base, credentials)?,
        })
    }

    fn object(&self, pid: &str) -> String {
        format!("{}/objects/bt:{}", self.http.base(), pid)
    }

    fn datastream(&self, pid: &str) -> String {
        format!("{}/datastreams/ds1", self.object(pid))
    }

    fn upload(&self, method: Method, pid: &str, size: u64, expected: u16) -> Result<u64> {
        let url = format!("{}?versionable=true&controlGroup=M", self.datastream(pid));
        let rb = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::sized(RandomPayload::new(size), size));
        let verb = if method == Method::POST { "create" } else { "update" };
        self.http
            .timed(&format!("{verb} datastream of {pid}"), rb, &[expected])
    }
}

fn unsupported(what: &str) -> BenchError {
    BenchError::ConfigurationUnsupported(format!("{what} requires Fedora 4"))
}

impl RemoteClient for Fedora3Client {
    fn version(&self) -> RepositoryVersion {
        RepositoryVersion::Fcrepo3
    }

    fn create_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        if tx.is_some() {
            return Err(unsupported("transactions"));
        }
        let url = format!("{}?format={}&label={}", self.object(pid), FOXML, pid);
        let rb = self.http.request(Method::POST, &url);
        self.http.timed(&format!("create object {pid}"), rb, &[201])
    }

    fn delete_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        if tx.is_some() {
            return Err(unsupported("transactions"));
        }
        let rb = self.http.request(Method::DELETE, &self.object(pid));
        self.http.timed(&format!("delete object {pid}"), rb, &[200])
    }

    fn create_payload(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64> {
        if tx.is_some() {
            return Err(unsupported("transactions"));
        }
        self.upload(Method::POST, pid, size, 201)
    }

    fn read_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        if tx.is_some() {
            return Err(unsupported("transactions"));
        }
        let url = format!("{}/content", self.datastream(pid));
        let rb = self.http.request(Method::GET, &url);
        self.http
            .timed_read(&format!("retrieve datastream of {pid}"), rb, &[200])
    }

    fn update_payload(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64> {
        if tx.is_some() {
            return Err(unsupported("transactions"));
        }
        self.upload(Method::PUT, pid, size, 200)
    }

    fn delete_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        if tx.is_some() {
            return Err(unsupported("transactions"));
        }
        let rb = self.http.request(Method::DELETE, &self.datastream(pid));
        self.http
            .timed(&format!("delete datastream of {pid}"), rb, &[200])
    }

    fn create_property(&self, _: &str, _: u64, _: Option<&TransactionState>) -> Result<u64> {
        Err(unsupported("properties"))
    }

    fn read_property(&self, _: &str, _: Option<&TransactionState>) -> Result<u64> {
        Err(unsupported("properties"))
    }

    fn update_property(&self, _: &str, _: u64, _: Option<&TransactionState>) -> Result<u64> {
        Err(unsupported("properties"))
    }

    fn delete_property(&self, _: &str, _: Option<&TransactionState>) -> Result<u64> {
        Err(unsupported("properties"))
    }

    fn sparql_insert(&self, _: &str, _: Option<&TransactionState>) -> Result<u64> {
        Err(unsupported("SPARQL"))
    }

    fn sparql_select(&self, _: &str, _: Option<&TransactionState>) -> Result<u64> {
        Err(unsupported("SPARQL"))
    }

    fn create_transaction(&self, _: &TransactionState) -> Result<u64> {
        Err(unsupported("transactions"))
    }

    fn commit_transaction(&self, _: &TransactionState) -> Result<u64> {
        Err(unsupported("transactions"))
    }

    fn rollback_transaction(&self, _: &TransactionState) -> Result<u64> {
        Err(unsupported("transactions"))
    }

    fn cluster_size(&self) -> Result<u32> {
        Ok(1)
    }
}
