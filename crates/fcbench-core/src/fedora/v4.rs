use super::{Credentials, Http};
use crate::client::RemoteClient;
use crate::error::{BenchError, Result};
use crate::payload::{random_text, RandomPayload};
use crate::transaction::TransactionState;
use crate::types::RepositoryVersion;
use reqwest::blocking::{Body, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::Method;
use tracing::debug;

const PROPERTY: &str = "<http://fcrepo.org/bench#property>";
const TITLE: &str = "<http://purl.org/dc/elements/1.1/title>";
const CLUSTER_SIZE: &str = "repository#clusterSize>";

const SPARQL_UPDATE: &str = "application/sparql-update";
const SPARQL_QUERY: &str = "application/sparql-query";
const N_TRIPLES: &str = "application/n-triples";

/// Client for the Fedora 4 REST API.
#[derive(Debug, Clone)]
pub struct Fedora4Client {
    http: Http,
}

impl Fedora4Client {
    pub fn new(base: &str, credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            http: Http::new(base, credentials)?,
        })
    }

    /// `{base}/rest`, or `{base}/rest/{tx}` inside a transaction.
    fn rest(&self, tx: Option<&TransactionState>) -> String {
        match tx.and_then(TransactionState::transaction_id) {
            Some(id) => format!("{}/rest/{}", self.http.base(), id),
            None => format!("{}/rest", self.http.base()),
        }
    }

    fn object(&self, pid: &str, tx: Option<&TransactionState>) -> String {
        format!("{}/objects/{}", self.rest(tx), pid)
    }

    fn content(&self, pid: &str, tx: Option<&TransactionState>) -> String {
        format!("{}/ds1/fcr:content", self.object(pid, tx))
    }

    fn patch(
        &self,
        operation: &str,
        pid: &str,
        update: String,
        tx: Option<&TransactionState>,
    ) -> Result<u64> {
        let rb = self
            .http
            .request(Method::PATCH, &self.object(pid, tx))
            .header(CONTENT_TYPE, SPARQL_UPDATE)
            .body(update);
        self.http.timed(operation, rb, &[204])
    }

    fn payload_request(
        &self,
        method: Method,
        pid: &str,
        size: u64,
        tx: Option<&TransactionState>,
    ) -> (String, RequestBuilder) {
        let url = self.content(pid, tx);
        let rb = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::sized(RandomPayload::new(size), size));
        (url, rb)
    }

    fn finalize(&self, verb: &str, tx: &TransactionState) -> Result<u64> {
        let id = tx
            .transaction_id()
            .ok_or_else(|| BenchError::TransactionAborted(tx.label()))?;
        let url = format!("{}/rest/{}/fcr:tx/fcr:{}", self.http.base(), id, verb);
        let rb = self.http.request(Method::POST, &url);
        self.http.timed(&format!("{verb} transaction {id}"), rb, &[204])
    }
}

impl RemoteClient for Fedora4Client {
    fn version(&self) -> RepositoryVersion {
        RepositoryVersion::Fcrepo4
    }

    fn create_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let rb = self.http.request(Method::POST, &self.object(pid, tx));
        self.http.timed(&format!("create object {pid}"), rb, &[201])
    }

    fn delete_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let rb = self.http.request(Method::DELETE, &self.object(pid, tx));
        self.http.timed(&format!("delete object {pid}"), rb, &[200, 204])
    }

    fn create_payload(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64> {
        let (url, rb) = self.payload_request(Method::POST, pid, size, tx);
        self.http.timed(&format!("create datastream at {url}"), rb, &[201])
    }

    fn read_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let url = self.content(pid, tx);
        let rb = self.http.request(Method::GET, &url);
        self.http
            .timed_read(&format!("retrieve datastream from {url}"), rb, &[200])
    }

    fn update_payload(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64> {
        let (url, rb) = self.payload_request(Method::PUT, pid, size, tx);
        self.http.timed(&format!("update datastream at {url}"), rb, &[204])
    }

    fn delete_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let url = format!("{}/ds1", self.object(pid, tx));
        let rb = self.http.request(Method::DELETE, &url);
        self.http
            .timed(&format!("delete datastream from {url}"), rb, &[204])
    }

    fn create_property(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64> {
        let update = format!(
            "INSERT DATA {{ <> {PROPERTY} \"{}\" . }}",
            random_text(size)
        );
        self.patch(&format!("create property on {pid}"), pid, update, tx)
    }

    fn read_property(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let rb = self
            .http
            .request(Method::GET, &self.object(pid, tx))
            .header(ACCEPT, N_TRIPLES);
        self.http
            .timed_read(&format!("read properties of {pid}"), rb, &[200])
    }

    fn update_property(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64> {
        let update = format!(
            "DELETE {{ <> {PROPERTY} ?o }} INSERT {{ <> {PROPERTY} \"{}\" }} WHERE {{ <> {PROPERTY} ?o }}",
            random_text(size)
        );
        self.patch(&format!("update property on {pid}"), pid, update, tx)
    }

    fn delete_property(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let update = format!("DELETE WHERE {{ <> {PROPERTY} ?o }}");
        self.patch(&format!("delete property on {pid}"), pid, update, tx)
    }

    fn sparql_insert(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let update = format!("INSERT DATA {{ <> {TITLE} \"{pid}\" . }}");
        self.patch(&format!("insert triples on {pid}"), pid, update, tx)
    }

    fn sparql_select(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        let query = format!("SELECT ?s WHERE {{ ?s {TITLE} \"{pid}\" }}");
        let rb = self
            .http
            .request(Method::POST, &format!("{}/fcr:sparql", self.rest(tx)))
            .header(CONTENT_TYPE, SPARQL_QUERY)
            .body(query);
        self.http
            .timed_read(&format!("select triples of {pid}"), rb, &[200])
    }

    fn create_transaction(&self, tx: &TransactionState) -> Result<u64> {
        let url = format!("{}/rest/fcr:tx", self.http.base());
        let rb = self.http.request(Method::POST, &url);
        let (resp, ms) = self.http.timed_response("create transaction", rb, &[201])?;
        let id = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        match id {
            Some(id) => {
                debug!("repository opened transaction {id}");
                tx.set_transaction_id(id);
            }
            None => debug!("transaction response carried no usable location header"),
        }
        Ok(ms)
    }

    fn commit_transaction(&self, tx: &TransactionState) -> Result<u64> {
        self.finalize("commit", tx)
    }

    fn rollback_transaction(&self, tx: &TransactionState) -> Result<u64> {
        self.finalize("rollback", tx)
    }

    fn cluster_size(&self) -> Result<u32> {
        let rb = self
            .http
            .request(Method::GET, &self.rest(None))
            .header(ACCEPT, N_TRIPLES);
        let body = self.http.text("fetch repository description", rb, &[200])?;
        Ok(parse_cluster_size(&body))
    }
}

/// Extract the cluster size literal from an N-Triples description.
fn parse_cluster_size(ntriples: &str) -> u32 {
    ntriples
        .lines()
        .filter(|line| line.contains(CLUSTER_SIZE))
        .find_map(|line| {
            let literal = line.split('"').nth(1)?;
            literal.trim().parse().ok()
        })
        .unwrap_or(0)
}
