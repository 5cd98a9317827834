#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Path the mock search API is mounted on.
pub const SEARCH_PATH: &str = "/esg-search/search";

/// One copy of a logical file as the mock index publishes it.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub instance_id: String,
    pub data_node: String,
    pub http_url: String,
    pub checksum: Option<String>,
    pub replica: bool,
}

impl FileRecord {
    /// Original copy served from `<data_base>/<node>/<id>`.
    pub fn original(instance_id: &str, node: &str, data_base: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            data_node: node.to_string(),
            http_url: format!("{data_base}/{node}/{instance_id}"),
            checksum: None,
            replica: false,
        }
    }

    pub fn replica(instance_id: &str, node: &str, data_base: &str) -> Self {
        Self {
            replica: true,
            ..Self::original(instance_id, node, data_base)
        }
    }

    /// Publishes the SHA-256 of `body` as this record's checksum.
    pub fn with_body_checksum(mut self, body: &[u8]) -> Self {
        self.checksum = Some(sha256_hex(body));
        self
    }

    pub fn route(&self) -> String {
        format!("/{}/{}", self.data_node, self.instance_id)
    }

    fn to_json(&self) -> Value {
        let mut doc = json!({
            "instance_id": self.instance_id,
            "data_node": self.data_node,
            "url": [
                format!("{}|application/netcdf|HTTPServer", self.http_url),
                format!("gsiftp://{}/{}|application/gridftp|GridFTP", self.data_node, self.instance_id),
            ],
        });
        if let Some(checksum) = &self.checksum {
            doc["checksum"] = json!([checksum]);
            doc["checksum_type"] = json!(["SHA256"]);
        }
        doc
    }
}

pub fn sha256_hex(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Answers search, count and facet requests from a fixed record set.
///
/// Understands the `replica:(..)` and `data_node:("a" OR "b")` clauses of
/// the query; every other clause matches all records.
pub struct IndexResponder {
    records: Vec<FileRecord>,
}

impl IndexResponder {
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self { records }
    }

    fn matching(&self, query: &str) -> Vec<&FileRecord> {
        let replica = if query.contains("replica:(true)") {
            Some(true)
        } else if query.contains("replica:(false)") {
            Some(false)
        } else {
            None
        };
        let restricts_nodes = query.contains("data_node:(");
        self.records
            .iter()
            .filter(|r| replica.is_none_or(|want| r.replica == want))
            .filter(|r| !restricts_nodes || query.contains(&format!("\"{}\"", r.data_node)))
            .collect()
    }
}

impl Respond for IndexResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let query = params.get("query").cloned().unwrap_or_default();
        let matching = self.matching(&query);

        if let Some(field) = params.get("facets") {
            let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
            for record in &matching {
                *counts.entry(record.data_node.as_str()).or_default() += 1;
            }
            let flat: Vec<Value> = counts
                .into_iter()
                .flat_map(|(node, count)| [json!(node), json!(count)])
                .collect();
            let mut fields = serde_json::Map::new();
            fields.insert(field.clone(), Value::Array(flat));
            return ResponseTemplate::new(200).set_body_json(json!({
                "response": {"numFound": matching.len(), "docs": []},
                "facet_counts": {"facet_fields": fields},
            }));
        }

        let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(10);
        let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let docs: Vec<Value> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| r.to_json())
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "response": {"numFound": matching.len(), "docs": docs},
        }))
    }
}

/// Mounts the search API on `server`.
pub async fn mount_index(server: &MockServer, records: Vec<FileRecord>) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(IndexResponder::new(records))
        .mount(server)
        .await;
}

/// Mounts one data file route per record, each expected `expected_calls` times.
pub async fn mount_files(server: &MockServer, records: &[FileRecord], body: &[u8], expected_calls: u64) {
    for record in records {
        Mock::given(method("GET"))
            .and(path(record.route()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .expect(expected_calls)
            .mount(server)
            .await;
    }
}

pub fn search_api(server: &MockServer) -> String {
    format!("{}{SEARCH_PATH}", server.uri())
}
