//! Integration tests for the search API client against a mock index.

mod support;
use support::index::{FileRecord, SEARCH_PATH, mount_index, search_api};
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

use sproket_core::search::{DATA_NODE_FIELD, SearchError};
use sproket_core::{Criteria, FileIndex, IndexClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn originals(n: usize, base: &str) -> Vec<FileRecord> {
    (0..n)
        .map(|i| FileRecord::original(&format!("f{i:03}.nc"), "a.org", base))
        .collect()
}

#[tokio::test]
async fn test_paging_reports_exact_remaining() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_index(&server, originals(130, "http://data.invalid")).await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let criteria = Criteria::from_fields([("project", "X")]).canonical();

    let mut seen = Vec::new();
    for (offset, expected_docs, expected_remaining) in [(0, 50, 80), (50, 50, 30), (100, 30, 0)] {
        let page = index.search_page(&criteria, offset, 50).await.unwrap();
        assert_eq!(page.docs.len(), expected_docs, "offset {offset}");
        assert_eq!(page.remaining, expected_remaining, "offset {offset}");
        seen.extend(page.docs.into_iter().map(|d| d.instance_id));
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 130);
}

#[tokio::test]
async fn test_count_call_requests_no_documents() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("limit", "0"))
        .and(query_param("type", "File"))
        .and(query_param("format", "application/solr+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": {"numFound": 42, "docs": [{"instance_id": "stray.nc"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let page = index.search_page(&Criteria::new(), 0, 0).await.unwrap();
    assert!(page.docs.is_empty(), "count calls never return docs");
    assert_eq!(page.remaining, 42);
}

#[tokio::test]
async fn test_query_param_carries_built_query() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("query", "NOT member_id:(r1i1p1f1) AND variable_id:(tas)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": {"numFound": 0, "docs": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let criteria = Criteria::from_fields([("variable_id", "tas"), ("-member_id", "r1i1p1f1")]);
    let page = index.search_page(&criteria, 0, 10).await.unwrap();
    assert_eq!(page.remaining, 0);
}

#[tokio::test]
async fn test_docs_expose_http_url_and_checksum() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    let record = FileRecord::original("tas.nc", "a.org", "http://data.invalid")
        .with_body_checksum(b"hello world");
    mount_index(&server, vec![record]).await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let page = index
        .search_page(&Criteria::new().with_replica(false), 0, 10)
        .await
        .unwrap();
    let doc = &page.docs[0];
    assert_eq!(doc.http_url.as_deref(), Some("http://data.invalid/a.org/tas.nc"));
    assert_eq!(doc.data_node, "a.org");
    let checksum = doc.checksum.as_ref().unwrap();
    assert_eq!(checksum.algorithm, "SHA256");
    assert_eq!(checksum.value.len(), 64);
}

#[tokio::test]
async fn test_facet_pairs_data_node_counts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    let base = "http://data.invalid";
    mount_index(
        &server,
        vec![
            FileRecord::replica("f1.nc", "b.org", base),
            FileRecord::replica("f2.nc", "b.org", base),
            FileRecord::replica("f1.nc", "c.org", base),
            FileRecord::original("f1.nc", "a.org", base),
        ],
    )
    .await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let counts = index
        .facet(&Criteria::new().with_replica(true), DATA_NODE_FIELD)
        .await
        .unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["b.org"], 2);
    assert_eq!(counts["c.org"], 1);
}

#[tokio::test]
async fn test_error_status_is_search_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let result = index.search_page(&Criteria::new(), 0, 10).await;
    assert!(matches!(result, Err(SearchError::HttpStatus { status: 503, .. })));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let result = index.search_page(&Criteria::new(), 0, 10).await;
    assert!(matches!(result, Err(SearchError::MalformedResponse { .. })));
}

#[tokio::test]
async fn test_field_keys_sorted_without_internal_names() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("fields", "*"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": {"numFound": 9, "docs": [{
                "variable_id": ["tas"], "_version_": 1, "data_node": "a.org", "checksum": ["x"]
            }]}
        })))
        .mount(&server)
        .await;

    let index = IndexClient::new(&search_api(&server)).unwrap();
    let keys = index.field_keys(&Criteria::new()).await.unwrap();
    assert_eq!(keys, vec!["checksum", "data_node", "variable_id"]);
}
