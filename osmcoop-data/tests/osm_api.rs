//! Integration tests for [`OsmApiSource`] against a local HTTP server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use osmcoop_core::{ElementKind, ElementSource, ElementType, FetchCache, FetchError};
use osmcoop_data::{OsmApiConfig, OsmApiSource};
use rstest::rstest;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Canned response: status code and body.
type Route = (u16, &'static str);

/// Minimal HTTP/1.1 server answering fixed routes and recording request
/// targets.
struct FakeApi {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeApi {
    async fn serve(routes: HashMap<&'static str, Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind local listener");
        let address = listener.local_addr().expect("listener address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.is_err() {
                    continue;
                }
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                let target = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_owned();
                let (status, body) = routes
                    .get(target.as_str())
                    .copied()
                    .unwrap_or((404, "not found"));
                recorded.lock().expect("request log").push(target);
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: text/xml\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = write_half.write_all(response.as_bytes()).await;
                let _ = write_half.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{address}"),
            requests,
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }

    fn source(&self) -> OsmApiSource {
        let config = OsmApiConfig::new(&self.base_url)
            .with_throttle(Duration::from_millis(5))
            .with_timeout(Duration::from_secs(5));
        let source = OsmApiSource::new(config).expect("source builds");
        source.start().expect("queue starts");
        source
    }
}

const NODE_VERSION: &str = r#"<osm version="0.6">
    <node id="5" version="3" lat="51.5" lon="-0.1"><tag k="amenity" v="cafe"/></node>
</osm>"#;

const WAYS: &str = r#"<osm version="0.6">
    <way id="1" version="2"><nd ref="10"/><nd ref="11"/></way>
    <way id="2" version="1"><nd ref="11"/><nd ref="12"/></way>
</osm>"#;

#[rstest]
#[tokio::test]
async fn fetches_a_specific_version() {
    let api = FakeApi::serve(HashMap::from([("/api/0.6/node/5/3", (200, NODE_VERSION))])).await;
    let source = api.source();

    let node = source
        .fetch_version(ElementType::Node, 5, 3)
        .await
        .expect("version fetched");

    assert_eq!(node.id, 5);
    assert_eq!(node.version, Some(3));
    assert_eq!(node.tags.len(), 1);
    assert_eq!(api.requests(), vec!["/api/0.6/node/5/3"]);
}

#[rstest]
#[tokio::test]
async fn fetches_a_batch_of_elements() {
    let api = FakeApi::serve(HashMap::from([("/api/0.6/ways?ways=1,2", (200, WAYS))])).await;
    let source = api.source();

    let ways = source
        .fetch_elements(ElementType::Way, &[1, 2])
        .await
        .expect("batch fetched");

    let ids: Vec<_> = ways.iter().map(|way| way.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(matches!(&ways[0].kind, ElementKind::Way { nodes } if nodes == &vec![10, 11]));
}

#[rstest]
#[tokio::test]
async fn error_status_is_a_remote_fetch_failure() {
    let api = FakeApi::serve(HashMap::new()).await;
    let source = api.source();

    let err = source
        .fetch_elements(ElementType::Node, &[7, 8])
        .await
        .expect_err("unknown route");

    assert_eq!(
        err,
        FetchError::RemoteFetchFailed {
            element_type: ElementType::Node,
            ids: vec![7, 8],
            status: 404,
        }
    );
}

#[rstest]
#[tokio::test]
async fn malformed_body_is_an_invalid_response() {
    let api = FakeApi::serve(HashMap::from([("/api/0.6/relation/3/1", (200, "<html/>"))])).await;
    let source = api.source();

    let err = source
        .fetch_version(ElementType::Relation, 3, 1)
        .await
        .expect_err("not an osm document");

    assert!(matches!(err, FetchError::InvalidResponse { .. }), "got {err:?}");
}

#[rstest]
#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);
    let config = OsmApiConfig::new(format!("http://{address}"))
        .with_throttle(Duration::from_millis(5));
    let source = OsmApiSource::new(config).expect("source builds");
    source.start().expect("queue starts");

    let err = source
        .fetch_elements(ElementType::Node, &[1])
        .await
        .expect_err("nothing listens");

    assert!(matches!(err, FetchError::Network { .. }), "got {err:?}");
}

#[rstest]
#[tokio::test]
async fn cache_avoids_repeat_requests() {
    let api = FakeApi::serve(HashMap::from([("/api/0.6/ways?ways=1,2", (200, WAYS))])).await;
    let cache = FetchCache::new(api.source());

    let first = cache
        .fetch_many(ElementType::Way, &[1, 2], None)
        .await
        .expect("first fetch");
    let second = cache
        .fetch_many(ElementType::Way, &[2, 1], None)
        .await
        .expect("cached fetch");

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(api.requests().len(), 1);
}

#[rstest]
#[tokio::test]
async fn stopped_source_rejects_requests() {
    let api = FakeApi::serve(HashMap::from([("/api/0.6/node/5/3", (200, NODE_VERSION))])).await;
    let source = api.source();
    source.stop();

    let pending = source.fetch_version(ElementType::Node, 5, 3);
    let outcome = tokio::time::timeout(Duration::from_millis(200), pending).await;

    assert!(outcome.is_err(), "permit never granted after stop");
    assert!(api.requests().is_empty());
}
