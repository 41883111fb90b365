// Copyright 2020-2024, The Tremor Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runs the filter against a fake elasticsearch node speaking just enough
//! HTTP/1.1 to answer percolate requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use simd_json::{json, OwnedValue};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tremor_percolate::{Config, Event, PercolateFilter, Percolation, Result};
use value_trait::prelude::*;

/// A request as seen by the fake node
#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Recorded {
    fn body_json(&self) -> OwnedValue {
        let mut body = self.body.clone();
        simd_json::to_owned_value(&mut body).expect("request body is JSON")
    }
}

struct FakeNode {
    port: u16,
    requests: Arc<Mutex<Vec<Recorded>>>,
    handle: JoinHandle<()>,
}

impl FakeNode {
    /// Answers every request with the given status and JSON body
    async fn start(status: u16, response: &'static str) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let mut stream = BufReader::new(stream);
                    if let Ok(request) = read_request(&mut stream).await {
                        recorded.lock().expect("poisoned").push(request);
                        let reply = format!(
                            "HTTP/1.1 {status} Fake\r\ncontent-type: application/json\r\nx-elastic-product: Elasticsearch\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response}",
                            response.len()
                        );
                        let _ = stream.get_mut().write_all(reply.as_bytes()).await;
                        let _ = stream.get_mut().shutdown().await;
                    }
                });
            }
        });
        Ok(Self {
            port,
            requests,
            handle,
        })
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("poisoned").clone()
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read_request<S>(stream: &mut BufReader<S>) -> std::io::Result<Recorded>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    stream.read_line(&mut line).await?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = HashMap::new();
    loop {
        let mut header = String::new();
        stream.read_line(&mut header).await?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    let len = headers
        .get("content-length")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or_default();
    let mut body = vec![0_u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Recorded {
        method,
        path,
        headers,
        body,
    })
}

fn filter(port: u16, extra: &str) -> Result<PercolateFilter> {
    let yaml = format!("hosts: [\"127.0.0.1:{port}\"]\nindex: my_index\ntype: my_type\n{extra}");
    PercolateFilter::register(Config::from_yaml(&yaml)?.validate()?)
}

const TWO_MATCHES: &str = r#"{"took":1,"total":2,"matches":[{"_index":"my_index","_id":"q1"},{"_index":"my_index","_id":"q2"}]}"#;

#[tokio::test]
async fn percolate_by_id() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(200, TWO_MATCHES).await?;
    let filter = filter(node.port, "id: \"%{doc_id}\"\n")?;

    let mut event = Event::new(1, json!({"doc_id": "7", "message": "snot"}))?;
    let outcome = filter.filter(&mut event).await;

    assert!(matches!(outcome, Percolation::Matched(ref ids) if ids == &["q1", "q2"]));
    assert!(event.is_matched());
    assert_eq!(Some(&json!(["q1", "q2"])), event.data().get("matches"));

    let requests = node.requests();
    assert_eq!(1, requests.len());
    assert_eq!("GET", requests[0].method);
    assert_eq!("/my_index/my_type/7/_percolate", requests[0].path);
    Ok(())
}

#[tokio::test]
async fn percolate_whole_event() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(200, TWO_MATCHES).await?;
    let filter = filter(node.port, "result: hits\n")?;

    let mut event = Event::new(1, json!({"message": "snot", "level": "warn"}))?;
    filter.filter(&mut event).await;

    assert_eq!(Some(&json!(["q1", "q2"])), event.data().get("hits"));
    assert_eq!(None, event.data().get("matches"));

    let requests = node.requests();
    assert_eq!("POST", requests[0].method);
    assert_eq!("/my_index/my_type/_percolate", requests[0].path);
    assert_eq!(
        json!({"doc": {"message": "snot", "level": "warn"}}),
        requests[0].body_json()
    );
    Ok(())
}

#[tokio::test]
async fn percolate_target() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(200, TWO_MATCHES).await?;
    let filter = filter(node.port, "target: payload\n")?;

    let mut event = Event::new(1, json!({"payload": {"message": "badger"}, "other": 1}))?;
    filter.filter(&mut event).await;

    let requests = node.requests();
    assert_eq!(
        json!({"doc": {"message": "badger"}}),
        requests[0].body_json()
    );
    Ok(())
}

#[tokio::test]
async fn basic_auth_header() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(200, TWO_MATCHES).await?;
    let filter = filter(node.port, "user: user\npassword: pass\n")?;

    let mut event = Event::new(1, json!({"message": "snot"}))?;
    filter.filter(&mut event).await;

    let requests = node.requests();
    assert_eq!(
        Some(&"Basic dXNlcjpwYXNz".to_string()),
        requests[0].headers.get("authorization")
    );
    Ok(())
}

#[tokio::test]
async fn count_only() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(200, r#"{"took":1,"total":3}"#).await?;
    let filter = filter(node.port, "count: true\n")?;

    let mut event = Event::new(1, json!({"message": "snot"}))?;
    let outcome = filter.filter(&mut event).await;

    assert!(matches!(outcome, Percolation::Counted(3)));
    assert_eq!(Some(&json!(3_u64)), event.data().get("matches"));
    assert_eq!("/my_index/my_type/_percolate/count", node.requests()[0].path);
    Ok(())
}

#[tokio::test]
async fn error_status_leaves_event_untouched() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(404, r#"{"error":"index_not_found_exception","status":404}"#).await?;
    let filter = filter(node.port, "")?;

    let data = json!({"message": "snot"});
    let mut event = Event::new(1, data.clone())?;
    let outcome = filter.filter(&mut event).await;

    assert!(matches!(outcome, Percolation::Failed(_)));
    assert!(!event.is_matched());
    assert_eq!(&data, event.data());
    Ok(())
}

#[tokio::test]
async fn connection_refused_leaves_event_untouched() -> Result<()> {
    let _ = env_logger::try_init();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };
    let filter = filter(port, "")?;

    let data = json!({"message": "snot"});
    let mut event = Event::new(1, data.clone())?;
    let outcome = filter.filter(&mut event).await;

    assert!(matches!(outcome, Percolation::Failed(_)));
    assert!(!event.is_matched());
    assert_eq!(&data, event.data());
    Ok(())
}

#[tokio::test]
async fn dot_dot_id_is_not_sent() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(200, TWO_MATCHES).await?;
    let filter = filter(node.port, "id: \"%{doc_id}\"\n")?;

    let data = json!({"doc_id": "..", "message": "snot"});
    let mut event = Event::new(1, data.clone())?;
    let outcome = filter.filter(&mut event).await;

    assert!(matches!(
        outcome,
        Percolation::Failed(tremor_percolate::Error::InvalidSegment(_))
    ));
    assert_eq!(&data, event.data());
    assert!(node.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn backslash_id_stays_one_segment() -> Result<()> {
    let _ = env_logger::try_init();
    let node = FakeNode::start(200, TWO_MATCHES).await?;
    let filter = filter(node.port, "id: \"%{doc_id}\"\n")?;

    let mut event = Event::new(1, json!({"doc_id": "a\\b"}))?;
    filter.filter(&mut event).await;

    assert_eq!("/my_index/my_type/a%5Cb/_percolate", node.requests()[0].path);
    Ok(())
}
