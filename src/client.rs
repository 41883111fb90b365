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

//! Percolate requests and the elasticsearch client sending them

use std::sync::atomic::{AtomicUsize, Ordering};

use elasticsearch::http::headers::HeaderMap;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::Method;
use elasticsearch::Elasticsearch;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use url::Url;

use crate::errors::{Error, Result};
use crate::transport::TransportOptions;

/// Characters escaped in a path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The document to percolate
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// an existing document, stored under the given id
    Stored(String),
    /// the given document
    Inline(OwnedValue),
}

/// A single percolate request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// percolate index
    pub index: String,
    /// percolate type
    pub doc_type: String,
    /// what to percolate
    pub document: Document,
    /// only count the matches
    pub count: bool,
}

impl Request {
    /// API path, e.g. `/my_index/my_type/42/_percolate`
    ///
    /// # Errors
    /// if a segment is `.` or `..`, urls resolve those in any encoding
    pub fn path(&self) -> Result<String> {
        let mut path = format!("/{}/{}", encode(&self.index)?, encode(&self.doc_type)?);
        if let Document::Stored(id) = &self.document {
            path.push('/');
            path.push_str(&encode(id)?);
        }
        path.push_str("/_percolate");
        if self.count {
            path.push_str("/count");
        }
        Ok(path)
    }

    /// HTTP method, stored documents are percolated without a body
    #[must_use]
    pub fn method(&self) -> Method {
        match self.document {
            Document::Stored(_) => Method::Get,
            Document::Inline(_) => Method::Post,
        }
    }
}

/// Encodes one path segment. Dot segments are rejected, the path is joined
/// onto the node url which would resolve them even when percent-encoded.
fn encode(segment: &str) -> Result<String> {
    if segment == "." || segment == ".." {
        return Err(Error::InvalidSegment(segment.to_string()));
    }
    Ok(utf8_percent_encode(segment, SEGMENT).to_string())
}

/// Body of an inline percolate request
#[derive(Serialize)]
struct InlineBody<'doc> {
    doc: &'doc OwnedValue,
}

#[derive(Deserialize)]
struct Matches {
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct Count {
    total: u64,
}

/// Result of a successful percolate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// ids of the matching queries, in response order
    Matches(Vec<String>),
    /// number of matching queries
    Count(u64),
}

/// Something that can percolate documents
#[async_trait::async_trait]
pub trait Percolator: Send + Sync {
    /// Sends one percolate request
    ///
    /// # Errors
    /// on transport errors, error responses or malformed responses
    async fn percolate(&self, request: &Request) -> Result<Response>;
}

#[derive(Clone, Debug)]
struct Node {
    client: Elasticsearch,
    url: Url,
}

/// Elasticsearch client, round robin over all configured nodes
#[derive(Debug)]
pub struct ElasticClient {
    nodes: Vec<Node>,
    idx: AtomicUsize,
}

impl ElasticClient {
    /// Creates a client with one connection per node
    ///
    /// # Errors
    /// if a transport can't be built
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let nodes = options
            .build()?
            .into_iter()
            .map(|(url, transport)| Node {
                client: Elasticsearch::new(transport),
                url,
            })
            .collect();
        Ok(Self {
            nodes,
            idx: AtomicUsize::new(0),
        })
    }

    /// return the next node to talk to.
    ///
    /// Cloning the client should be cheap
    fn next(&self) -> Option<Node> {
        if self.nodes.is_empty() {
            return None;
        }
        let idx = self.idx.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        self.nodes.get(idx).cloned()
    }
}

#[async_trait::async_trait]
impl Percolator for ElasticClient {
    async fn percolate(&self, request: &Request) -> Result<Response> {
        let node = self.next().ok_or(Error::NoNodes)?;
        let path = request.path()?;
        debug!("Percolating {:?} {} via {}", request.method(), path, node.url);
        let response = match &request.document {
            Document::Stored(_) => {
                node.client
                    .send(
                        Method::Get,
                        &path,
                        HeaderMap::new(),
                        Option::<&()>::None,
                        Option::<JsonBody<()>>::None,
                        None,
                    )
                    .await?
            }
            Document::Inline(doc) => {
                node.client
                    .send(
                        Method::Post,
                        &path,
                        HeaderMap::new(),
                        Option::<&()>::None,
                        Some(JsonBody::new(InlineBody { doc })),
                        None,
                    )
                    .await?
            }
        };
        let response = response.error_for_status_code()?;
        if request.count {
            let count: Count = response.json().await?;
            Ok(Response::Count(count.total))
        } else {
            let matches: Matches = response.json().await?;
            Ok(Response::Matches(
                matches.matches.into_iter().map(|m| m.id).collect(),
            ))
        }
    }
}
