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

//! # Percolate filter
//!
//! Percolates events against queries stored in elasticsearch and writes the
//! ids of the matching queries into the event.
//!
//! ```yaml
//! # percolates the existing document having the id found in the event's `id` field
//! hosts: ["es-server"]
//! index: my_index
//! type: my_type
//! id: "%{id}"
//! ```
//!
//! ```yaml
//! # percolates the sub-structure in the event's `my_field`
//! hosts: ["es-server"]
//! index: my_index
//! type: my_type
//! target: my_field
//! ```
//!
//! Without `id` and `target` the event itself is percolated. Failures are
//! logged and leave the event untouched.

use std::fmt;

use simd_json::OwnedValue;

use crate::client::{Document, ElasticClient, Percolator, Request, Response};
use crate::config::Settings;
use crate::errors::{Error, Result};
use crate::event::Event;
use crate::transport::TransportOptions;

/// Outcome of percolating one event
#[derive(Debug)]
pub enum Percolation {
    /// the ids of the matching stored queries
    Matched(Vec<String>),
    /// the request succeeded but no stored query matched
    NotMatched,
    /// number of matching stored queries, in count mode
    Counted(u64),
    /// the event could not be percolated
    Failed(Error),
}

impl Percolation {
    fn from_response(response: Response) -> Self {
        match response {
            Response::Matches(ids) if ids.is_empty() => Self::NotMatched,
            Response::Matches(ids) => Self::Matched(ids),
            Response::Count(total) => Self::Counted(total),
        }
    }

    /// The value written to the result field, `None` for failures
    fn result_value(&self) -> Option<OwnedValue> {
        match self {
            Self::Matched(ids) => Some(OwnedValue::from(ids.clone())),
            Self::NotMatched => Some(OwnedValue::from(Vec::<OwnedValue>::new())),
            Self::Counted(total) => Some(OwnedValue::from(*total)),
            Self::Failed(_) => None,
        }
    }

    /// true if the percolation succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// The percolate filter
pub struct PercolateFilter<P = ElasticClient> {
    settings: Settings,
    client: P,
}

impl PercolateFilter<ElasticClient> {
    /// Builds the elasticsearch client, once, from validated settings
    ///
    /// # Errors
    /// if the client can't be constructed
    pub fn register(settings: Settings) -> Result<Self> {
        let options = TransportOptions::new(&settings)?;
        let hosts: Vec<&str> = options.nodes().iter().map(url::Url::as_str).collect();
        let client = ElasticClient::new(&options)?;
        let filter = Self { settings, client };
        info!(
            "{} New Elasticsearch percolate hosts: [{}]",
            filter,
            hosts.join(", ")
        );
        Ok(filter)
    }
}

impl<P: Percolator> PercolateFilter<P> {
    /// Creates a filter percolating via the given client
    pub fn with_client(settings: Settings, client: P) -> Self {
        Self { settings, client }
    }

    /// The underlying client
    pub fn client(&self) -> &P {
        &self.client
    }

    /// Builds the percolate request for an event
    ///
    /// # Errors
    /// if the id template references a missing field or the target field is missing
    pub fn request_for(&self, event: &Event) -> Result<Request> {
        let document = if let Some(id) = &self.settings.id {
            Document::Stored(id.render(event.data())?)
        } else if let Some(target) = &self.settings.target {
            let doc = target
                .get(event.data())
                .ok_or_else(|| Error::MissingField(target.to_string()))?;
            Document::Inline(doc.clone())
        } else {
            Document::Inline(event.data().clone())
        };
        Ok(Request {
            index: self.settings.index.clone(),
            doc_type: self.settings.doc_type.clone(),
            document,
            count: self.settings.count,
        })
    }

    async fn percolate(&self, event: &Event) -> Result<Response> {
        let request = self.request_for(event)?;
        self.client.percolate(&request).await
    }

    /// Percolates the event and annotates it with the result.
    ///
    /// On success the result field is set and the event is marked as matched,
    /// on failure a warning is logged and the event is left as it was.
    pub async fn filter(&self, event: &mut Event) -> Percolation {
        let outcome = match self.percolate(event).await {
            Ok(response) => Percolation::from_response(response),
            Err(e) => Percolation::Failed(e),
        };
        let outcome = match outcome.result_value() {
            Some(value) => match self.settings.result.set(event.data_mut(), value) {
                Ok(()) => {
                    event.mark_matched();
                    outcome
                }
                Err(e) => Percolation::Failed(e),
            },
            None => outcome,
        };
        if let Percolation::Failed(e) = &outcome {
            warn!(
                "{} Failed to percolate event {}: id={:?} target={:?} event={} error={}",
                self,
                event.id,
                self.settings.id.as_ref().map(crate::template::Template::as_str),
                self.settings.target.as_ref().map(crate::template::FieldRef::as_str),
                event,
                e
            );
        }
        outcome
    }
}

impl<P> fmt::Display for PercolateFilter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[percolate::{}/{}]",
            self.settings.index, self.settings.doc_type
        )
    }
}
