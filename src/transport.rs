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

//! Transport options handed to the elasticsearch client: node urls, the
//! basic auth header and the TLS trust configuration.

use std::path::{Path, PathBuf};

use elasticsearch::cert::{Certificate, CertificateValidation};
use elasticsearch::http::headers::{HeaderValue, AUTHORIZATION};
use elasticsearch::http::transport::{SingleNodeConnectionPool, Transport, TransportBuilder};
use url::Url;

use crate::config::Settings;
use crate::errors::Result;

/// Options for building one transport per elasticsearch node
#[derive(Debug, Clone)]
pub struct TransportOptions {
    nodes: Vec<Url>,
    authorization: Option<String>,
    ca_file: Option<PathBuf>,
}

impl TransportOptions {
    /// Derives the transport options from validated settings
    ///
    /// # Errors
    /// if a host can't be turned into a node url
    pub fn new(settings: &Settings) -> Result<Self> {
        let nodes = settings
            .hosts
            .iter()
            .map(crate::config::Host::url)
            .collect::<Result<Vec<_>>>()?;
        let authorization = settings
            .credentials
            .as_ref()
            .map(crate::config::Credentials::basic_auth);
        let ca_file = if settings.ssl {
            settings.ca_file.clone()
        } else {
            None
        };
        Ok(Self {
            nodes,
            authorization,
            ca_file,
        })
    }

    /// Node urls, in configuration order
    #[must_use]
    pub fn nodes(&self) -> &[Url] {
        &self.nodes
    }

    /// The `Authorization` header value sent with every request
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// The certificate authority file to trust
    #[must_use]
    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// Builds one transport per node. The CA file is read once and shared.
    ///
    /// # Errors
    /// if the CA file can't be read or parsed, or a transport can't be built
    pub fn build(&self) -> Result<Vec<(Url, Transport)>> {
        let auth_header = self
            .authorization
            .as_deref()
            .map(|value| {
                let mut value = HeaderValue::from_str(value)?;
                value.set_sensitive(true);
                Ok::<_, crate::errors::Error>(value)
            })
            .transpose()?;
        let ca = self
            .ca_file
            .as_deref()
            .map(std::fs::read)
            .transpose()?;

        let mut transports = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let conn_pool = SingleNodeConnectionPool::new(node.clone());
            let mut builder = TransportBuilder::new(conn_pool);
            if let Some(value) = &auth_header {
                builder = builder.header(AUTHORIZATION, value.clone());
            }
            if let Some(pem) = &ca {
                builder = builder.cert_validation(CertificateValidation::Full(
                    Certificate::from_pem(pem)?,
                ));
            }
            transports.push((node.clone(), builder.build()?));
        }
        Ok(transports)
    }
}
