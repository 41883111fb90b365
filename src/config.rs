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

//! # Percolate filter configuration
//!
//! ```yaml
//! hosts: ["es-server"]
//! index: my_index
//! type: my_type
//! id: "%{id}"
//! ```
//!
//! `Config` is the raw, deserialized form. [`Config::validate`] turns it into
//! [`Settings`], normalising hosts and parsing templates and field references,
//! or fails with every violation found.

use std::fmt;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use simd_json::OwnedValue;
use url::Url;

use crate::errors::{Error, Result};
use crate::template::{FieldRef, Template};

lazy_static! {
    // ALLOW: we know this regex is valid
    static ref URL_SCHEME_REGEX: Regex =
        Regex::new("^([A-Za-z][A-Za-z0-9+.-]*)://").expect("Invalid Regex");
}

const DEFAULT_RESULT: &str = "matches";

fn default_result() -> String {
    DEFAULT_RESULT.to_string()
}

/// A secret string that is never printed
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// The secret value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Raw percolate filter configuration
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// list of elasticsearch hosts to use for querying
    pub hosts: Vec<String>,
    /// percolate index
    pub index: String,
    /// percolate type
    #[serde(rename = "type")]
    pub doc_type: String,
    /// id of an existing document, if not provided the event itself is percolated
    #[serde(default)]
    pub id: Option<String>,
    /// only count the matching queries
    #[serde(default)]
    pub count: bool,
    /// percolate this sub-field of the event instead of the whole event
    #[serde(default)]
    pub target: Option<String>,
    /// field to store the matches into
    #[serde(default = "default_result")]
    pub result: String,
    /// basic auth username
    #[serde(default)]
    pub user: Option<String>,
    /// basic auth password
    #[serde(default)]
    pub password: Option<Secret>,
    /// connect to all hosts via https
    #[serde(default)]
    pub ssl: bool,
    /// PEM file with the certificate authority to trust, requires `ssl`
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl Config {
    /// Deserializes the config from a structured value
    ///
    /// # Errors
    /// if the value doesn't match the config structure
    pub fn new(config: &OwnedValue) -> Result<Self> {
        Ok(simd_json::serde::from_owned_value(config.clone())?)
    }

    /// Deserializes the config from YAML
    ///
    /// # Errors
    /// if the YAML is invalid or doesn't match the config structure
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validates the config, reporting all violations at once
    ///
    /// # Errors
    /// `Error::InvalidConfig` listing every violation
    pub fn validate(self) -> Result<Settings> {
        let mut violations = Vec::new();

        if self.hosts.is_empty() {
            violations.push("`hosts` must not be empty".to_string());
        }
        let mut hosts = Vec::with_capacity(self.hosts.len());
        for raw in &self.hosts {
            match Host::parse(raw, self.ssl) {
                Ok(host) => hosts.push(host),
                Err(e) => violations.push(e),
            }
        }
        for (name, value) in [("index", &self.index), ("type", &self.doc_type)] {
            if value.is_empty() {
                violations.push(format!("`{name}` must not be empty"));
            } else if value == "." || value == ".." {
                violations.push(format!("`{name}` can't be `{value}`"));
            }
        }

        let id = self
            .id
            .as_deref()
            .and_then(|raw| check("id", Template::parse(raw), &mut violations));
        let target = self
            .target
            .as_deref()
            .and_then(|raw| check("target", FieldRef::parse(raw), &mut violations));
        let result = check("result", FieldRef::parse(&self.result), &mut violations);

        let credentials = match (self.user, self.password) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            (Some(_), None) => {
                violations.push("`user` is set without `password`".to_string());
                None
            }
            (None, Some(_)) => {
                violations.push("`password` is set without `user`".to_string());
                None
            }
            (None, None) => None,
        };

        if let Some(ca_file) = &self.ca_file {
            if !self.ssl {
                violations.push("`ca_file` requires `ssl` to be enabled".to_string());
            } else if !ca_file.exists() {
                violations.push(format!("`ca_file` {} does not exist", ca_file.display()));
            }
        }

        match result {
            Some(result) if violations.is_empty() => Ok(Settings {
                hosts,
                index: self.index,
                doc_type: self.doc_type,
                id,
                count: self.count,
                target,
                result,
                credentials,
                ssl: self.ssl,
                ca_file: self.ca_file,
            }),
            _ => Err(Error::InvalidConfig(violations)),
        }
    }
}

fn check<T>(field: &str, res: Result<T>, violations: &mut Vec<String>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            violations.push(format!("`{field}`: {e}"));
            None
        }
    }
}

/// Basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// username
    pub user: String,
    /// password
    pub password: Secret,
}

impl Credentials {
    /// The `Authorization` header value: `Basic base64(user:password)`
    #[must_use]
    pub fn basic_auth(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.user, self.password.expose()));
        format!("Basic {token}")
    }
}

/// URL scheme used to talk to a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// plain http
    Http,
    /// https
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

/// A normalised elasticsearch host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// `host[:port][/path]`, without scheme
    pub address: String,
    /// the scheme to use
    pub scheme: Scheme,
}

impl Host {
    /// Port used when a host doesn't specify one
    pub const DEFAULT_PORT: u16 = 9200;

    /// Parses a configured host entry. Entries without a scheme get `https` if
    /// `ssl` is set and `http` otherwise.
    ///
    /// # Errors
    /// a description of why the entry is invalid
    pub fn parse(raw: &str, ssl: bool) -> std::result::Result<Self, String> {
        let trimmed = raw.trim();
        let (scheme, address) = if let Some(caps) = URL_SCHEME_REGEX.captures(trimmed) {
            let prefix_len = caps.get(0).map_or(0, |m| m.end());
            let scheme = match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
                Some("http") => Scheme::Http,
                Some("https") => Scheme::Https,
                other => {
                    return Err(format!(
                        "host `{raw}` has unsupported scheme `{}`",
                        other.unwrap_or_default()
                    ))
                }
            };
            if ssl && scheme == Scheme::Http {
                return Err(format!("host `{raw}` uses `http` but `ssl` is enabled"));
            }
            (scheme, &trimmed[prefix_len..])
        } else if ssl {
            (Scheme::Https, trimmed)
        } else {
            (Scheme::Http, trimmed)
        };
        let address = address.trim_end_matches('/');
        if address.is_empty() {
            return Err(format!("host `{raw}` has no address"));
        }
        let host = Self {
            address: address.to_string(),
            scheme,
        };
        host.url()
            .map_err(|e| format!("host `{raw}` is invalid: {e}"))?;
        Ok(host)
    }

    /// The node url for this host, using port 9200 if none was given. The path
    /// always ends with a `/`.
    ///
    /// # Errors
    /// if the address is not a valid url authority
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.to_string())?;
        if !has_explicit_port(&self.address) {
            url.set_port(Some(Self::DEFAULT_PORT))
                .map_err(|()| url::ParseError::InvalidPort)?;
        }
        // api paths are joined relative to the node url
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.address)
    }
}

fn has_explicit_port(address: &str) -> bool {
    let authority = address.split('/').next().unwrap_or(address);
    authority.rsplit_once(':').map_or(false, |(_, port)| {
        !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
    })
}

/// Validated percolate filter settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// normalised hosts
    pub hosts: Vec<Host>,
    /// percolate index
    pub index: String,
    /// percolate type
    pub doc_type: String,
    /// id template of the stored document to percolate
    pub id: Option<Template>,
    /// only count the matching queries
    pub count: bool,
    /// sub-field of the event to percolate
    pub target: Option<FieldRef>,
    /// field to store the result into
    pub result: FieldRef,
    /// basic auth credentials
    pub credentials: Option<Credentials>,
    /// whether hosts are contacted via https
    pub ssl: bool,
    /// certificate authority to trust
    pub ca_file: Option<PathBuf>,
}
