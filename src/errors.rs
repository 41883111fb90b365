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

use elasticsearch::http::headers::InvalidHeaderValue;
use elasticsearch::http::transport::BuildError;

/// The error type for the percolate filter
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration violates one or more constraints, all of them are listed
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
    /// YAML configuration could not be deserialized
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// JSON configuration or event could not be deserialized
    #[error("Invalid JSON: {0}")]
    Json(#[from] simd_json::Error),
    /// IO error, e.g. reading the CA file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A host could not be turned into a node url
    #[error("Invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// A header value could not be constructed
    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
    /// The elasticsearch transport could not be built
    #[error("Failed to build elasticsearch transport: {0}")]
    Transport(#[from] BuildError),
    /// Elasticsearch request or response error
    #[error("Elasticsearch error: {0}")]
    Elastic(#[from] elasticsearch::Error),
    /// A referenced event field does not exist
    #[error("Missing field `{0}`")]
    MissingField(String),
    /// A value that needs to be an object is not one
    #[error("`{0}` is not an object")]
    NotAnObject(String),
    /// Malformed `%{...}` template or field reference
    #[error("Invalid template `{0}`: {1}")]
    InvalidTemplate(String, &'static str),
    /// A request path segment would be resolved away
    #[error("`{0}` can't be used as a path segment")]
    InvalidSegment(String),
    /// There is no node to send a request to
    #[error("No elasticsearch node available")]
    NoNodes,
}

/// Result for the percolate filter
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_lists_all_violations() {
        let e = Error::InvalidConfig(vec![
            "`hosts` must not be empty".to_string(),
            "`index` must not be empty".to_string(),
        ]);
        assert_eq!(
            "Invalid configuration: `hosts` must not be empty; `index` must not be empty",
            e.to_string()
        );
    }

    #[test]
    fn missing_field() {
        assert_eq!(
            "Missing field `[a][b]`",
            Error::MissingField("[a][b]".to_string()).to_string()
        );
    }
}
