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

use std::fmt;
use std::time::SystemTime;

use simd_json::OwnedValue;
use value_trait::prelude::*;

use crate::errors::{Error, Result};

/// Get a nanosecond timestamp
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn nanotime() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// A single log record flowing through a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The event id
    pub id: u64,
    /// Nanoseconds at which the event was ingested
    pub ingest_ns: u64,
    data: OwnedValue,
    matched: bool,
}

impl Event {
    /// Creates a new event from a payload, the payload has to be an object
    ///
    /// # Errors
    /// if the payload is not an object
    pub fn new(id: u64, data: OwnedValue) -> Result<Self> {
        if data.as_object().is_some() {
            Ok(Self {
                id,
                ingest_ns: nanotime(),
                data,
                matched: false,
            })
        } else {
            Err(Error::NotAnObject(format!("event {id}")))
        }
    }

    /// The event payload
    #[must_use]
    pub fn data(&self) -> &OwnedValue {
        &self.data
    }

    /// Mutable access to the event payload
    pub fn data_mut(&mut self) -> &mut OwnedValue {
        &mut self.data
    }

    /// Consumes the event, returning its payload
    #[must_use]
    pub fn into_data(self) -> OwnedValue {
        self.data
    }

    /// Flags the event as matched by a filter stage
    pub fn mark_matched(&mut self) {
        self.matched = true;
    }

    /// true if a filter stage marked the event as matched
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.matched
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simd_json::json;

    #[test]
    fn new_requires_object() {
        assert!(Event::new(1, json!({"message": "snot"})).is_ok());
        assert!(matches!(
            Event::new(2, json!("badger")),
            Err(Error::NotAnObject(_))
        ));
        assert!(Event::new(3, json!([1, 2])).is_err());
    }

    #[test]
    fn matched_flag() -> Result<()> {
        let mut event = Event::new(1, json!({}))?;
        assert!(!event.is_matched());
        event.mark_matched();
        assert!(event.is_matched());
        Ok(())
    }

    #[test]
    fn display_is_json() -> Result<()> {
        let event = Event::new(1, json!({"message": "snot"}))?;
        assert_eq!(r#"{"message":"snot"}"#, event.to_string());
        Ok(())
    }
}
