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

//! Field references and `%{field}` templates
//!
//! A field reference is either a bare top level field name (`doc_id`) or a
//! bracketed path into nested objects (`[payload][inner]`).
//!
//! A template is a string with `%{<field reference>}` placeholders that are
//! substituted with the referenced field's value when rendered against an
//! event payload.

use std::fmt;

use simd_json::OwnedValue;
use value_trait::prelude::*;

use crate::errors::{Error, Result};

/// Reference to a (possibly nested) field of an event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    raw: String,
    path: Vec<String>,
}

impl FieldRef {
    /// Parses a field reference
    ///
    /// # Errors
    /// if the reference is empty or the bracket syntax is malformed
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidTemplate(raw.to_string(), reason);
        if raw.is_empty() {
            return Err(invalid("empty field reference"));
        }
        let path = if raw.starts_with('[') {
            let mut path = Vec::new();
            let mut rest = raw;
            while !rest.is_empty() {
                let inner = rest
                    .strip_prefix('[')
                    .ok_or_else(|| invalid("expected `[`"))?;
                let end = inner.find(']').ok_or_else(|| invalid("unclosed `[`"))?;
                let segment = &inner[..end];
                if segment.is_empty() {
                    return Err(invalid("empty path segment"));
                }
                if segment.contains('[') {
                    return Err(invalid("nested `[` in path segment"));
                }
                path.push(segment.to_string());
                rest = &inner[end + 1..];
            }
            path
        } else if raw.contains(|c| c == '[' || c == ']') {
            return Err(invalid("brackets in a plain field name"));
        } else {
            vec![raw.to_string()]
        };
        Ok(Self {
            raw: raw.to_string(),
            path,
        })
    }

    /// The reference as it was written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Looks up the referenced field
    #[must_use]
    pub fn get<'v>(&self, data: &'v OwnedValue) -> Option<&'v OwnedValue> {
        self.path
            .iter()
            .try_fold(data, |current, key| current.as_object()?.get(key.as_str()))
    }

    /// Sets the referenced field, creating intermediate objects as needed.
    ///
    /// The payload is left untouched if an existing intermediate value is not an object.
    ///
    /// # Errors
    /// if the payload or an intermediate value is not an object
    pub fn set(&self, data: &mut OwnedValue, value: OwnedValue) -> Result<()> {
        set_path(data, &self.path, value, &self.raw)
    }
}

fn set_path(target: &mut OwnedValue, path: &[String], value: OwnedValue, raw: &str) -> Result<()> {
    let obj = target
        .as_object_mut()
        .ok_or_else(|| Error::NotAnObject(raw.to_string()))?;
    match path {
        [] => Err(Error::InvalidTemplate(raw.to_string(), "empty field reference")),
        [last] => {
            obj.insert(last.clone(), value);
            Ok(())
        }
        [first, rest @ ..] => {
            if !obj.contains_key(first.as_str()) {
                obj.insert(first.clone(), OwnedValue::object());
            }
            let child = obj
                .get_mut(first.as_str())
                .ok_or_else(|| Error::MissingField(raw.to_string()))?;
            set_path(child, rest, value, raw)
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(FieldRef),
}

/// A string with `%{field}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template
    ///
    /// # Errors
    /// if a placeholder is not closed or does not contain a valid field reference
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find("%{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| Error::InvalidTemplate(raw.to_string(), "unclosed `%{`"))?;
            let field = FieldRef::parse(&after[..end])
                .map_err(|_| Error::InvalidTemplate(raw.to_string(), "invalid field reference"))?;
            segments.push(Segment::Field(field));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template as it was written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Renders the template against an event payload.
    ///
    /// String fields are inserted verbatim, everything else as compact JSON.
    ///
    /// # Errors
    /// if a referenced field is missing
    pub fn render(&self, data: &OwnedValue) -> Result<String> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field(field) => {
                    let value = field
                        .get(data)
                        .ok_or_else(|| Error::MissingField(field.to_string()))?;
                    if let Some(s) = value.as_str() {
                        out.push_str(s);
                    } else {
                        out.push_str(&value.encode());
                    }
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
