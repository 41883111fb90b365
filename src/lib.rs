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

//! Tremor percolate filter
//!
//! [Percolates](https://www.elastic.co/guide/en/elasticsearch/reference/5.6/search-percolate.html)
//! events against queries stored in elasticsearch and annotates them with the
//! ids of the matching queries.
#![deny(missing_docs)]
#![recursion_limit = "1024"]
#![deny(
    clippy::all,
    clippy::unwrap_used,
    clippy::unnecessary_unwrap,
    clippy::pedantic,
    clippy::mod_module_files
)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

#[macro_use]
extern crate log;

/// Percolate requests and the elasticsearch client
pub mod client;
/// Configuration
pub mod config;
/// Errors
pub mod errors;
/// Pipeline events
pub mod event;
/// The percolate filter
pub mod filter;
/// Field references and templates
pub mod template;
/// Transport options
pub mod transport;

pub use crate::config::{Config, Settings};
pub use crate::errors::{Error, Result};
pub use crate::event::Event;
pub use crate::filter::{PercolateFilter, Percolation};
