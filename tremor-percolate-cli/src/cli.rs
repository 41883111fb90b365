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
use clap::Parser;

/// Percolates JSON events against queries stored in elasticsearch. Events are
/// read one per line from STDIN or a file and written to STDOUT.
#[derive(Parser, Debug)]
#[clap(name = "tremor-percolate", author, version)]
pub(crate) struct Cli {
    /// Percolate filter configuration (YAML)
    #[clap(short, long, value_parser = clap::value_parser!(String))]
    pub(crate) config: String,
    /// Input file with one JSON event per line, `-` reads STDIN
    #[clap(short, long, default_value = "-", value_parser = clap::value_parser!(String))]
    pub(crate) input: String,
    /// Configuration for Log4RS
    #[clap(short, long, value_parser = clap::value_parser!(String))]
    pub(crate) logger_config: Option<String>,
}
