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

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tremor_percolate::client::Percolator;
use tremor_percolate::{Config, Event, PercolateFilter, Percolation};

use crate::cli::Cli;

/// Counters for one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stats {
    pub(crate) events: u64,
    pub(crate) matched: u64,
    pub(crate) failed: u64,
    pub(crate) skipped: u64,
}

/// Percolates every JSON line of `reader` and writes the events to `writer`,
/// one per line. Lines that aren't JSON objects are skipped with a warning,
/// events that fail to percolate are written unchanged.
pub(crate) async fn process<P, R, W>(
    filter: &PercolateFilter<P>,
    reader: R,
    mut writer: W,
) -> anyhow::Result<Stats>
where
    P: Percolator,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = Stats::default();
    let mut lines = reader.lines();
    let mut line_no = 0_u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let mut bytes = line.into_bytes();
        let data = match simd_json::to_owned_value(&mut bytes) {
            Ok(data) => data,
            Err(e) => {
                warn!("Skipping line {line_no}: invalid JSON: {e}");
                stats.skipped += 1;
                continue;
            }
        };
        let mut event = match Event::new(stats.events, data) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping line {line_no}: {e}");
                stats.skipped += 1;
                continue;
            }
        };
        stats.events += 1;
        match filter.filter(&mut event).await {
            Percolation::Matched(_) | Percolation::Counted(_) => stats.matched += 1,
            Percolation::NotMatched => (),
            Percolation::Failed(_) => stats.failed += 1,
        }
        let mut out = simd_json::to_vec(event.data())?;
        out.push(b'\n');
        writer.write_all(&out).await?;
    }
    writer.flush().await?;
    Ok(stats)
}

/// Runs the cli: loads the configuration, registers the filter and pipes
/// the input through it.
pub(crate) async fn run(cli: &Cli) -> anyhow::Result<Stats> {
    let raw = tokio::fs::read_to_string(&cli.config)
        .await
        .with_context(|| format!("Failed to read config file `{}`", cli.config))?;
    let settings = Config::from_yaml(&raw)?.validate()?;
    let filter = PercolateFilter::register(settings)?;

    let stdout = tokio::io::stdout();
    let stats = if cli.input == "-" {
        process(&filter, BufReader::new(tokio::io::stdin()), stdout).await?
    } else {
        let file = tokio::fs::File::open(&cli.input)
            .await
            .with_context(|| format!("Failed to open input file `{}`", cli.input))?;
        process(&filter, BufReader::new(file), stdout).await?
    };
    info!(
        "{filter} Processed {} events: {} matched, {} failed, {} skipped lines",
        stats.events, stats.matched, stats.failed, stats.skipped
    );
    Ok(stats)
}
