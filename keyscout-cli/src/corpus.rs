use keyscout::{CancellationSignal, SearchExecutor, SearchResult};
use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

const LATENCY_SLICE: Duration = Duration::from_millis(10);

/// Case-insensitive substring search over an in-memory list of entries
#[derive(Debug, Clone)]
pub struct CorpusExecutor {
    entries: Vec<String>,
    latency: Duration,
}

impl CorpusExecutor {
    pub fn new(entries: Vec<String>, latency: Duration) -> Self {
        Self { entries, latency }
    }

    /// Loads one entry per non-empty line
    pub fn load(path: &Path, latency: Duration) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let entries = content
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Ok(Self::new(entries, latency))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl SearchExecutor for CorpusExecutor {
    type Item = String;

    fn execute(
        &self,
        query: &str,
        max_results: usize,
        signal: &CancellationSignal,
    ) -> SearchResult<Vec<String>> {
        simulate_latency(self.latency, signal)?;

        let needle = query.to_lowercase();
        let mut found = Vec::new();
        for entry in &self.entries {
            if found.len() >= max_results {
                break;
            }
            signal.check()?;
            if entry.to_lowercase().contains(&needle) {
                found.push(entry.clone());
            }
        }
        Ok(found)
    }
}

/// Sleeps for `latency`, waking up regularly to notice cancellation
fn simulate_latency(latency: Duration, signal: &CancellationSignal) -> SearchResult<()> {
    let deadline = Instant::now() + latency;
    loop {
        signal.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(LATENCY_SLICE.min(deadline - now));
    }
}
