//! Enrich stage: probe each harvested station's source URL (expanding
//! playlist files into their tracks) and attach live stream metadata.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use radioline_core::{
    Emitter, FetchOptions, Fetched, HttpClient, JsonLinesSink, Pipeline, Summary, TaskProcessor,
    TaskSource,
};
use serde_json::Value;

use crate::config::Config;
use crate::playlist;
use crate::records::timestamp;

/// Source URLs that show up in harvested data but are scraping artifacts,
/// never real streams.
const URL_BLACK_LIST: [&str; 1] = ["http://Yes"];

/// Task source streaming the raw station list, deduplicated on
/// `station_source_url`.
pub struct StationFileSource {
    source_file: PathBuf,
    black_list: HashSet<String>,
    /// Dedup state; lives and dies with this source instance.
    seen: HashSet<String>,
}

impl StationFileSource {
    pub fn new(config: &Config) -> Self {
        Self {
            source_file: config.source_file.clone(),
            black_list: URL_BLACK_LIST.iter().map(|s| s.to_string()).collect(),
            seen: HashSet::new(),
        }
    }
}

impl TaskSource<Value> for StationFileSource {
    fn run(&mut self, out: &Emitter<Value>) -> Result<()> {
        log::info!(
            "producer: reading stations from {}",
            self.source_file.display()
        );
        let file = File::open(&self.source_file).with_context(|| {
            format!("cannot open station source file {}", self.source_file.display())
        })?;

        let mut station_total = 0;
        for line in BufReader::new(file).lines() {
            let line = line.context("cannot read station source line")?;
            if line.trim().is_empty() {
                continue;
            }
            let data: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(_) => {
                    log::warn!("producer: skipping invalid record: {line}");
                    continue;
                }
            };
            let Some(url) = data.get("station_source_url").and_then(Value::as_str) else {
                log::warn!("producer: skipping record without station_source_url: {line}");
                continue;
            };
            if self.black_list.contains(url) {
                log::warn!("producer: skipping black-listed source url {url}");
                continue;
            }
            if !self.seen.insert(url.to_string()) {
                continue;
            }
            station_total += 1;
            out.send(data)?;
        }

        log::info!("producer: {station_total} unique stations queued");
        Ok(())
    }
}

/// Per-worker processor probing a station's stream candidates and writing
/// the enriched record.
pub struct StreamProbeProcessor {
    client: HttpClient,
    sink: Arc<JsonLinesSink>,
    max_body_size: Option<usize>,
}

impl StreamProbeProcessor {
    pub fn new(config: &Config, sink: Arc<JsonLinesSink>) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(&config.client_config())?,
            sink,
            max_body_size: config.max_body_size,
        })
    }

    /// Candidate stream URLs for a source URL: playlist tracks when it is
    /// a playlist file, otherwise the URL itself.
    fn stream_candidates(&self, source_url: &str) -> Vec<String> {
        if !playlist::is_playlist_url(source_url) {
            return vec![source_url.to_string()];
        }
        let options = FetchOptions {
            max_size: self.max_body_size,
            ..FetchOptions::default()
        };
        let Some(data) = self
            .client
            .fetch(source_url, &options)
            .and_then(Fetched::into_text)
        else {
            log::error!("consumer: cannot fetch playlist {source_url}");
            return Vec::new();
        };
        let tracks = playlist::parse_playlist(&data);
        if tracks.is_empty() {
            log::error!("consumer: no tracks in playlist {source_url}");
        }
        tracks
    }
}

impl TaskProcessor<Value> for StreamProbeProcessor {
    fn process(&mut self, mut station: Value) -> Result<()> {
        let source_url = station
            .get("station_source_url")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        anyhow::ensure!(!source_url.is_empty(), "record has an empty station_source_url");

        let mut streams = Vec::new();
        for candidate in self.stream_candidates(&source_url) {
            let Some(descriptor) = self
                .client
                .fetch(&candidate, &FetchOptions::streaming())
                .and_then(Fetched::into_stream)
            else {
                continue;
            };
            let mut entry = serde_json::to_value(&descriptor)
                .context("cannot serialize stream descriptor")?;
            // The record keeps the probed candidate URL, not the
            // post-redirect one the descriptor resolved to.
            entry["url"] = Value::String(candidate);
            streams.push(entry);
        }

        if !streams.is_empty() {
            station["stream_urls"] = Value::Array(streams);
            station["parsed_date"] = Value::String(timestamp());
        }
        self.sink
            .append(&station)
            .context("cannot write enriched record")?;
        Ok(())
    }
}

/// Run the enrich stage: raw station list → enriched station list.
pub fn run(config: &Config, stop: Arc<AtomicBool>) -> Result<Summary> {
    log::info!(
        "enrich: probing streams from {} into {}",
        config.source_file.display(),
        config.output_file.display()
    );

    let sink = Arc::new(
        JsonLinesSink::create(&config.output_file).with_context(|| {
            format!("cannot create output file {}", config.output_file.display())
        })?,
    );

    let pipeline = Pipeline {
        queue_capacity: config.queue_capacity,
        workers: config.workers,
        idle_timeout: config.idle_timeout,
        stop,
    };

    let source = StationFileSource::new(config);
    let summary = pipeline.run(source, |_worker| {
        StreamProbeProcessor::new(config, sink.clone())
    })?;

    sink.close();
    summary.log("enrich");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, lines: &[&str]) -> PathBuf {
        let path = dir.path().join("source.jsonl");
        let mut f = File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        path
    }

    fn collect_tasks(source_file: PathBuf) -> Vec<Value> {
        let config = Config {
            source_file,
            ..Config::default()
        };
        let collected = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = Pipeline {
            workers: 1,
            idle_timeout: std::time::Duration::from_secs(5),
            ..Pipeline::default()
        };
        let sink_tasks = collected.clone();
        pipeline
            .run(StationFileSource::new(&config), move |_| {
                let tasks = sink_tasks.clone();
                Ok(move |task: Value| -> Result<()> {
                    tasks.lock().unwrap().push(task);
                    Ok(())
                })
            })
            .unwrap();
        Arc::try_unwrap(collected).unwrap().into_inner().unwrap()
    }

    #[test]
    fn source_dedups_and_filters() {
        let dir = TempDir::new().unwrap();
        let path = write_source(
            &dir,
            &[
                r#"{"station_source_url": "http://a.example.com/live", "title": "A"}"#,
                r#"{"station_source_url": "http://a.example.com/live", "title": "A again"}"#,
                r#"{"station_source_url": "http://Yes", "title": "artifact"}"#,
                r#"{"title": "no source url"}"#,
                "not json at all",
                r#"{"station_source_url": "http://b.example.com/live", "title": "B"}"#,
            ],
        );
        let tasks = collect_tasks(path);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0]["title"], "A");
        assert_eq!(tasks[1]["title"], "B");
    }

    #[test]
    fn missing_source_file_truncates_the_run() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            source_file: dir.path().join("absent.jsonl"),
            ..Config::default()
        };
        let pipeline = Pipeline {
            workers: 1,
            idle_timeout: std::time::Duration::from_secs(5),
            ..Pipeline::default()
        };
        let summary = pipeline
            .run(StationFileSource::new(&config), |_| {
                Ok(|_task: Value| -> Result<()> { Ok(()) })
            })
            .unwrap();
        assert_eq!(summary.produced, 0);
        assert_eq!(summary.consumed, 0);
    }
}
