//! Harvest stage: enumerate every station page on the site and extract its
//! detail fields plus the stream source URL into the raw station list.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::{Context, Result};
use radioline_core::{
    Emitter, FetchOptions, Fetched, HttpClient, JsonLinesSink, Pipeline, Summary, TaskProcessor,
    TaskSource,
};

use crate::config::Config;
use crate::records::{Station, timestamp};
use crate::scrape::{self, GenreLink, StationPage};

const GENRES_PATH: &str = "/genre";

/// Task source walking the genre index and every genre's paginated
/// station listing.
pub struct StationPageSource {
    client: HttpClient,
    root_url: String,
    max_body_size: Option<usize>,
}

impl StationPageSource {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(&config.client_config())?,
            root_url: config.root_url.clone(),
            max_body_size: config.max_body_size,
        })
    }

    fn fetch_page(&self, url: &str) -> Option<String> {
        let options = FetchOptions {
            max_size: self.max_body_size,
            ..FetchOptions::default()
        };
        self.client.fetch(url, &options).and_then(Fetched::into_text)
    }

    /// Walk one genre's listing pages until an empty page or a fetch
    /// failure. Returns how many stations were emitted.
    fn emit_genre_stations(&self, genre: &GenreLink, out: &Emitter<StationPage>) -> Result<usize> {
        let encoded: Vec<String> = genre
            .path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect();
        let genre_url = format!("{}{}", self.root_url, encoded.join("/"));
        log::info!("producer: retrieving genre {genre_url}");

        let mut emitted = 0;
        for page in 1.. {
            let page_url = format!("{genre_url}?page={page}");
            let Some(html) = self.fetch_page(&page_url) else {
                log::error!(
                    "producer: cannot fetch {page_url} for genre {}",
                    genre.name
                );
                break;
            };
            let stations = scrape::station_links(&html);
            if stations.is_empty() {
                break;
            }
            for station in stations {
                out.send(station)?;
                emitted += 1;
            }
        }
        Ok(emitted)
    }
}

impl TaskSource<StationPage> for StationPageSource {
    fn run(&mut self, out: &Emitter<StationPage>) -> Result<()> {
        log::info!("producer: collecting the station list for every genre");
        let start = Instant::now();

        let index_url = format!("{}{GENRES_PATH}", self.root_url);
        let html = self
            .fetch_page(&index_url)
            .with_context(|| format!("cannot fetch the genre index {index_url}"))?;
        let genres = scrape::genre_links(&html);

        let mut station_total = 0;
        for genre in &genres {
            let genre_start = Instant::now();
            let count = self.emit_genre_stations(genre, out)?;
            station_total += count;
            log::info!(
                "producer: genre {}: {count} stations in {:.0}s",
                genre.name,
                genre_start.elapsed().as_secs_f64()
            );
        }

        log::info!(
            "producer: {} genres, {station_total} stations in {:.0}s",
            genres.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

/// Per-worker processor resolving one station page into a [`Station`]
/// record on the raw station list.
pub struct StationDetailProcessor {
    client: HttpClient,
    sink: Arc<JsonLinesSink>,
    root_url: String,
    max_body_size: Option<usize>,
}

impl StationDetailProcessor {
    pub fn new(config: &Config, sink: Arc<JsonLinesSink>) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(&config.client_config())?,
            sink,
            root_url: config.root_url.clone(),
            max_body_size: config.max_body_size,
        })
    }

    fn fetch_page(&self, url: &str) -> Option<String> {
        let options = FetchOptions {
            max_size: self.max_body_size,
            ..FetchOptions::default()
        };
        self.client.fetch(url, &options).and_then(Fetched::into_text)
    }
}

impl TaskProcessor<StationPage> for StationDetailProcessor {
    fn process(&mut self, task: StationPage) -> Result<()> {
        let station_url = format!("{}{}", self.root_url, task.path);
        let html = self
            .fetch_page(&station_url)
            .with_context(|| format!("cannot fetch station page {station_url}"))?;

        let detail = scrape::station_detail(&html)
            .with_context(|| format!("no detail block on {station_url}"))?;
        let iframe_path = scrape::player_iframe_path(&html)
            .with_context(|| format!("no player iframe on {station_url}"))?;

        let iframe_url = format!("{}{iframe_path}", self.root_url);
        let player_html = self
            .fetch_page(&iframe_url)
            .with_context(|| format!("cannot fetch player iframe {iframe_url}"))?;
        let source = scrape::stream_source(&player_html)
            .with_context(|| format!("no stream url in player {iframe_url}"))?;

        let station = Station {
            station_page_url: station_url,
            station_source_url: source.url,
            station_source_type: source.source_type,
            logo_url: format!("{}{}", self.root_url, detail.logo_path),
            title: task.title,
            desc: detail.desc,
            country: detail.country,
            genres: detail.genres,
            rating: detail.rating,
            generated_date: timestamp(),
        };
        self.sink
            .append(&station)
            .context("cannot write station record")?;
        Ok(())
    }
}

/// Run the harvest stage: site → raw station list.
pub fn run(config: &Config, stop: Arc<AtomicBool>) -> Result<Summary> {
    log::info!(
        "harvest: collecting stations from {} into {}",
        config.root_url,
        config.source_file.display()
    );

    let sink = Arc::new(
        JsonLinesSink::create(&config.source_file).with_context(|| {
            format!("cannot create output file {}", config.source_file.display())
        })?,
    );

    let pipeline = Pipeline {
        queue_capacity: config.queue_capacity,
        workers: config.workers,
        idle_timeout: config.idle_timeout,
        stop,
    };

    let source = StationPageSource::new(config)?;
    let summary = pipeline.run(source, |_worker| {
        StationDetailProcessor::new(config, sink.clone())
    })?;

    sink.close();
    summary.log("harvest");
    Ok(summary)
}
