//! Output record types for the two pipeline stages.

use serde::{Deserialize, Serialize};

/// One harvested station, written as a line of the raw station list.
///
/// `station_source_url` is the join key the enrich stage dedups on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub station_page_url: String,
    pub station_source_url: String,
    pub station_source_type: String,
    pub logo_url: String,
    pub title: String,
    pub desc: String,
    pub country: String,
    pub genres: Vec<String>,
    pub rating: String,
    pub generated_date: String,
}

/// Local wall-clock timestamp in the record format.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_format() {
        let ts = timestamp();
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }

    #[test]
    fn station_round_trips() {
        let station = Station {
            station_page_url: "http://www.radioguide.fm/some-station".into(),
            station_source_url: "http://stream.example.com/live.m3u".into(),
            station_source_type: "mp3".into(),
            logo_url: "http://www.radioguide.fm/logo.png".into(),
            title: "Some Station".into(),
            desc: "desc".into(),
            country: "Netherlands".into(),
            genres: vec!["Pop".into(), "Rock".into()],
            rating: "4.5".into(),
            generated_date: timestamp(),
        };
        let line = serde_json::to_string(&station).unwrap();
        let back: Station = serde_json::from_str(&line).unwrap();
        assert_eq!(back.station_source_url, station.station_source_url);
        assert_eq!(back.genres.len(), 2);
    }
}
