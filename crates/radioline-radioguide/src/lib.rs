//! Radioguide station pipelines.
//!
//! Two runs over the generic radioline pipeline: harvest walks the site's
//! genre listings into a raw station list; enrich probes each station's
//! stream source and attaches live metadata. Both write JSON Lines files
//! joined on `station_source_url`.

pub mod config;
pub mod enrich;
pub mod harvest;
pub mod playlist;
pub mod records;
pub mod scrape;

pub use config::Config;
pub use records::Station;
