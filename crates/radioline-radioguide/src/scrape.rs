//! Regex extraction rules for the radioguide.fm page structure.
//!
//! The markup is too irregular for a DOM walk to buy anything; these are
//! the minimal patterns the genre index, genre listings, station pages,
//! and the player iframe have held stable.

use std::sync::LazyLock;

use regex::Regex;

static GENRE_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<li>.*?<div\s+class="inner">.*?<a\s+href="(/genre/.*?)".*?>(.*?)</a>.*?</div>.*?</li>"#,
    )
    .expect("invalid genre page regex")
});

static STATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<li\s+class="clearfix">.*?<div class="station-info2">.*?<a\s+href="(/.*?)".*?>.*?<strong>(.*?)</strong>.*?</div>.*?</li>"#,
    )
    .expect("invalid station list regex")
});

static GENRE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<a\s+href="/genre/.*?">(.*?)</a>"#).expect("invalid genre name regex"));

static STATION_DETAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<div\s+class="player">.*?<span\s+class="logo">.*?<img\s+src="(.*?)"\s+alt="(.*?)">.*?</span>.*?</div>.*?<div\s+class="station-info">.*?<strong>Country:</strong>\s+<a\s+href="/.*?">(.*?)</a>.*?<strong>Genre\(s\):</strong>(.*?)\|.*?<strong>Rating:</strong>.*?<div.*?title="Rating:\s+(\d\.*\d*)".*?>.*?</div>.*?</div>"#,
    )
    .expect("invalid station detail regex")
});

static STATION_FRAME_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<iframe\s+name="playerContainer".*?src="(.*?)".*?>.*?</iframe>"#)
        .expect("invalid player iframe regex")
});

static STATION_SOURCE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"setMedia".*?\{(.*?):.*?"(.*?)".*?\}"#).expect("invalid player config regex")
});

static STATION_EMBEDDED_SOURCE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<embed.*?src="(.*?)".*?>.*?<style>.*?</style>"#)
        .expect("invalid embed fallback regex")
});

/// A genre entry from the genre index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreLink {
    pub name: String,
    pub path: String,
}

/// A station entry from a genre listing page. The harvest task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationPage {
    pub path: String,
    pub title: String,
}

/// Fields from a station detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationDetail {
    pub logo_path: String,
    pub desc: String,
    pub country: String,
    pub genres: Vec<String>,
    pub rating: String,
}

/// Stream source extracted from the player iframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    /// Media type key from the player config; empty for the embed fallback.
    pub source_type: String,
    pub url: String,
}

/// All genre links on the genre index page.
pub fn genre_links(html: &str) -> Vec<GenreLink> {
    GENRE_PAGE_RE
        .captures_iter(html)
        .map(|c| GenreLink {
            path: c[1].to_string(),
            name: c[2].to_string(),
        })
        .collect()
}

/// All station links on one genre listing page. Empty means past the last
/// page of the listing.
pub fn station_links(html: &str) -> Vec<StationPage> {
    STATION_RE
        .captures_iter(html)
        .map(|c| StationPage {
            path: c[1].to_string(),
            title: c[2].to_string(),
        })
        .collect()
}

/// Detail fields from a station page. `None` unless the page carries
/// exactly one player block.
pub fn station_detail(html: &str) -> Option<StationDetail> {
    let c = exactly_one(&STATION_DETAIL_RE, html)?;
    let genres = GENRE_NAME_RE
        .captures_iter(&c[4])
        .map(|g| g[1].to_string())
        .collect();
    Some(StationDetail {
        logo_path: c[1].to_string(),
        desc: c[2].trim().to_string(),
        country: c[3].to_string(),
        genres,
        rating: c[5].to_string(),
    })
}

/// Path of the player iframe on a station page.
pub fn player_iframe_path(html: &str) -> Option<String> {
    exactly_one(&STATION_FRAME_PATH_RE, html).map(|c| c[1].to_string())
}

/// Stream source URL from the player iframe page: the jPlayer `setMedia`
/// config when present, the `<embed>` tag as fallback.
pub fn stream_source(html: &str) -> Option<StreamSource> {
    if let Some(c) = exactly_one(&STATION_SOURCE_URL_RE, html) {
        return Some(StreamSource {
            source_type: c[1].trim().to_string(),
            url: c[2].to_string(),
        });
    }
    exactly_one(&STATION_EMBEDDED_SOURCE_URL_RE, html).map(|c| StreamSource {
        source_type: String::new(),
        url: c[1].to_string(),
    })
}

/// A match is only trusted when the pattern hits exactly once; repeated
/// hits mean the page layout is not what the pattern assumes.
fn exactly_one<'t>(re: &Regex, html: &'t str) -> Option<regex::Captures<'t>> {
    let mut iter = re.captures_iter(html);
    let first = iter.next()?;
    if iter.next().is_some() {
        return None;
    }
    Some(first)
}
