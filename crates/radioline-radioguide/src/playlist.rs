//! Playlist-file track extraction: M3U/M3U8, PLS, and XSPF.

use quick_xml::Reader;
use quick_xml::events::Event;

/// Extensions treated as playlist files rather than direct stream URLs.
pub const PLAYLIST_EXTS: [&str; 5] = [".m3u", ".m3u8", ".pls", ".xspf", ".xml"];

/// Whether a station source URL points at a playlist file.
pub fn is_playlist_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    PLAYLIST_EXTS
        .iter()
        .any(|ext| path.to_ascii_lowercase().ends_with(ext))
}

/// Extract track URLs from playlist data, sniffing the format from the
/// content. Unparseable data yields an empty list, never an error.
pub fn parse_playlist(data: &str) -> Vec<String> {
    let trimmed = data.trim_start();
    if trimmed.starts_with('<') {
        parse_xspf(data)
    } else if trimmed
        .lines()
        .next()
        .is_some_and(|l| l.trim().eq_ignore_ascii_case("[playlist]"))
    {
        parse_pls(data)
    } else {
        parse_m3u(data)
    }
}

/// M3U/M3U8: every non-empty line that is not a `#` directive is a track.
fn parse_m3u(data: &str) -> Vec<String> {
    data.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// PLS: `FileN=url` entries under a `[playlist]` section.
fn parse_pls(data: &str) -> Vec<String> {
    data.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let rest = key.strip_prefix("File")?;
            if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
        .collect()
}

/// XSPF (and bare XML playlists): text of every `<location>` element.
fn parse_xspf(data: &str) -> Vec<String> {
    let mut reader = Reader::from_str(data);
    reader.config_mut().trim_text(true);

    let mut tracks = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"location" => {
                if let Ok(text) = reader.read_text(e.name()) {
                    let url = text.trim().to_string();
                    if !url.is_empty() {
                        tracks.push(url);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("playlist XML parse stopped: {e}");
                break;
            }
        }
        buf.clear();
    }
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_url_detection() {
        assert!(is_playlist_url("http://example.com/radio.m3u"));
        assert!(is_playlist_url("http://example.com/radio.M3U8"));
        assert!(is_playlist_url("http://example.com/radio.pls?session=1"));
        assert!(is_playlist_url("http://example.com/radio.xspf"));
        assert!(!is_playlist_url("http://example.com/live"));
        assert!(!is_playlist_url("http://example.com/episode.mp3"));
    }

    #[test]
    fn m3u_skips_directives() {
        let data = "#EXTM3U\n#EXTINF:-1,Alpha FM\nhttp://stream.example.com/alpha\n\nhttp://stream.example.com/backup\n";
        assert_eq!(
            parse_playlist(data),
            vec![
                "http://stream.example.com/alpha",
                "http://stream.example.com/backup"
            ]
        );
    }

    #[test]
    fn pls_file_entries() {
        let data = "[playlist]\nNumberOfEntries=2\nFile1=http://stream.example.com/alpha\nTitle1=Alpha\nFile2=http://stream.example.com/beta\nLength1=-1\n";
        assert_eq!(
            parse_playlist(data),
            vec![
                "http://stream.example.com/alpha",
                "http://stream.example.com/beta"
            ]
        );
    }

    #[test]
    fn pls_ignores_non_file_keys() {
        let data = "[playlist]\nFilename=http://nope.example.com\nFile1=http://stream.example.com/alpha\n";
        assert_eq!(parse_playlist(data), vec!["http://stream.example.com/alpha"]);
    }

    #[test]
    fn xspf_locations() {
        let data = r#"<?xml version="1.0" encoding="UTF-8"?>
            <playlist version="1" xmlns="http://xspf.org/ns/0/">
              <trackList>
                <track><location>http://stream.example.com/alpha</location></track>
                <track><location>http://stream.example.com/beta</location></track>
              </trackList>
            </playlist>"#;
        assert_eq!(
            parse_playlist(data),
            vec![
                "http://stream.example.com/alpha",
                "http://stream.example.com/beta"
            ]
        );
    }

    #[test]
    fn garbage_yields_no_tracks() {
        assert!(parse_playlist("<playlist><location>").is_empty());
        assert!(parse_playlist("").is_empty());
        assert!(parse_playlist("#EXTM3U\n").is_empty());
    }
}
