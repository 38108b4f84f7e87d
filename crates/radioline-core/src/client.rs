//! Throttled, content-validating HTTP fetch client.
//!
//! Uses async reqwest internally behind a shared tokio runtime, presenting
//! a sync interface to worker threads. Every worker owns its own client
//! instance (and throttle), so nothing here is contended in normal runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use reqwest::header::{HeaderMap, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, SERVER};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;

use crate::error::FetchError;
use crate::throttle::RateThrottle;

/// User-Agent for document fetches.
const USER_AGENT: &str = "UniversalFeedParser/3.3 +http://feedparser.org/";

/// User-Agent for streaming probes. Shoutcast hosts answer a browser UA
/// with an HTML landing page instead of the stream, so pose as a player.
const STREAM_USER_AGENT: &str =
    "iTunes/9.2.1 (Macintosh; Intel Mac OS X 10.5.8) AppleWebKit/533.16";

/// One caller-supplied timeout budget is split into a connect portion and a
/// read portion. The connect portion applies per client (reqwest sets
/// connect timeouts at build time); the read portion is the per-request
/// deadline. Tunables, not contract.
const CONNECT_FRACTION: f64 = 0.5;
const READ_FRACTION: f64 = 0.8;

/// Station-identifying response headers lifted verbatim into the descriptor.
const ICY_FIELDS: [&str; 4] = ["icy-genre", "icy-name", "icy-url", "icy-description"];

/// Shared tokio runtime driving the async HTTP stack from sync workers.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Client construction parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target request rate; `None` disables throttling.
    pub requests_per_second: Option<f64>,
    /// Total timeout budget per fetch (split into connect/read portions).
    pub http_timeout: Duration,
    /// Optional upstream proxy, `host:port`.
    pub proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requests_per_second: None,
            http_timeout: Duration::from_secs(10),
            proxy: None,
        }
    }
}

/// Per-fetch options. Immutable for the duration of one call.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    /// Form fields for POST bodies.
    pub form: Option<Vec<(String, String)>>,
    /// Override of the client-level timeout budget. Rescales the
    /// whole-request deadline only: the connect cap is a reqwest
    /// builder setting, fixed from the client-level budget at
    /// construction. The override still bounds slow connects via the
    /// request deadline.
    pub timeout: Option<Duration>,
    /// Reject bodies larger than this many bytes.
    pub max_size: Option<usize>,
    /// Streaming probe: validate media headers, never read the body.
    pub stream: bool,
    /// Apply the client's rate throttle.
    pub throttle: bool,
    /// Require the body to decode as UTF-8 text.
    pub ensure_utf8: bool,
    /// Route through the configured proxy (ignored for loopback targets
    /// and streaming probes).
    pub proxy: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            form: None,
            timeout: None,
            max_size: None,
            stream: false,
            throttle: true,
            ensure_utf8: true,
            proxy: false,
        }
    }
}

impl FetchOptions {
    /// Options for a streaming media probe.
    pub fn streaming() -> Self {
        Self {
            stream: true,
            ensure_utf8: false,
            ..Self::default()
        }
    }
}

/// Metadata captured from a live media stream's response headers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// URL after redirects.
    pub url: String,
    pub server: String,
    /// Normalized media content-type.
    #[serde(rename = "icy-ct")]
    pub content_type: String,
    /// `icy-*` station headers, present only when the server sent them.
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// Successful fetch payload.
#[derive(Debug)]
pub enum Fetched {
    /// UTF-8 decoded document body.
    Document(String),
    /// Raw body when UTF-8 normalization was not requested.
    Raw(Vec<u8>),
    /// Media stream metadata (streaming mode).
    Stream(StreamDescriptor),
}

impl Fetched {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Document(text) => Some(text),
            Self::Raw(_) | Self::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<StreamDescriptor> {
        match self {
            Self::Stream(d) => Some(d),
            Self::Document(_) | Self::Raw(_) => None,
        }
    }
}

#[derive(Default)]
struct Validators {
    if_modified_since: Option<String>,
    if_none_match: Option<String>,
}

/// HTTP client with request pacing, conditional-request caching, and
/// media content validation.
pub struct HttpClient {
    direct: reqwest::Client,
    proxied: Option<reqwest::Client>,
    throttle: RateThrottle,
    http_timeout: Duration,
    validators: Mutex<HashMap<String, Validators>>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let connect = config.http_timeout.mul_f64(CONNECT_FRACTION);
        let direct = reqwest::Client::builder()
            .connect_timeout(connect)
            .build()?;
        let proxied = match &config.proxy {
            Some(addr) => Some(
                reqwest::Client::builder()
                    .connect_timeout(connect)
                    .proxy(reqwest::Proxy::http(format!("http://{addr}"))?)
                    .build()?,
            ),
            None => None,
        };
        Ok(Self {
            direct,
            proxied,
            throttle: RateThrottle::new(config.requests_per_second),
            http_timeout: config.http_timeout,
            validators: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch a resource. All failures collapse to `None`; the classification
    /// only reaches the logs. A `None` may also mean 304 Not Modified.
    pub fn fetch(&self, url: &str, options: &FetchOptions) -> Option<Fetched> {
        match self.try_fetch(url, options) {
            Ok(Some(payload)) => Some(payload),
            Ok(None) => {
                log::info!("content not modified. url = {url}");
                None
            }
            Err(e) => {
                log::error!("fetch failed. url = {url}, tag = {}, cause = {e}", e.tag());
                None
            }
        }
    }

    /// Fetch with full failure classification. `Ok(None)` is 304 Not
    /// Modified: no new content, not an error.
    pub fn try_fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<Fetched>, FetchError> {
        if options.throttle {
            let delay = self.throttle.pace();
            if !delay.is_zero() {
                log::info!("throttled for {:.2}s. url = {url}", delay.as_secs_f64());
            }
        }

        let url = normalize_url(url)?;
        log::debug!("fetching {url}");
        let client = self.select_client(&url, options);

        let read_timeout = options
            .timeout
            .unwrap_or(self.http_timeout)
            .mul_f64(READ_FRACTION);

        let mut request = client
            .request(options.method.clone(), url.clone())
            .timeout(read_timeout)
            .header(
                reqwest::header::USER_AGENT,
                if options.stream {
                    STREAM_USER_AGENT
                } else {
                    USER_AGENT
                },
            );
        if let Some(form) = &options.form {
            request = request.form(form);
        }
        {
            let validators = self.validators.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(v) = validators.get(&url) {
                if let Some(ims) = &v.if_modified_since {
                    request = request.header(IF_MODIFIED_SINCE, ims);
                }
                if let Some(inm) = &v.if_none_match {
                    request = request.header(IF_NONE_MATCH, inm);
                }
            }
        }

        let stream = options.stream;
        let response = SHARED_RUNTIME.handle().block_on(async move {
            let resp = request.send().await.map_err(|e| FetchError::from_reqwest(&e))?;
            let status = resp.status();
            let final_url = resp.url().to_string();
            let headers = resp.headers().clone();
            // Streaming bodies are endless; never read them.
            let body = if stream || status != StatusCode::OK {
                None
            } else {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| FetchError::from_reqwest(&e))?;
                Some(bytes.to_vec())
            };
            Ok::<_, FetchError>(RawResponse {
                status,
                final_url,
                headers,
                body,
            })
        })?;

        if response.status == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        if response.status != StatusCode::OK {
            return Err(FetchError::Status(response.status.as_u16()));
        }

        let payload = if options.stream {
            Fetched::Stream(stream_descriptor(&response)?)
        } else {
            let body = response.body.as_deref().unwrap_or_default();
            if let Some(max) = options.max_size {
                if body.len() > max {
                    return Err(FetchError::TooLarge {
                        size: body.len(),
                        max,
                    });
                }
            }
            if options.ensure_utf8 {
                let text = std::str::from_utf8(body).map_err(|_| FetchError::NotUtf8)?;
                Fetched::Document(text.to_string())
            } else {
                Fetched::Raw(body.to_vec())
            }
        };

        self.capture_validators(&url, &response.headers);
        Ok(Some(payload))
    }

    fn select_client(&self, url: &str, options: &FetchOptions) -> &reqwest::Client {
        if !options.proxy {
            return &self.direct;
        }
        if options.stream {
            log::info!("proxy is not compatible with streaming. url = {url}");
            return &self.direct;
        }
        if is_loopback(url) {
            log::info!("proxy is not compatible with loopback target. url = {url}");
            return &self.direct;
        }
        match &self.proxied {
            Some(client) => client,
            None => &self.direct,
        }
    }

    /// Remember cache validators so a later fetch of the same URL by this
    /// client can send a conditional request (and get a cheap 304 back).
    fn capture_validators(&self, url: &str, headers: &HeaderMap) {
        let last_modified = header_str(headers, LAST_MODIFIED.as_str());
        let etag = header_str(headers, ETAG.as_str());
        if last_modified.is_none() && etag.is_none() {
            return;
        }
        let mut validators = self.validators.lock().unwrap_or_else(|e| e.into_inner());
        let entry = validators.entry(url.to_string()).or_default();
        if last_modified.is_some() {
            entry.if_modified_since = last_modified;
        }
        if etag.is_some() {
            entry.if_none_match = etag;
        }
    }
}

struct RawResponse {
    status: StatusCode,
    final_url: String,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

/// Reject unsupported schemes, prefix `http://` when no scheme is present.
pub fn normalize_url(url: &str) -> Result<String, FetchError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(trimmed.to_string());
    }
    // Any other explicit scheme (mms, rtsp, ...) is unsupported.
    if trimmed.contains("://") || trimmed.starts_with("mms") {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    Ok(format!("http://{trimmed}"))
}

fn is_loopback(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => {
            host.eq_ignore_ascii_case("localhost")
                || host
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .parse::<std::net::IpAddr>()
                    .map(|ip| ip.is_loopback())
                    .unwrap_or(false)
        }
        None => false,
    }
}

/// Decide whether a declared content-type counts as a media stream for the
/// given URL path, returning the normalized content-type.
///
/// A missing or empty content-type is accepted as `""`: legacy ICY and
/// Shoutcast servers omit the header entirely. `application/octet-stream`
/// with a known media extension is accepted too: some podcast hosts serve
/// mp3 files that way.
pub fn accept_stream_content(content_type: &str, path: &str) -> Option<String> {
    let ct = content_type.split(';').next().unwrap_or("").trim();
    if ct.is_empty() {
        return Some(String::new());
    }
    let ct = if ct == "application/octet-stream" && path.ends_with(".mp3") {
        "audio/mp3"
    } else {
        ct
    };
    if ct.starts_with("audio/") || ct.starts_with("video/") {
        Some(ct.to_string())
    } else {
        None
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn stream_descriptor(response: &RawResponse) -> Result<StreamDescriptor, FetchError> {
    let declared = header_str(&response.headers, "content-type").unwrap_or_default();
    let path = Url::parse(&response.final_url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let content_type =
        accept_stream_content(&declared, &path).ok_or(FetchError::ContentType(declared))?;

    let mut fields = BTreeMap::new();
    for name in ICY_FIELDS {
        if let Some(value) = header_str(&response.headers, name) {
            let value = if name == "icy-url" && !value.is_empty() {
                normalize_url(&value).unwrap_or(value)
            } else {
                value
            };
            fields.insert(name.to_string(), value);
        }
    }

    Ok(StreamDescriptor {
        url: response.final_url.clone(),
        server: header_str(&response.headers, SERVER.as_str()).unwrap_or_default(),
        content_type,
        fields,
    })
}
