//! Failure classification for the fetch boundary.
//!
//! Every fetch failure collapses to "no payload" for callers; the variants
//! here exist so log lines can carry the transport/protocol/content cause.

/// Why a single fetch produced no payload.
#[derive(Debug)]
pub enum FetchError {
    /// Unsupported scheme or unparseable URL.
    InvalidUrl(String),
    /// Connection refused/reset, DNS failure, or timeout.
    Connection(String),
    /// Redirect limit exceeded.
    TooManyRedirects,
    /// Any HTTP status other than 200 or 304.
    Status(u16),
    /// Streaming fetch against a non-media content-type.
    ContentType(String),
    /// Body exceeded the caller-supplied size cap.
    TooLarge { size: usize, max: usize },
    /// Body was not valid UTF-8 while normalization was required.
    NotUtf8,
    /// Anything else from the HTTP stack.
    Other(String),
}

impl FetchError {
    /// Short tag for diagnostic log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "InvalidURL",
            Self::Connection(_) => "ConnectionError",
            Self::TooManyRedirects => "TooManyRedirects",
            Self::Status(_) => "HttpStatus",
            Self::ContentType(_) => "ContentType",
            Self::TooLarge { .. } => "MaxSize",
            Self::NotUtf8 => "NotUtf8",
            Self::Other(_) => "OtherError",
        }
    }

    /// Classify a transport-level reqwest error.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_redirect() {
            Self::TooManyRedirects
        } else if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else if e.is_connect() || e.is_timeout() {
            Self::Connection(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "invalid url: {url}"),
            Self::Connection(msg) => write!(f, "connection failed: {msg}"),
            Self::TooManyRedirects => write!(f, "too many redirects"),
            Self::Status(code) => write!(f, "unexpected HTTP status {code}"),
            Self::ContentType(ct) => write!(f, "not a media content-type: {ct}"),
            Self::TooLarge { size, max } => {
                write!(f, "body size {size} exceeds cap {max}")
            }
            Self::NotUtf8 => write!(f, "body is not valid UTF-8"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FetchError {}
