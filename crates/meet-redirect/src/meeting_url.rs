//! Classification of navigation targets against the meeting application's
//! URL scheme.

use url::Url;

use crate::config::MeetingConfig;

/// A navigation target that lies within the meeting origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingUrl {
    raw: String,
    fragment: String,
    new_meeting: bool,
}

impl MeetingUrl {
    /// Returns `None` when `raw` is not a URL within the configured origin.
    pub fn classify(raw: &str, config: &MeetingConfig) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        if !within_origin(&url, &config.origin) {
            return None;
        }

        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.find(|segment| !segment.is_empty()))
            .unwrap_or("");
        let fragment = match url.query() {
            Some(query) if !segment.is_empty() => format!("{segment}?{query}"),
            _ => segment.to_string(),
        };

        Some(Self {
            raw: raw.to_string(),
            new_meeting: segment == config.new_meeting_marker,
            fragment,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The meeting code plus any query string, e.g. `abc-defg-hij?authuser=1`.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn is_new_meeting(&self) -> bool {
        self.new_meeting
    }

    /// Whether the fragment names an internal page rather than a meeting.
    pub fn is_passthrough(&self, config: &MeetingConfig) -> bool {
        config
            .passthrough_markers
            .iter()
            .any(|marker| self.fragment.starts_with(marker.as_str()))
    }
}

/// Checks scheme and host (and port, when explicit) against `origin`.
pub fn within_origin(url: &Url, origin: &str) -> bool {
    let Ok(origin) = Url::parse(origin) else {
        return false;
    };
    url.scheme() == origin.scheme()
        && url.host_str().is_some()
        && url.host_str() == origin.host_str()
        && url.port_or_known_default() == origin.port_or_known_default()
}

/// String form of [`within_origin`] for URLs reported by the browser.
pub fn is_meeting_origin(raw: &str, config: &MeetingConfig) -> bool {
    Url::parse(raw)
        .map(|url| within_origin(&url, &config.origin))
        .unwrap_or(false)
}
