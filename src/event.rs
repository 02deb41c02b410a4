//! Page-visit encoding.
//!
//! A visit is stored as the query string the bulk tracking endpoint replays,
//! already wrapped in double quotes:
//!
//! ```text
//! "?idsite=1&url=http://example.com/Sec A/Sub B/&action_name=Sub B&uid=u1&h=3&rec=1"
//! ```
//!
//! Values are concatenated raw; nothing is percent-encoded.

use std::fmt;

/// Site id every visit is recorded under.
pub const SITE_ID: u32 = 1;

/// One encoded page visit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent(String);

impl PendingEvent {
    pub fn as_str(&self) -> &str { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for PendingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a visit to `path` for visitor `uid` on `domain`.
///
/// Returns `None` for an empty path. The page title is the last segment;
/// `options` are appended in the order given.
pub fn encode(
    domain:  &str,
    uid:     &str,
    path:    &[&str],
    options: &[(&str, &str)],
) -> Option<PendingEvent> {
    let title = path.last()?;

    let mut url = String::new();
    for segment in path {
        url.push_str(segment);
        url.push('/');
    }

    let mut msg = format!(
        "\"?idsite={SITE_ID}&url=http://{domain}/{url}&action_name={title}&uid={uid}"
    );
    for (key, value) in options {
        msg.push('&');
        msg.push_str(key);
        msg.push('=');
        msg.push_str(value);
    }
    msg.push_str("&rec=1\"");

    Some(PendingEvent(msg))
}
