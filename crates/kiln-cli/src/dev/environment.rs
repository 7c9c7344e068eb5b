//! Browser family of a connected page, taken from its `User-Agent`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    Chrome,
    Edge,
    Firefox,
    Safari,
    #[default]
    Other,
}

impl Environment {
    /// Classify a `User-Agent` header.
    ///
    /// Edge and Chrome both claim to be Safari, and Edge also claims to be
    /// Chrome, so the more specific tokens are checked first.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Edg/") {
            Environment::Edge
        } else if user_agent.contains("Firefox/") {
            Environment::Firefox
        } else if user_agent.contains("Chrome/") {
            Environment::Chrome
        } else if user_agent.contains("Safari/") {
            Environment::Safari
        } else {
            Environment::Other
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Chrome => "Chrome",
            Environment::Edge => "Edge",
            Environment::Firefox => "Firefox",
            Environment::Safari => "Safari",
            Environment::Other => "other",
        };
        f.write_str(name)
    }
}
