use serde::{Deserialize, Serialize};

/// Width used when only a height was requested.
pub const DEFAULT_WIDTH: u32 = 1280;
/// Height used when only a width was requested.
pub const DEFAULT_HEIGHT: u32 = 720;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl Viewport {
    /// Builds a viewport only when at least one dimension was given,
    /// filling the other from the defaults.
    pub fn from_dimensions(width: Option<u32>, height: Option<u32>) -> Option<Self> {
        if width.is_none() && height.is_none() {
            return None;
        }
        Some(Self {
            width: width.unwrap_or(DEFAULT_WIDTH),
            height: height.unwrap_or(DEFAULT_HEIGHT),
        })
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
