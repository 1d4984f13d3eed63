use serde::{Deserialize, Serialize};

/// A canonical Spotify track. Both the resolved seed and every resolved
/// recommendation use this shape; once built it is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub uri: String,
    pub popularity: u32,
    pub preview_url: Option<String>,
    pub image_url: Option<String>,
}

impl Track {
    /// Artists joined for prompts and display, e.g. "The Weeknd, Daft Punk".
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackDevice {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}
