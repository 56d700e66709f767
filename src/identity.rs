use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a video, used as the key across status tracking,
/// transcript storage, and media file naming.
///
/// Uploads are salted so repeated uploads of the same filename never
/// collide. Remote sources hash the raw URL string, so the same URL always
/// maps to the same identifier while two different URL strings for the same
/// video map to different ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Identifier for an uploaded file. A fresh UUID salt keeps re-uploads
    /// of identically-named files apart.
    pub fn for_upload(filename: &str) -> Self {
        let salted = format!("{}{}", filename, uuid::Uuid::new_v4());
        Self(format!("{:x}", md5::compute(salted.as_bytes())))
    }

    /// Deterministic identifier for a remote source URL.
    pub fn for_url(url: &str) -> Self {
        Self(format!("{:x}", md5::compute(url.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_ids_are_deterministic() {
        let url = "https://www.youtube.com/watch?v=abc123";
        assert_eq!(VideoId::for_url(url), VideoId::for_url(url));
    }

    #[test]
    fn different_url_strings_yield_different_ids() {
        // Two spellings of the same video are distinct keys. Accepted
        // behavior: the cache is keyed on the raw string, not the video.
        let a = VideoId::for_url("https://www.youtube.com/watch?v=abc123");
        let b = VideoId::for_url("https://youtu.be/abc123");
        assert_ne!(a, b);
    }

    #[test]
    fn upload_ids_never_collide_for_same_filename() {
        let a = VideoId::for_upload("lecture.mp4");
        let b = VideoId::for_upload("lecture.mp4");
        assert_ne!(a, b);
    }
}
