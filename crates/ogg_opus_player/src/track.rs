//! 曲目

use std::fmt;
use std::path::PathBuf;

/// 曲目：本地文件路径或 URI，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    uri: String,
}

impl Track {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// 解析成本地文件路径；非 `file://` 的 URI 返回 `None`
    pub fn path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.uri.strip_prefix("file://") {
            // file:///abs/path 或 file://localhost/abs/path
            let rest = rest.strip_prefix("localhost").unwrap_or(rest);
            return Some(PathBuf::from(rest));
        }
        if self.uri.is_empty() || self.uri.contains("://") {
            return None;
        }
        Some(PathBuf::from(&self.uri))
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl From<&str> for Track {
    fn from(uri: &str) -> Self {
        Track::new(uri)
    }
}

impl From<String> for Track {
    fn from(uri: String) -> Self {
        Track::new(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_path() {
        assert_eq!(
            Track::new("/sdcard/voice.ogg").path(),
            Some(PathBuf::from("/sdcard/voice.ogg"))
        );
        assert_eq!(
            Track::new("file:///tmp/a.ogg").path(),
            Some(PathBuf::from("/tmp/a.ogg"))
        );
        assert_eq!(
            Track::new("file://localhost/tmp/a.ogg").path(),
            Some(PathBuf::from("/tmp/a.ogg"))
        );
        assert_eq!(Track::new("https://example.com/a.ogg").path(), None);
        assert_eq!(Track::new("").path(), None);
    }
}
