//! 播放器配置

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// 配置错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 播放器配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// 位置更新间隔（毫秒）
    pub position_interval_ms: u64,
    /// 输出缓冲大小（采样数）
    pub buffer_size: usize,
    /// 播放结束后是否自动重新加载并回到可重播状态
    pub rearm_on_end: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: 100,
            buffer_size: 8192,
            rearm_on_end: true,
        }
    }
}

impl PlayerConfig {
    /// 从 JSON 文件读取，缺省字段使用默认值
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PlayerConfig::from_json_str(r#"{"rearm_on_end": false}"#).unwrap();
        assert!(!config.rearm_on_end);
        assert_eq!(config.position_interval_ms, 100);
        assert_eq!(config.buffer_size, 8192);
    }

    #[test]
    fn test_invalid_json() {
        let err = PlayerConfig::from_json_str(r#"{"buffer_size": "big"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = PlayerConfig {
            position_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.position_interval(), Duration::from_millis(1));
    }
}
