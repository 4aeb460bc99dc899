//! 播放器错误

use serde::Serialize;

/// 播放器错误
///
/// 引擎侧的错误在适配器边界被捕获，以 [`NativeEvent::Error`](crate::NativeEvent::Error)
/// 的形式交给协调器，再通过状态回调告知宿主，不会从宿主调用中返回。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum PlayerError {
    /// 资源无法打开或解码
    #[error("Load failure: {0}")]
    LoadFailure(String),
    /// 渲染过程中的引擎错误
    #[error("Playback failure: {0}")]
    PlaybackFailure(String),
    /// 引擎尚未就绪，调用方按空操作处理
    #[error("Engine not ready")]
    NotReady,
}

impl PlayerError {
    pub fn load(cause: impl Into<String>) -> Self {
        PlayerError::LoadFailure(cause.into())
    }

    pub fn playback(cause: impl Into<String>) -> Self {
        PlayerError::PlaybackFailure(cause.into())
    }

    /// 错误描述（不含分类前缀）
    pub fn cause(&self) -> &str {
        match self {
            PlayerError::LoadFailure(c) | PlayerError::PlaybackFailure(c) => c,
            PlayerError::NotReady => "not ready",
        }
    }
}
