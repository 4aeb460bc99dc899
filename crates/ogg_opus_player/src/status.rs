//! 播放状态

use serde::Serialize;

use crate::PlayerError;

/// 对外暴露的播放状态
///
/// 数值与宿主侧（Dart/Kotlin/Swift）的枚举保持一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum PlaybackStatus {
    /// 已加载但尚未就绪或尚未开始
    #[default]
    Initial = 0,
    Playing = 1,
    /// 就绪但未播放：主动暂停、加载后空闲或出错
    Paused = 2,
    /// 自然播放结束
    Stopped = 3,
}

impl PlaybackStatus {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(PlaybackStatus::Initial),
            1 => Some(PlaybackStatus::Playing),
            2 => Some(PlaybackStatus::Paused),
            3 => Some(PlaybackStatus::Stopped),
            _ => None,
        }
    }
}

/// 某一时刻完整的对外状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    /// 已播放秒数
    pub position: u64,
    /// 总时长（秒），就绪前为 0
    pub duration: u64,
    pub rate: f64,
    pub buffering: bool,
    /// 最近一次引擎错误，下一次 `play()` 时清除
    pub error: Option<PlayerError>,
}
