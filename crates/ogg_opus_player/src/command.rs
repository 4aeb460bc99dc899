//! 命令和规范事件定义

use std::time::Duration;

use crate::PlayerError;

/// 宿主命令（宿主 -> 协调器）
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// 播放
    Play,
    /// 暂停
    Pause,
    /// 跳转到指定位置
    Seek(Duration),
    /// 设置播放速率
    SetRate(f64),
}

/// 引擎命令（协调器 -> 原生引擎）
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Play,
    Pause,
    Seek(Duration),
    SetRate(f64),
    /// 重新加载曲目（播放结束后自动重置用）
    Reload,
}

/// 规范事件（原生引擎 -> 协调器）
///
/// 各平台适配器把引擎自己的通知翻译成这几种事件。
/// 事件可能在任意线程到达，可能重复，也可能乱序。
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// 引擎就绪，时长已知（秒）
    Ready { duration_secs: u64 },
    /// 周期性的位置更新（毫秒）
    TimeUpdate { position_ms: i64 },
    /// 引擎报告时间未知，视为尚未就绪
    TimeUnknown,
    /// 自然播放结束
    Ended,
    /// 引擎错误
    Error(PlayerError),
    /// 缓冲状态变化
    BufferingStateChanged(bool),
}
