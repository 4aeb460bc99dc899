//! VLCKit 通知翻译

use crate::{NativeEvent, PlayerError};

/// `VLCMediaPlayerState` 原始值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum VlcState {
    Stopped = 0,
    Opening = 1,
    Buffering = 2,
    Ended = 3,
    Error = 4,
    Playing = 5,
    Paused = 6,
    EsAdded = 7,
}

impl VlcState {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(VlcState::Stopped),
            1 => Some(VlcState::Opening),
            2 => Some(VlcState::Buffering),
            3 => Some(VlcState::Ended),
            4 => Some(VlcState::Error),
            5 => Some(VlcState::Playing),
            6 => Some(VlcState::Paused),
            7 => Some(VlcState::EsAdded),
            _ => None,
        }
    }
}

/// VLCKit 通知翻译器
///
/// VLC 播放到结尾时可能先报 `Ended` 再报 `Stopped`，也可能只报 `Stopped`；
/// 两种情况都只产生一次 [`NativeEvent::Ended`]。
#[derive(Debug, Default)]
pub struct VlcTranslator {
    ended: bool,
    buffering: bool,
    reported_length: Option<u64>,
}

impl VlcTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `state` 属性变化
    pub fn on_state(&mut self, raw: i32) -> Vec<NativeEvent> {
        let mut events = Vec::new();
        let Some(state) = VlcState::from_raw(raw) else {
            return events;
        };

        match state {
            VlcState::Opening | VlcState::Buffering => {
                self.ended = false;
                if !self.buffering {
                    self.buffering = true;
                    events.push(NativeEvent::BufferingStateChanged(true));
                }
            }
            VlcState::Playing | VlcState::Paused => {
                self.ended = false;
                self.finish_buffering(&mut events);
            }
            VlcState::Ended => {
                self.finish_buffering(&mut events);
                if !self.ended {
                    self.ended = true;
                    events.push(NativeEvent::Ended);
                }
            }
            VlcState::Stopped => {
                self.finish_buffering(&mut events);
                if self.ended {
                    // 紧跟在 Ended 之后的 Stopped
                    self.ended = false;
                } else {
                    events.push(NativeEvent::Ended);
                }
            }
            VlcState::Error => {
                self.finish_buffering(&mut events);
                events.push(NativeEvent::Error(PlayerError::playback(
                    "VLC media player error",
                )));
            }
            VlcState::EsAdded => {}
        }
        events
    }

    /// `time` 属性变化；时间值为空（显示为 `--:--`）时传 `None`
    pub fn on_time(&self, time_ms: Option<i64>) -> NativeEvent {
        match time_ms {
            Some(position_ms) => NativeEvent::TimeUpdate { position_ms },
            None => NativeEvent::TimeUnknown,
        }
    }

    /// 媒体长度已知
    pub fn on_length(&mut self, length_ms: i64) -> Option<NativeEvent> {
        if length_ms <= 0 {
            return None;
        }
        let duration_secs = (length_ms / 1000) as u64;
        if self.reported_length == Some(duration_secs) {
            return None;
        }
        self.reported_length = Some(duration_secs);
        Some(NativeEvent::Ready { duration_secs })
    }

    /// 重新加载媒体后调用，允许再次上报长度
    pub fn reset(&mut self) {
        self.reported_length = None;
        self.buffering = false;
    }

    fn finish_buffering(&mut self, events: &mut Vec<NativeEvent>) {
        if self.buffering {
            self.buffering = false;
            events.push(NativeEvent::BufferingStateChanged(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_play() {
        let mut t = VlcTranslator::new();
        assert_eq!(
            t.on_state(VlcState::Opening as i32),
            vec![NativeEvent::BufferingStateChanged(true)]
        );
        assert!(t.on_state(VlcState::Buffering as i32).is_empty());
        assert_eq!(
            t.on_state(VlcState::Playing as i32),
            vec![NativeEvent::BufferingStateChanged(false)]
        );
        assert!(t.on_state(VlcState::EsAdded as i32).is_empty());
        assert!(t.on_state(42).is_empty());
    }

    #[test]
    fn test_end_reported_once() {
        let mut t = VlcTranslator::new();
        assert_eq!(t.on_state(VlcState::Ended as i32), vec![NativeEvent::Ended]);
        assert!(t.on_state(VlcState::Stopped as i32).is_empty());

        // 只有 Stopped 也视为播放结束
        assert_eq!(
            t.on_state(VlcState::Stopped as i32),
            vec![NativeEvent::Ended]
        );
    }

    #[test]
    fn test_error() {
        let mut t = VlcTranslator::new();
        let events = t.on_state(VlcState::Error as i32);
        assert!(matches!(
            events.as_slice(),
            [NativeEvent::Error(PlayerError::PlaybackFailure(_))]
        ));
    }

    #[test]
    fn test_time_and_length() {
        let mut t = VlcTranslator::new();
        assert_eq!(t.on_time(None), NativeEvent::TimeUnknown);
        assert_eq!(
            t.on_time(Some(2_000)),
            NativeEvent::TimeUpdate { position_ms: 2_000 }
        );

        assert_eq!(t.on_length(0), None);
        assert_eq!(
            t.on_length(61_000),
            Some(NativeEvent::Ready { duration_secs: 61 })
        );
        assert_eq!(t.on_length(61_000), None);

        t.reset();
        assert_eq!(
            t.on_length(61_000),
            Some(NativeEvent::Ready { duration_secs: 61 })
        );
    }
}
