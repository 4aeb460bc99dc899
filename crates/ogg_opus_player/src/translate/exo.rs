//! ExoPlayer (media3) 通知翻译

use crate::{NativeEvent, PlayerError};

/// `Player.STATE_IDLE`
pub const EXO_STATE_IDLE: i32 = 1;
/// `Player.STATE_BUFFERING`
pub const EXO_STATE_BUFFERING: i32 = 2;
/// `Player.STATE_READY`
pub const EXO_STATE_READY: i32 = 3;
/// `Player.STATE_ENDED`
pub const EXO_STATE_ENDED: i32 = 4;

/// `C.TIME_UNSET`
pub const EXO_TIME_UNSET: i64 = i64::MIN + 1;

/// ExoPlayer 通知翻译器
///
/// ExoPlayer 用 `playbackState` + `playWhenReady` 两个字段表达状态，
/// 这里只取前者；是否播放由宿主命令决定。
#[derive(Debug, Default)]
pub struct ExoTranslator {
    last_state: Option<i32>,
    buffering: bool,
    reported_duration: Option<u64>,
}

impl ExoTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `onPlaybackStateChanged`，`duration_ms` 取自 `player.duration`
    pub fn on_playback_state_changed(&mut self, state: i32, duration_ms: i64) -> Vec<NativeEvent> {
        let mut events = Vec::new();
        let repeated = self.last_state == Some(state);
        self.last_state = Some(state);

        match state {
            EXO_STATE_BUFFERING => {
                if !self.buffering {
                    self.buffering = true;
                    events.push(NativeEvent::BufferingStateChanged(true));
                }
            }
            EXO_STATE_READY => {
                self.finish_buffering(&mut events);
                let duration_secs = duration_secs(duration_ms);
                if !repeated || self.reported_duration != Some(duration_secs) {
                    self.reported_duration = Some(duration_secs);
                    events.push(NativeEvent::Ready { duration_secs });
                }
            }
            EXO_STATE_ENDED => {
                self.finish_buffering(&mut events);
                if !repeated {
                    events.push(NativeEvent::Ended);
                }
            }
            // IDLE：停止或出错后，错误另有回调
            _ => self.finish_buffering(&mut events),
        }
        events
    }

    /// `onPlayerError`，按 `PlaybackException.errorCode` 分类
    pub fn on_player_error(&mut self, error_code: i32, message: &str) -> NativeEvent {
        self.buffering = false;
        let cause = format!("{} (code {})", message, error_code);
        // 2xxx: IO，3xxx: 解析
        let err = if (2000..4000).contains(&error_code) {
            PlayerError::LoadFailure(cause)
        } else {
            PlayerError::PlaybackFailure(cause)
        };
        NativeEvent::Error(err)
    }

    /// 位置轮询（`player.currentPosition`）
    pub fn on_position(&self, position_ms: i64) -> NativeEvent {
        if position_ms == EXO_TIME_UNSET {
            NativeEvent::TimeUnknown
        } else {
            NativeEvent::TimeUpdate { position_ms }
        }
    }

    fn finish_buffering(&mut self, events: &mut Vec<NativeEvent>) {
        if self.buffering {
            self.buffering = false;
            events.push(NativeEvent::BufferingStateChanged(false));
        }
    }
}

fn duration_secs(duration_ms: i64) -> u64 {
    if duration_ms == EXO_TIME_UNSET || duration_ms < 0 {
        0
    } else {
        (duration_ms / 1000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_sequence() {
        let mut t = ExoTranslator::new();
        assert_eq!(
            t.on_playback_state_changed(EXO_STATE_BUFFERING, EXO_TIME_UNSET),
            vec![NativeEvent::BufferingStateChanged(true)]
        );
        assert_eq!(
            t.on_playback_state_changed(EXO_STATE_READY, 120_500),
            vec![
                NativeEvent::BufferingStateChanged(false),
                NativeEvent::Ready { duration_secs: 120 }
            ]
        );
        // 重复的 READY 不再上报
        assert!(t
            .on_playback_state_changed(EXO_STATE_READY, 120_500)
            .is_empty());
    }

    #[test]
    fn test_ended_once() {
        let mut t = ExoTranslator::new();
        t.on_playback_state_changed(EXO_STATE_READY, 5_000);
        assert_eq!(
            t.on_playback_state_changed(EXO_STATE_ENDED, 5_000),
            vec![NativeEvent::Ended]
        );
        assert!(t.on_playback_state_changed(EXO_STATE_ENDED, 5_000).is_empty());

        // seekTo(0) 之后重新缓冲、就绪
        t.on_playback_state_changed(EXO_STATE_BUFFERING, 5_000);
        let events = t.on_playback_state_changed(EXO_STATE_READY, 5_000);
        assert!(events.contains(&NativeEvent::Ready { duration_secs: 5 }));
    }

    #[test]
    fn test_idle_emits_nothing() {
        let mut t = ExoTranslator::new();
        assert!(t
            .on_playback_state_changed(EXO_STATE_IDLE, EXO_TIME_UNSET)
            .is_empty());
    }

    #[test]
    fn test_error_classification() {
        let mut t = ExoTranslator::new();
        assert_eq!(
            t.on_player_error(2005, "file not found"),
            NativeEvent::Error(PlayerError::load("file not found (code 2005)"))
        );
        assert_eq!(
            t.on_player_error(4003, "decoding failed"),
            NativeEvent::Error(PlayerError::playback("decoding failed (code 4003)"))
        );
    }

    #[test]
    fn test_position() {
        let t = ExoTranslator::new();
        assert_eq!(t.on_position(EXO_TIME_UNSET), NativeEvent::TimeUnknown);
        assert_eq!(
            t.on_position(1_500),
            NativeEvent::TimeUpdate { position_ms: 1_500 }
        );
    }
}
