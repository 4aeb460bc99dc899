//! 状态协调器
//!
//! 唯一持有权威播放状态的组件。所有输入（规范事件和宿主命令）都会重新计算
//! 完整的对外状态，并返回需要转发给引擎的命令。协调器本身不加锁、不做 IO，
//! 串行化由 [`Player`](crate::Player) 负责。

use std::time::Duration;

use log::{debug, warn};

use crate::{
    EngineCommand, HostCommand, NativeEvent, PlaybackSnapshot, PlaybackStatus, PlayerError,
};

/// 一次输入产生的副作用
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    /// 需要转发给引擎的命令，按顺序执行
    pub commands: Vec<EngineCommand>,
    /// 命令执行完后需要调用 [`Reconciler::rearm`]
    pub rearm: bool,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    fn forward(cmd: EngineCommand) -> Self {
        Self {
            commands: vec![cmd],
            rearm: false,
        }
    }
}

/// 状态协调器
#[derive(Debug, Clone)]
pub struct Reconciler {
    status: PlaybackStatus,
    position: u64,
    duration: u64,
    rate: f64,
    /// 引擎已报告就绪
    ready: bool,
    /// 宿主希望播放（就绪前收到的 play 会在就绪时生效）
    play_when_ready: bool,
    buffering: bool,
    last_error: Option<PlayerError>,
    rearm_on_end: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reconciler {
    pub fn new(rearm_on_end: bool) -> Self {
        Self {
            status: PlaybackStatus::Initial,
            position: 0,
            duration: 0,
            rate: 1.0,
            ready: false,
            play_when_ready: false,
            buffering: false,
            last_error: None,
            rearm_on_end,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status: self.status,
            position: self.position,
            duration: self.duration,
            rate: self.rate,
            buffering: self.buffering,
            error: self.last_error.clone(),
        }
    }

    /// 处理引擎事件
    pub fn on_event(&mut self, event: NativeEvent) -> Transition {
        debug!("event {:?} in {:?}", event, self.status);
        match event {
            NativeEvent::Ready { duration_secs } => {
                self.duration = duration_secs;
                self.ready = true;
                self.buffering = false;
                self.position = self.clamp(self.position);
                if self.status == PlaybackStatus::Initial && self.play_when_ready {
                    self.status = PlaybackStatus::Playing;
                }
                Transition::none()
            }
            NativeEvent::TimeUpdate { position_ms } => {
                let secs = u64::try_from(position_ms / 1000).unwrap_or(0);
                self.position = self.clamp(secs);
                Transition::none()
            }
            NativeEvent::TimeUnknown => {
                self.status = PlaybackStatus::Initial;
                self.position = 0;
                Transition::none()
            }
            NativeEvent::Ended => {
                self.status = PlaybackStatus::Stopped;
                self.position = 0;
                self.play_when_ready = false;
                self.buffering = false;
                let mut commands = vec![EngineCommand::Seek(Duration::ZERO)];
                if self.rearm_on_end {
                    commands.push(EngineCommand::Reload);
                }
                Transition {
                    commands,
                    rearm: self.rearm_on_end,
                }
            }
            NativeEvent::Error(cause) => {
                self.status = PlaybackStatus::Paused;
                self.play_when_ready = false;
                self.buffering = false;
                self.last_error = Some(cause);
                Transition::forward(EngineCommand::Pause)
            }
            NativeEvent::BufferingStateChanged(buffering) => {
                self.buffering = buffering;
                Transition::none()
            }
        }
    }

    /// 处理宿主命令
    pub fn on_command(&mut self, cmd: HostCommand) -> Transition {
        debug!("command {:?} in {:?}", cmd, self.status);
        match cmd {
            HostCommand::Play => {
                self.last_error = None;
                self.play_when_ready = true;
                if self.ready {
                    self.status = PlaybackStatus::Playing;
                }
                Transition::forward(EngineCommand::Play)
            }
            HostCommand::Pause => {
                self.play_when_ready = false;
                if self.status == PlaybackStatus::Playing {
                    self.status = PlaybackStatus::Paused;
                }
                Transition::forward(EngineCommand::Pause)
            }
            HostCommand::Seek(target) => {
                if !self.ready {
                    debug!("seek before ready ignored");
                    return Transition::none();
                }
                let target = target.min(Duration::from_secs(self.duration));
                self.position = target.as_secs();
                Transition::forward(EngineCommand::Seek(target))
            }
            HostCommand::SetRate(rate) => {
                if !rate.is_finite() || rate <= 0.0 {
                    warn!("ignoring invalid playback rate {}", rate);
                    return Transition::none();
                }
                self.rate = rate;
                Transition::forward(EngineCommand::SetRate(rate))
            }
        }
    }

    /// 播放结束、引擎重新加载之后回到可重播状态
    ///
    /// 只在仍处于 `Stopped` 时生效，返回是否发生了重置。
    pub fn rearm(&mut self) -> bool {
        if self.status != PlaybackStatus::Stopped {
            return false;
        }
        self.status = PlaybackStatus::Paused;
        self.position = 0;
        self.play_when_ready = false;
        self.buffering = false;
        true
    }

    /// 位置始终在 `[0, duration]` 内；就绪前时长为 0
    fn clamp(&self, secs: u64) -> u64 {
        secs.min(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(reconciler: &mut Reconciler, duration_secs: u64) {
        reconciler.on_event(NativeEvent::Ready { duration_secs });
    }

    #[test]
    fn test_ready_then_play() {
        let mut r = Reconciler::default();
        assert_eq!(r.status(), PlaybackStatus::Initial);
        assert_eq!(r.duration(), 0);

        ready(&mut r, 120);
        assert_eq!(r.status(), PlaybackStatus::Initial);
        assert_eq!(r.duration(), 120);

        let t = r.on_command(HostCommand::Play);
        assert_eq!(t.commands, vec![EngineCommand::Play]);
        assert_eq!(r.status(), PlaybackStatus::Playing);

        // 重复或过期的事件不改变 Playing
        ready(&mut r, 120);
        r.on_event(NativeEvent::TimeUpdate { position_ms: 30_000 });
        r.on_event(NativeEvent::TimeUpdate { position_ms: 30_000 });
        r.on_event(NativeEvent::BufferingStateChanged(true));
        assert_eq!(r.status(), PlaybackStatus::Playing);
        assert_eq!(r.position(), 30);
        assert!(r.is_buffering());

        r.on_command(HostCommand::Pause);
        assert_eq!(r.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn test_play_before_ready() {
        let mut r = Reconciler::default();
        let t = r.on_command(HostCommand::Play);
        assert_eq!(t.commands, vec![EngineCommand::Play]);
        assert_eq!(r.status(), PlaybackStatus::Initial);

        ready(&mut r, 10);
        assert_eq!(r.status(), PlaybackStatus::Playing);
    }

    #[test]
    fn test_pause_before_ready_cancels_pending_play() {
        let mut r = Reconciler::default();
        r.on_command(HostCommand::Play);
        r.on_command(HostCommand::Pause);
        ready(&mut r, 10);
        assert_eq!(r.status(), PlaybackStatus::Initial);
    }

    #[test]
    fn test_position_clamped() {
        let mut r = Reconciler::default();
        r.on_event(NativeEvent::TimeUpdate { position_ms: -500 });
        assert_eq!(r.position(), 0);

        // 就绪前时长为 0，位置也只能是 0
        r.on_event(NativeEvent::TimeUpdate { position_ms: 30_000 });
        assert_eq!(r.duration(), 0);
        assert_eq!(r.position(), 0);

        ready(&mut r, 3);
        r.on_event(NativeEvent::TimeUpdate { position_ms: 2_900 });
        assert_eq!(r.position(), 2);
        r.on_event(NativeEvent::TimeUpdate { position_ms: 99_000 });
        assert_eq!(r.position(), 3);
        r.on_event(NativeEvent::TimeUpdate { position_ms: i64::MAX });
        assert_eq!(r.position(), 3);
    }

    #[test]
    fn test_unknown_length_pins_position_to_zero() {
        let mut r = Reconciler::default();
        ready(&mut r, 0);

        let t = r.on_command(HostCommand::Seek(Duration::MAX));
        assert_eq!(t.commands, vec![EngineCommand::Seek(Duration::ZERO)]);
        assert_eq!(r.position(), 0);

        r.on_event(NativeEvent::TimeUpdate { position_ms: 45_000 });
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_time_unknown_forces_initial() {
        let mut r = Reconciler::default();
        ready(&mut r, 60);
        r.on_command(HostCommand::Play);
        r.on_event(NativeEvent::TimeUpdate { position_ms: 12_000 });

        r.on_event(NativeEvent::TimeUnknown);
        assert_eq!(r.status(), PlaybackStatus::Initial);
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_ended_rearms() {
        let mut r = Reconciler::default();
        ready(&mut r, 120);
        r.on_command(HostCommand::Play);
        r.on_event(NativeEvent::TimeUpdate { position_ms: 119_000 });

        let t = r.on_event(NativeEvent::Ended);
        assert_eq!(r.status(), PlaybackStatus::Stopped);
        assert_eq!(r.position(), 0);
        assert_eq!(
            t.commands,
            vec![EngineCommand::Seek(Duration::ZERO), EngineCommand::Reload]
        );
        assert!(t.rearm);

        assert!(r.rearm());
        assert_eq!(r.status(), PlaybackStatus::Paused);
        assert_eq!(r.duration(), 120);
        assert!(!r.rearm());

        r.on_command(HostCommand::Play);
        assert_eq!(r.status(), PlaybackStatus::Playing);
    }

    #[test]
    fn test_ended_without_rearm_stays_stopped() {
        let mut r = Reconciler::new(false);
        ready(&mut r, 5);
        r.on_command(HostCommand::Play);

        let t = r.on_event(NativeEvent::Ended);
        assert_eq!(t.commands, vec![EngineCommand::Seek(Duration::ZERO)]);
        assert!(!t.rearm);
        assert_eq!(r.status(), PlaybackStatus::Stopped);

        r.on_event(NativeEvent::TimeUpdate { position_ms: 0 });
        assert_eq!(r.status(), PlaybackStatus::Stopped);

        r.on_command(HostCommand::Play);
        assert_eq!(r.status(), PlaybackStatus::Playing);
    }

    #[test]
    fn test_error_pauses_and_is_cleared_by_play() {
        let mut r = Reconciler::default();
        ready(&mut r, 30);
        r.on_command(HostCommand::Play);

        let t = r.on_event(NativeEvent::Error(PlayerError::playback("decode failure")));
        assert_eq!(t.commands, vec![EngineCommand::Pause]);
        assert_eq!(r.status(), PlaybackStatus::Paused);
        assert_eq!(
            r.last_error(),
            Some(&PlayerError::playback("decode failure"))
        );

        r.on_command(HostCommand::Play);
        assert_eq!(r.status(), PlaybackStatus::Playing);
        assert_eq!(r.last_error(), None);
    }

    #[test]
    fn test_load_failure_before_ready() {
        let mut r = Reconciler::default();
        r.on_event(NativeEvent::Error(PlayerError::load("no such file")));
        assert_eq!(r.status(), PlaybackStatus::Paused);

        // 未就绪时 play 不会进入 Playing
        r.on_command(HostCommand::Play);
        assert_eq!(r.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn test_seek() {
        let mut r = Reconciler::default();
        let t = r.on_command(HostCommand::Seek(Duration::from_secs(5)));
        assert!(t.commands.is_empty());
        assert_eq!(r.position(), 0);

        ready(&mut r, 60);
        let t = r.on_command(HostCommand::Seek(Duration::from_millis(12_500)));
        assert_eq!(
            t.commands,
            vec![EngineCommand::Seek(Duration::from_millis(12_500))]
        );
        assert_eq!(r.position(), 12);

        let t = r.on_command(HostCommand::Seek(Duration::from_secs(90)));
        assert_eq!(
            t.commands,
            vec![EngineCommand::Seek(Duration::from_secs(60))]
        );
        assert_eq!(r.position(), 60);

        let t = r.on_command(HostCommand::Seek(Duration::MAX));
        assert_eq!(
            t.commands,
            vec![EngineCommand::Seek(Duration::from_secs(60))]
        );
        assert_eq!(r.position(), 60);
    }

    #[test]
    fn test_rate() {
        let mut r = Reconciler::default();
        assert_eq!(r.rate(), 1.0);

        let t = r.on_command(HostCommand::SetRate(1.5));
        assert_eq!(t.commands, vec![EngineCommand::SetRate(1.5)]);
        assert_eq!(r.rate(), 1.5);

        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let t = r.on_command(HostCommand::SetRate(bad));
            assert!(t.commands.is_empty());
        }
        assert_eq!(r.rate(), 1.5);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut r = Reconciler::default();
        ready(&mut r, 60);
        r.on_command(HostCommand::Play);
        r.on_command(HostCommand::Pause);
        let before = r.snapshot();

        r.on_command(HostCommand::Pause);
        assert_eq!(r.snapshot(), before);
    }

    #[test]
    fn test_status_always_defined() {
        let events = [
            NativeEvent::Ready { duration_secs: 8 },
            NativeEvent::TimeUpdate { position_ms: 4_000 },
            NativeEvent::TimeUnknown,
            NativeEvent::Ended,
            NativeEvent::Error(PlayerError::load("x")),
            NativeEvent::BufferingStateChanged(true),
            NativeEvent::BufferingStateChanged(false),
        ];
        let commands = [
            HostCommand::Play,
            HostCommand::Pause,
            HostCommand::Seek(Duration::from_secs(2)),
            HostCommand::SetRate(2.0),
        ];

        // 穷举两步组合
        for first in 0..events.len() + commands.len() {
            for second in 0..events.len() + commands.len() {
                let mut r = Reconciler::default();
                for step in [first, second] {
                    let t = if step < events.len() {
                        r.on_event(events[step].clone())
                    } else {
                        r.on_command(commands[step - events.len()].clone())
                    };
                    if t.rearm {
                        r.rearm();
                    }
                    assert!(PlaybackStatus::from_i32(r.status().as_i32()).is_some());
                    assert!(r.position() <= r.duration());
                }
            }
        }
    }
}
