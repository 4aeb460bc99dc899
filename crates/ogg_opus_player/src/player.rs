//! 播放门面

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use parking_lot::{Mutex, ReentrantMutex};

use crate::{
    CallbackDispatcher, EngineCommand, EventSink, HostCommand, NativeEvent, NativeEventSource,
    PlaybackSnapshot, PlaybackStatus, PlayerConfig, PlayerError, Reconciler, Track, Transition,
};

/// 播放器内部共享状态
pub(crate) struct Shared {
    /// 串行化闸门：每次更新（修改 -> 转发 -> 通知）整体持有。
    /// 可重入，回调里再调用播放器不会死锁。
    gate: ReentrantMutex<()>,
    /// 状态元组，只在短临界区内持有，调用回调和引擎时从不持有
    core: Mutex<Core>,
    dispatcher: CallbackDispatcher,
    source: Mutex<Option<Arc<dyn NativeEventSource>>>,
    track: Track,
}

struct Core {
    reconciler: Reconciler,
    alive: bool,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(source) = self.source.get_mut().take() {
            source.destroy();
        }
    }
}

/// 单曲播放器
///
/// 可以在任意线程调用，`clone()` 得到的是同一个播放器。
/// 命令只转发给引擎后立即返回，不等待引擎确认；状态变化通过构造时注册的
/// 回调同步通知，回调的参数就是播放器本身。
///
/// 播放到结尾时状态先变为 [`PlaybackStatus::Stopped`]（会通知一次），随后引擎
/// 自动重新加载曲目，播放器回到位置 0 的 [`PlaybackStatus::Paused`]（再通知一次），
/// 无需重新创建即可再次 `play()`。可通过 [`PlayerConfig::rearm_on_end`] 关闭。
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
}

impl Player {
    /// 使用桌面引擎创建播放器
    #[cfg(feature = "desktop")]
    pub fn create<F>(track: impl Into<Track>, on_status_changed: F) -> Result<Self, PlayerError>
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        Self::create_with_config(track, PlayerConfig::default(), on_status_changed)
    }

    #[cfg(feature = "desktop")]
    pub fn create_with_config<F>(
        track: impl Into<Track>,
        config: PlayerConfig,
        on_status_changed: F,
    ) -> Result<Self, PlayerError>
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        Self::with_source(
            track,
            config,
            on_status_changed,
            crate::desktop::DesktopSource::spawn,
        )
    }

    /// 使用任意引擎适配器创建播放器
    ///
    /// `build` 拿到事件入口后构造适配器；构造失败时没有实例可通知，直接返回错误。
    pub fn with_source<S, B, F>(
        track: impl Into<Track>,
        config: PlayerConfig,
        on_status_changed: F,
        build: B,
    ) -> Result<Self, PlayerError>
    where
        S: NativeEventSource + 'static,
        B: FnOnce(&Track, &PlayerConfig, EventSink) -> Result<S, PlayerError>,
        F: Fn(&Player) + Send + Sync + 'static,
    {
        let track = track.into();
        let shared = Arc::new(Shared {
            gate: ReentrantMutex::new(()),
            core: Mutex::new(Core {
                reconciler: Reconciler::new(config.rearm_on_end),
                alive: true,
            }),
            dispatcher: CallbackDispatcher::new(Arc::new(on_status_changed)),
            source: Mutex::new(None),
            track,
        });

        let sink = EventSink::new(Arc::downgrade(&shared));
        let source = build(&shared.track, &config, sink)?;
        *shared.source.lock() = Some(Arc::new(source));

        debug!("player created for {}", shared.track);
        Ok(Self { shared })
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn play(&self) {
        self.handle_command(HostCommand::Play);
    }

    pub fn pause(&self) {
        self.handle_command(HostCommand::Pause);
    }

    /// 跳转；引擎就绪前调用是空操作
    pub fn seek(&self, position: Duration) {
        self.handle_command(HostCommand::Seek(position));
    }

    /// 设置播放速率，立即生效于 [`Player::rate`]，不等待引擎确认
    pub fn set_rate(&self, rate: f64) {
        self.handle_command(HostCommand::SetRate(rate));
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.core.lock().reconciler.status()
    }

    /// 已播放秒数
    pub fn position(&self) -> u64 {
        self.shared.core.lock().reconciler.position()
    }

    /// 总时长（秒），就绪前为 0
    pub fn duration(&self) -> u64 {
        self.shared.core.lock().reconciler.duration()
    }

    pub fn rate(&self) -> f64 {
        self.shared.core.lock().reconciler.rate()
    }

    pub fn is_buffering(&self) -> bool {
        self.shared.core.lock().reconciler.is_buffering()
    }

    pub fn last_error(&self) -> Option<PlayerError> {
        self.shared.core.lock().reconciler.last_error().cloned()
    }

    /// 原子地读取完整状态
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.core.lock().reconciler.snapshot()
    }

    pub fn track(&self) -> &Track {
        &self.shared.track
    }

    pub fn is_destroyed(&self) -> bool {
        !self.shared.core.lock().alive
    }

    /// 销毁播放器，可重复调用
    ///
    /// 先注销回调，再释放引擎。返回后不会再有状态变化或回调，
    /// 即使引擎事件已经在途。
    pub fn destroy(&self) {
        let source = {
            let _gate = self.shared.gate.lock();
            {
                let mut core = self.shared.core.lock();
                if !core.alive {
                    return;
                }
                core.alive = false;
            }
            self.shared.dispatcher.clear();
            self.shared.source.lock().take()
        };

        // 闸门已释放：引擎线程若正阻塞在闸门上，可以看到 alive = false 后退出
        if let Some(source) = source {
            source.destroy();
        }
        debug!("player for {} destroyed", self.shared.track);
    }

    pub(crate) fn handle_event(&self, event: NativeEvent) {
        self.apply(|reconciler| reconciler.on_event(event));
    }

    fn handle_command(&self, cmd: HostCommand) {
        self.apply(|reconciler| reconciler.on_command(cmd));
    }

    /// 一次完整的更新：修改状态 -> 转发引擎命令 -> 通知
    fn apply(&self, input: impl FnOnce(&mut Reconciler) -> Transition) {
        let _gate = self.shared.gate.lock();

        let Some(transition) = self.with_live_core(input) else {
            warn!("player destroyed, input ignored");
            return;
        };

        let failed = self.forward(&transition.commands);

        if transition.rearm {
            // 先让宿主看到 Stopped，再回到可重播状态。
            // 宿主在 Stopped 回调里调用 play() 时保留其结果。
            self.notify();
            if failed.is_none() && self.with_live_core(Reconciler::rearm) != Some(true) {
                return;
            }
        }

        if let Some(err) = failed {
            self.fail(err);
        }
        self.notify();
    }

    /// 引擎拒绝了命令：按引擎错误处理，但不再重试失败后的转发
    fn fail(&self, err: PlayerError) {
        let Some(transition) = self.with_live_core(|r| r.on_event(NativeEvent::Error(err))) else {
            return;
        };
        if let Some(err) = self.forward(&transition.commands) {
            error!("engine failed to settle after error: {}", err);
        }
    }

    fn with_live_core<R>(&self, f: impl FnOnce(&mut Reconciler) -> R) -> Option<R> {
        let mut core = self.shared.core.lock();
        if !core.alive {
            return None;
        }
        Some(f(&mut core.reconciler))
    }

    /// 按顺序转发，返回第一个需要上报的错误
    fn forward(&self, commands: &[EngineCommand]) -> Option<PlayerError> {
        if commands.is_empty() {
            return None;
        }
        let source = self.shared.source.lock().clone()?;

        for cmd in commands {
            let result = match cmd {
                EngineCommand::Play => source.play(),
                EngineCommand::Pause => source.pause(),
                EngineCommand::Seek(pos) => source.seek(*pos),
                EngineCommand::SetRate(rate) => source.set_rate(*rate),
                EngineCommand::Reload => source.reload(),
            };
            match result {
                Ok(()) => {}
                Err(PlayerError::NotReady) => debug!("engine not ready for {:?}", cmd),
                Err(err) => {
                    error!("engine rejected {:?}: {}", cmd, err);
                    return Some(err);
                }
            }
        }
        None
    }

    fn notify(&self) {
        if self.shared.core.lock().alive {
            self.shared.dispatcher.notify(self);
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("track", &self.shared.track)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
