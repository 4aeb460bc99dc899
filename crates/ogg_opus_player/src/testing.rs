//! 测试替身：记录转发的命令，并通过事件入口注入引擎事件

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{
    EngineCommand, EventSink, NativeEvent, NativeEventSource, PlaybackSnapshot, PlaybackStatus,
    Player, PlayerConfig, PlayerError, StatusObserver,
};

#[derive(Default)]
pub(crate) struct FakeOptions {
    /// `play()` 返回的错误
    pub play_error: Option<PlayerError>,
    /// `reload()` 返回的错误
    pub reload_error: Option<PlayerError>,
    /// `reload()` 时同步推送 `Ready`
    pub ready_on_reload: Option<u64>,
    /// 默认观察者在看到 Stopped 时调用 `play()`
    pub play_on_stop: bool,
    /// 替换默认的记录观察者
    pub observer: Option<StatusObserver>,
    pub config: PlayerConfig,
}

pub(crate) struct FakeSource {
    sink: EventSink,
    commands: Arc<Mutex<Vec<EngineCommand>>>,
    destroyed: Arc<AtomicBool>,
    play_error: Option<PlayerError>,
    reload_error: Option<PlayerError>,
    ready_on_reload: Option<u64>,
}

impl FakeSource {
    fn record(&self, cmd: EngineCommand) -> Result<(), PlayerError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.commands.lock().push(cmd);
        Ok(())
    }
}

impl NativeEventSource for FakeSource {
    fn play(&self) -> Result<(), PlayerError> {
        self.record(EngineCommand::Play)?;
        match &self.play_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.record(EngineCommand::Pause)
    }

    fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.record(EngineCommand::Seek(position))
    }

    fn set_rate(&self, rate: f64) -> Result<(), PlayerError> {
        self.record(EngineCommand::SetRate(rate))
    }

    fn reload(&self) -> Result<(), PlayerError> {
        self.record(EngineCommand::Reload)?;
        if let Some(err) = &self.reload_error {
            return Err(err.clone());
        }
        if let Some(duration_secs) = self.ready_on_reload {
            self.sink.emit(NativeEvent::Ready { duration_secs });
        }
        Ok(())
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct FakeHandle {
    pub sink: EventSink,
    pub destroyed: Arc<AtomicBool>,
    commands: Arc<Mutex<Vec<EngineCommand>>>,
}

impl FakeHandle {
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().clone()
    }
}

pub(crate) type Notes = Arc<Mutex<Vec<PlaybackSnapshot>>>;

/// 创建一个挂在测试替身上的播放器，默认观察者把每次通知的快照记下来
pub(crate) fn fake_player(options: FakeOptions) -> (Player, FakeHandle, Notes) {
    let notes: Notes = Arc::new(Mutex::new(Vec::new()));
    let commands = Arc::new(Mutex::new(Vec::new()));
    let destroyed = Arc::new(AtomicBool::new(false));
    let sink_slot = Arc::new(Mutex::new(None));

    let observer = options.observer.clone().unwrap_or_else(|| {
        let notes = notes.clone();
        let play_on_stop = options.play_on_stop;
        Arc::new(move |p: &Player| {
            let snapshot = p.snapshot();
            let stopped = snapshot.status == PlaybackStatus::Stopped;
            notes.lock().push(snapshot);
            if play_on_stop && stopped {
                p.play();
            }
        })
    });

    let player = {
        let commands = commands.clone();
        let destroyed = destroyed.clone();
        let sink_slot = sink_slot.clone();
        Player::with_source(
            "test.ogg",
            options.config.clone(),
            move |p: &Player| observer(p),
            move |_, _, sink| {
                *sink_slot.lock() = Some(sink.clone());
                Ok(FakeSource {
                    sink,
                    commands,
                    destroyed,
                    play_error: options.play_error,
                    reload_error: options.reload_error,
                    ready_on_reload: options.ready_on_reload,
                })
            },
        )
        .unwrap()
    };

    let sink = sink_slot.lock().take().unwrap();
    (
        player,
        FakeHandle {
            sink,
            destroyed,
            commands,
        },
        notes,
    )
}
