//! 原生引擎适配器约定

use std::sync::Weak;
use std::time::Duration;

use log::trace;

use crate::player::Shared;
use crate::{NativeEvent, Player, PlayerError};

/// 原生播放引擎适配器
///
/// 每个平台一个实现，在编译期选择。实现者拥有底层引擎实例，把引擎自己的通知
/// 翻译成 [`NativeEvent`] 后推给构造时拿到的 [`EventSink`]。
///
/// 命令只负责转发，不等待引擎确认。`destroy()` 之后的命令应当是空操作。
/// 返回 [`PlayerError::NotReady`] 会被忽略，其它错误会作为
/// [`NativeEvent::Error`] 回到协调器。
pub trait NativeEventSource: Send + Sync {
    fn play(&self) -> Result<(), PlayerError>;

    fn pause(&self) -> Result<(), PlayerError>;

    fn seek(&self, position: Duration) -> Result<(), PlayerError>;

    fn set_rate(&self, rate: f64) -> Result<(), PlayerError>;

    /// 重新加载当前曲目，回到就绪、未播放状态
    fn reload(&self) -> Result<(), PlayerError>;

    /// 释放引擎，可重复调用
    fn destroy(&self);
}

/// 事件入口
///
/// 只持有播放器的弱引用：适配器不会让播放器保持存活，
/// 播放器释放或销毁后推入的事件会被丢弃。
#[derive(Clone)]
pub struct EventSink {
    shared: Weak<Shared>,
}

impl EventSink {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// 推送一个规范事件，可在任意线程调用
    pub fn emit(&self, event: NativeEvent) {
        match self.shared.upgrade() {
            Some(shared) => Player::from_shared(shared).handle_event(event),
            None => trace!("player dropped, event {:?} discarded", event),
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = NativeEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}
