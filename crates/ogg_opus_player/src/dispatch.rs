//! 状态回调分发

use std::sync::Arc;

use parking_lot::Mutex;

use crate::Player;

/// 状态变化回调，参数是播放器本身，宿主从中重新读取状态
pub type StatusObserver = Arc<dyn Fn(&Player) + Send + Sync>;

/// 每个播放器恰好一个观察者
///
/// 回调在锁外同步调用，因此回调里可以再调用播放器的方法。
pub struct CallbackDispatcher {
    observer: Mutex<Option<StatusObserver>>,
}

impl CallbackDispatcher {
    pub fn new(observer: StatusObserver) -> Self {
        Self {
            observer: Mutex::new(Some(observer)),
        }
    }

    /// 通知观察者，已清除时什么都不做
    pub fn notify(&self, player: &Player) -> bool {
        let observer = self.observer.lock().clone();
        match observer {
            Some(observer) => {
                observer(player);
                true
            }
            None => false,
        }
    }

    /// 注销观察者，之后的 `notify` 都是空操作
    pub fn clear(&self) {
        self.observer.lock().take();
    }
}
