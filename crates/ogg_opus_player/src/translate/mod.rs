//! 原生引擎通知翻译
//!
//! 把各平台引擎自己的状态枚举和回调翻译成 [`NativeEvent`](crate::NativeEvent)。
//! 翻译器不持有引擎，只保存去重需要的少量状态，由平台适配器在收到引擎回调时调用。

mod exo;
mod vlc;

pub use exo::*;
pub use vlc::*;
