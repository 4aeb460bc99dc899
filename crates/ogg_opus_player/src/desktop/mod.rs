//! 桌面引擎：symphonia 解码 + cpal 输出
//!
//! 启用 `opus` 特性后 Opus 流交给 libopus 解码

mod decoder;
mod engine;
#[cfg(feature = "opus")]
mod opus;
mod output;

pub use decoder::*;
pub use engine::*;
pub use output::*;
