//! ogg_opus_player - 单曲播放门面
//!
//! 把两种原生播放引擎各自的异步事件归一为一组规范事件，
//! 由状态协调器维护唯一权威的播放状态，并向宿主回调通知。
//!
//! 注意：播放到结尾后，播放器会自动重新加载曲目并回到
//! `Paused`、位置 0 的可重播状态（见 [`PlayerConfig::rearm_on_end`]）。

mod command;
mod config;
mod dispatch;
mod error;
mod player;
mod reconciler;
mod registry;
mod source;
mod status;
mod track;

pub mod translate;

#[cfg(feature = "desktop")]
pub mod desktop;

#[cfg(test)]
mod testing;

pub use command::*;
pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use player::*;
pub use reconciler::*;
pub use registry::*;
pub use source::*;
pub use status::*;
pub use track::*;
