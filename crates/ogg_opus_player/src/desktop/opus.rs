//! libopus 解码（`opus` 特性）
//!
//! symphonia 负责 OGG 解封装，Opus 包交给 libopus 解码

use audiopus::coder::{Decoder as LibOpus, GenericCtl};
use audiopus::packet::Packet;
use audiopus::{Channels, MutSignals, SampleRate};

use super::DecoderError;

/// 单个 Opus 包最长 120 ms（48 kHz）
const MAX_FRAME: usize = 5760;

pub(crate) struct OpusDecoder {
    inner: LibOpus,
    channels: usize,
    pcm: Vec<f32>,
    /// 流开头还要丢弃的帧数（OpusHead 的 pre-skip）
    skip: usize,
}

impl OpusDecoder {
    /// 仅支持单声道和立体声（映射族 0）
    pub fn new(channels: usize, pre_skip: u32) -> Result<Self, DecoderError> {
        let layout = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => return Err(DecoderError::UnsupportedCodec),
        };
        let inner = LibOpus::new(SampleRate::Hz48000, layout).map_err(opus_error)?;
        Ok(Self {
            inner,
            channels,
            pcm: vec![0.0; MAX_FRAME * channels],
            skip: pre_skip as usize,
        })
    }

    /// 解码一个包，返回交错采样；空包返回 `None`
    pub fn decode(&mut self, data: &[u8]) -> Result<Option<Vec<f32>>, DecoderError> {
        let Ok(packet) = Packet::try_from(data) else {
            return Ok(None);
        };
        let signals = MutSignals::try_from(&mut self.pcm[..]).map_err(opus_error)?;
        let frames = self
            .inner
            .decode_float(Some(packet), signals, false)
            .map_err(opus_error)?;

        let dropped = self.skip.min(frames);
        self.skip -= dropped;
        Ok(Some(
            self.pcm[dropped * self.channels..frames * self.channels].to_vec(),
        ))
    }

    /// 跳转后清空解码器内部状态
    pub fn reset(&mut self) {
        self.skip = 0;
        if let Err(e) = self.inner.reset_state() {
            log::warn!("libopus reset failed: {}", e);
        }
    }
}

fn opus_error(e: audiopus::Error) -> DecoderError {
    DecoderError::Decode(e.to_string())
}
