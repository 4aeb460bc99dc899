//! 音频解码器
//!
//! 使用 symphonia 解码 OGG 容器中的音频流

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL};
#[cfg(feature = "opus")]
use symphonia::core::codecs::CODEC_TYPE_OPUS;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[cfg(feature = "opus")]
use super::opus::OpusDecoder;
use crate::PlayerError;

/// 解码器错误
#[derive(thiserror::Error, Debug)]
pub enum DecoderError {
    #[error("No supported audio track found")]
    NoTrack,
    #[error("Unsupported codec")]
    UnsupportedCodec,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SymphoniaError> for DecoderError {
    fn from(e: SymphoniaError) -> Self {
        DecoderError::Decode(e.to_string())
    }
}

impl From<DecoderError> for PlayerError {
    fn from(e: DecoderError) -> Self {
        PlayerError::LoadFailure(e.to_string())
    }
}

/// 音频信息
#[derive(Debug, Clone, Serialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub duration: Option<Duration>,
    pub codec: String,
}

enum Codec {
    Symphonia(Box<dyn Decoder>),
    #[cfg(feature = "opus")]
    Opus(OpusDecoder),
}

/// 音频解码器
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    codec: Codec,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    pub info: AudioInfo,
}

impl AudioDecoder {
    /// 打开本地文件，以扩展名作为探测提示
    pub fn open(path: &Path) -> Result<Self, DecoderError> {
        let file = File::open(path)?;
        let hint = path.extension().and_then(|e| e.to_str());
        Self::new(file, hint)
    }

    /// 从媒体源创建解码器
    pub fn new<R: MediaSource + 'static>(source: R, hint: Option<&str>) -> Result<Self, DecoderError> {
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut probe_hint = Hint::new();
        if let Some(ext) = hint {
            probe_hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &probe_hint,
            mss,
            &FormatOptions {
                enable_gapless: false,
                ..Default::default()
            },
            &MetadataOptions::default(),
        )?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoTrack)?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or(48000);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let duration = codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));

        let info = AudioInfo {
            sample_rate,
            channels,
            duration,
            codec: format!("{:?}", codec_params.codec),
        };

        let codec = make_codec(codec_params, channels)?;

        Ok(Self {
            format,
            codec,
            track_id,
            sample_buf: None,
            info,
        })
    }

    /// 解码下一帧，返回交错的 f32 采样；`None` 表示流结束
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoder = match &mut self.codec {
                Codec::Symphonia(decoder) => decoder,
                #[cfg(feature = "opus")]
                Codec::Opus(opus) => match opus.decode(&packet.data) {
                    Ok(Some(samples)) => return Ok(Some(samples)),
                    Ok(None) | Err(DecoderError::Decode(_)) => continue,
                    Err(e) => return Err(e),
                },
            };

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                // 单个坏包跳过
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let frames = decoded.capacity();

            let too_small = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < frames * spec.channels.count());
            if too_small {
                self.sample_buf = Some(SampleBuffer::new(frames as u64, spec));
            }

            let Some(sample_buf) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(sample_buf.samples().to_vec()));
        }
    }

    /// 跳转到指定时间
    pub fn seek(&mut self, time: Duration) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: symphonia::core::units::Time::from(time.as_secs_f64()),
            track_id: Some(self.track_id),
        };

        self.format.seek(SeekMode::Accurate, seek_to)?;
        match &mut self.codec {
            Codec::Symphonia(decoder) => decoder.reset(),
            #[cfg(feature = "opus")]
            Codec::Opus(opus) => opus.reset(),
        }

        Ok(())
    }
}

/// symphonia 0.5 没有 Opus 解码器；启用 `opus` 特性时改用 libopus
fn make_codec(params: &CodecParameters, channels: usize) -> Result<Codec, DecoderError> {
    #[cfg(feature = "opus")]
    if params.codec == CODEC_TYPE_OPUS {
        return Ok(Codec::Opus(OpusDecoder::new(
            channels,
            params.delay.unwrap_or(0),
        )?));
    }
    #[cfg(not(feature = "opus"))]
    let _ = channels;

    symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map(Codec::Symphonia)
        .map_err(|_| DecoderError::UnsupportedCodec)
}

/// 只读取流信息，不保留解码器
pub fn probe(path: &Path) -> Result<AudioInfo, DecoderError> {
    Ok(AudioDecoder::open(path)?.info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_garbage_is_rejected() {
        let data = b"definitely not an ogg stream".repeat(64);
        let result = AudioDecoder::new(Cursor::new(data), Some("ogg"));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let err = probe(Path::new("/nonexistent/voice.ogg")).unwrap_err();
        assert!(matches!(err, DecoderError::Io(_)));
        assert!(matches!(PlayerError::from(err), PlayerError::LoadFailure(_)));
    }
}
