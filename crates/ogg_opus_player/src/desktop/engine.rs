//! 桌面播放引擎
//!
//! 解码和输出都在独立的引擎线程上进行，适配器只通过通道转发命令。

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{debug, error};

use super::{AudioDecoder, AudioOutput, OutputConfig};
use crate::{
    EngineCommand, EventSink, NativeEvent, NativeEventSource, PlayerConfig, PlayerError, Track,
};

enum EngineMessage {
    Command(EngineCommand),
    Shutdown,
}

/// symphonia + cpal 的引擎适配器
pub struct DesktopSource {
    cmd_tx: Sender<EngineMessage>,
    shut_down: AtomicBool,
}

impl DesktopSource {
    /// 启动引擎线程并开始加载曲目
    ///
    /// 加载结果通过事件异步上报：`Ready` 或 `Error(LoadFailure)`。
    pub fn spawn(
        track: &Track,
        config: &PlayerConfig,
        sink: EventSink,
    ) -> Result<Self, PlayerError> {
        let (cmd_tx, cmd_rx) = unbounded();
        let path = track.path();
        let config = config.clone();

        thread::Builder::new()
            .name("ogg-opus-engine".into())
            .spawn(move || run_engine(path, config, cmd_rx, sink))
            .map_err(|e| PlayerError::playback(format!("failed to spawn engine thread: {}", e)))?;

        Ok(Self {
            cmd_tx,
            shut_down: AtomicBool::new(false),
        })
    }

    fn send(&self, cmd: EngineCommand) -> Result<(), PlayerError> {
        // 引擎已退出时命令是空操作
        let _ = self.cmd_tx.send(EngineMessage::Command(cmd));
        Ok(())
    }
}

impl NativeEventSource for DesktopSource {
    fn play(&self) -> Result<(), PlayerError> {
        self.send(EngineCommand::Play)
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.send(EngineCommand::Pause)
    }

    fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.send(EngineCommand::Seek(position))
    }

    fn set_rate(&self, rate: f64) -> Result<(), PlayerError> {
        self.send(EngineCommand::SetRate(rate))
    }

    fn reload(&self) -> Result<(), PlayerError> {
        self.send(EngineCommand::Reload)
    }

    fn destroy(&self) {
        // 不等待线程退出：destroy 可能发生在引擎线程自己的回调里
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            let _ = self.cmd_tx.send(EngineMessage::Shutdown);
        }
    }
}

fn run_engine(
    path: Option<PathBuf>,
    config: PlayerConfig,
    cmd_rx: Receiver<EngineMessage>,
    sink: EventSink,
) {
    let mut state = EngineState::new(path, config, sink);
    state.load();

    loop {
        // 空闲时阻塞等待命令，播放时非阻塞检查
        let msg = if state.playing {
            match cmd_rx.try_recv() {
                Ok(msg) => Some(msg),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match cmd_rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            }
        };

        match msg {
            Some(EngineMessage::Shutdown) => break,
            Some(EngineMessage::Command(cmd)) => state.handle_command(cmd),
            None => {}
        }

        if state.playing {
            state.decode_and_play();
            state.update_position();
            // 避免 CPU 空转
            thread::sleep(Duration::from_millis(5));
        }
    }

    state.unload();
    debug!("engine thread exited");
}

struct EngineState {
    path: Option<PathBuf>,
    config: PlayerConfig,
    sink: EventSink,
    current_track: Option<LoadedTrack>,
    playing: bool,
    /// 已读到流结尾，等待输出缓冲播完
    draining: bool,
    rate: f64,
    /// 最近一次跳转或变速时的位置（秒）
    position_base: f64,
    last_position_update: Instant,
}

struct LoadedTrack {
    decoder: AudioDecoder,
    output: AudioOutput,
    channels: usize,
}

enum DecodeOutcome {
    Continue,
    Ended,
    Failed(String),
}

impl EngineState {
    fn new(path: Option<PathBuf>, config: PlayerConfig, sink: EventSink) -> Self {
        Self {
            path,
            config,
            sink,
            current_track: None,
            playing: false,
            draining: false,
            rate: 1.0,
            position_base: 0.0,
            last_position_update: Instant::now(),
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        debug!("engine command {:?}", cmd);
        match cmd {
            EngineCommand::Play => self.play(),
            EngineCommand::Pause => self.pause(),
            EngineCommand::Seek(pos) => self.seek(pos),
            EngineCommand::SetRate(rate) => self.set_rate(rate),
            EngineCommand::Reload => self.load(),
        }
    }

    fn load(&mut self) {
        self.unload();
        self.sink.emit(NativeEvent::BufferingStateChanged(true));

        match self.open() {
            Ok(track) => {
                let duration_secs = track.decoder.info.duration.map_or(0, |d| d.as_secs());
                self.current_track = Some(track);
                self.sink.emit(NativeEvent::Ready { duration_secs });
            }
            Err(e) => {
                error!("failed to load track: {}", e);
                self.sink.emit(NativeEvent::Error(e));
            }
        }
    }

    fn open(&self) -> Result<LoadedTrack, PlayerError> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| PlayerError::load("track is not a local file"))?;

        let decoder = AudioDecoder::open(path)?;
        let info = &decoder.info;

        let output = AudioOutput::new(OutputConfig {
            sample_rate: info.sample_rate,
            channels: info.channels as u16,
            buffer_size: self.config.buffer_size,
        })?;
        let channels = info.channels;

        Ok(LoadedTrack {
            decoder,
            output,
            channels,
        })
    }

    fn unload(&mut self) {
        if let Some(track) = self.current_track.take() {
            track.output.set_playing(false);
        }
        self.playing = false;
        self.draining = false;
        self.position_base = 0.0;
    }

    fn play(&mut self) {
        match &self.current_track {
            Some(track) => {
                track.output.set_playing(true);
                self.playing = true;
            }
            None => debug!("play ignored, no track loaded"),
        }
    }

    fn pause(&mut self) {
        if let Some(track) = &self.current_track {
            track.output.set_playing(false);
        }
        self.playing = false;
    }

    fn seek(&mut self, pos: Duration) {
        let Some(track) = &mut self.current_track else {
            return;
        };
        match track.decoder.seek(pos) {
            Ok(()) => {
                track.output.clear();
                track.output.reset_position();
                self.position_base = pos.as_secs_f64();
                self.draining = false;
                self.sink.emit(NativeEvent::TimeUpdate {
                    position_ms: i64::try_from(pos.as_millis()).unwrap_or(i64::MAX),
                });
            }
            Err(e) => {
                self.sink
                    .emit(NativeEvent::Error(PlayerError::playback(format!(
                        "seek failed: {}",
                        e
                    ))));
            }
        }
    }

    fn set_rate(&mut self, rate: f64) {
        // 把旧速率下已播放的部分并入基准位置
        self.position_base = self.current_position();
        if let Some(track) = &self.current_track {
            track.output.reset_position();
        }
        self.rate = rate;
    }

    fn current_position(&self) -> f64 {
        match &self.current_track {
            Some(track) => self.position_base + track.output.position() * self.rate,
            None => self.position_base,
        }
    }

    fn decode_and_play(&mut self) {
        let outcome = match &mut self.current_track {
            Some(track) => decode_step(track, self.draining, self.rate),
            None => return,
        };

        match outcome {
            DecodeOutcome::Continue => {}
            DecodeOutcome::Ended if !self.draining => {
                // 流已读完，等输出缓冲播完再上报结束
                self.draining = true;
            }
            DecodeOutcome::Ended => {
                self.pause();
                self.draining = false;
                self.sink.emit(NativeEvent::Ended);
            }
            DecodeOutcome::Failed(e) => {
                error!("decode error: {}", e);
                self.pause();
                self.sink
                    .emit(NativeEvent::Error(PlayerError::playback(e)));
            }
        }
    }

    fn update_position(&mut self) {
        if self.last_position_update.elapsed() >= self.config.position_interval() {
            let position_ms = (self.current_position() * 1000.0) as i64;
            self.sink.emit(NativeEvent::TimeUpdate { position_ms });
            self.last_position_update = Instant::now();
        }
    }
}

/// 解码一帧写入输出；`draining` 时只检查输出是否播完
fn decode_step(track: &mut LoadedTrack, draining: bool, rate: f64) -> DecodeOutcome {
    if draining {
        return if track.output.buffered() == 0 {
            DecodeOutcome::Ended
        } else {
            DecodeOutcome::Continue
        };
    }

    // 缓冲足够时先不解码
    if track.output.buffered() >= track.output.capacity() / 2 {
        return DecodeOutcome::Continue;
    }

    match track.decoder.decode_next() {
        Ok(Some(samples)) => {
            if (rate - 1.0).abs() > f64::EPSILON {
                track.output.write(&varispeed(&samples, track.channels, rate));
            } else {
                track.output.write(&samples);
            }
            DecodeOutcome::Continue
        }
        Ok(None) => DecodeOutcome::Ended,
        Err(e) => DecodeOutcome::Failed(e.to_string()),
    }
}

/// 线性插值变速（音调随之变化）
fn varispeed(samples: &[f32], channels: usize, rate: f64) -> Vec<f32> {
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    if frames == 0 || rate <= 0.0 {
        return Vec::new();
    }

    let out_frames = (frames as f64 / rate).floor() as usize;
    let mut out = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let src = i as f64 * rate;
        let idx = (src.floor() as usize).min(frames - 1);
        let next = (idx + 1).min(frames - 1);
        let frac = (src - idx as f64) as f32;
        for ch in 0..channels {
            let a = samples[idx * channels + ch];
            let b = samples[next * channels + ch];
            out.push(a + (b - a) * frac);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PlaybackStatus, Player};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_varispeed_double_speed() {
        // 双声道 4 帧
        let samples = [0.0, 0.0, 1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let out = varispeed(&samples, 2, 2.0);
        assert_eq!(out, vec![0.0, 0.0, 2.0, -2.0]);
    }

    #[test]
    fn test_varispeed_half_speed_interpolates() {
        let samples = [0.0, 1.0, 2.0];
        let out = varispeed(&samples, 1, 0.5);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.0]);
    }

    #[test]
    fn test_varispeed_empty() {
        assert!(varispeed(&[], 2, 1.5).is_empty());
        assert!(varispeed(&[1.0], 2, 1.5).is_empty());
    }

    #[test]
    fn test_missing_file_reports_load_failure() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        let player = Player::create("/nonexistent/voice.ogg", move |p: &Player| {
            if let Some(err) = p.last_error() {
                seen.lock().push(err);
            }
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while errors.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        assert!(matches!(
            errors.lock().first(),
            Some(PlayerError::LoadFailure(_))
        ));
        assert_eq!(player.status(), PlaybackStatus::Paused);
        assert_eq!(player.duration(), 0);

        // 出错后实例仍可用，命令不会失败
        player.play();
        player.set_rate(1.25);
        assert_eq!(player.rate(), 1.25);
        player.destroy();
        player.destroy();
    }
}
