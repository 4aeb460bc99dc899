//! Ogg Opus Player Android JNI 绑定
//!
//! Java 侧的 `NativePlayer` 持有 ExoPlayer，并把它的监听回调转给这里；
//! 播放器命令再通过 JNI 调回 Java 引擎对象。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jdouble, jint, jlong, jstring};
use jni::{JNIEnv, JavaVM};
use log::{debug, error, warn};
use parking_lot::Mutex;

use ogg_opus_player::translate::ExoTranslator;
use ogg_opus_player::{
    EventSink, HandleTable, NativeEvent, NativeEventSource, Player, PlayerConfig, PlayerError,
};

/// 初始化日志（Android）
#[cfg(target_os = "android")]
fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("OggOpusPlayer"),
    );
}

#[cfg(not(target_os = "android"))]
fn init_logging() {}

/// 调用 Java 对象上的方法，异常会被清除并转为错误
fn call_java(
    vm: &JavaVM,
    target: &GlobalRef,
    name: &str,
    sig: &str,
    args: &[JValue],
) -> Result<(), PlayerError> {
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| PlayerError::playback(format!("attach thread: {}", e)))?;

    match env.call_method(target, name, sig, args) {
        Ok(_) => Ok(()),
        Err(e) => {
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_describe();
                let _ = env.exception_clear();
            }
            Err(PlayerError::playback(format!("{}: {}", name, e)))
        }
    }
}

/// Java 侧 ExoPlayer 包装对象
///
/// 需要提供 `play()V`、`pause()V`、`seekTo(J)V`、`setSpeed(F)V`、`reload()V`、`release()V`。
struct JavaEngine {
    vm: Arc<JavaVM>,
    engine: GlobalRef,
    destroyed: AtomicBool,
}

impl JavaEngine {
    fn call(&self, name: &str, sig: &str, args: &[JValue]) -> Result<(), PlayerError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Ok(());
        }
        call_java(&self.vm, &self.engine, name, sig, args)
    }
}

impl NativeEventSource for JavaEngine {
    fn play(&self) -> Result<(), PlayerError> {
        self.call("play", "()V", &[])
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.call("pause", "()V", &[])
    }

    fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        let ms = i64::try_from(position.as_millis()).unwrap_or(i64::MAX);
        self.call("seekTo", "(J)V", &[JValue::Long(ms)])
    }

    fn set_rate(&self, rate: f64) -> Result<(), PlayerError> {
        self.call("setSpeed", "(F)V", &[JValue::Float(rate as f32)])
    }

    fn reload(&self) -> Result<(), PlayerError> {
        self.call("reload", "()V", &[])
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = call_java(&self.vm, &self.engine, "release", "()V", &[]) {
            error!("release failed: {}", e);
        }
    }
}

#[derive(Clone)]
struct Entry {
    player: Player,
    sink: EventSink,
    exo: Arc<Mutex<ExoTranslator>>,
}

fn players() -> &'static HandleTable<Entry> {
    static PLAYERS: OnceLock<HandleTable<Entry>> = OnceLock::new();
    PLAYERS.get_or_init(HandleTable::new)
}

fn entry(handle: jlong) -> Option<Entry> {
    if handle <= 0 {
        return None;
    }
    players().get(handle as u64)
}

/// 秒数转 jlong，溢出时饱和
fn saturate(secs: u64) -> jlong {
    jlong::try_from(secs).unwrap_or(jlong::MAX)
}

/// 推送事件；翻译器锁在推送前释放，推送会进入播放器的串行化区
fn post(handle: jlong, translate: impl FnOnce(&mut ExoTranslator) -> Vec<NativeEvent>) {
    let Some(entry) = entry(handle) else {
        debug!("event for unknown player {} dropped", handle);
        return;
    };
    let events = {
        let mut exo = entry.exo.lock();
        translate(&mut exo)
    };
    entry.sink.emit_all(events);
}

/// JNI: 初始化库
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeInit(
    _env: JNIEnv,
    _class: JClass,
) {
    init_logging();
}

/// JNI: 创建播放器
///
/// @param path 文件路径或 file:// URI
/// @param engine Java 侧 ExoPlayer 包装对象
/// @return 播放器句柄；失败返回 0
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeCreate<'local>(
    mut env: JNIEnv<'local>,
    this: JObject<'local>,
    path: JString<'local>,
    engine: JObject<'local>,
) -> jlong {
    create_impl(&mut env, this, path, engine)
}

fn create_impl(
    env: &mut JNIEnv<'_>,
    this: JObject<'_>,
    path: JString<'_>,
    engine: JObject<'_>,
) -> jlong {
    let path: String = match env.get_string(&path) {
        Ok(s) => s.into(),
        Err(_) => return 0,
    };
    if path.is_empty() {
        return 0;
    }

    let vm = match env.get_java_vm() {
        Ok(vm) => Arc::new(vm),
        Err(_) => return 0,
    };
    let listener = match env.new_global_ref(&this) {
        Ok(r) => r,
        Err(_) => return 0,
    };
    let engine = match env.new_global_ref(&engine) {
        Ok(r) => r,
        Err(_) => return 0,
    };

    // NativePlayer.onStatusChanged() 在发生变化的线程上同步调用
    let observer_vm = vm.clone();
    let on_status = move |_player: &Player| {
        if let Err(e) = call_java(&observer_vm, &listener, "onStatusChanged", "()V", &[]) {
            warn!("status callback failed: {}", e);
        }
    };

    let mut captured = None;
    let created = Player::with_source(path, PlayerConfig::default(), on_status, |_, _, sink| {
        captured = Some(sink);
        Ok(JavaEngine {
            vm,
            engine,
            destroyed: AtomicBool::new(false),
        })
    });

    match (created, captured) {
        (Ok(player), Some(sink)) => {
            let handle = players().insert(Entry {
                player,
                sink,
                exo: Arc::new(Mutex::new(ExoTranslator::new())),
            });
            jlong::try_from(handle).unwrap_or(0)
        }
        (Ok(player), None) => {
            player.destroy();
            0
        }
        (Err(e), _) => {
            error!("create failed: {}", e);
            0
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativePlay(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if let Some(e) = entry(handle) {
        e.player.play();
    }
}

#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativePause(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if let Some(e) = entry(handle) {
        e.player.pause();
    }
}

/// JNI: 跳转到指定秒数
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeSeek(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    seconds: jdouble,
) {
    // NaN 和负数按 0 处理，过大的值交给播放器按时长截断
    let target = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
    if let Some(e) = entry(handle) {
        e.player.seek(target);
    }
}

#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeSetRate(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    rate: jdouble,
) {
    if let Some(e) = entry(handle) {
        e.player.set_rate(rate);
    }
}

#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeGetRate(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jdouble {
    entry(handle).map(|e| e.player.rate()).unwrap_or(0.0)
}

/// @return 当前位置（秒）；句柄无效返回 -1
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeGetPosition(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jlong {
    entry(handle)
        .map(|e| saturate(e.player.position()))
        .unwrap_or(-1)
}

/// @return 总时长（秒），未知时为 0；句柄无效返回 -1
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeGetDuration(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jlong {
    entry(handle)
        .map(|e| saturate(e.player.duration()))
        .unwrap_or(-1)
}

/// @return 0 initial, 1 playing, 2 paused, 3 stopped；句柄无效返回 -1
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeGetStatus(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jint {
    entry(handle)
        .map(|e| e.player.status().as_i32())
        .unwrap_or(-1)
}

/// @return 最近一次错误描述；没有错误返回 null
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeGetError<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
) -> jstring {
    let Some(err) = entry(handle).and_then(|e| e.player.last_error()) else {
        return std::ptr::null_mut();
    };
    to_jstring(&mut env, &err.to_string())
}

fn to_jstring(env: &mut JNIEnv<'_>, s: &str) -> jstring {
    match env.new_string(s) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// JNI: 销毁播放器，返回后不会再有 onStatusChanged 回调
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeDestroy(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if handle <= 0 {
        return;
    }
    if let Some(e) = players().remove(handle as u64) {
        e.player.destroy();
        debug!("player {} destroyed", handle);
    }
}

/// JNI: `Player.Listener.onPlaybackStateChanged`
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeOnPlaybackStateChanged(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    state: jint,
    duration_ms: jlong,
) {
    post(handle, |exo| exo.on_playback_state_changed(state, duration_ms));
}

/// JNI: `Player.Listener.onPlayerError`
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeOnPlayerError<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
    error_code: jint,
    message: JString<'local>,
) {
    let message: String = if message.is_null() {
        String::new()
    } else {
        match env.get_string(&message) {
            Ok(s) => s.into(),
            Err(_) => String::new(),
        }
    };
    post(handle, |exo| vec![exo.on_player_error(error_code, &message)]);
}

/// JNI: 位置轮询结果（`player.currentPosition`）
#[no_mangle]
pub extern "system" fn Java_one_mixin_oggOpusPlayer_NativePlayer_nativeOnPosition(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    position_ms: jlong,
) {
    post(handle, |exo| vec![exo.on_position(position_ms)]);
}
