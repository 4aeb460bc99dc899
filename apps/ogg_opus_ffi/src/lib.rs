//! Ogg Opus Player FFI - C ABI wrapper for desktop hosts and VLCKit-based hosts.
//!
//! Players are referenced by `u64` handles; `0` is never a valid handle.
//! Functions returning `c_int` use `0` for success and negative values for failure:
//!
//! | code | meaning |
//! |------|---------|
//! | `-1` | path pointer is NULL |
//! | `-2` | path is empty |
//! | `-3` | unknown or destroyed handle |
//! | `-4` | handle was not created with `ogg_opus_player_create_hosted` |
//! | `-10`..`-13` | output buffer problems (see `ogg_opus_player_last_error`) |

use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, warn};
use ogg_opus_player::translate::VlcTranslator;
use ogg_opus_player::{
    EventSink, HandleTable, NativeEventSource, Player, PlayerConfig, PlayerError,
};
use parking_lot::Mutex;

const ERR_NULL_PATH: c_int = -1;
const ERR_EMPTY_PATH: c_int = -2;
const ERR_BAD_HANDLE: c_int = -3;
const ERR_NOT_HOSTED: c_int = -4;

/// Called synchronously on every status change.
///
/// Runs on whichever thread produced the change (the caller's thread for
/// commands, the engine's thread for engine events). Calling back into this
/// library from inside the callback is allowed.
pub type StatusCallback = extern "C" fn(handle: u64, user_data: *mut c_void);

/// Engine operations supplied by a host that owns its own playback engine.
///
/// Command functions return `0` on success, `1` when the engine is not ready
/// yet (ignored), and a negative value on failure (reported as a playback error).
/// `destroy` is called exactly once.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EngineVTable {
    pub ctx: *mut c_void,
    pub play: extern "C" fn(ctx: *mut c_void) -> c_int,
    pub pause: extern "C" fn(ctx: *mut c_void) -> c_int,
    pub seek: extern "C" fn(ctx: *mut c_void, position_ms: i64) -> c_int,
    pub set_rate: extern "C" fn(ctx: *mut c_void, rate: f64) -> c_int,
    pub reload: extern "C" fn(ctx: *mut c_void) -> c_int,
    pub destroy: extern "C" fn(ctx: *mut c_void),
}

/// Opaque host pointer handed back to the host untouched.
#[derive(Clone, Copy)]
struct UserData(*mut c_void);

// The pointer is only ever passed back to the host, which owns its thread-safety.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    fn get(self) -> *mut c_void {
        self.0
    }
}

struct HostedSource {
    vtable: EngineVTable,
    vlc: Arc<Mutex<VlcTranslator>>,
    destroyed: AtomicBool,
}

// Same contract as `UserData`: `ctx` belongs to the host.
unsafe impl Send for HostedSource {}
unsafe impl Sync for HostedSource {}

impl HostedSource {
    fn call(&self, name: &str, f: impl FnOnce(*mut c_void) -> c_int) -> Result<(), PlayerError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Ok(());
        }
        match f(self.vtable.ctx) {
            0 => Ok(()),
            1 => Err(PlayerError::NotReady),
            code => Err(PlayerError::playback(format!(
                "host engine {} failed with code {}",
                name, code
            ))),
        }
    }
}

impl NativeEventSource for HostedSource {
    fn play(&self) -> Result<(), PlayerError> {
        self.call("play", |ctx| (self.vtable.play)(ctx))
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.call("pause", |ctx| (self.vtable.pause)(ctx))
    }

    fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        let ms = i64::try_from(position.as_millis()).unwrap_or(i64::MAX);
        let seek = self.vtable.seek;
        self.call("seek", |ctx| seek(ctx, ms))
    }

    fn set_rate(&self, rate: f64) -> Result<(), PlayerError> {
        let set_rate = self.vtable.set_rate;
        self.call("set_rate", |ctx| set_rate(ctx, rate))
    }

    fn reload(&self) -> Result<(), PlayerError> {
        self.vlc.lock().reset();
        self.call("reload", |ctx| (self.vtable.reload)(ctx))
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            (self.vtable.destroy)(self.vtable.ctx);
        }
    }
}

#[derive(Clone)]
struct Entry {
    player: Player,
    hosted: Option<Hosted>,
}

#[derive(Clone)]
struct Hosted {
    sink: EventSink,
    vlc: Arc<Mutex<VlcTranslator>>,
}

fn players() -> &'static HandleTable<Entry> {
    static PLAYERS: OnceLock<HandleTable<Entry>> = OnceLock::new();
    PLAYERS.get_or_init(HandleTable::new)
}

fn cstr_to_string(ptr: *const c_char) -> Result<String, c_int> {
    if ptr.is_null() {
        return Err(ERR_NULL_PATH);
    }
    let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().to_string();
    if s.is_empty() {
        return Err(ERR_EMPTY_PATH);
    }
    Ok(s)
}

/// Builds the observer for a reserved `handle`.
///
/// The engine may report (e.g. a load failure) before `create` returns. The
/// first notification publishes the entry, so the callback always sees a
/// handle the getters accept.
fn observer(
    handle: u64,
    hosted: Arc<OnceLock<Hosted>>,
    callback: Option<StatusCallback>,
    user_data: UserData,
) -> impl Fn(&Player) + Send + Sync + 'static {
    move |player: &Player| {
        players().get_or_insert_with(handle, || Entry {
            player: player.clone(),
            hosted: hosted.get().cloned(),
        });
        if let Some(callback) = callback {
            callback(handle, user_data.get());
        }
    }
}

/// Publishes the entry unless a notification already did, or the host
/// destroyed the player from inside a callback.
fn register(handle: u64, player: Player, hosted: Option<Hosted>) -> u64 {
    if !player.is_destroyed() {
        players().get_or_insert_with(handle, || Entry { player, hosted });
    }
    handle
}

/// Seconds as `i64`, saturating on overflow.
fn saturate(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

fn with_player<R>(handle: u64, default: R, f: impl FnOnce(&Player) -> R) -> R {
    match players().get(handle) {
        Some(entry) => f(&entry.player),
        None => default,
    }
}

/// Creates a player backed by the built-in desktop engine.
/// Returns the new handle, or `0` on failure.
///
/// # Safety
/// - `path` must be a valid NUL-terminated C string pointer (or NULL).
/// - `user_data` is passed back to `callback` as-is and must stay valid until
///   `ogg_opus_player_destroy` returns.
#[no_mangle]
pub unsafe extern "C" fn ogg_opus_player_create(
    path: *const c_char,
    callback: Option<StatusCallback>,
    user_data: *mut c_void,
) -> u64 {
    let path = match cstr_to_string(path) {
        Ok(p) => p,
        Err(_) => return 0,
    };

    let handle = players().reserve();
    let on_status = observer(handle, Arc::default(), callback, UserData(user_data));
    match Player::create(path, on_status) {
        Ok(player) => register(handle, player, None),
        Err(e) => {
            warn!("create failed: {}", e);
            players().remove(handle);
            0
        }
    }
}

/// Creates a player driving a host-owned engine through `vtable`.
/// The host reports engine notifications with `ogg_opus_player_post_vlc_*`.
/// Returns the new handle, or `0` on failure. On failure `vtable.destroy` is
/// not called.
///
/// # Safety
/// - `path` must be a valid NUL-terminated C string pointer (or NULL).
/// - `vtable` must point to a valid `EngineVTable`; its functions must be safe
///   to call from any thread until `destroy` has been called.
/// - `user_data` must stay valid until `ogg_opus_player_destroy` returns.
#[no_mangle]
pub unsafe extern "C" fn ogg_opus_player_create_hosted(
    path: *const c_char,
    vtable: *const EngineVTable,
    callback: Option<StatusCallback>,
    user_data: *mut c_void,
) -> u64 {
    if vtable.is_null() {
        return 0;
    }
    let vtable = unsafe { *vtable };
    let path = match cstr_to_string(path) {
        Ok(p) => p,
        Err(_) => return 0,
    };

    let handle = players().reserve();
    let hosted = Arc::new(OnceLock::new());
    let on_status = observer(handle, hosted.clone(), callback, UserData(user_data));
    let vlc = Arc::new(Mutex::new(VlcTranslator::new()));

    let created = Player::with_source(path, PlayerConfig::default(), on_status, |_, _, sink| {
        let _ = hosted.set(Hosted {
            sink,
            vlc: vlc.clone(),
        });
        Ok(HostedSource {
            vtable,
            vlc: vlc.clone(),
            destroyed: AtomicBool::new(false),
        })
    });

    match created {
        Ok(player) => register(handle, player, hosted.get().cloned()),
        Err(e) => {
            warn!("create_hosted failed: {}", e);
            players().remove(handle);
            0
        }
    }
}

#[no_mangle]
pub extern "C" fn ogg_opus_player_play(handle: u64) -> c_int {
    with_player(handle, ERR_BAD_HANDLE, |p| {
        p.play();
        0
    })
}

#[no_mangle]
pub extern "C" fn ogg_opus_player_pause(handle: u64) -> c_int {
    with_player(handle, ERR_BAD_HANDLE, |p| {
        p.pause();
        0
    })
}

/// Seeks to `seconds`. Negative and NaN values seek to the start.
#[no_mangle]
pub extern "C" fn ogg_opus_player_seek(handle: u64, seconds: f64) -> c_int {
    // NaN and negative values map to 0; oversized values are clamped by the player
    let target = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
    with_player(handle, ERR_BAD_HANDLE, |p| {
        p.seek(target);
        0
    })
}

#[no_mangle]
pub extern "C" fn ogg_opus_player_set_rate(handle: u64, rate: f64) -> c_int {
    with_player(handle, ERR_BAD_HANDLE, |p| {
        p.set_rate(rate);
        0
    })
}

/// Returns the current rate, or `0.0` for an unknown handle.
#[no_mangle]
pub extern "C" fn ogg_opus_player_rate(handle: u64) -> f64 {
    with_player(handle, 0.0, |p| p.rate())
}

/// Position in whole seconds, or `-1` for an unknown handle.
#[no_mangle]
pub extern "C" fn ogg_opus_player_position(handle: u64) -> i64 {
    with_player(handle, -1, |p| saturate(p.position()))
}

/// Duration in whole seconds (`0` until known), or `-1` for an unknown handle.
#[no_mangle]
pub extern "C" fn ogg_opus_player_duration(handle: u64) -> i64 {
    with_player(handle, -1, |p| saturate(p.duration()))
}

/// `0` initial, `1` playing, `2` paused, `3` stopped; `-3` for an unknown handle.
#[no_mangle]
pub extern "C" fn ogg_opus_player_status(handle: u64) -> c_int {
    with_player(handle, ERR_BAD_HANDLE, |p| p.status().as_i32())
}

/// Writes the last error message into `out_buf` (NUL-terminated, empty when
/// there is none). Returns 0 on success, negative on failure.
///
/// # Safety
/// - `out_buf` must point to at least `out_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn ogg_opus_player_last_error(
    handle: u64,
    out_buf: *mut c_char,
    out_len: usize,
) -> c_int {
    if out_buf.is_null() || out_len == 0 {
        return -10;
    }

    let message = match players().get(handle) {
        Some(entry) => entry
            .player
            .last_error()
            .map(|e| e.to_string())
            .unwrap_or_default(),
        None => return ERR_BAD_HANDLE,
    };

    let s = match CString::new(message) {
        Ok(v) => v,
        Err(_) => return -12,
    };
    let bytes = s.as_bytes_with_nul();
    if bytes.len() > out_len {
        return -13;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, out_buf, bytes.len());
    }
    0
}

/// Destroys the player. No callback fires after this returns.
/// Destroying an unknown handle returns `-3`.
#[no_mangle]
pub extern "C" fn ogg_opus_player_destroy(handle: u64) -> c_int {
    match players().remove(handle) {
        Some(entry) => {
            entry.player.destroy();
            debug!("player {} destroyed", handle);
            0
        }
        None => ERR_BAD_HANDLE,
    }
}

fn with_hosted(handle: u64, f: impl FnOnce(&Hosted) -> Vec<ogg_opus_player::NativeEvent>) -> c_int {
    let Some(entry) = players().get(handle) else {
        return ERR_BAD_HANDLE;
    };
    let Some(hosted) = entry.hosted.as_ref() else {
        return ERR_NOT_HOSTED;
    };
    // Release the translator lock before emitting; emit enters the player gate.
    let events = f(hosted);
    hosted.sink.emit_all(events);
    0
}

/// Reports a `VLCMediaPlayerState` change (raw enum value).
#[no_mangle]
pub extern "C" fn ogg_opus_player_post_vlc_state(handle: u64, state: c_int) -> c_int {
    with_hosted(handle, |h| h.vlc.lock().on_state(state))
}

/// Reports the media player's current time. A negative `time_ms` means the
/// time is not known yet (VLC shows `--:--`).
#[no_mangle]
pub extern "C" fn ogg_opus_player_post_vlc_time(handle: u64, time_ms: i64) -> c_int {
    let time = (time_ms >= 0).then_some(time_ms);
    with_hosted(handle, |h| vec![h.vlc.lock().on_time(time)])
}

/// Reports the media length once VLC has parsed it.
#[no_mangle]
pub extern "C" fn ogg_opus_player_post_vlc_length(handle: u64, length_ms: i64) -> c_int {
    with_hosted(handle, |h| {
        h.vlc.lock().on_length(length_ms).into_iter().collect()
    })
}
