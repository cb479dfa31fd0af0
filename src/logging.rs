//! Logging configuration for nixbind's C bindings.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Once, RwLock};

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

use crate::error::{NixError, clear_error, cstring_from_str_lossy, nix_error_t, write_error};

const LOGGER_UNINIT: u8 = 0;
const LOGGER_READY: u8 = 1;
const LOGGER_CONFLICT: u8 = 2;

const DEFAULT_TARGET: &str = "nixbind";

static LOGGER_STATE: AtomicU8 = AtomicU8::new(LOGGER_UNINIT);
static LOGGER_INIT: Once = Once::new();
static NIX_LOGGER: Lazy<NixLogger> = Lazy::new(NixLogger::new);

/// Log level values for nixbind logging.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum nix_log_level_t {
    NIX_LOG_LEVEL_OFF = 0,
    NIX_LOG_LEVEL_ERROR = 1,
    NIX_LOG_LEVEL_WARN = 2,
    NIX_LOG_LEVEL_INFO = 3,
    NIX_LOG_LEVEL_DEBUG = 4,
    NIX_LOG_LEVEL_TRACE = 5,
}

impl From<nix_log_level_t> for LevelFilter {
    fn from(value: nix_log_level_t) -> Self {
        match value {
            nix_log_level_t::NIX_LOG_LEVEL_OFF => LevelFilter::Off,
            nix_log_level_t::NIX_LOG_LEVEL_ERROR => LevelFilter::Error,
            nix_log_level_t::NIX_LOG_LEVEL_WARN => LevelFilter::Warn,
            nix_log_level_t::NIX_LOG_LEVEL_INFO => LevelFilter::Info,
            nix_log_level_t::NIX_LOG_LEVEL_DEBUG => LevelFilter::Debug,
            nix_log_level_t::NIX_LOG_LEVEL_TRACE => LevelFilter::Trace,
        }
    }
}

impl From<Level> for nix_log_level_t {
    fn from(value: Level) -> Self {
        match value {
            Level::Error => nix_log_level_t::NIX_LOG_LEVEL_ERROR,
            Level::Warn => nix_log_level_t::NIX_LOG_LEVEL_WARN,
            Level::Info => nix_log_level_t::NIX_LOG_LEVEL_INFO,
            Level::Debug => nix_log_level_t::NIX_LOG_LEVEL_DEBUG,
            Level::Trace => nix_log_level_t::NIX_LOG_LEVEL_TRACE,
        }
    }
}

/// Log record delivered to a C callback.
///
/// String pointers are only valid for the duration of the callback.
/// `module_path` and `file` may be null. `line` is 0 when unknown.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct nix_log_record_t {
    pub level: nix_log_level_t,
    pub target: *const c_char,
    pub message: *const c_char,
    pub module_path: *const c_char,
    pub file: *const c_char,
    pub line: u32,
}

/// Callback invoked for each log record, from whichever thread emitted it.
#[allow(non_camel_case_types)]
pub type nix_log_callback_t =
    Option<extern "C" fn(record: *const nix_log_record_t, user_data: *mut c_void)>;

/// Configuration for nixbind logging.
///
/// A non-null `filter` is parsed as a `RUST_LOG`-style filter and overrides
/// `level`. Otherwise `RUST_LOG` from the environment is used if set, and
/// `level` applies to the `nixbind` target as a last resort. Without a
/// `callback`, records are written to stderr.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct nix_log_config_t {
    pub level: nix_log_level_t,
    pub filter: *const c_char,
    pub callback: nix_log_callback_t,
    pub user_data: *mut c_void,
}

#[derive(Clone, Debug, PartialEq)]
struct Directive {
    target: String,
    level: LevelFilter,
}

#[derive(Clone, Debug, PartialEq)]
struct LogFilter {
    default: LevelFilter,
    directives: Vec<Directive>,
}

impl LogFilter {
    fn for_level(level: LevelFilter) -> Self {
        Self {
            default: LevelFilter::Off,
            directives: vec![Directive {
                target: DEFAULT_TARGET.to_string(),
                level,
            }],
        }
    }

    fn parse(spec: &str) -> Result<Self, String> {
        let mut filter = Self {
            default: LevelFilter::Off,
            directives: Vec::new(),
        };

        for (index, directive) in spec.split(',').map(str::trim).enumerate() {
            if directive.is_empty() {
                continue;
            }
            match directive.split_once('=') {
                Some((target, level)) => {
                    let (target, level) = (target.trim(), level.trim());
                    if target.is_empty() {
                        return Err(format!("empty log target at position {index}"));
                    }
                    let level = parse_level(level)
                        .ok_or_else(|| format!("invalid level `{level}` for `{target}`"))?;
                    filter.directives.push(Directive {
                        target: target.to_string(),
                        level,
                    });
                }
                None => match parse_level(directive) {
                    Some(level) => filter.default = level,
                    None => filter.directives.push(Directive {
                        target: directive.to_string(),
                        level: LevelFilter::Trace,
                    }),
                },
            }
        }

        Ok(filter)
    }

    /// Level for `target`: the longest matching directive wins, later
    /// directives win ties.
    fn level_for(&self, target: &str) -> LevelFilter {
        self.directives
            .iter()
            .filter(|directive| target.starts_with(&directive.target))
            .fold((0, self.default), |best, directive| {
                if directive.target.len() >= best.0 {
                    (directive.target.len(), directive.level)
                } else {
                    best
                }
            })
            .1
    }

    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_for(metadata.target())
    }

    fn max_level(&self) -> LevelFilter {
        self.directives
            .iter()
            .map(|directive| directive.level)
            .fold(self.default, Ord::max)
    }
}

struct LoggerConfig {
    filter: LogFilter,
    callback: nix_log_callback_t,
    // Stored as an integer so the logger stays Send + Sync.
    user_data: usize,
}

struct NixLogger {
    config: RwLock<LoggerConfig>,
}

impl NixLogger {
    fn new() -> Self {
        Self {
            config: RwLock::new(LoggerConfig {
                filter: LogFilter::for_level(LevelFilter::Info),
                callback: None,
                user_data: 0,
            }),
        }
    }

    fn update(&self, config: LoggerConfig) {
        let mut guard = self.config.write().unwrap_or_else(|err| err.into_inner());
        *guard = config;
    }

    fn with_config<T>(&self, f: impl FnOnce(&LoggerConfig) -> T) -> T {
        let guard = self.config.read().unwrap_or_else(|err| err.into_inner());
        f(&guard)
    }
}

impl Log for NixLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.with_config(|config| config.filter.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        let (callback, user_data, enabled) = self.with_config(|config| {
            (
                config.callback,
                config.user_data,
                config.filter.enabled(record.metadata()),
            )
        });
        if !enabled {
            return;
        }

        let Some(callback) = callback else {
            eprintln!("{} {}: {}", record.level(), record.target(), record.args());
            return;
        };

        let target = cstring_from_str_lossy(record.target());
        let message = cstring_from_str_lossy(&record.args().to_string());
        let module_path = record.module_path().map(cstring_from_str_lossy);
        let file = record.file().map(cstring_from_str_lossy);
        let c_record = nix_log_record_t {
            level: record.level().into(),
            target: target.as_ptr(),
            message: message.as_ptr(),
            module_path: module_path.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
            file: file.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
            line: record.line().unwrap_or(0),
        };
        callback(&c_record, user_data as *mut c_void);
    }

    fn flush(&self) {}
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn parse_filter(filter: String) -> Result<LogFilter, NixError> {
    LogFilter::parse(&filter).map_err(|reason| NixError::InvalidLogFilter { filter, reason })
}

fn resolve_filter(config: Option<&nix_log_config_t>) -> Result<LogFilter, NixError> {
    if let Some(config) = config.filter(|config| !config.filter.is_null()) {
        // Safety: caller guarantees a valid, NUL-terminated C string.
        let filter = unsafe { CStr::from_ptr(config.filter) };
        return parse_filter(filter.to_string_lossy().into_owned());
    }

    if let Ok(filter) = std::env::var("RUST_LOG") {
        return parse_filter(filter);
    }

    let level = config.map_or(nix_log_level_t::NIX_LOG_LEVEL_INFO, |config| config.level);
    Ok(LogFilter::for_level(level.into()))
}

fn ensure_logger() -> Result<(), NixError> {
    LOGGER_INIT.call_once(|| {
        let state = match log::set_logger(&*NIX_LOGGER) {
            Ok(()) => LOGGER_READY,
            Err(_) => LOGGER_CONFLICT,
        };
        LOGGER_STATE.store(state, Ordering::SeqCst);
    });

    match LOGGER_STATE.load(Ordering::SeqCst) {
        LOGGER_READY => Ok(()),
        _ => Err(NixError::LoggerConflict),
    }
}

/// Fills `config` with the defaults: INFO for nixbind, no filter, no callback.
#[unsafe(no_mangle)]
pub extern "C" fn nix_log_config_init(config: *mut nix_log_config_t) {
    if config.is_null() {
        return;
    }
    // Safety: caller provided a writable config pointer.
    unsafe {
        config.write(nix_log_config_t {
            level: nix_log_level_t::NIX_LOG_LEVEL_INFO,
            filter: ptr::null(),
            callback: None,
            user_data: ptr::null_mut(),
        });
    }
}

/// Initializes logging for nixbind.
///
/// If `config` is null, defaults are used. May be called again to replace the
/// configuration.
#[unsafe(no_mangle)]
pub extern "C" fn nix_log_init(
    config: *const nix_log_config_t,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);

    // Safety: config must be null or point to a valid configuration.
    let config = unsafe { config.as_ref() };
    let result = resolve_filter(config).and_then(|filter| ensure_logger().map(|()| filter));
    let filter = match result {
        Ok(filter) => filter,
        Err(err) => {
            write_error(out_error, err);
            return false;
        }
    };

    let callback = config.and_then(|config| config.callback);
    let user_data = config.map_or(0, |config| config.user_data as usize);
    let max_level = filter.max_level();
    NIX_LOGGER.update(LoggerConfig {
        filter,
        callback,
        user_data,
    });
    log::set_max_level(max_level);
    log::debug!(target: DEFAULT_TARGET, "logging configured at max level {max_level}");
    true
}
