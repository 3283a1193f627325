use std::os::raw::c_int;
use std::sync::Once;
use tracing::Level;
use xtun_core::LogLevel;

#[cfg(target_os = "android")]
use once_cell::sync::OnceCell;
#[cfg(target_os = "android")]
use tracing_subscriber::{layer::Context, reload, EnvFilter, Registry};

#[cfg(target_os = "android")]
pub(crate) const LOG_TAG: &str = "xTun";

static INIT: Once = Once::new();

#[cfg(target_os = "android")]
static FILTER_HANDLE: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

#[cfg(target_os = "android")]
extern "C" {
    fn __android_log_write(
        prio: c_int,
        tag: *const std::os::raw::c_char,
        text: *const std::os::raw::c_char,
    ) -> c_int;
}

/// Android log priority for a tracing level
#[cfg_attr(not(target_os = "android"), allow(dead_code))]
pub(crate) fn android_priority(level: &Level) -> c_int {
    match *level {
        Level::ERROR => 6, // ANDROID_LOG_ERROR
        Level::WARN => 5,  // ANDROID_LOG_WARN
        Level::INFO => 4,  // ANDROID_LOG_INFO
        Level::DEBUG => 3, // ANDROID_LOG_DEBUG
        _ => 2,            // ANDROID_LOG_VERBOSE
    }
}

/// Forwards tracing events to logcat
#[cfg(target_os = "android")]
pub(crate) struct AndroidLogLayer;

#[cfg(target_os = "android")]
impl<S> tracing_subscriber::Layer<S> for AndroidLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::ffi::CString;

        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);

        let tag = CString::new(LOG_TAG).unwrap_or_default();
        let msg = CString::new(visitor.message.replace('\0', " ")).unwrap_or_default();

        unsafe {
            __android_log_write(
                android_priority(event.metadata().level()),
                tag.as_ptr(),
                msg.as_ptr(),
            );
        }
    }
}

#[cfg(target_os = "android")]
#[derive(Default)]
pub(crate) struct LogVisitor {
    message: String,
}

#[cfg(target_os = "android")]
impl tracing::field::Visit for LogVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" || self.message.is_empty() {
            self.message = value.to_string();
        } else {
            self.message
                .push_str(&format!(" {}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" || self.message.is_empty() {
            self.message = format!("{:?}", value);
        } else {
            self.message
                .push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

/// Install the process subscriber. Later calls only adjust the level.
pub fn init_logging(level: LogLevel) {
    let mut installed = false;
    INIT.call_once(|| {
        install(level);
        installed = true;
    });
    if !installed {
        set_level(level);
    }
}

#[cfg(target_os = "android")]
fn install(level: LogLevel) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = match xtun_core::logging::log_filter(level) {
        Ok(Some(filter)) => filter,
        Ok(None) => EnvFilter::new("off"),
        Err(_) => EnvFilter::new("info"),
    };
    let (filter, handle) = reload::Layer::new(filter);

    if tracing_subscriber::registry()
        .with(filter)
        .with(AndroidLogLayer)
        .try_init()
        .is_ok()
    {
        let _ = FILTER_HANDLE.set(handle);
        tracing::info!("Android logging initialized at level: {:?}", level);
    }
}

#[cfg(not(target_os = "android"))]
fn install(level: LogLevel) {
    if let Err(e) = xtun_core::logging::init_logging(level) {
        xtun_core::logging::log_error(&e, Some("Failed to initialize logging"));
    }
}

/// Switch the log level of an installed subscriber, e.g. for a verbose session
#[cfg(target_os = "android")]
pub fn set_level(level: LogLevel) {
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    let filter = match xtun_core::logging::log_filter(level) {
        Ok(Some(filter)) => filter,
        Ok(None) => EnvFilter::new("off"),
        Err(e) => {
            xtun_core::logging::log_error(&e, Some("Invalid log level"));
            return;
        }
    };
    if let Err(e) = handle.reload(filter) {
        tracing::warn!("Failed to change log level: {}", e);
    }
}

#[cfg(not(target_os = "android"))]
pub fn set_level(_level: LogLevel) {}
