//! Android binding for the xTun session core.
//!
//! Registers the `init`/`start`/`stop` natives of `io.github.xTun.xTun`,
//! wires the VpnService's `protectSocket` into the core's
//! [`SocketProtector`](xtun_core::SocketProtector), and drives the native
//! engine library through [`xtun_core::SessionController`].

pub mod logging;

#[cfg(target_os = "android")]
pub mod ffi;
#[cfg(target_os = "android")]
pub mod native;

#[cfg(target_os = "android")]
pub mod android_jni;

/// C truthiness for a `jboolean`: anything but `JNI_FALSE` (0) is true
#[cfg_attr(not(target_os = "android"), allow(dead_code))]
pub(crate) fn jni_bool(value: u8) -> bool {
    value != 0
}
