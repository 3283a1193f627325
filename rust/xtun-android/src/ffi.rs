//! Bindings to the native xTun engine library (packet forwarding, session
//! crypto and domain-table DNS).

use std::os::raw::{c_char, c_int};

/// Opaque `struct tundev`
#[repr(C)]
pub struct TunDev {
    _private: [u8; 0],
}

#[link(name = "xtun-engine", kind = "dylib")]
extern "C" {
    /// Returns 0 on success
    pub fn crypto_init(password: *const c_char) -> c_int;

    /// Returns 0 on success
    pub fn dns_init(domain_path: *const c_char) -> c_int;
    pub fn dns_destroy();

    pub fn tun_alloc() -> *mut TunDev;
    /// Returns 0 on success
    pub fn tun_config(
        tun: *mut TunDev,
        fd: c_int,
        mtu: c_int,
        global: c_int,
        verbose: c_int,
        server: *const c_char,
        dns: *const c_char,
    ) -> c_int;
    /// Spawns the engine's I/O threads. Returns 0 on success
    pub fn tun_start(tun: *mut TunDev) -> c_int;
    pub fn tun_stop(tun: *mut TunDev);
    pub fn tun_free(tun: *mut TunDev);
}
