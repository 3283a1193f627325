//! Core collaborator traits implemented over the native engine library

use crate::ffi;
use std::ffi::CString;
use std::os::raw::c_int;
use std::ptr::NonNull;
use tracing::debug;
use xtun_core::{CryptoSubsystem, DnsSubsystem, Error, Result, TunnelConfig, TunnelEngine};

fn c_string(value: &str, what: &str) -> Result<CString> {
    CString::new(value).map_err(|e| Error::config_with_source(format!("{} contains NUL", what), e))
}

pub struct NativeCrypto;

impl CryptoSubsystem for NativeCrypto {
    fn init(&self, passphrase: &str) -> Result<()> {
        let password = c_string(passphrase, "passphrase")
            .map_err(|_| Error::crypto_init("passphrase contains NUL"))?;
        if unsafe { ffi::crypto_init(password.as_ptr()) } != 0 {
            return Err(Error::crypto_init("key derivation failed"));
        }
        Ok(())
    }
}

pub struct NativeDns;

impl DnsSubsystem for NativeDns {
    fn init(&self, path: &str) -> Result<()> {
        let domain_path = c_string(path, "domain table path")
            .map_err(|_| Error::dns_init_with_path("path contains NUL", path))?;
        if unsafe { ffi::dns_init(domain_path.as_ptr()) } != 0 {
            return Err(Error::dns_init_with_path("failed to load domain table", path));
        }
        Ok(())
    }

    fn destroy(&self) {
        unsafe { ffi::dns_destroy() }
    }
}

/// Owned `struct tundev *`
pub struct TunHandle(NonNull<ffi::TunDev>);

// The engine only touches the device from the thread calling into it and its
// own I/O threads, which it joins in tun_stop.
unsafe impl Send for TunHandle {}

pub struct NativeTunEngine;

impl TunnelEngine for NativeTunEngine {
    type Handle = TunHandle;

    fn allocate(&self) -> Result<TunHandle> {
        NonNull::new(unsafe { ffi::tun_alloc() })
            .map(TunHandle)
            .ok_or_else(|| Error::engine_config("tun_alloc returned null"))
    }

    fn configure(&self, handle: &mut TunHandle, config: &TunnelConfig) -> Result<()> {
        let server = c_string(&config.server, "server endpoint")?;
        let dns = c_string(&config.dns, "dns endpoint")?;

        let rc = unsafe {
            ffi::tun_config(
                handle.0.as_ptr(),
                config.tun_fd,
                config.mtu,
                c_int::from(config.global_proxy),
                c_int::from(config.verbose),
                server.as_ptr(),
                dns.as_ptr(),
            )
        };
        if rc != 0 {
            return Err(Error::engine_config(format!(
                "tun_config failed with {} (server={}, mtu={})",
                rc, config.server, config.mtu
            )));
        }
        debug!("Engine configured on fd={}", config.tun_fd);
        Ok(())
    }

    fn start(&self, handle: &mut TunHandle) -> Result<()> {
        let rc = unsafe { ffi::tun_start(handle.0.as_ptr()) };
        if rc != 0 {
            return Err(Error::engine_start(format!("tun_start failed with {}", rc)));
        }
        Ok(())
    }

    fn stop(&self, handle: &mut TunHandle) {
        unsafe { ffi::tun_stop(handle.0.as_ptr()) }
    }

    fn free(&self, handle: TunHandle) {
        unsafe { ffi::tun_free(handle.0.as_ptr()) }
    }
}
