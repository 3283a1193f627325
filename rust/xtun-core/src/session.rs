//! Session lifecycle: `init -> start -> stop`.
//!
//! The host drives these three calls and serializes them relative to each
//! other. The engine handle and the protect capability are the only shared
//! state; the handle lives behind the session mutex, the capability inside
//! [`SocketProtector`] so engine threads can call `protect` while the host is
//! in the middle of `stop`.

use crate::config::SessionConfig;
use crate::engine::{TunnelConfig, TunnelEngine};
use crate::error::{Error, Result};
use crate::logging;
use crate::socket_protect::{ProtectCapability, SocketProtector};
use crate::subsystem::{DnsState, SubsystemInitializer};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Engine allocated and configured, not forwarding yet
    Initialized,
    Running,
    Stopped,
}

struct SessionInner<H> {
    state: SessionState,
    handle: Option<H>,
    global_proxy: bool,
    dns: DnsState,
}

impl<H> SessionInner<H> {
    fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            handle: None,
            global_proxy: false,
            dns: DnsState::Skipped,
        }
    }

    fn is_live(&self) -> bool {
        self.handle.is_some() || self.dns == DnsState::Loaded
    }
}

pub struct SessionController<E: TunnelEngine> {
    engine: E,
    subsystems: SubsystemInitializer,
    protector: Arc<SocketProtector>,
    inner: Mutex<SessionInner<E::Handle>>,
}

impl<E: TunnelEngine> SessionController<E> {
    pub fn new(engine: E, subsystems: SubsystemInitializer, protector: Arc<SocketProtector>) -> Self {
        Self {
            engine,
            subsystems,
            protector,
            inner: Mutex::new(SessionInner::new()),
        }
    }

    /// Prepare a session: register the protect capability, bring up crypto
    /// and (outside global-proxy mode) DNS, then allocate and configure the
    /// engine without starting it.
    ///
    /// A session left over from a previous `init` is torn down first, once
    /// `config` has passed validation. On failure no engine handle exists
    /// afterwards.
    pub fn init(&self, capability: Arc<dyn ProtectCapability>, config: SessionConfig) -> Result<()> {
        let _perf = logging::time_operation("Session init");

        // Registered even if the rest fails, the host retries the whole init
        self.protector.register(capability);

        config.validate()?;
        debug!("Initializing session with {:?}", config);

        let mut inner = self.inner.lock();
        if inner.handle.is_some() {
            warn!(
                "init called with a live session ({:?}), tearing it down first",
                inner.state
            );
            self.teardown(&mut inner);
        }
        inner.state = SessionState::Uninitialized;

        self.subsystems.init_crypto(&config.passphrase)?;

        inner.global_proxy = config.global_proxy;
        let dns = self
            .subsystems
            .init_dns(config.global_proxy, &config.domain_table)?;

        let handle = match self.configure_engine(&config) {
            Ok(handle) => handle,
            Err(e) => {
                self.subsystems.destroy_dns(dns);
                return Err(e);
            }
        };

        inner.handle = Some(handle);
        inner.dns = dns;
        inner.state = SessionState::Initialized;
        info!(
            "Session initialized: server={}, mtu={}, global_proxy={}",
            config.server, config.mtu, config.global_proxy
        );
        Ok(())
    }

    fn configure_engine(&self, config: &SessionConfig) -> Result<E::Handle> {
        let mut handle = self.engine.allocate()?;
        if let Err(e) = self.engine.configure(&mut handle, &TunnelConfig::from(config)) {
            self.engine.free(handle);
            debug!("Engine handle freed after configuration failure");
            return Err(e);
        }
        Ok(handle)
    }

    /// Begin packet forwarding on the engine prepared by [`init`](Self::init)
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Initialized {
            return Err(Error::invalid_state(format!(
                "cannot start from {:?}",
                inner.state
            )));
        }

        let handle = inner
            .handle
            .as_mut()
            .ok_or_else(|| Error::invalid_state("no engine handle"))?;
        self.engine.start(handle)?;

        inner.state = SessionState::Running;
        info!("Session started");
        Ok(())
    }

    /// Stop forwarding, free the engine and tear down DNS if it was loaded.
    ///
    /// No-op when there is no session.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Running | SessionState::Initialized => {
                self.teardown(&mut inner);
                info!("Session stopped");
            }
            SessionState::Uninitialized | SessionState::Stopped => {
                debug!("stop called in {:?}, nothing to do", inner.state);
            }
        }
        Ok(())
    }

    /// Module unload: end any session and drop the host capability
    pub fn shutdown(&self) {
        if let Err(e) = self.stop() {
            logging::log_error(&e, Some("Failed to stop session during shutdown"));
        }
        self.protector.release();
    }

    fn teardown(&self, inner: &mut SessionInner<E::Handle>) {
        let _perf = logging::time_operation("Session teardown");

        if let Some(mut handle) = inner.handle.take() {
            if inner.state == SessionState::Running {
                self.engine.stop(&mut handle);
            }
            self.engine.free(handle);
        }

        if !inner.global_proxy {
            self.subsystems.destroy_dns(inner.dns);
        }
        inner.dns = DnsState::Skipped;
        inner.state = SessionState::Stopped;
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_global_proxy(&self) -> bool {
        self.inner.lock().global_proxy
    }

    pub fn has_engine(&self) -> bool {
        self.inner.lock().handle.is_some()
    }

    pub fn protector(&self) -> Arc<SocketProtector> {
        Arc::clone(&self.protector)
    }
}

impl<E: TunnelEngine> Drop for SessionController<E> {
    fn drop(&mut self) {
        let mut inner = std::mem::replace(self.inner.get_mut(), SessionInner::new());
        if inner.is_live() {
            self.teardown(&mut inner);
        }
    }
}
