use crate::config::SessionConfig;
use crate::error::Result;

/// Parameters the packet-forwarding engine is configured with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    pub tun_fd: i32,
    pub mtu: i32,
    pub global_proxy: bool,
    pub verbose: bool,
    pub server: String,
    pub dns: String,
}

impl From<&SessionConfig> for TunnelConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            tun_fd: config.tun_fd,
            mtu: config.mtu,
            global_proxy: config.global_proxy,
            verbose: config.verbose,
            server: config.server.clone(),
            dns: config.dns.clone(),
        }
    }
}

/// Packet-forwarding engine operating on the tunnel descriptor.
///
/// The engine runs on execution contexts of its own once started and calls
/// back into the [`SocketProtector`](crate::SocketProtector) for every
/// upstream socket it opens.
pub trait TunnelEngine: Send + Sync {
    type Handle: Send;

    fn allocate(&self) -> Result<Self::Handle>;
    fn configure(&self, handle: &mut Self::Handle, config: &TunnelConfig) -> Result<()>;
    fn start(&self, handle: &mut Self::Handle) -> Result<()>;
    fn stop(&self, handle: &mut Self::Handle);
    /// Release the handle. It must be stopped or never started.
    fn free(&self, handle: Self::Handle);
}
