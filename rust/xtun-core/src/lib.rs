//! xTun session core
//!
//! Orchestrates one VPN session on behalf of the host application:
//! - captures the host's socket-protect capability ([`SocketProtector`])
//! - brings up crypto and, outside global-proxy mode, DNS
//!   ([`SubsystemInitializer`])
//! - hands the tunnel descriptor to the packet-forwarding engine and drives
//!   it through `init -> start -> stop` ([`SessionController`])
//!
//! The engine, crypto and DNS implementations live outside this crate and
//! are reached through the [`TunnelEngine`], [`CryptoSubsystem`] and
//! [`DnsSubsystem`] traits.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod session;
pub mod socket_protect;
pub mod subsystem;


pub use config::{LogLevel, Profile, SessionConfig};
pub use engine::{TunnelConfig, TunnelEngine};
pub use error::{Error, Result};
pub use session::{SessionController, SessionState};
pub use socket_protect::{ProtectCapability, RawFd, SocketProtector};
pub use subsystem::{CryptoSubsystem, DnsState, DnsSubsystem, SubsystemInitializer};
