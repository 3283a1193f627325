use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Session key derivation
pub trait CryptoSubsystem: Send + Sync {
    /// Derive session keys from `passphrase`. Calling it again overwrites the
    /// previous keys.
    fn init(&self, passphrase: &str) -> Result<()>;
}

/// Domain-based name resolution
pub trait DnsSubsystem: Send + Sync {
    /// Load the domain routing table at `path`
    fn init(&self, path: &str) -> Result<()>;
    fn destroy(&self);
}

/// Whether the DNS subsystem holds state that has to be torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsState {
    Loaded,
    /// Global-proxy mode: no domain table was loaded
    Skipped,
}

/// Brings up crypto and DNS for a session, in that order
#[derive(Clone)]
pub struct SubsystemInitializer {
    crypto: Arc<dyn CryptoSubsystem>,
    dns: Arc<dyn DnsSubsystem>,
}

impl SubsystemInitializer {
    pub fn new(crypto: Arc<dyn CryptoSubsystem>, dns: Arc<dyn DnsSubsystem>) -> Self {
        Self { crypto, dns }
    }

    pub fn init_crypto(&self, passphrase: &str) -> Result<()> {
        self.crypto.init(passphrase)?;
        debug!("Crypto subsystem initialized");
        Ok(())
    }

    /// Load the domain table unless running in global-proxy mode.
    ///
    /// Must only be called after [`init_crypto`](Self::init_crypto) succeeded.
    pub fn init_dns(&self, global_proxy: bool, domain_table: &str) -> Result<DnsState> {
        if global_proxy {
            debug!("Global proxy mode, skipping DNS subsystem");
            return Ok(DnsState::Skipped);
        }

        self.dns.init(domain_table)?;
        info!("DNS subsystem loaded domain table {}", domain_table);
        Ok(DnsState::Loaded)
    }

    pub fn destroy_dns(&self, state: DnsState) {
        if state == DnsState::Loaded {
            self.dns.destroy();
            info!("DNS subsystem destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_crypto: bool,
        fail_dns: bool,
    }

    impl CryptoSubsystem for Recorder {
        fn init(&self, passphrase: &str) -> Result<()> {
            self.calls.lock().push(format!("crypto:{}", passphrase));
            if self.fail_crypto {
                return Err(Error::crypto_init("key derivation failed"));
            }
            Ok(())
        }
    }

    impl DnsSubsystem for Recorder {
        fn init(&self, path: &str) -> Result<()> {
            self.calls.lock().push(format!("dns_init:{}", path));
            if self.fail_dns {
                return Err(Error::dns_init_with_path("cannot parse table", path));
            }
            Ok(())
        }

        fn destroy(&self) {
            self.calls.lock().push("dns_destroy".to_string());
        }
    }

    fn initializer(recorder: &Arc<Recorder>) -> SubsystemInitializer {
        SubsystemInitializer::new(recorder.clone(), recorder.clone())
    }

    #[test]
    fn test_dns_skipped_in_global_mode() {
        let recorder = Arc::new(Recorder::default());
        let init = initializer(&recorder);

        assert_eq!(init.init_dns(true, "/data/domains.txt").unwrap(), DnsState::Skipped);
        init.destroy_dns(DnsState::Skipped);
        assert!(recorder.calls.lock().is_empty());
    }

    #[test]
    fn test_dns_loaded_and_destroyed() {
        let recorder = Arc::new(Recorder::default());
        let init = initializer(&recorder);

        init.init_crypto("secret").unwrap();
        let state = init.init_dns(false, "/data/domains.txt").unwrap();
        assert_eq!(state, DnsState::Loaded);
        init.destroy_dns(state);

        assert_eq!(
            *recorder.calls.lock(),
            vec!["crypto:secret", "dns_init:/data/domains.txt", "dns_destroy"]
        );
    }

    #[test]
    fn test_failures_propagate() {
        let recorder = Arc::new(Recorder {
            fail_crypto: true,
            fail_dns: true,
            ..Recorder::default()
        });
        let init = initializer(&recorder);

        assert_eq!(init.init_crypto("bad").unwrap_err().code(), "CRYPTO_INIT");
        assert_eq!(init.init_dns(false, "/missing").unwrap_err().code(), "DNS_INIT");
    }
}
