//! Socket protection for the tunnel engine's own upstream sockets.
//!
//! The engine must exempt every socket it opens from VPN capture, otherwise
//! its traffic to the server is routed back into the tunnel. Only the host
//! can do this, so the host registers a capability here and the engine asks
//! through [`SocketProtector::protect`] from whatever thread it runs on.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::os::raw::c_int;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub type RawFd = c_int;

/// Host-supplied ability to mark a socket as VPN-exempt.
///
/// Implementations must be callable from any thread, including engine
/// threads that did not exist when the capability was registered.
pub trait ProtectCapability: Send + Sync {
    /// Returns exactly what the host reported for `fd`.
    ///
    /// `Err(Error::CapabilityUnavailable)` when the host cannot be reached
    /// from the calling thread.
    fn protect(&self, fd: RawFd) -> Result<bool>;
}

impl<F> ProtectCapability for F
where
    F: Fn(RawFd) -> Result<bool> + Send + Sync,
{
    fn protect(&self, fd: RawFd) -> Result<bool> {
        self(fd)
    }
}

/// Single slot holding the registered protect capability
#[derive(Default)]
pub struct SocketProtector {
    capability: RwLock<Option<Arc<dyn ProtectCapability>>>,
}

impl SocketProtector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `capability`, dropping any previously registered one
    pub fn register(&self, capability: Arc<dyn ProtectCapability>) {
        let previous = self.capability.write().replace(capability);
        if previous.is_some() {
            info!("Socket protect capability replaced");
        } else {
            info!("Socket protect capability registered");
        }
    }

    /// Drop the held capability. Safe to call when nothing is registered.
    pub fn release(&self) {
        if self.capability.write().take().is_some() {
            info!("Socket protect capability released");
        }
    }

    pub fn is_registered(&self) -> bool {
        self.capability.read().is_some()
    }

    pub fn protect(&self, fd: RawFd) -> Result<bool> {
        // Clone out of the slot so a concurrent release never waits on a host call
        let capability = self.capability.read().clone();
        let Some(capability) = capability else {
            error!("No protect capability registered, socket fd={} not protected", fd);
            return Err(Error::capability_unavailable(
                "no capability registered",
                fd,
            ));
        };

        match capability.protect(fd) {
            Ok(true) => {
                debug!("Socket fd={} protected successfully", fd);
                Ok(true)
            }
            Ok(false) => {
                warn!("Host refused to protect socket fd={}", fd);
                Ok(false)
            }
            Err(e) => {
                error!("Failed to protect socket fd={}: {}", fd, e);
                Err(e)
            }
        }
    }

    /// Engine-facing form of [`protect`](Self::protect): any failure means the
    /// socket must not be used.
    pub fn protect_or_refuse(&self, fd: RawFd) -> bool {
        self.protect(fd).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_protect_without_capability() {
        let protector = SocketProtector::new();
        let err = protector.protect(12).unwrap_err();
        assert_eq!(err.code(), "CAPABILITY_UNAVAILABLE");
        assert!(matches!(err, Error::CapabilityUnavailable { fd: Some(12), .. }));
        assert!(!protector.protect_or_refuse(12));
    }

    #[test]
    fn test_protect_forwards_host_answer() {
        let protector = SocketProtector::new();
        protector.register(Arc::new(|fd: RawFd| -> Result<bool> { Ok(fd % 2 == 0) }));

        assert!(protector.protect(4).unwrap());
        assert!(!protector.protect(5).unwrap());
    }

    #[test]
    fn test_capability_error_refuses_socket() {
        let protector = SocketProtector::new();
        protector.register(Arc::new(|fd: RawFd| -> Result<bool> {
            Err(Error::capability_unavailable("thread not attached", fd))
        }));

        assert!(protector.protect(9).is_err());
        assert!(!protector.protect_or_refuse(9));
    }

    #[test]
    fn test_register_replaces_previous() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first_calls);
        let protector = SocketProtector::new();

        let first: Arc<dyn ProtectCapability> = Arc::new(move |_fd: RawFd| -> Result<bool> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        });
        let weak = Arc::downgrade(&first);
        protector.register(first);
        protector.register(Arc::new(|_fd: RawFd| -> Result<bool> { Ok(false) }));

        assert!(weak.upgrade().is_none(), "previous capability still held");
        assert!(!protector.protect(3).unwrap());
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let protector = SocketProtector::new();
        protector.release();
        protector.register(Arc::new(|_fd: RawFd| -> Result<bool> { Ok(true) }));
        assert!(protector.is_registered());
        protector.release();
        protector.release();
        assert!(!protector.is_registered());
        assert!(protector.protect(1).is_err());
    }

    #[test]
    fn test_protect_from_other_threads() {
        let protector = Arc::new(SocketProtector::new());
        protector.register(Arc::new(|fd: RawFd| -> Result<bool> { Ok(fd >= 0) }));

        let handles: Vec<_> = (0..8)
            .map(|fd| {
                let protector = Arc::clone(&protector);
                std::thread::spawn(move || protector.protect(fd))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().unwrap());
        }
    }

    #[test]
    fn test_release_during_inflight_protect() {
        let protector = Arc::new(SocketProtector::new());
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (resume_tx, resume_rx) = std::sync::mpsc::channel::<()>();
        let entered_tx = parking_lot::Mutex::new(entered_tx);
        let resume_rx = parking_lot::Mutex::new(resume_rx);

        protector.register(Arc::new(move |_fd: RawFd| -> Result<bool> {
            let _ = entered_tx.lock().send(());
            let _ = resume_rx.lock().recv();
            Ok(true)
        }));

        let worker = {
            let protector = Arc::clone(&protector);
            std::thread::spawn(move || protector.protect(7))
        };

        entered_rx.recv().unwrap();
        // Must not block on the in-flight call
        protector.release();
        assert!(!protector.is_registered());
        resume_tx.send(()).unwrap();

        assert!(worker.join().unwrap().unwrap());
        assert!(protector.protect(7).is_err());
    }
}
