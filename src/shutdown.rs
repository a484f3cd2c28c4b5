//! Connection release on every way out of the process.
//!
//! Normal completion, error exits and SIGINT/SIGTERM all end up in
//! [`ShutdownGuard::release`]. On Unix the termination signals are blocked on the main thread
//! and consumed by a dedicated watcher thread, which releases the registered connection and
//! exits with `128 + signal`.

use std::sync::{Arc, OnceLock};

/// Something holding a server-side resource that must be given back before exit.
///
/// Implementations must tolerate being released more than once.
pub trait Release: Send + Sync {
    fn release(&self);
}

impl Release for crate::namespace::zk::ZkNamespace {
    fn release(&self) {
        self.disconnect();
    }
}

#[derive(Clone, Default)]
pub struct ShutdownGuard {
    resource: Arc<OnceLock<Arc<dyn Release>>>,
}

impl ShutdownGuard {
    /// Installs the signal watcher.
    ///
    /// Must run before any other thread is spawned so that every thread inherits the blocked
    /// signal mask and only the watcher ever sees SIGINT/SIGTERM.
    pub fn install() -> std::io::Result<Self> {
        let guard = ShutdownGuard::default();
        #[cfg(unix)]
        unix::spawn_watcher(guard.clone())?;
        Ok(guard)
    }

    /// Registers the resource to release. Only the first registration is kept.
    pub fn register(&self, resource: Arc<dyn Release>) {
        let _ = self.resource.set(resource);
    }

    /// Releases the registered resource, if any.
    pub fn release(&self) {
        if let Some(resource) = self.resource.get() {
            resource.release();
        }
    }
}

#[cfg(unix)]
mod unix {
    use super::ShutdownGuard;
    use std::{io, mem, ptr, thread};
    use tracing::{error, warn};

    const TERMINATION_SIGNALS: [libc::c_int; 2] = [libc::SIGINT, libc::SIGTERM];

    fn termination_set() -> libc::sigset_t {
        // SAFETY: the set is initialized by sigemptyset before sigaddset touches it.
        unsafe {
            let mut set: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut set);
            for signal in TERMINATION_SIGNALS {
                libc::sigaddset(&mut set, signal);
            }
            set
        }
    }

    pub(super) fn spawn_watcher(guard: ShutdownGuard) -> io::Result<()> {
        let set = termination_set();

        // SAFETY: `set` is a valid, initialized signal set and the old mask is not requested.
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, ptr::null_mut()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }

        thread::Builder::new()
            .name("signal-watcher".to_string())
            .spawn(move || {
                let mut signal: libc::c_int = 0;
                // SAFETY: both pointers are valid for the duration of the call.
                let rc = unsafe { libc::sigwait(&set, &mut signal) };
                if rc != 0 {
                    error!(
                        "Waiting for termination signals failed: {}",
                        io::Error::from_raw_os_error(rc)
                    );
                    return;
                }

                warn!("Received signal {}, closing connection", signal);
                guard.release();
                std::process::exit(128 + signal);
            })?;

        Ok(())
    }
}
