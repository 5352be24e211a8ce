//! Signal-driven event flags (spec.md §4.I, §9 design note): handlers set
//! a plain `AtomicBool` via `signal_hook::flag::register` and do nothing
//! else, so the actual reaction happens at a safe point between frames,
//! never inside the handler itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGALRM, SIGHUP, SIGINT, SIGQUIT, SIGTERM};

use crate::error::{PradsError, Result};

/// The flags the capture loop checks between frames. `SIGKILL` cannot be
/// intercepted by any process (POSIX), so it is not registered here; it
/// always terminates the process immediately regardless of in-flight state.
pub struct EventFlags {
    shutdown: Arc<AtomicBool>,
    hup: Arc<AtomicBool>,
    alrm: Arc<AtomicBool>,
}

impl EventFlags {
    pub fn register() -> Result<EventFlags> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let hup = Arc::new(AtomicBool::new(false));
        let alrm = Arc::new(AtomicBool::new(false));

        for sig in [SIGINT, SIGTERM, SIGQUIT] {
            signal_hook::flag::register(sig, Arc::clone(&shutdown))
                .map_err(|e| PradsError::Capture(format!("registering signal {sig}: {e}")))?;
        }
        signal_hook::flag::register(SIGHUP, Arc::clone(&hup))
            .map_err(|e| PradsError::Capture(format!("registering SIGHUP: {e}")))?;
        signal_hook::flag::register(SIGALRM, Arc::clone(&alrm))
            .map_err(|e| PradsError::Capture(format!("registering SIGALRM: {e}")))?;

        Ok(EventFlags { shutdown, hup, alrm })
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Read and clear the HUP flag (stats dump happens at most once per
    /// signal, at the next safe point between frames).
    pub fn take_hup(&self) -> bool {
        self.hup.swap(false, Ordering::Relaxed)
    }

    pub fn take_alrm(&self) -> bool {
        self.alrm.swap(false, Ordering::Relaxed)
    }

    /// A handle for tests to simulate signal delivery without a real `kill`.
    #[cfg(test)]
    pub fn test_handle() -> (EventFlags, Arc<AtomicBool>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let hup = Arc::new(AtomicBool::new(false));
        let alrm = Arc::new(AtomicBool::new(false));
        let flags = EventFlags {
            shutdown: Arc::clone(&shutdown),
            hup: Arc::clone(&hup),
            alrm: Arc::clone(&alrm),
        };
        (flags, shutdown, hup, alrm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hup_flag_clears_on_take() {
        let (flags, _shutdown, hup, _alrm) = EventFlags::test_handle();
        hup.store(true, Ordering::Relaxed);
        assert!(flags.take_hup());
        assert!(!flags.take_hup());
    }

    #[test]
    fn shutdown_flag_is_sticky_until_checked() {
        let (flags, shutdown, _hup, _alrm) = EventFlags::test_handle();
        assert!(!flags.shutdown_requested());
        shutdown.store(true, Ordering::Relaxed);
        assert!(flags.shutdown_requested());
    }
}
