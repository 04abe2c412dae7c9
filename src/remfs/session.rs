//! Session lifetime: device hooks, scoped cleanup and signal handling.
//!
//! On a live tablet the document renderer (`xochitl`) must be paused
//! while we hold the mount and restarted when we let go, whatever way
//! the session ends. That control plane is an external collaborator;
//! here it is a pair of hooks bracketing the mount, with the close hook
//! tied to `Drop` so it runs on every exit path, including the unwind
//! caused by a termination signal.

use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};

/// Commands issued around a mount session.
pub trait SessionHooks {
    /// Called once before the filesystem is mounted.
    fn on_open(&mut self) -> Result<()>;

    /// Called once after unmount. Must not fail; cleanup is best-effort.
    fn on_close(&mut self);
}

/// Hooks for sessions with nothing to pause (the offline local-directory
/// mode).
pub struct NoHooks;

impl SessionHooks for NoHooks {
    fn on_open(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_close(&mut self) {}
}

/// Runs the open hook now and guarantees the close hook at drop.
pub struct SessionGuard<H: SessionHooks> {
    hooks: H,
}

impl<H: SessionHooks> SessionGuard<H> {
    pub fn open(mut hooks: H) -> Result<Self> {
        hooks.on_open()?;
        Ok(Self { hooks })
    }
}

impl<H: SessionHooks> Drop for SessionGuard<H> {
    fn drop(&mut self) {
        self.hooks.on_close();
    }
}

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Convert INT/TERM/HUP into an orderly unmount instead of an abrupt
/// exit, so the session guard still restarts the device renderer.
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGTERM, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGHUP, request_shutdown as libc::sighandler_t);
    }
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Recording {
        opened: Rc<Cell<bool>>,
        closed: Rc<Cell<bool>>,
    }

    impl SessionHooks for Recording {
        fn on_open(&mut self) -> Result<()> {
            self.opened.set(true);
            Ok(())
        }

        fn on_close(&mut self) {
            self.closed.set(true);
        }
    }

    #[test]
    fn close_hook_runs_on_drop() {
        let opened = Rc::new(Cell::new(false));
        let closed = Rc::new(Cell::new(false));
        let guard = SessionGuard::open(Recording {
            opened: opened.clone(),
            closed: closed.clone(),
        })
        .unwrap();
        assert!(opened.get());
        assert!(!closed.get());
        drop(guard);
        assert!(closed.get());
    }
}
