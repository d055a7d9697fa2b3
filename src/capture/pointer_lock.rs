//! Exclusive pointer capture as a platform capability.
//!
//! A browser backs this with the Pointer Lock API; headless and native hosts
//! without an equivalent use [`AlwaysHeld`] or [`SoftwareLock`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait PointerLock: Send {
    /// Requests exclusive capture. Returns whether it is held afterwards.
    fn acquire(&mut self) -> bool;
    fn release(&mut self);
    fn is_held(&self) -> bool;
}

/// Capture that can never be lost.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysHeld;

impl PointerLock for AlwaysHeld {
    fn acquire(&mut self) -> bool {
        true
    }

    fn release(&mut self) {}

    fn is_held(&self) -> bool {
        true
    }
}

/// Flag-backed capture; the host can revoke it through a [`LockHandle`].
#[derive(Debug, Default)]
pub struct SoftwareLock {
    held: Arc<AtomicBool>,
}

impl SoftwareLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> LockHandle {
        LockHandle {
            held: self.held.clone(),
        }
    }
}

impl PointerLock for SoftwareLock {
    fn acquire(&mut self) -> bool {
        self.held.store(true, Ordering::Relaxed);
        true
    }

    fn release(&mut self) {
        self.held.store(false, Ordering::Relaxed);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

/// Host-side view of a [`SoftwareLock`].
#[derive(Debug, Clone)]
pub struct LockHandle {
    held: Arc<AtomicBool>,
}

impl LockHandle {
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// User-initiated loss (Esc, focus change).
    pub fn revoke(&self) {
        self.held.store(false, Ordering::Relaxed);
    }
}
