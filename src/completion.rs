//! Completion flag shared between interrupt context and the main flow.
//!
//! # Ordering contract
//!
//! One writer (the completion interrupt) calls [`CompletionFlag::signal`],
//! one reader (the acquisition path) calls [`CompletionFlag::take`] or
//! [`CompletionFlag::is_set`] followed by [`CompletionFlag::clear`]. The
//! writer's `Release` store pairs with the reader's `Acquire` load, so sample
//! data written before `signal()` is visible once the reader observes the
//! flag.

use std::sync::atomic::{AtomicBool, Ordering};

/// Atomically observed "sequence done" condition.
#[derive(Debug, Default)]
pub struct CompletionFlag {
    raised: AtomicBool,
}

impl CompletionFlag {
    /// Create a lowered flag.
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Raise the flag. Called from the completion interrupt.
    pub fn signal(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether the flag is raised, without consuming it.
    pub fn is_set(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Lower the flag.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Lower the flag and report whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}
