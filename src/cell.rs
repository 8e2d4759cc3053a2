//! Process-wide kernel handle
//!
//! A [`KernelCell`] holds the one live kernel of a hosted application. It
//! moves through `Idle -> Running -> Stopped`; the handle is present only
//! while `Running`. Transitions serialize on a dedicated mutex, while reads
//! of the handle and the state are atomic loads and never block.

use crate::Container;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of a hosted application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplicationState {
    /// Not started yet; no kernel
    #[default]
    Idle,
    /// Started; the kernel is present
    Running,
    /// Stopped; the kernel has been released
    Stopped,
}

impl ApplicationState {
    const fn as_u8(self) -> u8 {
        match self {
            ApplicationState::Idle => 0,
            ApplicationState::Running => 1,
            ApplicationState::Stopped => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ApplicationState::Running,
            2 => ApplicationState::Stopped,
            _ => ApplicationState::Idle,
        }
    }
}

/// Cell holding the kernel handle and the lock serializing its transitions.
///
/// Use [`KernelCell::global`] for the process-wide cell. Separate cells can
/// be declared as statics, which keeps independent applications (and tests)
/// apart.
///
/// ```rust
/// use hosted_injector::{ApplicationState, KernelCell};
///
/// static CELL: KernelCell = KernelCell::new();
///
/// assert!(CELL.load().is_none());
/// assert_eq!(CELL.state(), ApplicationState::Idle);
/// ```
pub struct KernelCell {
    handle: ArcSwapOption<Container>,
    state: AtomicU8,
    transition: Mutex<()>,
}

static GLOBAL_CELL: KernelCell = KernelCell::new();

impl KernelCell {
    /// Create an empty, idle cell.
    pub const fn new() -> Self {
        Self {
            handle: ArcSwapOption::const_empty(),
            state: AtomicU8::new(ApplicationState::Idle.as_u8()),
            transition: Mutex::new(()),
        }
    }

    /// The process-wide cell used by [`HostedApplication::new`](crate::HostedApplication::new).
    pub fn global() -> &'static KernelCell {
        &GLOBAL_CELL
    }

    /// Current kernel handle, if the application is running.
    ///
    /// Never blocks and never observes a partially published kernel.
    #[inline]
    pub fn load(&self) -> Option<Arc<Container>> {
        self.handle.load_full()
    }

    /// Current lifecycle state.
    ///
    /// Never blocks, so hooks running inside a transition may call it. During
    /// a transition it reports the state as of the last completed step.
    #[inline]
    pub fn state(&self) -> ApplicationState {
        ApplicationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Acquire the transition lock.
    ///
    /// A hook that panicked mid-transition poisons the mutex; the state is
    /// still consistent, so the poison is ignored.
    pub(crate) fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the transition lock held.
    pub(crate) fn set_state(&self, state: ApplicationState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn publish(&self, kernel: Arc<Container>) {
        self.handle.store(Some(kernel));
    }

    pub(crate) fn take(&self) -> Option<Arc<Container>> {
        self.handle.swap(None)
    }
}

impl Default for KernelCell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KernelCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCell")
            .field("state", &self.state())
            .field("present", &self.handle.load().is_some())
            .finish()
    }
}
