use std::fmt;
use std::sync::{Arc, Mutex};

use crate::provider::Provider;

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Probing,
    LocalReady,
    NativeReady,
    /// No recognition method exists; terminal
    Unavailable,
    Active,
    /// Explicitly stopped; a fresh initialize() may follow
    Stopped,
    /// Fatal error; terminal
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Unavailable | SessionState::Failed)
    }

    pub fn is_ready(self) -> bool {
        matches!(self, SessionState::LocalReady | SessionState::NativeReady)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Probing => "probing",
            SessionState::LocalReady => "local_ready",
            SessionState::NativeReady => "native_ready",
            SessionState::Unavailable => "unavailable",
            SessionState::Active => "active",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shared session state, mutated only through the named transitions below.
///
/// Each transition returns whether it took effect, which lets callers gate
/// exactly-once side effects (error callbacks, end-of-session signals) on
/// the transition itself.
#[derive(Clone)]
pub struct StateCell(Arc<Mutex<SessionState>>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(SessionState::Idle)))
    }

    pub fn get(&self) -> SessionState {
        *self.lock()
    }

    pub fn is_active(&self) -> bool {
        self.get() == SessionState::Active
    }

    /// IDLE/STOPPED/ready → PROBING
    pub fn begin_probing(&self) -> bool {
        self.swap(
            |s| matches!(s, SessionState::Idle | SessionState::Stopped) || s.is_ready(),
            SessionState::Probing,
        )
    }

    /// PROBING → LOCAL_READY | NATIVE_READY
    pub fn mark_ready(&self, provider: Provider) -> bool {
        let next = match provider {
            Provider::Local => SessionState::LocalReady,
            Provider::Native => SessionState::NativeReady,
        };
        self.swap(|s| s == SessionState::Probing, next)
    }

    /// PROBING → UNAVAILABLE (terminal)
    pub fn mark_unavailable(&self) -> bool {
        self.swap(|s| s == SessionState::Probing, SessionState::Unavailable)
    }

    /// ready → ACTIVE
    pub fn activate(&self) -> bool {
        self.swap(|s| s.is_ready(), SessionState::Active)
    }

    /// ACTIVE → STOPPED
    pub fn finish(&self) -> bool {
        self.swap(|s| s == SessionState::Active, SessionState::Stopped)
    }

    /// ready/ACTIVE → FAILED (terminal)
    pub fn fail(&self) -> bool {
        self.swap(
            |s| s == SessionState::Active || s.is_ready(),
            SessionState::Failed,
        )
    }

    fn swap(&self, allowed: impl Fn(SessionState) -> bool, next: SessionState) -> bool {
        let mut state = self.lock();
        if allowed(*state) {
            *state = next;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
