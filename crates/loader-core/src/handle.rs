//! Cooperative cancellation handle shared between the registry and a
//! running loader task.

use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Live state of a loader as seen by its engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Running,
    Paused,
    Stopped,
}

struct HandleInner {
    state: Mutex<LoaderState>,
    token: CancellationToken,
}

/// Handle flipped by the control surface and read by engine loops at
/// iteration boundaries.
///
/// `Stopped` is terminal: the one-shot token is cancelled and the state can
/// never leave `Stopped` again. `Running` and `Paused` flip back and forth
/// freely.
#[derive(Clone)]
pub struct LoaderHandle {
    inner: Arc<HandleInner>,
}

impl LoaderHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: Mutex::new(LoaderState::Running),
                token: CancellationToken::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoaderState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self) -> LoaderState {
        *self.lock()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == LoaderState::Stopped
    }

    /// Flip `Running` to `Paused`. Returns whether the transition applied.
    pub fn pause(&self) -> bool {
        let mut state = self.lock();
        if *state == LoaderState::Running {
            *state = LoaderState::Paused;
            true
        } else {
            false
        }
    }

    /// Flip `Paused` back to `Running`. Returns whether the transition
    /// applied (resuming a running handle is a no-op success).
    pub fn resume(&self) -> bool {
        let mut state = self.lock();
        match *state {
            LoaderState::Paused => {
                *state = LoaderState::Running;
                true
            }
            LoaderState::Running => true,
            LoaderState::Stopped => false,
        }
    }

    /// Commit the terminal `Stopped` state and fire the cancellation token.
    pub fn stop(&self) {
        *self.lock() = LoaderState::Stopped;
        self.inner.token.cancel();
    }

    /// Resolves once `stop` has been called; used to cut sleeps short.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }
}

impl Default for LoaderHandle {
    fn default() -> Self {
        Self::new()
    }
}
