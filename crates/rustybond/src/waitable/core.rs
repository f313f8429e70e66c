use crate::error::{SmpError, SmpResult};
use crate::event::EventSource;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

type Callback<T> = Box<dyn FnOnce(T) + Send>;
type Detach = Box<dyn FnOnce() + Send>;

enum Slot<T> {
    Pending,
    Fired(T),
    TimedOut,
    /// The waiter went away without a callback; late results are dropped
    Abandoned,
    /// The result was handed to the waiter
    Taken,
}

struct CellState<T> {
    slot: Slot<T>,
    callback: Option<Callback<T>>,
    detach: Option<Detach>,
}

struct WaitCell<T> {
    name: &'static str,
    state: Mutex<CellState<T>>,
    cond: Condvar,
}

impl<T> WaitCell<T> {
    fn is_pending(&self) -> bool {
        matches!(self.state.lock().slot, Slot::Pending)
    }
}

/// Resolves the [`Waitable`] it was created with
pub struct Notifier<T> {
    cell: Arc<WaitCell<T>>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + Send + 'static> Notifier<T> {
    /// Resolve with `value`. Returns false if the waitable had already
    /// resolved or timed out, in which case the value is dropped.
    pub fn notify(&self, value: T) -> bool {
        let (callback, detach) = {
            let mut state = self.cell.state.lock();
            if !matches!(state.slot, Slot::Pending) {
                return false;
            }
            state.slot = Slot::Fired(value.clone());
            self.cell.cond.notify_all();
            (state.callback.take(), state.detach.take())
        };

        if let Some(detach) = detach {
            detach();
        }
        if let Some(callback) = callback {
            callback(value);
        }
        true
    }

    /// Install the cleanup run once the waitable resolves or times out.
    /// Runs immediately if that already happened.
    pub fn set_detach<F>(&self, detach: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.cell.state.lock();
        if matches!(state.slot, Slot::Pending) {
            state.detach = Some(Box::new(detach));
        } else {
            drop(state);
            detach();
        }
    }
}

/// A single-shot result that can be waited on with a timeout.
///
/// Waiting consumes the waitable, so it can only be waited on once.
pub struct Waitable<T: Clone + Send + 'static> {
    cell: Arc<WaitCell<T>>,
}

impl<T: Clone + Send + 'static> fmt::Debug for Waitable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waitable")
            .field("name", &self.cell.name)
            .field("pending", &self.cell.is_pending())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Waitable<T> {
    /// Create an unresolved waitable and the notifier that resolves it
    pub fn channel(name: &'static str) -> (Self, Notifier<T>) {
        let cell = Arc::new(WaitCell {
            name,
            state: Mutex::new(CellState {
                slot: Slot::Pending,
                callback: None,
                detach: None,
            }),
            cond: Condvar::new(),
        });
        (
            Self {
                cell: Arc::clone(&cell),
            },
            Notifier { cell },
        )
    }

    /// A waitable that has already resolved with `value`
    pub fn completed(value: T) -> Self {
        let (waitable, notifier) = Self::channel("completed");
        notifier.notify(value);
        waitable
    }

    /// Resolve with the first notification of `source`
    pub fn from_event(source: &EventSource<T>) -> Self {
        Self::from_event_map(source, |args: &T| Some(args.clone()))
    }

    /// Resolve with the first notification of `source` that `map` accepts.
    ///
    /// The listener is unregistered as soon as the waitable resolves or
    /// times out.
    pub fn from_event_map<S, F>(source: &EventSource<S>, map: F) -> Self
    where
        S: 'static,
        F: Fn(&S) -> Option<T> + Send + Sync + 'static,
    {
        let (waitable, notifier) = Self::channel(source.name());
        let listener_notifier = notifier.clone();
        let id = source.register(move |args| {
            if let Some(value) = map(args) {
                listener_notifier.notify(value);
            }
        });

        let source = source.clone();
        notifier.set_detach(move || {
            source.unregister(id);
        });
        waitable
    }

    /// Whether the waitable has not resolved yet
    pub fn is_pending(&self) -> bool {
        self.cell.is_pending()
    }

    /// Block until the result arrives or `timeout` elapses.
    ///
    /// `None` waits forever. On timeout the waitable is detached from its
    /// source, so a late result is discarded. With `fail_on_timeout` a
    /// timeout is returned as [`SmpError::Timeout`], otherwise as `Ok(None)`.
    pub fn wait(self, timeout: Option<Duration>, fail_on_timeout: bool) -> SmpResult<Option<T>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.cell.state.lock();

        while matches!(state.slot, Slot::Pending) {
            match deadline {
                Some(deadline) => {
                    let result = self.cell.cond.wait_until(&mut state, deadline);
                    if result.timed_out() && matches!(state.slot, Slot::Pending) {
                        state.slot = Slot::TimedOut;
                    }
                }
                None => self.cell.cond.wait(&mut state),
            }
        }

        match std::mem::replace(&mut state.slot, Slot::Taken) {
            Slot::Fired(value) => Ok(Some(value)),
            _ => {
                state.slot = Slot::TimedOut;
                state.callback = None;
                let detach = state.detach.take();
                drop(state);

                if let Some(detach) = detach {
                    detach();
                }
                debug!(waitable = self.cell.name, "Timed out waiting for event");
                if fail_on_timeout {
                    Err(SmpError::Timeout(format!(
                        "Timed out waiting for {}",
                        self.cell.name
                    )))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Register a callback for the result instead of (or as well as) waiting.
    ///
    /// Runs immediately if the result is already available. Only one
    /// callback is kept; a later call replaces it.
    pub fn then<F>(self, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        let ready = {
            let mut guard = self.cell.state.lock();
            let state = &mut *guard;
            match &state.slot {
                Slot::Pending => {
                    state.callback = Some(Box::new(callback));
                    None
                }
                Slot::Fired(value) => Some((value.clone(), callback)),
                _ => None,
            }
        };
        if let Some((value, callback)) = ready {
            callback(value);
        }
        self
    }
}

impl<T: Clone + Send + 'static> Drop for Waitable<T> {
    fn drop(&mut self) {
        let detach = {
            let mut state = self.cell.state.lock();
            if !matches!(state.slot, Slot::Pending) || state.callback.is_some() {
                return;
            }
            state.slot = Slot::Abandoned;
            state.detach.take()
        };
        if let Some(detach) = detach {
            detach();
        }
    }
}

/// A waitable resolved by hand through [`GenericWaitable::notify`]
pub struct GenericWaitable<T: Clone + Send + 'static> {
    waitable: Waitable<T>,
    notifier: Notifier<T>,
}

impl<T: Clone + Send + 'static> GenericWaitable<T> {
    pub fn new(name: &'static str) -> Self {
        let (waitable, notifier) = Waitable::channel(name);
        Self { waitable, notifier }
    }

    /// Handle that can resolve this waitable from another thread
    pub fn notifier(&self) -> Notifier<T> {
        self.notifier.clone()
    }

    pub fn notify(&self, value: T) -> bool {
        self.notifier.notify(value)
    }

    pub fn wait(self, timeout: Option<Duration>, fail_on_timeout: bool) -> SmpResult<Option<T>> {
        self.waitable.wait(timeout, fail_on_timeout)
    }

    pub fn into_waitable(self) -> Waitable<T> {
        self.waitable
    }
}
