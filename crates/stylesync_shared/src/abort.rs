//! Teardown signalling. A session holds an [`AbortSignal`]; when the owning controller aborts,
//! every registered callback runs exactly once.

use std::cell::RefCell;
use std::rc::Rc;

type AbortCallback = Box<dyn FnOnce()>;

#[derive(Default)]
struct AbortState {
    aborted: bool,
    callbacks: Vec<AbortCallback>,
}

#[derive(Clone, Default)]
pub struct AbortController {
    state: Rc<RefCell<AbortState>>,
}

#[derive(Clone)]
pub struct AbortSignal {
    state: Rc<RefCell<AbortState>>,
}

impl AbortController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            state: self.state.clone(),
        }
    }

    /// Aborts the signal. Calling this a second time is a no-op.
    pub fn abort(&self) {
        let callbacks = {
            let mut state = self.state.borrow_mut();
            if state.aborted {
                return;
            }
            state.aborted = true;
            std::mem::take(&mut state.callbacks)
        };

        for callback in callbacks {
            callback();
        }
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.state.borrow().aborted
    }

    /// Registers a callback for when the signal gets aborted. When the signal is already
    /// aborted, the callback runs immediately.
    pub fn on_abort(&self, callback: impl FnOnce() + 'static) {
        if self.is_aborted() {
            callback();
            return;
        }
        self.state.borrow_mut().callbacks.push(Box::new(callback));
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AbortSignal(aborted: {})", self.is_aborted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn callbacks_run_once() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        signal.on_abort(move || c.set(c.get() + 1));

        controller.abort();
        controller.abort();
        assert!(signal.is_aborted());
        assert_eq!(count.get(), 1);

        let c = count.clone();
        signal.on_abort(move || c.set(c.get() + 1));
        assert_eq!(count.get(), 2);
    }
}
