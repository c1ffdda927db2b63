use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Default quiet window between the last change event and reconciliation.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct Slots {
    counter: u64,
    pending: HashMap<String, u64>,
}

/// Per-identity single-slot timer: each new event for an identity
/// supersedes its pending one, so a burst of changes collapses into one
/// action timed from the last event. Different identities never block each
/// other.
#[derive(Debug)]
pub struct DebounceScheduler {
    window: Duration,
    slots: Arc<Mutex<Slots>>,
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl DebounceScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    /// Queues `action` to run after the quiet window, replacing any action
    /// still pending for the same identity. Callable from any thread.
    pub fn schedule(&self, identity: &str, action: impl FnOnce() + Send + 'static) {
        let generation = {
            let mut slots = self.slots.lock().expect("debounce slots");
            slots.counter += 1;
            let generation = slots.counter;
            slots.pending.insert(identity.to_string(), generation);
            generation
        };
        trace!("debounce slot {generation} armed for {identity:?}");

        let slots = Arc::clone(&self.slots);
        let identity = identity.to_string();
        let window = self.window;
        thread::spawn(move || {
            thread::sleep(window);

            let still_current = {
                let mut slots = slots.lock().expect("debounce slots");
                if slots.pending.get(&identity) == Some(&generation) {
                    slots.pending.remove(&identity);
                    true
                } else {
                    false
                }
            };

            if still_current {
                action();
            }
        });
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.slots.lock().expect("debounce slots").pending.len()
    }
}
