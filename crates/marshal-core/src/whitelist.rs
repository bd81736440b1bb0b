use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::GovernorError;
use crate::model::Model;

/// The set of class names this node is permitted to execute.
///
/// Write-once on boot: `register` fails once [`Whitelist::lock`] has been
/// called (the Governor calls it from `start()`), and fails for a
/// duplicate name regardless. Reads never block a writer because there
/// are none after boot.
#[derive(Default)]
pub struct Whitelist {
    classes: RwLock<HashMap<String, Arc<dyn Model>>>,
    locked: AtomicBool,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, model: Arc<dyn Model>) -> Result<(), GovernorError> {
        let name = name.into();
        if self.locked.load(Ordering::SeqCst) {
            return Err(GovernorError::already_started());
        }
        let mut classes = self.classes.write().expect("whitelist lock poisoned");
        if classes.contains_key(&name) {
            return Err(GovernorError::duplicate_class(name));
        }
        classes.insert(name, model);
        Ok(())
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes
            .read()
            .expect("whitelist lock poisoned")
            .contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Model>> {
        self.classes
            .read()
            .expect("whitelist lock poisoned")
            .get(name)
            .cloned()
    }
}
