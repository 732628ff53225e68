use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// A value produced by one action of a scenario and read by later ones.
///
/// Clones share the same cell. A fresh slot is created for every scenario
/// instance, so two scenarios never observe each other's values.
pub struct Slot<T>(Arc<Mutex<Option<T>>>);

impl<T> Slot<T> {
    pub fn new() -> Self {
        Slot(Arc::new(Mutex::new(None)))
    }

    fn cell(&self) -> MutexGuard<'_, Option<T>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, value: T) {
        *self.cell() = Some(value);
    }

    pub fn clear(&self) {
        *self.cell() = None;
    }

    pub fn is_set(&self) -> bool {
        self.cell().is_some()
    }
}

impl<T: Clone> Slot<T> {
    pub fn get(&self) -> Option<T> {
        self.cell().clone()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(Arc::clone(&self.0))
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&*self.cell()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_value() {
        let producer: Slot<String> = Slot::new();
        let consumer = producer.clone();
        assert_eq!(consumer.get(), None);
        producer.set("ref-1".into());
        assert_eq!(consumer.get().as_deref(), Some("ref-1"));
        consumer.clear();
        assert!(!producer.is_set());
    }

    #[test]
    fn default_slots_are_independent() {
        let a: Slot<u32> = Slot::default();
        let b: Slot<u32> = Slot::default();
        a.set(1);
        assert_eq!(b.get(), None);
    }
}
