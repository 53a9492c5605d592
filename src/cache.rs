//! Single-slot cache keyed by the locator that produced the cached value.
//!
//! Holds at most one entry. Storing under a new key evicts the previous one,
//! so a lookup only hits when the most recent key is requested again. There is
//! no expiry: the entry lives as long as the owning instance.

#[derive(Debug, Clone)]
pub struct SlotCache<K, V> {
    slot: Option<(K, V)>,
}

impl<K, V> Default for SlotCache<K, V> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<K: PartialEq, V> SlotCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value cached under `key`, if that is the most recent key stored.
    pub fn get(&self, key: &K) -> Option<&V> {
        match &self.slot {
            Some((cached, value)) if cached == key => Some(value),
            _ => None,
        }
    }

    /// Replace the slot contents and return a reference to the stored value.
    pub fn put(&mut self, key: K, value: V) -> &V {
        let (_, value) = self.slot.insert((key, value));
        value
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn key(&self) -> Option<&K> {
        self.slot.as_ref().map(|(key, _)| key)
    }

    pub fn value(&self) -> Option<&V> {
        self.slot.as_ref().map(|(_, value)| value)
    }
}
