use crate::config::Identity;

/// A memoized value that is either absent or computed since the last
/// invalidation.
///
/// Invalidation clears the value and advances the generation; a value is
/// never patched in place.
#[derive(Debug)]
pub struct CacheSlot<T> {
    value: Option<T>,
    generation: u64,
}

impl<T: Clone> CacheSlot<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            generation: 0,
        }
    }

    pub fn get(&self) -> Option<T> {
        self.value.clone()
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fill(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Clear the value. Returns whether a value was present.
    pub fn invalidate(&mut self) -> bool {
        self.generation += 1;
        self.value.take().is_some()
    }

    /// Clear the value only if it was computed in `generation`
    pub fn invalidate_if(&mut self, generation: u64) -> bool {
        if self.generation == generation && self.is_filled() {
            self.invalidate()
        } else {
            false
        }
    }
}

impl<T: Clone> Default for CacheSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Invalidation notice passed from a cache layer to the layer above it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    AdminsModified,
    GuildsModified,
    /// `None` covers every guild
    ChannelsModified { guild: Option<Identity> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_clears_and_advances_generation() {
        let mut slot = CacheSlot::new();
        slot.fill(7);
        assert_eq!(slot.get(), Some(7));

        assert!(slot.invalidate());
        assert_eq!(slot.get(), None);
        assert_eq!(slot.generation(), 1);
        assert!(!slot.invalidate());
    }

    #[test]
    fn test_invalidate_if_ignores_older_generation() {
        let mut slot = CacheSlot::new();
        slot.fill("old");
        let stale = slot.generation();
        slot.invalidate();
        slot.fill("new");

        assert!(!slot.invalidate_if(stale));
        assert_eq!(slot.get(), Some("new"));
        assert!(slot.invalidate_if(slot.generation()));
    }
}
