//! Append-only light list with explicit capacity
//!
//! Capacity is tracked separately from the backing `Vec` so growth is
//! exactly a doubling and the scene layout can size the light region from it.

use super::records::LightRecord;

/// What a push did to the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightPush {
    /// The light fit in the existing capacity
    InPlace {
        /// Slot the light was written to
        index: usize,
    },
    /// Capacity doubled to make room
    Grown {
        /// Slot the light was written to
        index: usize,
        /// Capacity before the push
        old_capacity: usize,
        /// Capacity after the push
        new_capacity: usize,
    },
}

impl LightPush {
    /// Slot the light landed in
    pub const fn index(&self) -> usize {
        match *self {
            Self::InPlace { index } | Self::Grown { index, .. } => index,
        }
    }
}

/// Owned, growable sequence of lights
#[derive(Debug, Clone)]
pub struct LightList {
    records: Vec<LightRecord>,
    capacity: usize,
}

impl LightList {
    /// Empty list with room for `initial_capacity` lights (at least one)
    pub fn with_capacity(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1);
        Self { records: Vec::with_capacity(capacity), capacity }
    }

    /// Append a light, doubling capacity when full
    pub fn push(&mut self, light: LightRecord) -> LightPush {
        let index = self.records.len();
        let outcome = if index == self.capacity {
            let old_capacity = self.capacity;
            self.capacity *= 2;
            self.records.reserve_exact(self.capacity - index);
            log::debug!("Light capacity grew {} -> {}", old_capacity, self.capacity);
            LightPush::Grown { index, old_capacity, new_capacity: self.capacity }
        } else {
            LightPush::InPlace { index }
        };
        self.records.push(light);
        outcome
    }

    /// Number of lights
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no lights have been added
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Slots reserved in the scene buffer
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Light at `index`
    pub fn get(&self, index: usize) -> Option<&LightRecord> {
        self.records.get(index)
    }

    /// All lights, in insertion order
    pub fn as_slice(&self) -> &[LightRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(i: usize) -> LightRecord {
        LightRecord::new([i as f32, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    #[test]
    fn test_reads_back_in_order() {
        let mut lights = LightList::with_capacity(4);
        for i in 0..20 {
            assert_eq!(lights.push(light(i)).index(), i);
        }
        assert_eq!(lights.len(), 20);
        for (i, record) in lights.as_slice().iter().enumerate() {
            assert_eq!(record.position[0], i as f32);
        }
    }

    #[test]
    fn test_overflow_doubles_exactly() {
        let mut lights = LightList::with_capacity(2);
        assert_eq!(lights.push(light(0)), LightPush::InPlace { index: 0 });
        assert_eq!(lights.push(light(1)), LightPush::InPlace { index: 1 });
        assert_eq!(
            lights.push(light(2)),
            LightPush::Grown { index: 2, old_capacity: 2, new_capacity: 4 }
        );
        assert_eq!(lights.capacity(), 4);
        assert_eq!(lights.push(light(3)), LightPush::InPlace { index: 3 });
        assert!(matches!(lights.push(light(4)), LightPush::Grown { new_capacity: 8, .. }));

        assert_eq!(lights.get(0), Some(&light(0)));
        assert_eq!(lights.get(1), Some(&light(1)));
        assert_eq!(lights.get(4), Some(&light(4)));
    }

    #[test]
    fn test_zero_initial_capacity_still_holds_one() {
        let mut lights = LightList::with_capacity(0);
        assert_eq!(lights.capacity(), 1);
        assert!(lights.is_empty());
        assert_eq!(lights.push(light(0)), LightPush::InPlace { index: 0 });
        assert!(matches!(lights.push(light(1)), LightPush::Grown { old_capacity: 1, new_capacity: 2, .. }));
    }
}
