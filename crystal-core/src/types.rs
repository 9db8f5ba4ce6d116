/// Identifier for a unit in a [`crate::population::Population`].
///
/// This is an index into `Population::units`, and is only meaningful within
/// the lifetime of a given `Population` instance. Reloading a dataset
/// replaces the whole arena, so handles never survive a reload.
pub type UnitId = usize;

/// Cluster identifier shared by every unit of one tree.
///
/// `0` means "unattached / no cluster yet assigned".
pub type ClusterId = u32;

/// The "no cluster" identifier carried by unattached units.
pub const NO_CLUSTER: ClusterId = 0;

/// Three colour channels (conceptually RGB), one byte each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::WHITE
    }
}

/// Hands out fresh cluster identifiers, starting at 1.
///
/// An identifier is minted the first time a previously unattached unit
/// becomes the attachment point of a merge.
#[derive(Debug)]
pub struct ClusterIdAllocator {
    next: ClusterId,
}

impl ClusterIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next identifier and advances the counter.
    pub fn mint(&mut self) -> ClusterId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The identifier the next call to [`ClusterIdAllocator::mint`] will return.
    pub fn peek(&self) -> ClusterId {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}

impl Default for ClusterIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_starts_at_one_and_is_monotonic() {
        let mut ids = ClusterIdAllocator::new();
        assert_eq!(ids.peek(), 1);
        assert_eq!(ids.mint(), 1);
        assert_eq!(ids.mint(), 2);
        assert_eq!(ids.peek(), 3);

        ids.reset();
        assert_eq!(ids.mint(), 1);
    }
}
