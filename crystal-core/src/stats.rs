/// Topology counters derived from a full scan of the population.
///
/// Recomputed from scratch every tick by [`crate::phases::count_phase`];
/// never maintained incrementally.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TopologyCounts {
    pub visible: usize,
    /// Visible units with a parent.
    pub children: usize,
    /// Visible roots with at least one child.
    pub parents: usize,
    /// `visible - (parents + children)`.
    pub unattached: usize,
    /// Largest unattached visible size, floored at the configured minimum.
    pub size_cap: f32,
}

impl TopologyCounts {
    /// One cluster root and nothing left unattached.
    ///
    /// An empty population never counts as converged.
    pub fn is_converged(&self) -> bool {
        self.unattached == 0 && self.parents == 1
    }
}

/// Read-only status snapshot for display and telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Status {
    pub total: usize,
    pub visible: usize,
    pub unattached: usize,
    pub parents: usize,
    pub children: usize,
    /// Ticks run since clustering was last (re)loaded.
    pub ticks: u64,
    pub size_cap: f32,
    pub active: bool,
    pub converged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_counts_are_not_converged() {
        assert!(!TopologyCounts::default().is_converged());
    }

    #[test]
    fn single_root_without_stragglers_is_converged() {
        let counts = TopologyCounts {
            visible: 3,
            children: 2,
            parents: 1,
            unattached: 0,
            size_cap: 2.0,
        };
        assert!(counts.is_converged());

        let two_roots = TopologyCounts {
            parents: 2,
            children: 1,
            ..counts
        };
        assert!(!two_roots.is_converged());
    }
}
