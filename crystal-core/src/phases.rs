//! Per-tick phases of the clustering engine.
//!
//! A tick with clustering active runs:
//! 1. [`merge_phase`] — every visible unit looks for the first visible
//!    partner in range that is not already in its cluster, and grafts its
//!    tree under that partner.
//! 2. [`gravity_phase`] — the centroid of all attached units is recomputed.
//! 3. [`jiggle_phase`] — every visible root (cluster root or unattached
//!    unit) takes a gravity-biased random step, dragging its subtree along.
//! 4. [`count_phase`] — topology counters are rebuilt from scratch. This
//!    one runs on every tick, active or not.

use crate::{
    config::ClusterParams,
    population::{JiggleField, Population},
    stats::TopologyCounts,
    types::{ClusterIdAllocator, NO_CLUSTER, UnitId},
    unit::Unit,
};
use glam::Vec3;
use rand::Rng;
use tracing::{debug, trace};

/// Returns `true` if both units carry the same nonzero cluster id.
///
/// Two unattached units (id `0`) are never in the same cluster.
#[inline]
pub fn same_cluster(a: &Unit, b: &Unit) -> bool {
    a.cluster_id != NO_CLUSTER && a.cluster_id == b.cluster_id
}

/// Returns `true` if the units are strictly closer than the merge distance.
#[inline]
pub fn in_merge_range(a: &Unit, b: &Unit, params: &ClusterParams) -> bool {
    a.pos.distance(b.pos) < params.merge_distance(a, b)
}

/// Grafts the tree rooted at `sub` under `main`.
///
/// 1. If `main` is unattached it receives a freshly minted cluster id.
/// 2. `main`'s id is propagated over `sub` and its whole subtree.
/// 3. `sub` is appended to `main`'s children and its parent set to `main`.
///
/// ### Panics
/// In debug builds, panics if `sub` is an ancestor of `main` (or `main`
/// itself), since the graft would close a cycle.
pub fn attach(pop: &mut Population, sub: UnitId, main: UnitId, ids: &mut ClusterIdAllocator) {
    debug_assert!(
        !pop.contains_descendant(sub, main),
        "attaching unit {sub} under its own descendant {main}"
    );

    if pop.units[main].cluster_id == NO_CLUSTER {
        let fresh = ids.mint();
        pop.set_cluster_id(main, fresh);
    }

    let cluster = pop.units[main].cluster_id;
    pop.set_cluster_id(sub, cluster);
    pop.add_child(main, sub);
    pop.set_parent(sub, Some(main));
}

/// Merges `d1`'s whole tree into `d2`'s cluster.
///
/// The root of `d1`'s tree is grafted under `d2` itself, so the merged
/// cluster always takes its identity from `d2`'s side.
pub fn bind(pop: &mut Population, d1: UnitId, d2: UnitId, ids: &mut ClusterIdAllocator) {
    let root = pop.topmost_ancestor(d1);
    trace!(unit = d1, root, onto = d2, "merge");
    attach(pop, root, d2, ids);
}

/// Scans all visible pairs and merges those in range.
///
/// Each visible unit `i` walks the visible units `j != i` in index order,
/// skipping partners already in its cluster, and merges with the first
/// one in range, then moves on to the next `i`. Ties are resolved purely
/// by scan order.
///
/// ### Parameters
/// - `pop` - The population; tree links and cluster ids are mutated.
/// - `params` - Provides the merge distance for each pair.
/// - `ids` - Source of fresh cluster ids.
///
/// ### Returns
/// The number of merges performed.
pub fn merge_phase(
    pop: &mut Population,
    params: &ClusterParams,
    ids: &mut ClusterIdAllocator,
) -> usize {
    let n = pop.len();
    let mut merges = 0;

    for i in 0..n {
        if !pop.units[i].visible {
            continue;
        }

        for j in 0..n {
            if i == j || !pop.units[j].visible {
                continue;
            }

            let (a, b) = (&pop.units[i], &pop.units[j]);
            if same_cluster(a, b) {
                continue;
            }

            if in_merge_range(a, b, params) {
                bind(pop, i, j, ids);
                merges += 1;
                break;
            }
        }
    }

    debug!(merges, next_cluster_id = ids.peek(), "merge pass");
    merges
}

/// Recomputes the centroid of every attached unit.
///
/// Unattached units are left out. If nothing is attached the centroid is
/// `Vec3::ZERO`.
pub fn gravity_phase(pop: &Population) -> Vec3 {
    let (sum, count) = pop
        .units
        .iter()
        .filter(|u| !u.is_unattached())
        .fold((Vec3::ZERO, 0usize), |(sum, n), u| (sum + u.pos, n + 1));

    if count == 0 {
        Vec3::ZERO
    } else {
        sum / count as f32
    }
}

/// Jiggles every visible unit that has no parent.
///
/// Children are never jiggled directly; they ride along with their root.
///
/// ### Returns
/// The number of roots that were moved.
pub fn jiggle_phase(pop: &mut Population, field: &JiggleField, rng: &mut impl Rng) -> usize {
    let mut moved = 0;
    for id in 0..pop.len() {
        let u = &pop.units[id];
        if !u.visible || u.is_child() {
            continue;
        }
        pop.jiggle(id, field, rng);
        moved += 1;
    }
    moved
}

/// Rebuilds the topology counters in a single pass over visible units.
///
/// The size cap starts at `min_size_cap` and grows to the largest
/// unattached visible unit.
pub fn count_phase(pop: &Population, min_size_cap: f32) -> TopologyCounts {
    let mut counts = TopologyCounts {
        size_cap: min_size_cap,
        ..TopologyCounts::default()
    };

    for u in pop.units.iter().filter(|u| u.visible) {
        counts.visible += 1;

        if u.is_unattached() {
            counts.size_cap = counts.size_cap.max(u.size);
        }

        if u.is_child() {
            counts.children += 1;
        } else if u.has_children() {
            counts.parents += 1;
        }
    }

    counts.unattached = counts.visible - (counts.parents + counts.children);
    counts
}
