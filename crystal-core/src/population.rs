//! Arena of [`Unit`]s and the tree / geometry operations over it.
//!
//! Parent and child links are [`UnitId`] indices into `Population::units`.
//! The arena owns every unit and is replaced wholesale on reload, so no
//! link ever outlives the units it points at.

use crate::{
    error::{Error, Result},
    types::{ClusterId, UnitId},
    unit::Unit,
};
use glam::Vec3;
use rand::Rng;

#[derive(Debug, Default)]
pub struct Population {
    pub units: Vec<Unit>,
}

/// Everything a single jiggle needs besides the unit itself.
#[derive(Clone, Copy, Debug)]
pub struct JiggleField {
    /// Fraction of the (capped) unit size used as the displacement range.
    pub jiggle_pct: f32,
    /// Upper bound on the size that feeds the displacement range.
    pub size_cap: f32,
    pub gravity_center: Vec3,
    /// Damping applied to the bound pointing away from the gravity center.
    pub gravity_ratio: f32,
}

/// Per-axis sampling range of a jiggle offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JiggleBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl JiggleField {
    /// Computes the biased displacement range for a unit at `pos` with edge `size`.
    ///
    /// Each axis starts as `[-amount, +amount]` with
    /// `amount = min(size_cap, size) * jiggle_pct`. When
    /// `gravity_center + pos` is positive on an axis the positive bound is
    /// scaled by `gravity_ratio`; when negative, the negative bound is.
    /// A negative or NaN `amount` collapses to zero, so `min <= max` always holds.
    pub fn bounds(&self, pos: Vec3, size: f32) -> JiggleBounds {
        let amount = (self.size_cap.min(size) * self.jiggle_pct).max(0.0);
        let mut min = Vec3::splat(-amount);
        let mut max = Vec3::splat(amount);

        let side = self.gravity_center + pos;
        for axis in 0..3 {
            if side[axis] > 0.0 {
                max[axis] *= self.gravity_ratio;
            } else if side[axis] < 0.0 {
                min[axis] *= self.gravity_ratio;
            }
        }

        JiggleBounds { min, max }
    }
}

impl JiggleBounds {
    /// Draws one offset, sampling every axis independently.
    pub fn sample(&self, rng: &mut impl Rng) -> Vec3 {
        Vec3::new(
            rng.random_range(self.min.x..=self.max.x),
            rng.random_range(self.min.y..=self.max.y),
            rng.random_range(self.min.z..=self.max.z),
        )
    }
}

impl Population {
    pub fn new(units: Vec<Unit>) -> Self {
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Looks up a unit, reporting stale or foreign handles as an error.
    pub fn get(&self, id: UnitId) -> Result<&Unit> {
        self.units.get(id).ok_or(Error::UnknownUnit {
            id,
            len: self.units.len(),
        })
    }

    pub fn visible_ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units
            .iter()
            .enumerate()
            .filter_map(|(i, u)| u.visible.then_some(i))
    }

    /// Sets absolute coordinates, multiplied component-wise by `scale`.
    pub fn set_position(&mut self, id: UnitId, pos: Vec3, scale: Vec3) {
        self.units[id].pos = pos * scale;
    }

    /// Multiplies a unit's own coordinates by `scale`.
    ///
    /// A zero on any axis is rejected and the unit is left untouched.
    pub fn scale_position(&mut self, id: UnitId, scale: Vec3) -> Result<()> {
        if scale.cmpeq(Vec3::ZERO).any() {
            return Err(Error::ZeroScale(scale));
        }
        self.units[id].pos *= scale;
        Ok(())
    }

    /// Ids of `id` and every descendant, parents before children.
    pub fn subtree(&self, id: UnitId) -> Vec<UnitId> {
        let mut out = Vec::with_capacity(1 + self.units[id].children.len());
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            // Reverse so siblings come out in insertion order.
            stack.extend(self.units[cur].children.iter().rev().copied());
        }
        out
    }

    /// Moves a unit and its whole subtree by `delta`.
    pub fn translate(&mut self, id: UnitId, delta: Vec3) {
        for member in self.subtree(id) {
            self.units[member].pos += delta;
        }
    }

    /// Sets the cluster id on a unit and every descendant.
    pub fn set_cluster_id(&mut self, id: UnitId, cluster: ClusterId) {
        for member in self.subtree(id) {
            self.units[member].cluster_id = cluster;
        }
    }

    /// Appends to the children list only; the child's parent link is untouched.
    pub fn add_child(&mut self, parent: UnitId, child: UnitId) {
        self.units[parent].children.push(child);
    }

    /// Removes `child` from the children list; no-op if absent.
    pub fn remove_child(&mut self, parent: UnitId, child: UnitId) {
        self.units[parent].children.retain(|&c| c != child);
    }

    /// Sets the back-reference only; neither children list changes.
    pub fn set_parent(&mut self, child: UnitId, parent: Option<UnitId>) {
        self.units[child].parent = parent;
    }

    /// Follows parent links up to the root of `id`'s tree.
    pub fn topmost_ancestor(&self, id: UnitId) -> UnitId {
        let mut cur = id;
        let mut steps = 0;
        while let Some(parent) = self.units[cur].parent {
            cur = parent;
            steps += 1;
            debug_assert!(steps <= self.units.len(), "cycle above unit {id}");
        }
        cur
    }

    /// True if `other` is `id` itself or anywhere in its subtree.
    pub fn contains_descendant(&self, id: UnitId, other: UnitId) -> bool {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if cur == other {
                return true;
            }
            stack.extend(self.units[cur].children.iter().copied());
        }
        false
    }

    /// Applies a random, gravity-biased offset to `id` and its subtree.
    ///
    /// Returns the offset that was applied.
    pub fn jiggle(&mut self, id: UnitId, field: &JiggleField, rng: &mut impl Rng) -> Vec3 {
        let unit = &self.units[id];
        let offset = field.bounds(unit.pos, unit.size).sample(rng);
        self.translate(id, offset);
        offset
    }
}
