use crate::types::{ClusterId, NO_CLUSTER, Rgb, UnitId};
use glam::Vec3;

/// Default edge length of a unit's cube.
pub const DEFAULT_UNIT_SIZE: f32 = 10.0;

/// A positioned, sized, coloured data unit.
///
/// Tree links are indices into the owning [`crate::population::Population`];
/// a unit never owns its parent or children.
#[derive(Clone, Debug)]
pub struct Unit {
    pub id: UnitId,
    pub pos: Vec3,
    pub size: f32,
    pub color: Rgb,
    pub category: i32,
    pub visible: bool,
    pub cluster_id: ClusterId,
    pub parent: Option<UnitId>,
    pub children: Vec<UnitId>,
}

/// Axis-aligned cube footprint of a unit, as handed to mesh exporters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cube {
    pub center: Vec3,
    pub size: f32,
}

impl Cube {
    pub fn min(&self) -> Vec3 {
        self.center - Vec3::splat(self.size * 0.5)
    }

    pub fn max(&self) -> Vec3 {
        self.center + Vec3::splat(self.size * 0.5)
    }
}

impl Unit {
    pub fn new(id: UnitId) -> Self {
        Self {
            id,
            pos: Vec3::ZERO,
            size: DEFAULT_UNIT_SIZE,
            color: Rgb::WHITE,
            category: 0,
            visible: true,
            cluster_id: NO_CLUSTER,
            parent: None,
            children: Vec::with_capacity(2),
        }
    }

    pub fn at(id: UnitId, pos: Vec3) -> Self {
        Self {
            pos,
            ..Self::new(id)
        }
    }

    #[inline]
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Root of a cluster: has children and no parent.
    #[inline]
    pub fn is_top_level(&self) -> bool {
        self.has_children() && !self.is_child()
    }

    /// Neither parent nor children.
    #[inline]
    pub fn is_unattached(&self) -> bool {
        !self.is_child() && !self.has_children()
    }

    pub fn footprint(&self) -> Cube {
        Cube {
            center: self.pos,
            size: self.size,
        }
    }
}
