//! The cluster engine: owns a population and drives it one tick at a time.

use glam::Vec3;
use rand::Rng;
use tracing::{info, warn};

use crate::{
    config::{ClusterParams, MergeThreshold, check_merge_pct, check_non_negative},
    error::{Error, Result},
    phases,
    population::{JiggleField, Population},
    stats::{Status, TopologyCounts},
    types::{ClusterId, ClusterIdAllocator, NO_CLUSTER, Rgb, UnitId},
    unit::{Cube, Unit},
};

/// Discrete control commands; each takes effect on the next tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    SetJigglePct(f32),
    SetGravityRatio(f32),
    SetMergePct(f32),
    SetThreshold(MergeThreshold),
}

/// Outcome of a single [`ClusterEngine::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub merges: usize,
    /// Clustering converged on this tick and was switched off.
    pub converged: bool,
}

/// Screen label for one cluster root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterLabel {
    pub unit: UnitId,
    pub cluster_id: ClusterId,
    pub pos: Vec3,
}

#[derive(Debug)]
pub struct ClusterEngine {
    population: Population,
    params: ClusterParams,
    ids: ClusterIdAllocator,
    gravity_center: Vec3,
    counts: TopologyCounts,
    ticks: u64,
    active: bool,
}

impl ClusterEngine {
    /// Creates an engine with an empty population.
    pub fn new(params: ClusterParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            population: Population::default(),
            params,
            ids: ClusterIdAllocator::new(),
            gravity_center: Vec3::ZERO,
            counts: phases::count_phase(&Population::default(), params.min_size_cap),
            ticks: 0,
            active: false,
        })
    }

    pub fn with_units(params: ClusterParams, units: Vec<Unit>) -> Result<Self> {
        let mut engine = Self::new(params)?;
        engine.load(units);
        Ok(engine)
    }

    /// Replaces the whole population and resets all cluster state.
    ///
    /// Cluster ids restart at 1, the tick count and gravity center are
    /// cleared and clustering is switched off. Incoming units are expected
    /// to be unattached; any tree links they carry are dropped.
    pub fn load(&mut self, mut units: Vec<Unit>) {
        for (i, u) in units.iter_mut().enumerate() {
            u.id = i;
            u.cluster_id = NO_CLUSTER;
            u.parent = None;
            u.children.clear();
        }

        self.population = Population::new(units);
        self.ids.reset();
        self.gravity_center = Vec3::ZERO;
        self.ticks = 0;
        self.active = false;
        self.counts = phases::count_phase(&self.population, self.params.min_size_cap);

        info!(
            total = self.population.len(),
            visible = self.counts.visible,
            "population loaded"
        );
    }

    /// Runs one animation tick.
    ///
    /// With clustering active this merges, recomputes the gravity center
    /// and jiggles every root. The counters are refreshed on every tick;
    /// if they show convergence, clustering is switched off.
    pub fn tick(&mut self, rng: &mut impl Rng) -> TickReport {
        let mut report = TickReport::default();

        if self.active {
            report.merges = phases::merge_phase(&mut self.population, &self.params, &mut self.ids);
            self.gravity_center = phases::gravity_phase(&self.population);

            let field = JiggleField {
                jiggle_pct: self.params.jiggle_pct,
                size_cap: self.counts.size_cap,
                gravity_center: self.gravity_center,
                gravity_ratio: self.params.gravity_ratio,
            };
            phases::jiggle_phase(&mut self.population, &field, rng);
            self.ticks += 1;
        }

        self.counts = phases::count_phase(&self.population, self.params.min_size_cap);

        if self.active && self.counts.is_converged() {
            self.active = false;
            report.converged = true;
            info!(ticks = self.ticks, units = self.counts.visible, "clustering converged");
        }

        report
    }

    /// Switches clustering on unless the population has already converged.
    ///
    /// Returns whether clustering is active afterwards.
    pub fn start(&mut self) -> bool {
        if self.counts.is_converged() {
            info!("already converged; start ignored");
            self.active = false;
        } else {
            self.active = true;
        }
        self.active
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn toggle(&mut self) -> bool {
        if self.active {
            self.stop();
            false
        } else {
            self.start()
        }
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        let applied = match command {
            Command::Start => {
                self.start();
                Ok(())
            }
            Command::Stop => {
                self.stop();
                Ok(())
            }
            Command::Toggle => {
                self.toggle();
                Ok(())
            }
            Command::SetJigglePct(v) => {
                check_non_negative("jiggle_pct", v).map(|v| self.params.jiggle_pct = v)
            }
            Command::SetGravityRatio(v) => {
                check_non_negative("gravity_ratio", v).map(|v| self.params.gravity_ratio = v)
            }
            Command::SetMergePct(v) => check_merge_pct(v).map(|v| self.params.merge_pct = v),
            Command::SetThreshold(t) => {
                self.params.threshold = t;
                Ok(())
            }
        };

        if let Err(e) = &applied {
            warn!(?command, error = %e, "command rejected");
        }
        applied
    }

    /// Multiplies every unit's coordinates by `scale`.
    ///
    /// Rejected without touching any unit if `scale` has a zero component.
    pub fn rescale(&mut self, scale: Vec3) -> Result<()> {
        if scale.cmpeq(Vec3::ZERO).any() {
            warn!(%scale, "zero scale factor rejected");
            return Err(Error::ZeroScale(scale));
        }
        for id in 0..self.population.len() {
            self.population.scale_position(id, scale)?;
        }
        Ok(())
    }

    /// Recolours every unit.
    pub fn recolor(&mut self, mut color_of: impl FnMut(&Unit) -> Rgb) {
        for u in &mut self.population.units {
            u.color = color_of(u);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_converged(&self) -> bool {
        self.counts.is_converged()
    }

    pub fn counts(&self) -> &TopologyCounts {
        &self.counts
    }

    pub fn gravity_center(&self) -> Vec3 {
        self.gravity_center
    }

    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit> {
        self.population.get(id)
    }

    pub fn next_cluster_id(&self) -> ClusterId {
        self.ids.peek()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn status(&self) -> Status {
        Status {
            total: self.population.len(),
            visible: self.counts.visible,
            unattached: self.counts.unattached,
            parents: self.counts.parents,
            children: self.counts.children,
            ticks: self.ticks,
            size_cap: self.counts.size_cap,
            active: self.active,
            converged: self.counts.is_converged(),
        }
    }

    /// Labels for visible cluster roots only.
    pub fn cluster_labels(&self) -> impl Iterator<Item = ClusterLabel> + '_ {
        self.population
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.visible && u.is_top_level())
            .map(|(unit, u)| ClusterLabel {
                unit,
                cluster_id: u.cluster_id,
                pos: u.pos,
            })
    }

    /// Cube footprints of all visible units, for mesh export.
    pub fn footprints(&self) -> impl Iterator<Item = (UnitId, Cube)> + '_ {
        self.population
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.visible)
            .map(|(id, u)| (id, u.footprint()))
    }
}
