//! Tunables for the clustering engine and the ingestion boundary.
//!
//! Everything can be loaded from TOML; every field has a default so an
//! empty file is a valid configuration.
//!
//! ```toml
//! [cluster]
//! merge_pct = 0.8
//! threshold = "fixed"   # or "mean_size", "smallest_size"
//! jiggle_pct = 0.5
//! gravity_ratio = 0.9
//!
//! [dataset]
//! xy_scale = 1.0
//! layer_spacing = 1000.0
//! file_spacing = 50.0
//!
//! [[dataset.categories]]
//! id = 1
//! name = "Apple"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    unit::{DEFAULT_UNIT_SIZE, Unit},
};

/// How the merge distance between two units is derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeThreshold {
    /// `base_size * merge_pct`, independent of the compared units.
    #[default]
    Fixed,
    /// Mean edge of the two units times `merge_pct`.
    MeanSize,
    /// Smaller edge of the two units times `merge_pct`.
    SmallestSize,
}

impl MergeThreshold {
    pub const ALL: [MergeThreshold; 3] = [
        MergeThreshold::Fixed,
        MergeThreshold::MeanSize,
        MergeThreshold::SmallestSize,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MergeThreshold::Fixed => "fixed",
            MergeThreshold::MeanSize => "mean size",
            MergeThreshold::SmallestSize => "smallest size",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    pub base_size: f32,
    pub merge_pct: f32,
    pub threshold: MergeThreshold,
    pub jiggle_pct: f32,
    pub gravity_ratio: f32,
    /// Floor of the jiggle size cap.
    pub min_size_cap: f32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            base_size: DEFAULT_UNIT_SIZE,
            merge_pct: 0.8,
            threshold: MergeThreshold::Fixed,
            jiggle_pct: 0.5,
            gravity_ratio: 0.9,
            min_size_cap: 2.0,
        }
    }
}

impl ClusterParams {
    /// Distance below which `a` and `b` merge.
    pub fn merge_distance(&self, a: &Unit, b: &Unit) -> f32 {
        let basis = match self.threshold {
            MergeThreshold::Fixed => self.base_size,
            MergeThreshold::MeanSize => (a.size + b.size) * 0.5,
            MergeThreshold::SmallestSize => a.size.min(b.size),
        };
        basis * self.merge_pct
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("base_size", self.base_size)?;
        check_merge_pct(self.merge_pct)?;
        check_non_negative("jiggle_pct", self.jiggle_pct)?;
        check_non_negative("gravity_ratio", self.gravity_ratio)?;
        check_positive("min_size_cap", self.min_size_cap)?;
        Ok(())
    }
}

/// Which palette index a unit's colour is taken from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBy {
    #[default]
    Category,
    /// Index of the source file the row came from.
    File,
}

/// Display name for a category tag.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CategoryName {
    pub id: i32,
    pub name: String,
}

/// How records become positioned units.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Positions are multiplied by `xy_scale / 20` on x and y.
    pub xy_scale: f32,
    /// Positions are multiplied by `z_scale / 20` on z.
    pub z_scale: f32,
    /// z offset per category tag when all categories are shown together.
    pub layer_spacing: f32,
    /// Extra z offset per source file when all categories are shown,
    /// applied after scaling and multiplied by `z_scale`.
    pub file_spacing: f32,
    pub use_size_column: bool,
    pub use_color: bool,
    pub color_by: ColorBy,
    pub default_size: f32,
    pub category_column: usize,
    pub x_column: usize,
    pub y_column: usize,
    pub size_column: usize,
    /// Optional third coordinate column; rows default to z = 0.
    pub z_column: Option<usize>,
    pub categories: Vec<CategoryName>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            xy_scale: 1.0,
            z_scale: 1.0,
            layer_spacing: 1000.0,
            file_spacing: 50.0,
            use_size_column: false,
            use_color: true,
            color_by: ColorBy::Category,
            default_size: DEFAULT_UNIT_SIZE,
            category_column: 1,
            x_column: 2,
            y_column: 3,
            size_column: 4,
            z_column: None,
            categories: Vec::new(),
        }
    }
}

impl LoadOptions {
    pub fn category_name(&self, id: i32) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("xy_scale", self.xy_scale)?;
        check_positive("z_scale", self.z_scale)?;
        check_positive("default_size", self.default_size)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrystalConfig {
    pub cluster: ClusterParams,
    pub dataset: LoadOptions,
}

impl CrystalConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: CrystalConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.dataset.validate()
    }
}

pub(crate) fn check_merge_pct(value: f32) -> Result<f32> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(Error::InvalidParam {
            name: "merge_pct",
            value,
            reason: "must be in (0, 1]",
        })
    }
}

pub(crate) fn check_non_negative(name: &'static str, value: f32) -> Result<f32> {
    if value >= 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidParam {
            name,
            value,
            reason: "must be finite and non-negative",
        })
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<f32> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidParam {
            name,
            value,
            reason: "must be finite and positive",
        })
    }
}
