//! Ingestion boundary: tabular point records and their conversion into
//! a freshly positioned, coloured unit buffer.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use glam::Vec3;
use rand::Rng;
use tracing::info;

use crate::{
    config::{ColorBy, LoadOptions},
    error::{Error, Result},
    population::Population,
    types::Rgb,
    unit::Unit,
};

/// Positions read from the table are multiplied by `scale / SCALE_DIVISOR`.
const SCALE_DIVISOR: f32 = 20.0;

/// One data row.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub category: i32,
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
    pub size: Option<f32>,
    /// Index of the source file, in load order.
    pub file_index: usize,
}

/// Which rows are shown after a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Only rows of this category are visible; everything sits on z = 0.
    Category(i32),
    /// Every row is visible, stacked in z by category.
    All,
}

impl Selection {
    pub fn includes(self, category: i32) -> bool {
        match self {
            Selection::Category(c) => c == category,
            Selection::All => true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub sources: Vec<PathBuf>,
}

/// Fixed colour for a palette slot; unknown slots are white.
pub fn palette(index: i64) -> Rgb {
    match index {
        0 => Rgb(255, 0, 0),
        1 => Rgb(255, 255, 0),
        2 => Rgb(0, 255, 0),
        3 => Rgb(255, 255, 255),
        4 => Rgb(0, 0, 255),
        5 => Rgb(255, 0, 128),
        6 => Rgb(128, 255, 255),
        7 => Rgb(255, 128, 128),
        8 => Rgb(128, 0, 160),
        9 => Rgb(45, 250, 170),
        10 => Rgb(71, 128, 241),
        _ => Rgb::WHITE,
    }
}

/// Colour of a record under the given options.
pub fn color_for(opts: &LoadOptions, category: i32, file_index: usize) -> Rgb {
    if !opts.use_color {
        return Rgb::WHITE;
    }
    match opts.color_by {
        ColorBy::Category => palette(category as i64),
        ColorBy::File => palette(file_index as i64),
    }
}

fn parse_field<T>(row: &csv::StringRecord, line: usize, column: usize) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = row.get(column).ok_or_else(|| Error::Record {
        row: line,
        column,
        reason: "missing column".into(),
    })?;
    raw.parse::<T>().map_err(|e| Error::Record {
        row: line,
        column,
        reason: format!("{raw:?}: {e}"),
    })
}

/// Like `parse_field`, but rejects NaN and infinities.
fn parse_finite(row: &csv::StringRecord, line: usize, column: usize) -> Result<f32> {
    let value = parse_field::<f32>(row, line, column)?;
    if !value.is_finite() {
        return Err(Error::Record {
            row: line,
            column,
            reason: format!("{value} is not a finite number"),
        });
    }
    Ok(value)
}

impl Dataset {
    /// Reads records from CSV data with a header row.
    pub fn read_records<R: Read>(
        reader: R,
        file_index: usize,
        opts: &LoadOptions,
    ) -> Result<Vec<Record>> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (i, row) in csv.records().enumerate() {
            let row = row?;
            // Header is line 1.
            let line = row.position().map_or(i + 2, |p| p.line() as usize);

            let category = parse_field::<i32>(&row, line, opts.category_column)?;
            let z = opts
                .z_column
                .map(|column| parse_finite(&row, line, column))
                .transpose()?;
            let size = match row.get(opts.size_column) {
                Some(raw) if opts.use_size_column && !raw.is_empty() => {
                    let size = parse_finite(&row, line, opts.size_column)?;
                    if size < 0.0 {
                        return Err(Error::Record {
                            row: line,
                            column: opts.size_column,
                            reason: format!("negative size {size}"),
                        });
                    }
                    Some(size)
                }
                _ => None,
            };

            records.push(Record {
                category,
                x: parse_finite(&row, line, opts.x_column)?,
                y: parse_finite(&row, line, opts.y_column)?,
                z,
                size,
                file_index,
            });
        }
        Ok(records)
    }

    /// Loads a single CSV file, or every `.csv` file of a directory in
    /// file-name order.
    pub fn from_path(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| Error::io(path, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
                })
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut dataset = Dataset::default();
        for (file_index, file) in files.into_iter().enumerate() {
            let reader = File::open(&file).map_err(|e| Error::io(&file, e))?;
            let records = Self::read_records(reader, file_index, opts)?;
            info!(file = %file.display(), rows = records.len(), "csv loaded");
            dataset.records.extend(records);
            dataset.sources.push(file);
        }
        Ok(dataset)
    }

    /// Generates `count` records spread uniformly over a square, with
    /// categories `1..=categories`.
    pub fn random(count: usize, categories: i32, half_range: f32, rng: &mut impl Rng) -> Self {
        let categories = categories.max(1);
        let records = (0..count)
            .map(|_| Record {
                category: rng.random_range(1..=categories),
                x: rng.random_range(-half_range..=half_range),
                y: rng.random_range(-half_range..=half_range),
                z: None,
                size: None,
                file_index: 0,
            })
            .collect();

        Self {
            records,
            sources: Vec::new(),
        }
    }

    /// Distinct category tags, ascending.
    pub fn categories(&self) -> Vec<i32> {
        let mut cats: Vec<i32> = self.records.iter().map(|r| r.category).collect();
        cats.sort_unstable();
        cats.dedup();
        cats
    }

    /// Builds a fresh unit buffer for the given selection.
    ///
    /// Every record becomes a unit (invisible if not selected). Positions
    /// are scaled, then the whole buffer is centred on the mean position.
    /// With [`Selection::All`], rows of later files are also lifted by
    /// `file_index * file_spacing * z_scale`.
    pub fn build_units(&self, selection: Selection, opts: &LoadOptions) -> Vec<Unit> {
        let scale = Vec3::new(opts.xy_scale, opts.xy_scale, opts.z_scale) / SCALE_DIVISOR;

        let mut pop = Population::new(
            self.records
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let mut u = Unit::new(i);
                    u.category = r.category;
                    u.visible = selection.includes(r.category);
                    u.color = color_for(opts, r.category, r.file_index);
                    u.size = match r.size {
                        Some(s) if opts.use_size_column && s.is_finite() && s > 0.0 => s,
                        _ => opts.default_size,
                    };
                    u
                })
                .collect(),
        );

        for (i, r) in self.records.iter().enumerate() {
            let mut z = r.z.unwrap_or(0.0);
            if selection == Selection::All {
                z += r.category as f32 * opts.layer_spacing;
            }
            pop.set_position(i, Vec3::new(r.x, r.y, z), scale);
            if selection == Selection::All && r.file_index > 0 {
                let offset = r.file_index as f32 * opts.file_spacing * opts.z_scale;
                pop.translate(i, Vec3::Z * offset);
            }
        }

        if !pop.is_empty() {
            let mean = pop.units.iter().map(|u| u.pos).sum::<Vec3>() / pop.len() as f32;
            for i in 0..pop.len() {
                pop.translate(i, -mean);
            }
        }

        info!(
            rows = pop.len(),
            visible = pop.visible_ids().count(),
            ?selection,
            "units built"
        );
        pop.units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::TempDir;

    const CSV: &str = "\
id,category,x,y,size
a,1,0,0,4
b,1,40,0,0
c,2,0,40,
d,2,40,40,12
";

    fn records(opts: &LoadOptions) -> Vec<Record> {
        Dataset::read_records(CSV.as_bytes(), 0, opts).unwrap()
    }

    fn dataset() -> Dataset {
        let opts = LoadOptions {
            use_size_column: true,
            ..LoadOptions::default()
        };
        Dataset {
            records: records(&opts),
            sources: Vec::new(),
        }
    }

    #[test]
    fn reads_rows_and_skips_header() {
        let recs = records(&LoadOptions::default());
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[1].category, 1);
        assert_eq!((recs[1].x, recs[1].y), (40.0, 0.0));
        assert_eq!(recs[3].z, None);
        // Size column ignored unless enabled.
        assert!(recs.iter().all(|r| r.size.is_none()));
    }

    #[test]
    fn reads_size_column_when_enabled() {
        let ds = dataset();
        let sizes: Vec<Option<f32>> = ds.records.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![Some(4.0), Some(0.0), None, Some(12.0)]);
    }

    #[test]
    fn malformed_row_reports_position() {
        let bad = "id,category,x,y\na,1,0,0\nb,1,oops,0\n";
        let err = Dataset::read_records(bad.as_bytes(), 0, &LoadOptions::default()).unwrap_err();
        match err {
            Error::Record { row, column, .. } => {
                assert_eq!(row, 3);
                assert_eq!(column, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let short = "id,category,x,y\na,1,0\n";
        assert!(matches!(
            Dataset::read_records(short.as_bytes(), 0, &LoadOptions::default()),
            Err(Error::Record { column: 3, .. })
        ));
    }

    #[test]
    fn category_selection_controls_visibility_and_centres_everything() {
        let opts = LoadOptions::default();
        let units = dataset().build_units(Selection::Category(2), &opts);

        let visible: Vec<bool> = units.iter().map(|u| u.visible).collect();
        assert_eq!(visible, vec![false, false, true, true]);

        // Raw mean (20, 20) scaled by 1/20 is (1, 1).
        assert_eq!(units[0].pos, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(units[3].pos, Vec3::new(1.0, 1.0, 0.0));
        assert!(units.iter().all(|u| u.is_unattached()));
        assert_eq!(units.iter().map(|u| u.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn all_selection_stacks_categories_in_z() {
        let opts = LoadOptions::default();
        let units = dataset().build_units(Selection::All, &opts);

        assert!(units.iter().all(|u| u.visible));
        // z = category * 1000 / 20 = 50 or 100, centred on 75.
        assert_eq!(units[0].pos.z, -25.0);
        assert_eq!(units[2].pos.z, 25.0);
    }

    #[test]
    fn size_column_falls_back_on_zero_or_missing() {
        let opts = LoadOptions {
            use_size_column: true,
            ..LoadOptions::default()
        };
        let units = dataset().build_units(Selection::All, &opts);
        let sizes: Vec<f32> = units.iter().map(|u| u.size).collect();
        assert_eq!(sizes, vec![4.0, 10.0, 10.0, 12.0]);

        let units = dataset().build_units(Selection::All, &LoadOptions::default());
        assert!(units.iter().all(|u| u.size == 10.0));
    }

    #[test]
    fn colours_follow_options() {
        let mut opts = LoadOptions::default();
        let units = dataset().build_units(Selection::All, &opts);
        assert_eq!(units[0].color, palette(1));
        assert_eq!(units[2].color, palette(2));

        opts.color_by = ColorBy::File;
        assert_eq!(color_for(&opts, 2, 0), Rgb(255, 0, 0));

        opts.use_color = false;
        assert_eq!(color_for(&opts, 2, 0), Rgb::WHITE);
        assert_eq!(palette(42), Rgb::WHITE);
    }

    #[test]
    fn random_dataset_uses_requested_categories() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let ds = Dataset::random(200, 3, 100.0, &mut rng);
        assert_eq!(ds.records.len(), 200);
        assert_eq!(ds.categories(), vec![1, 2, 3]);
        assert!(
            ds.records
                .iter()
                .all(|r| r.x.abs() <= 100.0 && r.y.abs() <= 100.0)
        );
    }

    #[test]
    fn empty_dataset_builds_no_units() {
        let units = Dataset::default().build_units(Selection::All, &LoadOptions::default());
        assert!(units.is_empty());
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let nan_x = "id,category,x,y\na,1,0,0\nb,1,NaN,0\n";
        assert!(matches!(
            Dataset::read_records(nan_x.as_bytes(), 0, &LoadOptions::default()),
            Err(Error::Record { row: 3, column: 2, .. })
        ));

        let inf_y = "id,category,x,y\na,1,0,inf\n";
        assert!(matches!(
            Dataset::read_records(inf_y.as_bytes(), 0, &LoadOptions::default()),
            Err(Error::Record { row: 2, column: 3, .. })
        ));
    }

    #[test]
    fn bad_sizes_are_rejected_when_size_column_is_used() {
        let opts = LoadOptions {
            use_size_column: true,
            ..LoadOptions::default()
        };
        for bad in ["-4", "NaN", "inf"] {
            let csv = format!("id,category,x,y,size\na,1,0,0,{bad}\nb,1,1,0,3\n");
            assert!(
                matches!(
                    Dataset::read_records(csv.as_bytes(), 0, &opts),
                    Err(Error::Record { row: 2, column: 4, .. })
                ),
                "size {bad} accepted"
            );
        }

        // Ignored when the size column is off.
        let csv = "id,category,x,y,size\na,1,0,0,-4\n";
        let recs = Dataset::read_records(csv.as_bytes(), 0, &LoadOptions::default()).unwrap();
        assert_eq!(recs[0].size, None);
    }

    #[test]
    fn negative_size_in_records_falls_back_to_default() {
        let ds = Dataset {
            records: vec![Record {
                category: 1,
                x: 0.0,
                y: 0.0,
                z: None,
                size: Some(-4.0),
                file_index: 0,
            }],
            sources: Vec::new(),
        };
        let opts = LoadOptions {
            use_size_column: true,
            ..LoadOptions::default()
        };
        let units = ds.build_units(Selection::All, &opts);
        assert_eq!(units[0].size, opts.default_size);
    }

    #[test]
    fn all_selection_lifts_later_files() {
        let record = |file_index| Record {
            category: 1,
            x: 0.0,
            y: 0.0,
            z: None,
            size: None,
            file_index,
        };
        let ds = Dataset {
            records: vec![record(0), record(1)],
            sources: Vec::new(),
        };
        let opts = LoadOptions {
            z_scale: 2.0,
            ..LoadOptions::default()
        };

        // Second file sits 1 * 50 * 2 = 100 above the first.
        let units = ds.build_units(Selection::All, &opts);
        assert_eq!(units[1].pos.z - units[0].pos.z, 100.0);

        let units = ds.build_units(Selection::Category(1), &opts);
        assert_eq!(units[0].pos, units[1].pos);
    }

    #[test]
    fn directory_is_read_in_file_name_order() {
        let tmp = TempDir::new().unwrap();
        let write = |name: &str, body: &str| std::fs::write(tmp.path().join(name), body).unwrap();
        write("b.csv", "id,category,x,y\nb0,2,20,0\nb1,2,21,0\n");
        write("a.CSV", "id,category,x,y\na0,1,10,0\n");
        write("notes.txt", "not,a,csv\n");

        let ds = Dataset::from_path(tmp.path(), &LoadOptions::default()).unwrap();

        let names: Vec<_> = ds
            .sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);

        let rows: Vec<(f32, usize)> = ds.records.iter().map(|r| (r.x, r.file_index)).collect();
        assert_eq!(rows, vec![(10.0, 0), (20.0, 1), (21.0, 1)]);
        assert_eq!(ds.categories(), vec![1, 2]);
    }

    #[test]
    fn single_file_path_is_file_zero() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("one.csv");
        std::fs::write(&path, "id,category,x,y\na,3,1,2\n").unwrap();

        let ds = Dataset::from_path(&path, &LoadOptions::default()).unwrap();
        assert_eq!(ds.sources, vec![path]);
        assert_eq!(ds.records[0].file_index, 0);
        assert_eq!((ds.records[0].x, ds.records[0].y), (1.0, 2.0));
    }

    #[test]
    fn missing_path_is_io_error() {
        let err = Dataset::from_path("/nonexistent/crystals.csv", &LoadOptions::default());
        assert!(matches!(err, Err(Error::Io { .. })));
    }
}
