//! Interactive data-crystal viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the cluster engine and the
//! loaded dataset and implements [`eframe::App`] to render units, drive
//! the per-frame clustering tick and expose the controls.

use crystal_core::{
    ClusterEngine, Command,
    config::{CrystalConfig, LoadOptions, MergeThreshold},
    dataset::{Dataset, Selection, color_for},
    types::Rgb,
};
use eframe::App;
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use tracing::info;

/// Main application state for the interactive viewer.
///
/// [`Viewer`] glues together:
/// - The clustering core: [`ClusterEngine`] plus the [`Dataset`] it is
///   (re)loaded from and the [`LoadOptions`] used to build units.
/// - Camera state (orbit angles, zoom, pan).
/// - eframe/egui callbacks for drawing and user interaction.
///
/// The per-frame update is:
/// 1. Handle keyboard shortcuts and panel widgets.
/// 2. Run one engine tick (a recount only, unless clustering is active).
/// 3. Draw visible units and, optionally, cluster labels.
pub struct Viewer {
    engine: ClusterEngine,
    dataset: Dataset,
    opts: LoadOptions,
    categories: Vec<i32>,
    selection: Selection,

    rng: StdRng,

    yaw: f32,
    pitch: f32,
    zoom: f32,
    pan: egui::Vec2,

    show_gui: bool,
    show_labels: bool,
    last_error: Option<String>,
}

impl Viewer {
    /// Creates a viewer showing the first category of `dataset`.
    ///
    /// Falls back to showing every category when the dataset is empty.
    pub fn new(cfg: CrystalConfig, dataset: Dataset, rng: StdRng) -> crystal_core::Result<Self> {
        let categories = dataset.categories();
        let selection = categories
            .first()
            .map_or(Selection::All, |&c| Selection::Category(c));

        let mut viewer = Self {
            engine: ClusterEngine::new(cfg.cluster)?,
            dataset,
            opts: cfg.dataset,
            categories,
            selection,
            rng,
            yaw: 0.0,
            pitch: 0.0,
            zoom: 2.5,
            pan: egui::vec2(0.0, 0.0),
            show_gui: true,
            show_labels: false,
            last_error: None,
        };
        viewer.reload();
        Ok(viewer)
    }

    /// Rebuilds the unit buffer for the current selection.
    ///
    /// All cluster state is discarded and clustering stops.
    fn reload(&mut self) {
        let units = self.dataset.build_units(self.selection, &self.opts);
        self.engine.load(units);
        info!(selection = %self.selection_label(), "dataset reloaded");
    }

    /// Moves to the previous (`step < 0`) or next category, wrapping around.
    fn cycle_category(&mut self, step: i32) {
        if self.categories.is_empty() {
            return;
        }
        let n = self.categories.len() as i32;
        let current = match self.selection {
            Selection::Category(c) => self.categories.iter().position(|&x| x == c),
            Selection::All => None,
        };
        let next = match current {
            Some(i) => (i as i32 + step).rem_euclid(n),
            None if step < 0 => n - 1,
            None => 0,
        };
        self.selection = Selection::Category(self.categories[next as usize]);
        self.reload();
    }

    fn select_all(&mut self) {
        self.selection = Selection::All;
        self.reload();
    }

    fn toggle_color(&mut self) {
        self.opts.use_color = !self.opts.use_color;
        let (opts, records) = (&self.opts, &self.dataset.records);
        self.engine.recolor(|u| {
            let file_index = records.get(u.id).map_or(0, |r| r.file_index);
            color_for(opts, u.category, file_index)
        });
    }

    /// Runs a single clustering tick, even while paused.
    fn step_once(&mut self) {
        let was_active = self.engine.is_active();
        if !was_active && !self.engine.start() {
            return;
        }
        self.engine.tick(&mut self.rng);
        if !was_active {
            self.engine.stop();
        }
    }

    /// Changes the load scales and rescales the live population to match,
    /// keeping its cluster state.
    fn set_scale(&mut self, xy_scale: f32, z_scale: f32) {
        let ratio = Vec3::new(
            xy_scale / self.opts.xy_scale,
            xy_scale / self.opts.xy_scale,
            z_scale / self.opts.z_scale,
        );
        match self.engine.rescale(ratio) {
            Ok(()) => {
                self.opts.xy_scale = xy_scale;
                self.opts.z_scale = z_scale;
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn command(&mut self, command: Command) {
        match self.engine.apply(command) {
            Ok(()) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn selection_label(&self) -> String {
        match self.selection {
            Selection::All => "All".to_owned(),
            Selection::Category(c) => self
                .opts
                .category_name(c)
                .map_or_else(|| format!("Category {c}"), str::to_owned),
        }
    }

    /// Projects a world-space position to screen-space.
    ///
    /// The point is rotated by the orbit angles, scaled by `zoom`, offset
    /// by `pan` and centred inside `rect`. The y-axis is flipped so that
    /// positive y goes up.
    fn project(&self, p: Vec3, rect: egui::Rect) -> egui::Pos2 {
        let v = Quat::from_rotation_x(self.pitch) * Quat::from_rotation_y(self.yaw) * p;
        let center = rect.center();
        egui::pos2(
            center.x + v.x * self.zoom + self.pan.x,
            center.y - v.y * self.zoom + self.pan.y,
        )
    }

    fn color32(c: Rgb) -> egui::Color32 {
        egui::Color32::from_rgb(c.0, c.1, c.2)
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        use egui::Key;

        let pressed = |key| ctx.input(|i| i.key_pressed(key));

        if pressed(Key::Space) {
            self.command(Command::Toggle);
        }
        if pressed(Key::Num1) {
            self.cycle_category(-1);
        }
        if pressed(Key::Num2) {
            self.cycle_category(1);
        }
        if pressed(Key::A) {
            self.select_all();
        }
        if pressed(Key::R) {
            self.reload();
        }
        if pressed(Key::C) {
            self.toggle_color();
        }
        if pressed(Key::L) {
            self.show_labels = !self.show_labels;
        }
        if pressed(Key::G) {
            self.show_gui = !self.show_gui;
        }
    }

    /// Builds the top panel UI (run controls, dataset selection, toggles).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let running = self.engine.is_active();
                if ui
                    .button(if running { "⏸ Pause" } else { "▶ Cluster" })
                    .clicked()
                {
                    self.command(Command::Toggle);
                }

                if ui.button("Step").clicked() {
                    self.step_once();
                }

                if ui.button("Reload").clicked() {
                    self.reload();
                }

                ui.separator();
                if ui.button("◀").clicked() {
                    self.cycle_category(-1);
                }
                ui.label(self.selection_label());
                if ui.button("▶").clicked() {
                    self.cycle_category(1);
                }
                if ui.button("All").clicked() {
                    self.select_all();
                }

                ui.separator();
                let mut use_color = self.opts.use_color;
                if ui.checkbox(&mut use_color, "Colour").changed() {
                    self.toggle_color();
                }
                ui.checkbox(&mut self.show_labels, "Cluster ids");
                ui.add(egui::Slider::new(&mut self.zoom, 0.1..=20.0).text("Zoom"));
            });
        });
    }

    /// Builds the bottom status bar (topology counters).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        let s = self.engine.status();
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("cycles = {}", s.ticks));
                ui.label(format!("visible = {}", s.visible));
                ui.label(format!("unattached = {}", s.unattached));
                ui.label(format!("parents = {}", s.parents));
                ui.label(format!("children = {}", s.children));
                ui.label(format!("total = {}", s.total));
                ui.label(format!("size cap = {:.1}", s.size_cap));
                ui.label(format!("use size column = {}", self.opts.use_size_column));
                if s.converged {
                    ui.colored_label(egui::Color32::LIGHT_GREEN, "converged");
                }
                if let Some(err) = &self.last_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                }
            });
        });
    }

    /// Builds the right-hand panel for clustering parameters.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Clustering");
                let params = *self.engine.params();

                let mut gravity = params.gravity_ratio;
                if ui
                    .add(egui::Slider::new(&mut gravity, 0.001..=1.5).text("gravity"))
                    .changed()
                {
                    self.command(Command::SetGravityRatio(gravity));
                }

                let mut jiggle = params.jiggle_pct;
                if ui
                    .add(egui::Slider::new(&mut jiggle, 0.1..=3.0).text("jiggle"))
                    .changed()
                {
                    self.command(Command::SetJigglePct(jiggle));
                }

                let mut merge = params.merge_pct;
                if ui
                    .add(egui::Slider::new(&mut merge, 0.1..=1.0).text("cluster %"))
                    .changed()
                {
                    self.command(Command::SetMergePct(merge));
                }

                ui.separator();
                ui.heading("Scale");
                let (mut xy, mut z) = (self.opts.xy_scale, self.opts.z_scale);
                let xy_changed = ui
                    .add(egui::Slider::new(&mut xy, 0.25..=4.0).text("xy scale"))
                    .changed();
                let z_changed = ui
                    .add(egui::Slider::new(&mut z, 0.25..=4.0).text("z scale"))
                    .changed();
                if xy_changed || z_changed {
                    self.set_scale(xy, z);
                }

                ui.separator();
                egui::ComboBox::from_label("threshold")
                    .selected_text(params.threshold.label())
                    .show_ui(ui, |ui| {
                        for t in MergeThreshold::ALL {
                            if ui
                                .selectable_label(params.threshold == t, t.label())
                                .clicked()
                            {
                                self.command(Command::SetThreshold(t));
                            }
                        }
                    });

                ui.separator();
                let g = self.engine.gravity_center();
                ui.label(format!("gravity center = ({:.1}, {:.1}, {:.1})", g.x, g.y, g.z));
                ui.label(format!("next cluster id = {}", self.engine.next_cluster_id()));
            });
    }

    /// Builds the central panel where units are drawn and the camera is driven.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Drag orbits, shift-drag pans.
            if response.dragged() {
                let delta = response.drag_delta();
                if ui.input(|i| i.modifiers.shift) {
                    self.pan += delta;
                } else {
                    self.yaw += delta.x * 0.01;
                    self.pitch = (self.pitch + delta.y * 0.01).clamp(-1.55, 1.55);
                }
            }

            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(0.1, 20.0);
            }

            self.engine.tick(&mut self.rng);

            for u in self.engine.population().units.iter().filter(|u| u.visible) {
                let p = self.project(u.pos, rect);
                let side = (u.size * self.zoom).max(2.0);
                painter.rect_filled(
                    egui::Rect::from_center_size(p, egui::vec2(side, side)),
                    0.0,
                    Self::color32(u.color),
                );
            }

            if self.show_labels {
                for label in self.engine.cluster_labels() {
                    let p = self.project(label.pos, rect) + egui::vec2(20.0, -20.0);
                    painter.text(
                        p,
                        egui::Align2::LEFT_BOTTOM,
                        label.cluster_id.to_string(),
                        egui::FontId::monospace(12.0),
                        egui::Color32::WHITE,
                    );
                }
            }

            if self.engine.is_active() {
                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);
        if self.show_gui {
            self.ui_top_panel(ctx);
            self.ui_config_panel(ctx);
            self.ui_status_bar(ctx);
        }
        self.ui_central_panel(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_core::dataset::Record;
    use rand::SeedableRng;

    fn test_rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::new(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    fn record(category: i32, x: f32, y: f32) -> Record {
        Record {
            category,
            x,
            y,
            z: None,
            size: None,
            file_index: 0,
        }
    }

    /// Two tight pairs in categories 1 and 2, far from each other.
    fn viewer() -> Viewer {
        let dataset = Dataset {
            records: vec![
                record(1, 0.0, 0.0),
                record(1, 100.0, 0.0),
                record(2, 4000.0, 0.0),
                record(2, 4100.0, 0.0),
            ],
            sources: Vec::new(),
        };
        Viewer::new(CrystalConfig::default(), dataset, StdRng::seed_from_u64(1)).unwrap()
    }

    #[test]
    fn project_maps_origin_to_panned_center() {
        let mut viewer = viewer();
        let rect = test_rect();
        assert_eq!(viewer.project(Vec3::ZERO, rect), rect.center());

        viewer.pan = egui::vec2(15.0, -7.0);
        viewer.zoom = 2.0;
        let p = viewer.project(Vec3::new(10.0, 5.0, 0.0), rect);
        assert!((p.x - (400.0 + 20.0 + 15.0)).abs() < 1e-4);
        assert!((p.y - (300.0 - 10.0 - 7.0)).abs() < 1e-4);
    }

    #[test]
    fn project_yaw_turns_depth_into_width() {
        let mut viewer = viewer();
        viewer.zoom = 1.0;
        viewer.yaw = std::f32::consts::FRAC_PI_2;
        let p = viewer.project(Vec3::new(0.0, 0.0, -10.0), test_rect());
        assert!((p.x - 390.0).abs() < 1e-3);
    }

    #[test]
    fn starts_on_first_category() {
        let viewer = viewer();
        assert_eq!(viewer.selection, Selection::Category(1));
        assert_eq!(viewer.engine.status().visible, 2);
        assert_eq!(viewer.engine.status().total, 4);
        assert_eq!(viewer.selection_label(), "Category 1");
    }

    #[test]
    fn cycling_categories_wraps_and_reloads() {
        let mut viewer = viewer();
        viewer.step_once();
        assert!(viewer.engine.next_cluster_id() > 1);

        viewer.cycle_category(1);
        assert_eq!(viewer.selection, Selection::Category(2));
        assert_eq!(viewer.engine.next_cluster_id(), 1);

        viewer.cycle_category(1);
        assert_eq!(viewer.selection, Selection::Category(1));
        viewer.cycle_category(-1);
        assert_eq!(viewer.selection, Selection::Category(2));

        viewer.select_all();
        assert_eq!(viewer.engine.status().visible, 4);
        assert_eq!(viewer.selection_label(), "All");
    }

    #[test]
    fn step_once_merges_then_stays_paused() {
        let mut viewer = viewer();
        viewer.step_once();

        let s = viewer.engine.status();
        assert_eq!(s.parents, 1);
        assert_eq!(s.unattached, 0);
        assert!(s.converged);
        assert!(!viewer.engine.is_active());

        // Converged: further steps are refused.
        let ticks = s.ticks;
        viewer.step_once();
        assert_eq!(viewer.engine.ticks(), ticks);
    }

    #[test]
    fn scale_sliders_rescale_live_units_and_later_reloads() {
        let mut viewer = viewer();
        viewer.step_once();
        let before: Vec<Vec3> = viewer.engine.population().units.iter().map(|u| u.pos).collect();
        let next_id = viewer.engine.next_cluster_id();

        viewer.set_scale(2.0, 0.5);
        assert_eq!((viewer.opts.xy_scale, viewer.opts.z_scale), (2.0, 0.5));
        for (u, p) in viewer.engine.population().units.iter().zip(&before) {
            assert_eq!(u.pos, *p * Vec3::new(2.0, 2.0, 0.5));
        }
        // Cluster state survives a rescale.
        assert_eq!(viewer.engine.next_cluster_id(), next_id);

        viewer.reload();
        // Raw x of the first pair is 0 and 100; mean of all four is 2050.
        let x0 = viewer.engine.population().units[0].pos.x;
        assert!((x0 - (0.0 - 2050.0) * 2.0 / 20.0).abs() < 1e-3);
    }

    #[test]
    fn reload_resets_cluster_state() {
        let mut viewer = viewer();
        viewer.step_once();
        viewer.reload();

        let s = viewer.engine.status();
        assert_eq!(s.ticks, 0);
        assert_eq!(s.unattached, 2);
        assert_eq!(s.parents, 0);
        assert_eq!(viewer.engine.next_cluster_id(), 1);
    }

    #[test]
    fn toggle_color_whitens_and_restores() {
        let mut viewer = viewer();
        let first = viewer.engine.population().units[0].color;
        assert_ne!(first, Rgb::WHITE);

        viewer.toggle_color();
        assert!(
            viewer
                .engine
                .population()
                .units
                .iter()
                .all(|u| u.color == Rgb::WHITE)
        );

        viewer.toggle_color();
        assert_eq!(viewer.engine.population().units[0].color, first);
    }

    #[test]
    fn rejected_command_is_reported() {
        let mut viewer = viewer();
        viewer.command(Command::SetMergePct(5.0));
        assert!(viewer.last_error.is_some());
        viewer.command(Command::SetMergePct(0.5));
        assert!(viewer.last_error.is_none());
    }
}
