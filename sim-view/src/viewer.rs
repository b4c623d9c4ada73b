//! eframe front end for the orb field.
//!
//! [`Viewer`] measures its drawing area, hands sizes and parameter edits to
//! the [`DisplayAdapter`] and paints the frames coming back from the
//! simulation host as a texture.

use std::time::{Duration, Instant};

use eframe::App;
use orbfield_core::{Dims, Frame, LogoConfig, ObjectFit, RenderMode, Rgba};

use crate::adapter::DisplayAdapter;

/// Upper bound on the time between UI updates, so debounced resizes and
/// new frames are picked up without input events.
const REPAINT_INTERVAL: Duration = Duration::from_millis(8);

/// Main application state for the viewer.
///
/// ### Fields
/// - `adapter` - Link to the simulation host.
/// - `draft` - Configuration as edited in the side panel; pushed to the
///   adapter whenever it differs and validates.
/// - `texture` - Last uploaded frame.
/// - `frame_dims` - Pixel size of the last uploaded frame.
/// - `frames_received` - Frames received since start-up.
/// - `show_config` - Whether the side panel is open.
pub struct Viewer {
    adapter: DisplayAdapter,
    draft: LogoConfig,
    texture: Option<egui::TextureHandle>,
    frame_dims: Option<Dims>,
    frames_received: u64,
    show_config: bool,
}

impl Viewer {
    pub fn new(adapter: DisplayAdapter) -> Self {
        let draft = adapter.config().clone();
        Self {
            adapter,
            draft,
            texture: None,
            frame_dims: None,
            frames_received: 0,
            show_config: false,
        }
    }

    /// Helper to draw a labeled `f64` [`egui::DragValue`].
    fn labeled_drag_f64(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f64,
        range: std::ops::RangeInclusive<f64>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Helper to draw a labeled colour picker for an [`Rgba`].
    fn labeled_color(ui: &mut egui::Ui, label: &str, color: &mut Rgba) {
        ui.horizontal(|ui| {
            ui.label(label);
            let mut rgba = color.to_array();
            if ui.color_edit_button_srgba_unmultiplied(&mut rgba).changed() {
                let [r, g, b, a] = rgba;
                *color = Rgba { r, g, b, a };
            }
        });
    }

    fn upload(&mut self, ctx: &egui::Context, frame: Frame) {
        let dims = frame.dims();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [dims.width as usize, dims.height as usize],
            frame.pixels(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("orbfield", image, egui::TextureOptions::LINEAR));
            }
        }
        self.frame_dims = Some(dims);
        self.frames_received += 1;
    }

    /// Pushes the draft to the adapter once it differs and is valid.
    fn sync_config(&mut self) {
        if self.draft == *self.adapter.config() {
            return;
        }
        match self.draft.validate() {
            Ok(()) => self.adapter.set_config(self.draft.clone()),
            Err(err) => tracing::debug!(%err, "draft configuration not applied"),
        }
    }

    fn ui_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.toggle_value(&mut self.show_config, "⚙ Config");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("frames = {}", self.frames_received));
                    if let Some(dims) = self.adapter.surface() {
                        ui.label(format!("surface = {}×{}", dims.width, dims.height));
                    }
                    ui.label(match self.adapter.config().mode() {
                        RenderMode::Animated => "animated",
                        RenderMode::Static => "static",
                    });
                });
            });
        });
    }

    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        if !self.show_config {
            return;
        }
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Config");

                ui.separator();
                ui.label("Orbs");
                let p = &mut self.draft.params;
                Self::labeled_drag_f64(ui, "orb_radii_in_dim:", &mut p.orb_radii_in_dim, 2.5..=40.0, 0.05);
                Self::labeled_drag_f64(
                    ui,
                    "max_link_thickness_per_radius:",
                    &mut p.max_link_thickness_per_radius,
                    0.05..=1.0,
                    0.01,
                );
                Self::labeled_drag_f64(
                    ui,
                    "max_range_per_radius:",
                    &mut p.max_range_per_radius,
                    0.1..=5.0,
                    0.01,
                );

                ui.separator();
                ui.label("Gas");
                Self::labeled_drag_f64(ui, "gas_density:", &mut p.gas_density, 0.0..=0.001, 0.000_005);
                Self::labeled_drag_f64(ui, "temperature:", &mut p.temperature, 0.0..=50.0, 0.1);

                ui.separator();
                ui.label("Colours");
                Self::labeled_color(ui, "background:", &mut p.background_color);
                Self::labeled_color(ui, "fill:", &mut p.fill_color);

                ui.separator();
                ui.label("Display");
                ui.checkbox(&mut self.draft.static_frame, "static");
                ui.checkbox(&mut self.draft.square, "square");
                ui.add(egui::Slider::new(&mut self.draft.global_alpha, 0.0..=1.0).text("global_alpha"));
                ui.horizontal(|ui| {
                    ui.label("object_fit:");
                    ui.selectable_value(&mut self.draft.object_fit, ObjectFit::Contain, "contain");
                    ui.selectable_value(&mut self.draft.object_fit, ObjectFit::Cover, "cover");
                });

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.draft = LogoConfig::default();
                }
            });
    }

    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let ppp = ctx.pixels_per_point();
                let measured = (
                    (rect.width() * ppp).round() as u32,
                    (rect.height() * ppp).round() as u32,
                );
                self.adapter.observe_size(measured, Instant::now());

                let (Some(texture), Some(dims)) = (&self.texture, self.frame_dims) else {
                    return;
                };
                let image_size = egui::vec2(dims.width as f32, dims.height as f32) / ppp;
                let dest = fit_rect(rect, image_size, self.adapter.config().object_fit);
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                let alpha = (self.adapter.config().global_alpha * 255.0).round() as u8;

                ui.painter_at(rect)
                    .image(texture.id(), dest, uv, egui::Color32::from_white_alpha(alpha));
            });
    }
}

/// Where to paint an image of `image_size` inside `area`, centred.
///
/// `Contain` shows the whole image, `Cover` fills the area and lets the
/// painter's clip rect crop the overflow.
pub fn fit_rect(area: egui::Rect, image_size: egui::Vec2, fit: ObjectFit) -> egui::Rect {
    if image_size.x <= 0.0 || image_size.y <= 0.0 {
        return area;
    }
    let sx = area.width() / image_size.x;
    let sy = area.height() / image_size.y;
    let scale = match fit {
        ObjectFit::Contain => sx.min(sy),
        ObjectFit::Cover => sx.max(sy),
    };
    egui::Rect::from_center_size(area.center(), image_size * scale)
}

impl App for Viewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(frame) = self.adapter.poll(Instant::now()) {
            self.upload(ctx, frame);
        }

        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.sync_config();
        self.ui_central_panel(ctx);

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
