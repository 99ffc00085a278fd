use anyhow::{anyhow, Context};
use dirscope::config::Config;
use dirscope::navigator::{DirectoryPicker, DrillDownNavigator, NavStatus, RenderModel, RenderSurface};
use dirscope::units::format_size;
use eframe::egui;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dirscope=info")),
        )
        .init();

    let config = Config::load().context("failed to load configuration")?;
    let start_path = std::env::args().nth(1).map(PathBuf::from);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 700.0])
            .with_title("dirscope - Disk Usage"),
        ..Default::default()
    };

    eframe::run_native(
        "dirscope",
        options,
        Box::new(move |cc| {
            configure_custom_style(&cc.egui_ctx);
            Box::new(DirscopeApp::new(&config, start_path))
        }),
    )
    .map_err(|err| anyhow!("window failed: {err}"))
}

fn configure_custom_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = egui::Visuals::dark();

    visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(30, 41, 59, 240);
    visuals.window_fill = egui::Color32::from_rgba_unmultiplied(30, 41, 59, 230);
    visuals.window_stroke = egui::Stroke::new(1.0, egui::Color32::from_rgba_unmultiplied(255, 255, 255, 26));
    visuals.window_rounding = egui::Rounding::same(12.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);
    visuals.window_shadow = egui::epaint::Shadow::NONE;
    style.visuals = visuals;

    style.spacing.item_spacing = egui::vec2(10.0, 6.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);

    ctx.set_style(style);
}

/// The path field doubles as the directory chooser.
struct PathField<'a>(&'a str);

impl DirectoryPicker for PathField<'_> {
    fn prompt_for_directory(&mut self) -> Option<PathBuf> {
        let trimmed = self.0.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

/// Keeps the last model handed over by the navigator.
#[derive(Default)]
struct ListView {
    model: Option<RenderModel>,
}

impl RenderSurface for ListView {
    fn render(&mut self, model: &RenderModel) {
        self.model = Some(model.clone());
    }
}

enum UiAction {
    Scan,
    Back,
    Home,
    Rescan,
    Breadcrumb(usize),
    Entry(usize),
}

struct DirscopeApp {
    navigator: DrillDownNavigator,
    view: ListView,
    path_input: String,
    filter_input: String,
    watching: bool,
}

impl DirscopeApp {
    fn new(config: &Config, start_path: Option<PathBuf>) -> Self {
        let mut navigator = DrillDownNavigator::from_config(config);
        let path_input = start_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        if let Some(path) = start_path {
            navigator.select_root(path);
        }

        let mut view = ListView::default();
        navigator.present(&mut view);

        Self {
            navigator,
            view,
            path_input,
            filter_input: String::new(),
            watching: config.watch_current_dir,
        }
    }

    fn apply(&mut self, action: UiAction) {
        let launched = match action {
            UiAction::Scan => self.navigator.browse(&mut PathField(&self.path_input)),
            UiAction::Back => self.navigator.back(),
            UiAction::Home => self.navigator.home(),
            UiAction::Rescan => self.navigator.rescan(),
            UiAction::Breadcrumb(index) => self.navigator.open_breadcrumb(index),
            UiAction::Entry(index) => self.navigator.open_entry_at(index),
        };
        if launched {
            self.filter_input.clear();
            if let Some(path) = self.navigator.current_path() {
                self.path_input = path.display().to_string();
            }
        }
        self.navigator.present(&mut self.view);
    }

    /// Bar color ramps from cool blue for small shares to coral for big ones.
    fn share_color(ratio: f32, is_dir: bool) -> egui::Color32 {
        let (r, g, b) = if ratio < 0.15 {
            let t = ratio / 0.15;
            (59.0 + 80.0 * t, 130.0 + 35.0 * t, 246.0)
        } else if ratio < 0.4 {
            (139.0, 92.0, 246.0)
        } else if ratio < 0.7 {
            let t = (ratio - 0.4) / 0.3;
            (245.0 + 6.0 * t, 158.0 + 33.0 * t, 11.0 + 25.0 * t)
        } else {
            let t = ((ratio - 0.7) / 0.3).min(1.0);
            (239.0 + 9.0 * t, 68.0 + 45.0 * t, 68.0 + 45.0 * t)
        };
        let dim = if is_dir { 1.0 } else { 0.85 };
        egui::Color32::from_rgb((r * dim) as u8, (g * dim) as u8, (b * dim) as u8)
    }

    fn top_bar(&mut self, ui: &mut egui::Ui, model: &RenderModel, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            ui.heading("dirscope");
            ui.separator();

            ui.label("Path:");
            let field = ui.add(
                egui::TextEdit::singleline(&mut self.path_input)
                    .hint_text("Folder to scan...")
                    .desired_width(420.0),
            );
            let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Scan").clicked() || submitted {
                actions.push(UiAction::Scan);
            }

            if model.status == NavStatus::Scanning {
                ui.spinner();
            }
        });

        ui.horizontal(|ui| {
            if ui.add_enabled(model.can_go_back, egui::Button::new("⬅ Back")).clicked() {
                actions.push(UiAction::Back);
            }
            let has_root = model.current_path.is_some();
            if ui.add_enabled(has_root, egui::Button::new("Home")).clicked() {
                actions.push(UiAction::Home);
            }
            if ui.add_enabled(has_root, egui::Button::new("Rescan")).clicked() {
                actions.push(UiAction::Rescan);
            }

            ui.separator();

            for (index, crumb) in model.breadcrumbs.iter().enumerate() {
                if index > 0 {
                    ui.label("›");
                }
                if ui.small_button(crumb.label.as_str()).clicked() {
                    actions.push(UiAction::Breadcrumb(index));
                }
            }
        });

        ui.horizontal(|ui| {
            ui.label("Filter:");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.filter_input)
                    .hint_text("Name contains...")
                    .desired_width(240.0),
            );
            if response.changed() {
                self.navigator.set_filter(self.filter_input.clone());
                self.navigator.present(&mut self.view);
            }
        });
    }

    fn entry_list(ui: &mut egui::Ui, model: &RenderModel, actions: &mut Vec<UiAction>) {
        let max_share = model
            .entries
            .iter()
            .map(|e| e.percentage)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new("entries")
                .num_columns(3)
                .striped(true)
                .spacing([16.0, 6.0])
                .show(ui, |ui| {
                    for (index, entry) in model.entries.iter().enumerate() {
                        let icon = if entry.is_dir { "📁" } else { "📄" };
                        let label = ui
                            .add(egui::Button::new(format!("{} {}", icon, entry.name())).frame(false))
                            .on_hover_text(if entry.is_dir {
                                "Open folder"
                            } else {
                                "Show in file manager"
                            });
                        if label.clicked() {
                            actions.push(UiAction::Entry(index));
                        }

                        ui.label(format_size(entry.size_bytes));

                        let ratio = (entry.percentage / max_share) as f32;
                        ui.add(
                            egui::ProgressBar::new((entry.percentage / 100.0) as f32)
                                .desired_width(260.0)
                                .fill(Self::share_color(ratio, entry.is_dir))
                                .text(format!("{:.1}%", entry.percentage)),
                        );
                        ui.end_row();
                    }
                });

            if model.hidden_count > 0 {
                ui.add_space(8.0);
                ui.label(
                    egui::RichText::new(format!("{} more items not shown", model.hidden_count))
                        .color(egui::Color32::GRAY),
                );
            }
        });
    }
}

impl eframe::App for DirscopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.navigator.poll() {
            self.navigator.present(&mut self.view);
            // A watch-triggered rescan resets the filter.
            self.filter_input = self.navigator.filter().to_string();
        }
        let Some(model) = self.view.model.clone() else {
            return;
        };

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            self.top_bar(ui, &model, &mut actions);
        });

        egui::TopBottomPanel::bottom("info_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(model.status_line());
                if model.status == NavStatus::Displaying {
                    ui.separator();
                    ui.label(format!("Total: {}", format_size(model.total_size)));
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match &model.status {
            NavStatus::Displaying => Self::entry_list(ui, &model, &mut actions),
            NavStatus::Scanning => {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
            }
            _ => {
                ui.centered_and_justified(|ui| {
                    ui.label(model.status_line());
                });
            }
        });

        for action in actions {
            self.apply(action);
        }

        if model.status == NavStatus::Scanning {
            ctx.request_repaint();
        } else if self.watching {
            ctx.request_repaint_after(Duration::from_millis(500));
        }
    }
}
