//! Chart window for a finished run.
//!
//! The x axis is the position of each index date, so non-trading days do not
//! leave gaps; axis labels map positions back to dates. The initial view is
//! forced on the first frame only, after which drag and zoom belong to the
//! user until "Reset view" is pressed.

use eframe::egui::{self, Color32, RichText, Visuals};
use egui_plot::{AxisHints, Corner, Legend, Line, Plot, PlotPoints};

use techdex_core::{Contribution, IndexPoint, IndexSeries, Tick, TradingDate};

use crate::error::CliError;
use crate::pipeline::RunOutcome;

const BACKGROUND: Color32 = Color32::from_rgb(0x12, 0x12, 0x12);
const AXES_BACKGROUND: Color32 = Color32::from_rgb(0x18, 0x18, 0x18);
const INDEX_LINE: Color32 = Color32::from_rgb(0x00, 0xA2, 0xFF);
const UP: Color32 = Color32::from_rgb(0x44, 0xD4, 0x00);
const DOWN: Color32 = Color32::from_rgb(0xFF, 0x3B, 0x30);
const NEUTRAL: Color32 = Color32::from_rgb(0xAA, 0xAA, 0xAA);
const TEXT: Color32 = Color32::from_rgb(0xE0, 0xE0, 0xE0);
const TEXT_DIM: Color32 = Color32::from_rgb(0x88, 0x88, 0x88);
const GRID: Color32 = Color32::from_rgb(0x33, 0x33, 0x33);

const CONSTITUENT_PALETTE: [Color32; 8] = [
    Color32::from_rgb(0xFF, 0x9F, 0x1C),
    Color32::from_rgb(0x9B, 0x5D, 0xE5),
    Color32::from_rgb(0x2E, 0xC4, 0xB6),
    Color32::from_rgb(0xF1, 0x5B, 0xB5),
    Color32::from_rgb(0xFE, 0xE4, 0x40),
    Color32::from_rgb(0x00, 0xBB, 0xF9),
    Color32::from_rgb(0xE7, 0x6F, 0x51),
    Color32::from_rgb(0x8A, 0xC9, 0x26),
];

/// Open the chart window and block until it is closed.
pub fn show(outcome: RunOutcome, with_constituents: bool) -> Result<(), CliError> {
    let title = format!("{} ({})", outcome.name, outcome.index.alignment());
    let app = ChartApp::new(outcome, with_constituents);

    eframe::run_native(
        &title,
        eframe::NativeOptions::default(),
        Box::new(move |cc| {
            apply_dark_theme(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
    .map_err(|error| CliError::Chart(error.to_string()))
}

struct ChartApp {
    outcome: RunOutcome,
    with_constituents: bool,
    dates: Vec<TradingDate>,
    view: InitialView,
}

impl ChartApp {
    fn new(outcome: RunOutcome, with_constituents: bool) -> Self {
        let dates = outcome.index.points().iter().map(|point| point.date).collect();
        let mut values: Vec<f64> = outcome.index.points().iter().map(|p| p.value).collect();
        if with_constituents {
            values.extend(
                outcome
                    .contributions
                    .iter()
                    .flat_map(|contribution| contribution.points.iter().map(|p| p.value)),
            );
        }
        let view = InitialView::new(outcome.index.len(), &values);

        Self {
            outcome,
            with_constituents,
            dates,
            view,
        }
    }

    fn constituents_panel(&self, ui: &mut egui::Ui) {
        ui.heading(RichText::new("Constituents").color(TEXT));
        ui.add_space(6.0);

        if self.outcome.snapshots.is_empty() {
            ui.label(RichText::new("No price history").color(TEXT_DIM));
        }
        for snapshot in &self.outcome.snapshots {
            let share = self
                .outcome
                .contributions
                .iter()
                .find(|contribution| contribution.symbol == snapshot.symbol)
                .and_then(|contribution| latest_share(&self.outcome.index, contribution));

            ui.horizontal(|ui| {
                ui.label(RichText::new(snapshot.symbol.as_str()).strong().color(TEXT));
                if let Some(share) = share {
                    ui.label(RichText::new(format!("{:.0}%", share * 100.0)).small().color(TEXT_DIM));
                }
            });
            ui.horizontal(|ui| {
                ui.label(RichText::new(format!("{:.2}", snapshot.last_close)).color(TEXT));
                ui.label(
                    RichText::new(format!("{:+.2}%", snapshot.change_pct))
                        .color(tick_color(snapshot.tick)),
                );
            });
            ui.label(RichText::new(snapshot.as_of.format_iso()).small().color(TEXT_DIM));
            ui.separator();
        }

        if !self.outcome.index.excluded().is_empty() {
            ui.label(RichText::new("Excluded").color(TEXT_DIM));
            for exclusion in self.outcome.index.excluded() {
                ui.label(RichText::new(exclusion.symbol.as_str()).color(NEUTRAL));
            }
        }
    }

    fn plot(&mut self, ui: &mut egui::Ui) {
        let index = &self.outcome.index;
        if index.is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No overlapping history to plot").color(TEXT_DIM));
            });
            return;
        }

        if let Some(summary) = index.summary() {
            ui.horizontal(|ui| {
                ui.heading(RichText::new(self.outcome.name).color(TEXT));
                ui.label(RichText::new(format!("{:.2}", summary.last.value)).strong().color(TEXT));
                ui.label(
                    RichText::new(format!("{:+.2}%", summary.change_pct))
                        .color(change_color(summary.change_pct)),
                );
                if ui.button("Reset view").clicked() {
                    self.view.reset();
                }
            });
        }

        let dates = self.dates.clone();
        let x_axis = AxisHints::new_x().formatter(move |grid_mark, _range| {
            date_label(&dates, grid_mark.value).unwrap_or_default()
        });
        let y_axis = AxisHints::new_y().formatter(|grid_mark, _range| format!("{:.2}", grid_mark.value));

        let forced = self.view.take();

        Plot::new("index_plot")
            .legend(Legend::default().position(Corner::LeftTop))
            .custom_x_axes(vec![x_axis])
            .custom_y_axes(vec![y_axis])
            .show(ui, |plot_ui| {
                if let Some(((x_low, x_high), y)) = forced {
                    plot_ui.set_plot_bounds_x(x_low..=x_high);
                    if let Some((low, high)) = y {
                        plot_ui.set_plot_bounds_y(low..=high);
                    }
                }

                plot_ui.line(
                    Line::new(self.outcome.name, positions(index, index.points()))
                        .color(INDEX_LINE)
                        .width(2.0),
                );

                if self.with_constituents {
                    for (slot, contribution) in self.outcome.contributions.iter().enumerate() {
                        plot_ui.line(
                            Line::new(
                                contribution.symbol.as_str(),
                                positions(index, &contribution.points),
                            )
                            .color(CONSTITUENT_PALETTE[slot % CONSTITUENT_PALETTE.len()])
                            .width(1.0),
                        );
                    }
                }
            });
    }
}

impl eframe::App for ChartApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::SidePanel::right("constituents")
            .resizable(false)
            .min_width(170.0)
            .show(ctx, |ui| self.constituents_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.plot(ui));
    }
}

fn apply_dark_theme(ctx: &egui::Context) {
    let mut visuals = Visuals::dark();
    visuals.panel_fill = BACKGROUND;
    visuals.window_fill = BACKGROUND;
    visuals.extreme_bg_color = AXES_BACKGROUND;
    visuals.widgets.noninteractive.fg_stroke.color = TEXT;
    visuals.widgets.noninteractive.bg_stroke.color = GRID;
    ctx.set_visuals(visuals);
}

type Range = (f64, f64);

/// Bounds the plot opens with, forced once and again after each reset.
#[derive(Debug, Clone, Copy, PartialEq)]
struct InitialView {
    x: Range,
    y: Option<Range>,
    pending: bool,
}

impl InitialView {
    fn new(points: usize, values: &[f64]) -> Self {
        let last_x = points.saturating_sub(1) as f64;
        Self {
            x: (0.0, last_x.max(1.0)),
            y: padded_bounds(values),
            pending: true,
        }
    }

    /// Bounds to force on this frame, if any.
    fn take(&mut self) -> Option<(Range, Option<Range>)> {
        std::mem::replace(&mut self.pending, false).then_some((self.x, self.y))
    }

    fn reset(&mut self) {
        self.pending = true;
    }
}

/// Fraction of the latest index value contributed by one constituent.
fn latest_share(index: &IndexSeries, contribution: &Contribution) -> Option<f64> {
    let last = contribution.points.last()?;
    let total = index.value_on(last.date)?;
    (total != 0.0).then(|| last.value / total)
}

/// Y range over `values`, padded by a tenth of the span plus a constant so a
/// flat series still gets a visible band.
fn padded_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let (low, high) = values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, value| match acc {
            Some((low, high)) => Some((low.min(value), high.max(value))),
            None => Some((value, value)),
        })?;
    let padding = (high - low) * 0.1 + 0.01;
    Some((low - padding, high + padding))
}

/// Map points onto the index's x positions; dates not on the index are dropped.
fn positions(index: &IndexSeries, points: &[IndexPoint]) -> PlotPoints<'static> {
    let dates: Vec<TradingDate> = index.points().iter().map(|point| point.date).collect();
    points
        .iter()
        .filter_map(|point| {
            dates
                .binary_search(&point.date)
                .ok()
                .map(|x| [x as f64, point.value])
        })
        .collect::<Vec<_>>()
        .into()
}

/// Date under an x position, if the position lands on a whole index slot.
fn date_label(dates: &[TradingDate], x: f64) -> Option<String> {
    if !x.is_finite() || x < 0.0 || x.fract() != 0.0 {
        return None;
    }
    dates.get(x as usize).map(|date| date.format_iso())
}

fn tick_color(tick: Tick) -> Color32 {
    match tick {
        Tick::Up => UP,
        Tick::Down => DOWN,
        Tick::Flat => NEUTRAL,
    }
}

fn change_color(change_pct: f64) -> Color32 {
    if change_pct > 0.0 {
        UP
    } else if change_pct < 0.0 {
        DOWN
    } else {
        NEUTRAL
    }
}
