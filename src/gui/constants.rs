//! GUI-specific constants for layout and status colors

/// Control panel window dimensions
pub const WINDOW_WIDTH: f32 = 360.0;
pub const WINDOW_HEIGHT: f32 = 300.0;
pub const WINDOW_MIN_WIDTH: f32 = 320.0;
pub const WINDOW_MIN_HEIGHT: f32 = 240.0;

pub const WINDOW_TITLE: &str = "Screen Shield";

/// Layout spacing
pub const PADDING: f32 = 8.0;
pub const SECTION_SPACING: f32 = 15.0;
pub const ITEM_SPACING: f32 = 8.0;

/// Status colors
pub const STATUS_ACTIVE: egui::Color32 = egui::Color32::from_rgb(0, 200, 0);
pub const STATUS_INACTIVE: egui::Color32 = egui::Color32::from_rgb(150, 150, 150);
pub const STATUS_SELECTING: egui::Color32 = egui::Color32::from_rgb(200, 200, 0);
