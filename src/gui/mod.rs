//! Control panel and tray

mod constants;
pub mod panel;
pub mod tray;

pub use panel::run_gui;
