//! X11 implementation of the platform windows

mod blur_window;
mod context;
mod context_menu;
pub mod events;
mod interaction_window;
mod selection_overlay;

pub use blur_window::BlurWindow;
pub use context::X11Context;
pub use context_menu::ContextMenu;
pub use interaction_window::InteractionWindow;
pub use selection_overlay::SelectionOverlay;

use anyhow::{Context, Result};

use crate::controller::Platform;
use crate::menu::MenuModel;
use crate::region::{Point, Region};

/// Window factory borrowing the engine's [`X11Context`]
pub struct X11Platform<'a> {
    ctx: &'a X11Context,
}

impl<'a> X11Platform<'a> {
    pub fn new(ctx: &'a X11Context) -> Self {
        Self { ctx }
    }
}

impl<'a> Platform for X11Platform<'a> {
    type Blur = BlurWindow<'a>;
    type Handle = InteractionWindow<'a>;
    type Overlay = SelectionOverlay<'a>;
    type Menu = ContextMenu<'a>;

    fn create_blur_window(&mut self, region: Region) -> Result<BlurWindow<'a>> {
        BlurWindow::new(self.ctx, region)
            .context(format!("Failed to create blur window at {}", region))
    }

    fn create_interaction_window(&mut self, region: Region) -> Result<InteractionWindow<'a>> {
        InteractionWindow::new(self.ctx, region)
            .context(format!("Failed to create interaction window at {}", region))
    }

    fn create_selection_overlay(&mut self) -> Result<SelectionOverlay<'a>> {
        SelectionOverlay::new(self.ctx).context("Failed to create selection overlay")
    }

    fn create_context_menu(&mut self, at: Point, model: &MenuModel) -> Result<ContextMenu<'a>> {
        ContextMenu::new(self.ctx, at, model)
            .context(format!("Failed to create context menu at ({}, {})", at.x, at.y))
    }
}
