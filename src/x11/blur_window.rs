//! The visual half of a shield: a tinted, click-through, blurred window

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::shape;
use x11rb::protocol::xfixes::ConnectionExt as XFixesExt;
use x11rb::protocol::xproto::{AtomEnum, EventMask, PropMode, Window};
use x11rb::wrapper::ConnectionExt as WrapperExt;

use super::context::{WindowGuard, X11Context};
use crate::constants::shield::BLUR_TINT_ARGB;
use crate::region::Region;
use crate::shield::{BlurSurface, ShieldWindow, WindowId};

pub struct BlurWindow<'a> {
    ctx: &'a X11Context,
    window: Window,
}

impl<'a> BlurWindow<'a> {
    pub fn new(ctx: &'a X11Context, region: Region) -> Result<Self> {
        let window = ctx.create_argb_window(
            region,
            BLUR_TINT_ARGB,
            // Map and destroy notifications only; pointer input passes through
            EventMask::STRUCTURE_NOTIFY,
            None,
        )?;
        let guard = WindowGuard::new(ctx, window);

        Self::make_click_through(ctx, window)?;
        ctx.set_always_on_top(window, true)?;

        info!(window, region = %region, "Created blur window");
        Ok(Self { ctx, window: guard.disarm() })
    }

    /// An empty input shape lets every click reach the windows below
    fn make_click_through(ctx: &X11Context, window: Window) -> Result<()> {
        let empty = ctx.conn.generate_id()
            .context("Failed to generate ID for input region")?;
        ctx.conn.xfixes_create_region(empty, &[])
            .context("Failed to create empty input region")?;
        let applied = ctx.conn
            .xfixes_set_window_shape_region(window, shape::SK::INPUT, 0, 0, empty)
            .context(format!("Failed to clear input shape of window {}", window));
        if let Err(e) = ctx.conn.xfixes_destroy_region(empty) {
            error!(region = empty, error = %e, "Failed to free input region");
        }
        applied?;
        Ok(())
    }
}

impl ShieldWindow for BlurWindow<'_> {
    fn id(&self) -> WindowId {
        self.window
    }

    fn set_geometry(&mut self, region: Region) -> Result<()> {
        self.ctx.set_geometry(self.window, region)?;
        self.ctx.conn.flush()
            .context("Failed to flush X11 connection after moving blur window")?;
        Ok(())
    }

    fn set_always_on_top(&mut self, enabled: bool) -> Result<()> {
        self.ctx.set_always_on_top(self.window, enabled)
    }

    fn show(&mut self) -> Result<()> {
        self.ctx.map(self.window)
    }
}

impl BlurSurface for BlurWindow<'_> {
    fn apply_blur(&mut self) -> Result<()> {
        if !self.ctx.compositor_running()? {
            anyhow::bail!("No compositing manager is running on screen {}", self.ctx.screen_num);
        }
        // An empty region asks for the whole window to be blurred
        self.ctx.conn.change_property32(
            PropMode::REPLACE,
            self.window,
            self.ctx.atoms.blur_behind_region,
            AtomEnum::CARDINAL,
            &[],
        )
        .context(format!("Failed to request blur behind window {}", self.window))?;
        self.ctx.conn.flush()
            .context("Failed to flush X11 connection after blur request")?;
        debug!(window = self.window, "Blur-behind property set");
        Ok(())
    }
}

impl Drop for BlurWindow<'_> {
    fn drop(&mut self) {
        debug!(window = self.window, "Destroying blur window");
        self.ctx.destroy(self.window);
    }
}
