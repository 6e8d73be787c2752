//! The input half of a shield: a near-invisible window stacked over the blur
//! window that receives drags and right-clicks

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt, Cursor, EventMask, Window};

use super::context::{WindowGuard, X11Context};
use crate::constants::shield::{HANDLE_BACKGROUND_ARGB, HANDLE_OPACITY};
use crate::constants::x11::CURSOR_FLEUR;
use crate::region::Region;
use crate::shield::{ShieldWindow, WindowId};

pub struct InteractionWindow<'a> {
    ctx: &'a X11Context,
    window: Window,
    cursor: Cursor,
}

impl<'a> InteractionWindow<'a> {
    pub fn new(ctx: &'a X11Context, region: Region) -> Result<Self> {
        let cursor = ctx.create_cursor(CURSOR_FLEUR)?;
        let window = ctx.create_argb_window(
            region,
            // Alpha 1/255: fully transparent windows would let clicks through
            HANDLE_BACKGROUND_ARGB,
            EventMask::BUTTON_PRESS
                | EventMask::BUTTON_RELEASE
                | EventMask::POINTER_MOTION
                | EventMask::STRUCTURE_NOTIFY,
            Some(cursor),
        );
        let window = match window {
            Ok(window) => window,
            Err(e) => {
                free_cursor(ctx, cursor);
                return Err(e);
            }
        };
        let guard = WindowGuard::new(ctx, window);

        let configured = ctx
            .set_opacity(window, HANDLE_OPACITY)
            .and_then(|()| ctx.set_always_on_top(window, true));
        if let Err(e) = configured {
            free_cursor(ctx, cursor);
            return Err(e);
        }

        info!(window, region = %region, "Created interaction window");
        Ok(Self { ctx, window: guard.disarm(), cursor })
    }
}

impl ShieldWindow for InteractionWindow<'_> {
    fn id(&self) -> WindowId {
        self.window
    }

    fn set_geometry(&mut self, region: Region) -> Result<()> {
        self.ctx.set_geometry(self.window, region)?;
        self.ctx.conn.flush()
            .context("Failed to flush X11 connection after moving interaction window")?;
        Ok(())
    }

    fn set_always_on_top(&mut self, enabled: bool) -> Result<()> {
        self.ctx.set_always_on_top(self.window, enabled)
    }

    fn show(&mut self) -> Result<()> {
        self.ctx.map(self.window)?;
        // Mapped after the blur window, but make sure it sits on top of it
        self.ctx.raise(self.window)?;
        self.ctx.conn.flush()
            .context("Failed to flush X11 connection after raising interaction window")?;
        Ok(())
    }
}

impl Drop for InteractionWindow<'_> {
    fn drop(&mut self) {
        debug!(window = self.window, "Destroying interaction window");
        free_cursor(self.ctx, self.cursor);
        self.ctx.destroy(self.window);
    }
}

fn free_cursor(ctx: &X11Context, cursor: Cursor) {
    if let Err(e) = ctx.conn.free_cursor(cursor) {
        error!(cursor, error = %e, "Failed to free cursor");
    }
}
