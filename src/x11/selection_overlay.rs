//! Full-monitor overlay for dragging out a shield region

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::render::{Color, ConnectionExt as RenderExt, CreatePictureAux, PictOp, Picture};
use x11rb::protocol::xproto::*;

use super::context::{WindowGuard, X11Context, wire_geometry};
use crate::constants::overlay::{BORDER_ARGB, BORDER_DASH, SCRIM_ALPHA};
use crate::constants::x11::CURSOR_CROSSHAIR;
use crate::controller::OverlaySurface;
use crate::region::{Point, Region};
use crate::shield::WindowId;

const TRANSPARENT: Color = Color { red: 0, green: 0, blue: 0, alpha: 0 };
const SCRIM: Color = Color { red: 0, green: 0, blue: 0, alpha: SCRIM_ALPHA as u16 * 257 };

pub struct SelectionOverlay<'a> {
    ctx: &'a X11Context,
    window: Window,
    bounds: Region,
    cursor: Cursor,
    picture: Picture,
    border_gc: Gcontext,
    keyboard_grabbed: bool,
}

impl<'a> SelectionOverlay<'a> {
    pub fn new(ctx: &'a X11Context) -> Result<Self> {
        let bounds = ctx.primary_monitor();
        let cursor = ctx.create_cursor(CURSOR_CROSSHAIR)?;
        let window = ctx.create_argb_window(
            bounds,
            0,
            EventMask::BUTTON_PRESS
                | EventMask::BUTTON_RELEASE
                | EventMask::POINTER_MOTION
                | EventMask::KEY_PRESS
                | EventMask::EXPOSURE
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

        let picture = match Self::create_picture(ctx, window) {
            Ok(picture) => picture,
            Err(e) => {
                free_cursor(ctx, cursor);
                return Err(e);
            }
        };
        let border_gc = Self::create_border_gc(ctx, window)
            .and_then(|gc| match ctx.set_always_on_top(window, true) {
                Ok(()) => Ok(gc),
                Err(e) => {
                    free_gc(ctx, gc);
                    Err(e)
                }
            });
        let border_gc = match border_gc {
            Ok(gc) => gc,
            Err(e) => {
                free_picture(ctx, picture);
                free_cursor(ctx, cursor);
                return Err(e);
            }
        };

        info!(window, bounds = %bounds, "Created selection overlay");
        Ok(Self {
            ctx,
            window: guard.disarm(),
            bounds,
            cursor,
            picture,
            border_gc,
            keyboard_grabbed: false,
        })
    }

    fn create_picture(ctx: &X11Context, window: Window) -> Result<Picture> {
        let picture = ctx.conn.generate_id()
            .context("Failed to generate ID for overlay picture")?;
        ctx.conn.render_create_picture(picture, window, ctx.argb.pictformat, &CreatePictureAux::new())
            .context("Failed to create overlay picture")?;
        Ok(picture)
    }

    fn create_border_gc(ctx: &X11Context, window: Window) -> Result<Gcontext> {
        let border_gc = ctx.conn.generate_id()
            .context("Failed to generate ID for selection border GC")?;
        ctx.conn.create_gc(
            border_gc,
            window,
            &CreateGCAux::new()
                .foreground(BORDER_ARGB)
                .line_width(1)
                .line_style(LineStyle::ON_OFF_DASH)
                .dashes(BORDER_DASH as u32),
        )
        .context("Failed to create selection border GC")?;
        Ok(border_gc)
    }

    fn full_rect(&self) -> Rectangle {
        let (_, _, width, height) = wire_geometry(self.bounds);
        Rectangle { x: 0, y: 0, width, height }
    }
}

impl OverlaySurface for SelectionOverlay<'_> {
    fn id(&self) -> WindowId {
        self.window
    }

    fn origin(&self) -> Point {
        self.bounds.origin()
    }

    fn show(&mut self) -> Result<()> {
        self.ctx.map(self.window)
    }

    fn grab_input(&mut self) -> Result<()> {
        let status = self.ctx.conn
            .grab_keyboard(true, self.window, x11rb::CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)
            .context("Failed to request keyboard grab for selection overlay")?
            .reply()
            .context("Failed to get reply for keyboard grab")?
            .status;
        if status != GrabStatus::SUCCESS {
            anyhow::bail!("Keyboard grab refused: {:?}", status);
        }
        self.keyboard_grabbed = true;
        debug!(window = self.window, "Keyboard grabbed for selection");
        Ok(())
    }

    fn redraw(&mut self, selection: Option<Region>) -> Result<()> {
        self.ctx.conn
            .render_fill_rectangles(PictOp::SRC, self.picture, SCRIM, &[self.full_rect()])
            .context("Failed to paint selection scrim")?;

        if let Some(rect) = selection.filter(|rect| !rect.is_empty()) {
            let (x, y, width, height) = wire_geometry(rect);
            self.ctx.conn
                .render_fill_rectangles(PictOp::SRC, self.picture, TRANSPARENT, &[Rectangle { x, y, width, height }])
                .context("Failed to clear selection area")?;
            // Outline sits on the inside edge of the hole
            self.ctx.conn
                .poly_rectangle(self.window, self.border_gc, &[Rectangle {
                    x,
                    y,
                    width: width.saturating_sub(1),
                    height: height.saturating_sub(1),
                }])
                .context("Failed to draw selection border")?;
        }

        self.ctx.conn.flush()
            .context("Failed to flush X11 connection after overlay redraw")?;
        Ok(())
    }
}

fn free_gc(ctx: &X11Context, gc: Gcontext) {
    if let Err(e) = ctx.conn.free_gc(gc) {
        error!(gc, error = %e, "Failed to free selection border GC");
    }
}

fn free_picture(ctx: &X11Context, picture: Picture) {
    if let Err(e) = ctx.conn.render_free_picture(picture) {
        error!(picture, error = %e, "Failed to free overlay picture");
    }
}

fn free_cursor(ctx: &X11Context, cursor: Cursor) {
    if let Err(e) = ctx.conn.free_cursor(cursor) {
        error!(cursor, error = %e, "Failed to free cursor");
    }
}

impl Drop for SelectionOverlay<'_> {
    fn drop(&mut self) {
        if self.keyboard_grabbed
            && let Err(e) = self.ctx.conn.ungrab_keyboard(x11rb::CURRENT_TIME)
        {
            error!(error = %e, "Failed to release keyboard grab");
        }
        free_gc(self.ctx, self.border_gc);
        free_picture(self.ctx, self.picture);
        free_cursor(self.ctx, self.cursor);
        debug!(window = self.window, "Destroying selection overlay");
        self.ctx.destroy(self.window);
    }
}
