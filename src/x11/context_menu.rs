//! Shield context menu popup
//!
//! Drawn with RENDER fills. Labels come from the TrueType renderer when one
//! is loaded, otherwise from the core `fixed` font.

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::render::{Color, ConnectionExt as RenderExt, CreatePictureAux, PictOp, Picture};
use x11rb::protocol::xproto::*;

use super::context::{WindowGuard, X11Context, wire_geometry};
use crate::constants::menu::{
    BACKGROUND_ARGB, CHECK_LEFT, HOVER_ARGB, PADDING, SEPARATOR_ARGB, TEXT_ARGB, TEXT_LEFT,
};
use crate::controller::MenuSurface;
use crate::menu::{MenuEntry, MenuModel};
use crate::region::{Point, Region};
use crate::shield::WindowId;

const CHECK_SIZE: u16 = 8;

/// Straight ARGB to a RENDER color
fn render_color(argb: u32) -> Color {
    let [b, g, r, a] = argb.to_le_bytes().map(|c| c as u16 * 257);
    Color { red: r, green: g, blue: b, alpha: a }
}

fn rect(region: Region) -> Rectangle {
    let (x, y, width, height) = wire_geometry(region);
    Rectangle { x, y, width, height }
}

/// Place a `width`x`height` popup at `at`, moved back inside the screen
pub fn clamp_to_screen(at: Point, width: i32, height: i32, screen_width: i32, screen_height: i32) -> Point {
    Point::new(
        at.x.min(screen_width - width).max(0),
        at.y.min(screen_height - height).max(0),
    )
}

struct CoreFont {
    font: Font,
    ascent: i16,
}

pub struct ContextMenu<'a> {
    ctx: &'a X11Context,
    window: Window,
    picture: Picture,
    gc: Gcontext,
    core_font: Option<CoreFont>,
    grabbed_pointer: bool,
    grabbed_keyboard: bool,
}

impl<'a> ContextMenu<'a> {
    pub fn new(ctx: &'a X11Context, at: Point, model: &MenuModel) -> Result<Self> {
        let screen = ctx.screen();
        let origin = clamp_to_screen(
            at,
            model.width(),
            model.height(),
            screen.width_in_pixels as i32,
            screen.height_in_pixels as i32,
        );
        let bounds = Region::new(origin.x, origin.y, model.width(), model.height());

        let window = ctx.create_argb_window(
            bounds,
            BACKGROUND_ARGB,
            EventMask::BUTTON_PRESS
                | EventMask::BUTTON_RELEASE
                | EventMask::POINTER_MOTION
                | EventMask::KEY_PRESS
                | EventMask::EXPOSURE
                | EventMask::STRUCTURE_NOTIFY,
            None,
        )?;
        let guard = WindowGuard::new(ctx, window);

        let picture = ctx.conn.generate_id()
            .context("Failed to generate ID for menu picture")?;
        ctx.conn.render_create_picture(picture, window, ctx.argb.pictformat, &CreatePictureAux::new())
            .context("Failed to create menu picture")?;

        // The core font is only needed without a TrueType renderer
        let core_font = match ctx.font {
            Some(_) => None,
            None => match Self::open_core_font(ctx) {
                Ok(core) => Some(core),
                Err(e) => {
                    free_picture(ctx, picture);
                    return Err(e);
                }
            },
        };

        let gc = match Self::create_gc(ctx, window, core_font.as_ref()) {
            Ok(gc) => gc,
            Err(e) => {
                close_core_font(ctx, core_font.as_ref());
                free_picture(ctx, picture);
                return Err(e);
            }
        };

        if let Err(e) = ctx.set_always_on_top(window, true) {
            free_gc(ctx, gc);
            close_core_font(ctx, core_font.as_ref());
            free_picture(ctx, picture);
            return Err(e);
        }

        info!(window, bounds = %bounds, "Created context menu");
        Ok(Self {
            ctx,
            window: guard.disarm(),
            picture,
            gc,
            core_font,
            grabbed_pointer: false,
            grabbed_keyboard: false,
        })
    }

    fn open_core_font(ctx: &X11Context) -> Result<CoreFont> {
        let font = ctx.conn.generate_id()
            .context("Failed to generate ID for menu font")?;
        ctx.conn.open_font(font, b"fixed")
            .context("Failed to open core font 'fixed'")?;
        let ascent = ctx.conn
            .query_font(font)
            .context("Failed to query core font metrics")?
            .reply()
            .context("Failed to get core font metrics")?
            .font_ascent;
        Ok(CoreFont { font, ascent })
    }

    fn create_gc(ctx: &X11Context, window: Window, core_font: Option<&CoreFont>) -> Result<Gcontext> {
        let gc = ctx.conn.generate_id()
            .context("Failed to generate ID for menu GC")?;
        let mut gc_aux = CreateGCAux::new().foreground(TEXT_ARGB).background(BACKGROUND_ARGB);
        if let Some(core) = core_font {
            gc_aux = gc_aux.font(core.font);
        }
        ctx.conn.create_gc(gc, window, &gc_aux)
            .context("Failed to create menu GC")?;
        Ok(gc)
    }

    fn fill(&self, argb: u32, area: Region) -> Result<()> {
        self.ctx.conn
            .render_fill_rectangles(PictOp::SRC, self.picture, render_color(argb), &[rect(area)])
            .context(format!("Failed to fill menu area {}", area))?;
        Ok(())
    }

    fn draw_check(&self, row: Region, checked: bool) -> Result<()> {
        let size = CHECK_SIZE as i32;
        let check = Region::new(CHECK_LEFT as i32, row.y + (row.height - size) / 2, size, size);
        if checked {
            self.fill(TEXT_ARGB, check)
        } else {
            let mut outline = rect(check);
            outline.width -= 1;
            outline.height -= 1;
            self.ctx.conn.poly_rectangle(self.window, self.gc, &[outline])
                .context("Failed to draw menu check box")?;
            Ok(())
        }
    }

    fn draw_label(&self, label: &str, row: Region, background: u32) -> Result<()> {
        if let Some(font) = &self.ctx.font {
            let rendered = font.render_text(label, TEXT_ARGB);
            if rendered.is_empty() {
                return Ok(());
            }
            let (width, height) = (rendered.width as u16, rendered.height as u16);
            let y = row.y + (row.height - height as i32) / 2;

            let text_pixmap = self.ctx.conn.generate_id()
                .context("Failed to generate ID for label pixmap")?;
            self.ctx.conn.create_pixmap(crate::constants::x11::ARGB_DEPTH, text_pixmap, self.window, width, height)
                .context(format!("Failed to create pixmap for label '{}'", label))?;
            self.ctx.conn.put_image(
                ImageFormat::Z_PIXMAP,
                text_pixmap,
                self.gc,
                width,
                height,
                0,
                0,
                0,
                crate::constants::x11::ARGB_DEPTH,
                &rendered.to_bgra_bytes(),
            )
            .context(format!("Failed to upload label '{}'", label))?;

            let text_picture = self.ctx.conn.generate_id()
                .context("Failed to generate ID for label picture")?;
            self.ctx.conn.render_create_picture(text_picture, text_pixmap, self.ctx.argb.pictformat, &CreatePictureAux::new())
                .context(format!("Failed to create picture for label '{}'", label))?;
            self.ctx.conn.render_composite(
                PictOp::OVER,
                text_picture,
                0u32,
                self.picture,
                0,
                0,
                0,
                0,
                TEXT_LEFT,
                y as i16,
                width,
                height,
            )
            .context(format!("Failed to composite label '{}'", label))?;

            self.ctx.conn.render_free_picture(text_picture)
                .context("Failed to free label picture")?;
            self.ctx.conn.free_pixmap(text_pixmap)
                .context("Failed to free label pixmap")?;
        } else if let Some(core) = &self.core_font {
            self.ctx.conn.change_gc(self.gc, &ChangeGCAux::new().background(background))
                .context("Failed to set label background")?;
            let baseline = row.y + (row.height + core.ascent as i32) / 2 - 1;
            self.ctx.conn.image_text8(self.window, self.gc, TEXT_LEFT, baseline as i16, label.as_bytes())
                .context(format!("Failed to draw label '{}'", label))?;
        }
        Ok(())
    }
}

impl MenuSurface for ContextMenu<'_> {
    fn id(&self) -> WindowId {
        self.window
    }

    fn show(&mut self) -> Result<()> {
        self.ctx.map(self.window)
    }

    fn grab_input(&mut self) -> Result<()> {
        let pointer = self.ctx.conn
            .grab_pointer(
                false,
                self.window,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            )
            .context("Failed to request pointer grab for context menu")?
            .reply()
            .context("Failed to get reply for pointer grab")?
            .status;
        if pointer != GrabStatus::SUCCESS {
            anyhow::bail!("Pointer grab refused: {:?}", pointer);
        }
        self.grabbed_pointer = true;

        let keyboard = self.ctx.conn
            .grab_keyboard(true, self.window, x11rb::CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)
            .context("Failed to request keyboard grab for context menu")?
            .reply()
            .context("Failed to get reply for keyboard grab")?
            .status;
        if keyboard != GrabStatus::SUCCESS {
            anyhow::bail!("Keyboard grab refused: {:?}", keyboard);
        }
        self.grabbed_keyboard = true;
        debug!(window = self.window, "Context menu grabbed input");
        Ok(())
    }

    fn redraw(&mut self, model: &MenuModel) -> Result<()> {
        self.fill(BACKGROUND_ARGB, Region::new(0, 0, model.width(), model.height()))?;

        for (index, entry) in model.entries().iter().enumerate() {
            let Some(row) = model.entry_rect(index) else {
                continue;
            };
            match entry {
                MenuEntry::Separator => {
                    let inset = PADDING as i32;
                    let line = Region::new(inset, row.y + row.height / 2, row.width - 2 * inset, 1);
                    self.fill(SEPARATOR_ARGB, line)?;
                }
                MenuEntry::Item { label, checked, .. } => {
                    let background = if model.hovered() == Some(index) { HOVER_ARGB } else { BACKGROUND_ARGB };
                    self.fill(background, row)?;
                    if let Some(checked) = checked {
                        self.draw_check(row, *checked)?;
                    }
                    self.draw_label(label, row, background)?;
                }
            }
        }

        self.ctx.conn.flush()
            .context("Failed to flush X11 connection after menu redraw")?;
        Ok(())
    }
}

fn free_gc(ctx: &X11Context, gc: Gcontext) {
    if let Err(e) = ctx.conn.free_gc(gc) {
        error!(gc, error = %e, "Failed to free menu GC");
    }
}

fn close_core_font(ctx: &X11Context, core_font: Option<&CoreFont>) {
    if let Some(core) = core_font
        && let Err(e) = ctx.conn.close_font(core.font)
    {
        error!(font = core.font, error = %e, "Failed to close menu font");
    }
}

fn free_picture(ctx: &X11Context, picture: Picture) {
    if let Err(e) = ctx.conn.render_free_picture(picture) {
        error!(picture, error = %e, "Failed to free menu picture");
    }
}

impl Drop for ContextMenu<'_> {
    fn drop(&mut self) {
        if self.grabbed_pointer
            && let Err(e) = self.ctx.conn.ungrab_pointer(x11rb::CURRENT_TIME)
        {
            error!(error = %e, "Failed to release pointer grab");
        }
        if self.grabbed_keyboard
            && let Err(e) = self.ctx.conn.ungrab_keyboard(x11rb::CURRENT_TIME)
        {
            error!(error = %e, "Failed to release keyboard grab");
        }
        free_gc(self.ctx, self.gc);
        close_core_font(self.ctx, self.core_font.as_ref());
        free_picture(self.ctx, self.picture);
        debug!(window = self.window, "Destroying context menu");
        self.ctx.destroy(self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_color_scales_channels() {
        let color = render_color(0xFF_80_00_01);
        assert_eq!(color.alpha, 0xFFFF);
        assert_eq!(color.red, 0x80 * 257);
        assert_eq!(color.green, 0);
        assert_eq!(color.blue, 257);
    }

    #[test]
    fn test_clamp_keeps_menu_on_screen() {
        // Fits as is
        assert_eq!(clamp_to_screen(Point::new(100, 100), 200, 121, 1920, 1080), Point::new(100, 100));
        // Near the bottom-right corner → shifted back
        assert_eq!(clamp_to_screen(Point::new(1900, 1070), 200, 121, 1920, 1080), Point::new(1720, 959));
        // Negative positions clamp to the origin
        assert_eq!(clamp_to_screen(Point::new(-5, -5), 200, 121, 1920, 1080), Point::new(0, 0));
    }
}
