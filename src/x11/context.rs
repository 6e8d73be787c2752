//! Shared X11 state: connection, atoms, ARGB visual and window helpers

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as RandrExt;
use x11rb::protocol::render::{ConnectionExt as RenderExt, Pictformat};
use x11rb::protocol::xfixes::ConnectionExt as XFixesExt;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::constants::x11;
use crate::font::FontRenderer;
use crate::region::Region;

/// Pre-cached X11 atoms to avoid repeated roundtrips
#[derive(Debug)]
pub struct CachedAtoms {
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_window_opacity: Atom,
    pub blur_behind_region: Atom,
    /// `_NET_WM_CM_S{screen}`: owned by the running compositing manager
    pub compositor_selection: Atom,
    pub wake: Atom,
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
    let label = String::from_utf8_lossy(name);
    Ok(conn
        .intern_atom(false, name)
        .context(format!("Failed to intern {} atom", label))?
        .reply()
        .context(format!("Failed to get reply for {} atom", label))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection, screen_num: usize) -> Result<Self> {
        Ok(Self {
            net_wm_state: intern(conn, b"_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, b"_NET_WM_STATE_ABOVE")?,
            net_wm_window_opacity: intern(conn, b"_NET_WM_WINDOW_OPACITY")?,
            blur_behind_region: intern(conn, x11::BLUR_BEHIND_PROPERTY)?,
            compositor_selection: intern(conn, format!("_NET_WM_CM_S{}", screen_num).as_bytes())?,
            wake: intern(conn, x11::WAKE_ATOM)?,
        })
    }
}

/// 32-bit TrueColor visual with the colormap and RENDER format that go with it
#[derive(Debug, Clone, Copy)]
pub struct ArgbVisual {
    pub visual: Visualid,
    pub colormap: Colormap,
    pub pictformat: Pictformat,
}

pub fn get_pictformat(conn: &RustConnection, depth: u8, alpha: bool) -> Result<Pictformat> {
    conn.render_query_pict_formats()
        .context("Failed to query RENDER picture formats")?
        .reply()
        .context("Failed to get reply for RENDER picture formats query")?
        .formats
        .iter()
        .find(|format| format.depth == depth && (format.direct.alpha_mask != 0) == alpha)
        .map(|format| {
            debug!(depth, alpha_mask = format.direct.alpha_mask, "Using Pictformat");
            format.id
        })
        .with_context(|| format!(
            "Could not find suitable picture format (depth={}, alpha={}). Check RENDER extension support.",
            depth, alpha
        ))
}

/// Everything the platform windows borrow while they live
pub struct X11Context {
    pub conn: Arc<RustConnection>,
    pub screen_num: usize,
    pub root: Window,
    pub atoms: CachedAtoms,
    pub argb: ArgbVisual,
    pub cursor_font: Font,
    pub escape_keycodes: Vec<Keycode>,
    /// None when no TrueType font could be loaded; menus use the core font
    pub font: Option<FontRenderer>,
}

impl X11Context {
    pub fn new(conn: Arc<RustConnection>, screen_num: usize) -> Result<Self> {
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .with_context(|| format!("Screen {} not present in X11 setup", screen_num))?;
        let root = screen.root;

        conn.xfixes_query_version(5, 0)
            .context("Failed to query XFixes version")?
            .reply()
            .context("XFixes extension unavailable")?;
        conn.render_query_version(0, 11)
            .context("Failed to query RENDER version")?
            .reply()
            .context("RENDER extension unavailable")?;

        let atoms = CachedAtoms::new(&conn, screen_num)?;
        let argb = Self::find_argb_visual(&conn, screen)?;

        let cursor_font = conn.generate_id()
            .context("Failed to generate ID for cursor font")?;
        conn.open_font(cursor_font, b"cursor")
            .context("Failed to open cursor font")?;

        let escape_keycodes = super::events::escape_keycodes(&conn)
            .inspect_err(|e| warn!(error = ?e, "Failed to look up Escape keycodes"))
            .unwrap_or_default();

        let font = FontRenderer::from_system_font(crate::constants::menu::FONT_SIZE)
            .inspect_err(|e| warn!(error = ?e, "TrueType menu font unavailable"))
            .ok();

        info!(
            screen = screen_num,
            width = screen.width_in_pixels,
            height = screen.height_in_pixels,
            visual = argb.visual,
            "X11 context ready"
        );

        Ok(Self {
            conn,
            screen_num,
            root,
            atoms,
            argb,
            cursor_font,
            escape_keycodes,
            font,
        })
    }

    fn find_argb_visual(conn: &RustConnection, screen: &Screen) -> Result<ArgbVisual> {
        let visual = screen
            .allowed_depths
            .iter()
            .filter(|depth| depth.depth == x11::ARGB_DEPTH)
            .flat_map(|depth| depth.visuals.iter())
            .find(|visual| visual.class == VisualClass::TRUE_COLOR)
            .map(|visual| visual.visual_id)
            .context("No 32-bit TrueColor visual; translucent windows need an ARGB visual")?;

        let colormap = conn.generate_id()
            .context("Failed to generate ID for ARGB colormap")?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual)
            .context("Failed to create ARGB colormap")?;

        let pictformat = get_pictformat(conn, x11::ARGB_DEPTH, true)
            .context("Failed to get ARGB picture format")?;

        Ok(ArgbVisual { visual, colormap, pictformat })
    }

    pub fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    /// Geometry of the primary monitor, or of the whole root window when
    /// RandR cannot tell
    pub fn primary_monitor(&self) -> Region {
        let screen = self.screen();
        let fallback = Region::new(0, 0, screen.width_in_pixels as i32, screen.height_in_pixels as i32);

        let monitors = match self.conn.randr_get_monitors(self.root, true).map(|cookie| cookie.reply()) {
            Ok(Ok(reply)) => reply.monitors,
            Ok(Err(e)) => {
                debug!(error = ?e, "RandR monitor query failed, using root window");
                return fallback;
            }
            Err(e) => {
                debug!(error = ?e, "RandR unavailable, using root window");
                return fallback;
            }
        };

        monitors
            .iter()
            .find(|monitor| monitor.primary)
            .or_else(|| monitors.first())
            .map(|monitor| Region::new(monitor.x as i32, monitor.y as i32, monitor.width as i32, monitor.height as i32))
            .filter(|region| !region.is_empty())
            .unwrap_or(fallback)
    }

    /// Whether a compositing manager currently owns `_NET_WM_CM_Sn`
    pub fn compositor_running(&self) -> Result<bool> {
        let owner = self.conn
            .get_selection_owner(self.atoms.compositor_selection)
            .context("Failed to query compositing manager selection")?
            .reply()
            .context("Failed to get reply for compositing manager selection")?
            .owner;
        Ok(owner != x11rb::NONE)
    }

    pub fn create_cursor(&self, glyph: u16) -> Result<Cursor> {
        let cursor = self.conn.generate_id()
            .context("Failed to generate ID for cursor")?;
        self.conn.create_glyph_cursor(
            cursor,
            self.cursor_font,
            self.cursor_font,
            glyph,
            glyph + 1,
            0,
            0,
            0,
            0xffff,
            0xffff,
            0xffff,
        )
        .context(format!("Failed to create cursor from glyph {}", glyph))?;
        Ok(cursor)
    }

    /// Create an unmapped, override-redirect ARGB window.
    /// `background` is a premultiplied ARGB pixel.
    pub fn create_argb_window(
        &self,
        region: Region,
        background: u32,
        event_mask: EventMask,
        cursor: Option<Cursor>,
    ) -> Result<Window> {
        let (x, y, width, height) = wire_geometry(region);
        let window = self.conn.generate_id()
            .context("Failed to generate X11 window ID")?;
        self.conn.create_window(
            x11::ARGB_DEPTH,
            window,
            self.root,
            x,
            y,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            self.argb.visual,
            &CreateWindowAux::new()
                .background_pixel(background)
                .border_pixel(0)
                .colormap(self.argb.colormap)
                .override_redirect(x11::OVERRIDE_REDIRECT)
                .event_mask(event_mask)
                .cursor(cursor),
        )
        .context(format!("Failed to create window at {}", region))?;

        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            x11::WM_CLASS,
        )
        .context(format!("Failed to set WM_CLASS on window {}", window))?;

        Ok(window)
    }

    pub fn set_geometry(&self, window: Window, region: Region) -> Result<()> {
        let (x, y, width, height) = wire_geometry(region);
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(x as i32)
                .y(y as i32)
                .width(width as u32)
                .height(height as u32),
        )
        .context(format!("Failed to move window {} to {}", window, region))?;
        Ok(())
    }

    /// Advertise `_NET_WM_STATE_ABOVE` and raise the window when enabled
    pub fn set_always_on_top(&self, window: Window, enabled: bool) -> Result<()> {
        let state: &[Atom] = if enabled { &[self.atoms.net_wm_state_above] } else { &[] };
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_state,
            AtomEnum::ATOM,
            state,
        )
        .context(format!("Failed to set always-on-top on window {}", window))?;
        if enabled {
            self.raise(window)?;
        }
        Ok(())
    }

    pub fn raise(&self, window: Window) -> Result<()> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .context(format!("Failed to raise window {}", window))?;
        Ok(())
    }

    pub fn set_opacity(&self, window: Window, opacity: u32) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_window_opacity,
            AtomEnum::CARDINAL,
            &[opacity],
        )
        .context(format!("Failed to set opacity on window {}", window))?;
        Ok(())
    }

    pub fn map(&self, window: Window) -> Result<()> {
        self.conn.map_window(window)
            .context(format!("Failed to map window {}", window))?;
        self.conn.flush()
            .context("Failed to flush X11 connection after map")?;
        Ok(())
    }

    /// Destroy a window and log, never fail; used from `Drop`
    pub fn destroy(&self, window: Window) {
        if let Err(e) = self.conn.destroy_window(window) {
            error!(window, error = %e, "Failed to destroy window");
        }
        if let Err(e) = self.conn.flush() {
            error!(error = %e, "Failed to flush X11 connection during cleanup");
        }
    }
}

impl Drop for X11Context {
    fn drop(&mut self) {
        if let Err(e) = self.conn.close_font(self.cursor_font) {
            error!(font = self.cursor_font, error = %e, "Failed to close cursor font");
        }
        if let Err(e) = self.conn.free_colormap(self.argb.colormap) {
            error!(colormap = self.argb.colormap, error = %e, "Failed to free ARGB colormap");
        }
        let _ = self.conn.flush();
    }
}

/// Destroys a freshly created window unless initialization completes
pub struct WindowGuard<'a> {
    ctx: &'a X11Context,
    window: Window,
    armed: bool,
}

impl<'a> WindowGuard<'a> {
    pub fn new(ctx: &'a X11Context, window: Window) -> Self {
        Self { ctx, window, armed: true }
    }

    pub fn disarm(mut self) -> Window {
        self.armed = false;
        self.window
    }
}

impl Drop for WindowGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(window = self.window, "Destroying window after failed initialization");
            self.ctx.destroy(self.window);
        }
    }
}

/// Region in the integer widths the core protocol uses
pub fn wire_geometry(region: Region) -> (i16, i16, u16, u16) {
    let clamp_pos = |v: i32| v.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    let clamp_len = |v: i32| v.clamp(1, u16::MAX as i32) as u16;
    (clamp_pos(region.x), clamp_pos(region.y), clamp_len(region.width), clamp_len(region.height))
}
