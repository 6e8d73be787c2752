//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// X11 protocol and rendering constants
pub mod x11 {
    /// ARGB color depth (32-bit: 8 bits each for Alpha, Red, Green, Blue)
    pub const ARGB_DEPTH: u8 = 32;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// WM_CLASS value (instance\0class\0) set on every window we create
    pub const WM_CLASS: &[u8] = b"screen-shield\0screen-shield\0";

    /// Glyph indices in the standard X cursor font
    pub const CURSOR_CROSSHAIR: u16 = 34;
    pub const CURSOR_FLEUR: u16 = 52;

    /// Keysym for the Escape key
    pub const XK_ESCAPE: u32 = 0xff1b;

    /// Property the KWin blur effect reads; an empty region blurs the whole window
    pub const BLUR_BEHIND_PROPERTY: &[u8] = b"_KDE_NET_WM_BLUR_BEHIND_REGION";

    /// Private atom used to wake the engine thread
    pub const WAKE_ATOM: &[u8] = b"_SCREEN_SHIELD_WAKE";
}

/// Mouse button constants
pub mod mouse {
    /// Left mouse button number
    pub const BUTTON_LEFT: u8 = 1;

    /// Middle mouse button number
    pub const BUTTON_MIDDLE: u8 = 2;

    /// Right mouse button number
    pub const BUTTON_RIGHT: u8 = 3;
}

/// Region validation
pub mod region {
    /// Largest accepted absolute value of a region origin coordinate
    pub const COORDINATE_BOUND: i32 = 10_000;
}

/// Shield window appearance and interaction
pub mod shield {
    /// Premultiplied ARGB background of the blur window (dark tint, ~40% alpha)
    pub const BLUR_TINT_ARGB: u32 = 0x66_0C_0C_0C;

    /// Premultiplied ARGB background of the interaction window (alpha 1/255)
    pub const HANDLE_BACKGROUND_ARGB: u32 = 0x01_00_00_00;

    /// _NET_WM_WINDOW_OPACITY for the interaction window (1%, never fully transparent)
    pub const HANDLE_OPACITY: u32 = 0x028F_5C28;

    /// Distance from an edge (in pixels) that starts a resize instead of a move
    pub const RESIZE_MARGIN: i32 = 8;

    /// Smallest width/height a resize may produce
    pub const MIN_SIZE: i32 = 20;
}

/// Selection overlay appearance
pub mod overlay {
    /// Scrim alpha (0-255) drawn over the whole overlay
    pub const SCRIM_ALPHA: u8 = 120;

    /// Premultiplied ARGB color of the dashed selection border
    pub const BORDER_ARGB: u32 = 0xFF_FF_FF_FF;

    /// Dash length (on/off) of the selection border in pixels
    pub const BORDER_DASH: u8 = 4;
}

/// Context menu layout and colors
pub mod menu {
    pub const WIDTH: u16 = 200;
    pub const ITEM_HEIGHT: u16 = 26;
    pub const SEPARATOR_HEIGHT: u16 = 9;
    pub const PADDING: u16 = 4;
    pub const TEXT_LEFT: i16 = 28;
    pub const CHECK_LEFT: i16 = 10;
    pub const FONT_SIZE: f32 = 14.0;

    pub const BACKGROUND_ARGB: u32 = 0xFF_2B_2B_2B;
    pub const HOVER_ARGB: u32 = 0xFF_3D_6F_A8;
    pub const SEPARATOR_ARGB: u32 = 0xFF_55_55_55;
    pub const TEXT_ARGB: u32 = 0xFF_EE_EE_EE;
}

/// Configuration file constants
pub mod config {
    /// Application directory name under the user's config dir
    pub const APP_DIR: &str = "screen-shield";

    /// Settings file name
    pub const FILENAME: &str = "settings.json";
}

/// Single-instance guard
pub mod instance {
    /// Well-known identifier of the shared-memory segment (uid is appended)
    pub const KEY: &str = "screen-shield-9f3a61c2";
}

/// Tray presence
pub mod tray {
    pub const ID: &str = "screen-shield";
    pub const TITLE: &str = "Screen Shield";
    pub const TOOLTIP: &str = "Screen Shield controller";
}
