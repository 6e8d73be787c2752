//! Translation of raw X11 events into controller events

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{ConnectionExt, Keycode, Keysym};
use x11rb::rust_connection::RustConnection;

use crate::constants::{mouse, x11};
use crate::controller::{Button, Key, WindowEvent};
use crate::region::Point;

pub fn button(detail: u8) -> Button {
    match detail {
        mouse::BUTTON_LEFT => Button::Left,
        mouse::BUTTON_MIDDLE => Button::Middle,
        mouse::BUTTON_RIGHT => Button::Right,
        other => Button::Other(other),
    }
}

/// Narrow an X11 event to what the controller acts on
pub fn translate(event: &Event, escape_keycodes: &[Keycode]) -> Option<WindowEvent> {
    Some(match event {
        Event::ButtonPress(e) => WindowEvent::ButtonPress {
            window: e.event,
            button: button(e.detail),
            root: Point::new(e.root_x.into(), e.root_y.into()),
            local: Point::new(e.event_x.into(), e.event_y.into()),
        },
        Event::ButtonRelease(e) => WindowEvent::ButtonRelease {
            window: e.event,
            button: button(e.detail),
            root: Point::new(e.root_x.into(), e.root_y.into()),
            local: Point::new(e.event_x.into(), e.event_y.into()),
        },
        Event::MotionNotify(e) => WindowEvent::Motion {
            window: e.event,
            root: Point::new(e.root_x.into(), e.root_y.into()),
            local: Point::new(e.event_x.into(), e.event_y.into()),
        },
        Event::KeyPress(e) => WindowEvent::Key {
            window: e.event,
            key: if escape_keycodes.contains(&e.detail) { Key::Escape } else { Key::Other },
        },
        // Only the last Expose of a series triggers a repaint
        Event::Expose(e) if e.count == 0 => WindowEvent::Exposed { window: e.window },
        Event::MapNotify(e) => WindowEvent::Mapped { window: e.window },
        Event::DestroyNotify(e) => WindowEvent::Destroyed { window: e.window },
        _ => return None,
    })
}

/// Keycodes that produce `keysym` in a keyboard mapping table
pub fn keycodes_for(keysym: Keysym, keysyms: &[Keysym], per_keycode: u8, min_keycode: Keycode) -> Vec<Keycode> {
    if per_keycode == 0 {
        return Vec::new();
    }
    keysyms
        .chunks(per_keycode as usize)
        .enumerate()
        .filter(|(_, syms)| syms.contains(&keysym))
        .filter_map(|(index, _)| u8::try_from(index).ok()?.checked_add(min_keycode))
        .collect()
}

pub fn escape_keycodes(conn: &RustConnection) -> Result<Vec<Keycode>> {
    let setup = conn.setup();
    let count = setup.max_keycode - setup.min_keycode + 1;
    let mapping = conn
        .get_keyboard_mapping(setup.min_keycode, count)
        .context("Failed to query keyboard mapping")?
        .reply()
        .context("Failed to get reply for keyboard mapping")?;
    Ok(keycodes_for(
        x11::XK_ESCAPE,
        &mapping.keysyms,
        mapping.keysyms_per_keycode,
        setup.min_keycode,
    ))
}
