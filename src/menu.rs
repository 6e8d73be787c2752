//! Shield context menu: entries, layout and hit testing
//!
//! The model is independent of the window that draws it; the X11 popup asks it
//! for its size and entry rectangles and forwards pointer positions to it.

use crate::constants::menu::{ITEM_HEIGHT, PADDING, SEPARATOR_HEIGHT, WIDTH};
use crate::region::{Point, Region};
use crate::shield::LockState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ToggleAlwaysOnTop,
    TogglePositionLock,
    ToggleSizeLock,
    CloseShield,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Item {
        action: MenuAction,
        label: &'static str,
        /// Some for checkable entries
        checked: Option<bool>,
    },
    Separator,
}

impl MenuEntry {
    fn height(&self) -> i32 {
        match self {
            MenuEntry::Item { .. } => ITEM_HEIGHT as i32,
            MenuEntry::Separator => SEPARATOR_HEIGHT as i32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuModel {
    entries: Vec<MenuEntry>,
    hovered: Option<usize>,
}

impl MenuModel {
    pub fn new(entries: Vec<MenuEntry>) -> Self {
        Self { entries, hovered: None }
    }

    /// Menu shown on right-click over a shield
    pub fn for_shield(always_on_top: bool, locks: LockState) -> Self {
        Self::new(vec![
            MenuEntry::Item {
                action: MenuAction::ToggleAlwaysOnTop,
                label: "Always on top",
                checked: Some(always_on_top),
            },
            MenuEntry::Item {
                action: MenuAction::TogglePositionLock,
                label: "Lock position",
                checked: Some(locks.position),
            },
            MenuEntry::Item {
                action: MenuAction::ToggleSizeLock,
                label: "Lock size",
                checked: Some(locks.size),
            },
            MenuEntry::Separator,
            MenuEntry::Item {
                action: MenuAction::CloseShield,
                label: "Close shield",
                checked: None,
            },
        ])
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn width(&self) -> i32 {
        WIDTH as i32
    }

    pub fn height(&self) -> i32 {
        let content: i32 = self.entries.iter().map(MenuEntry::height).sum();
        content + 2 * PADDING as i32
    }

    /// Rectangle of entry `index` in menu-local coordinates
    pub fn entry_rect(&self, index: usize) -> Option<Region> {
        let entry = self.entries.get(index)?;
        let top: i32 = PADDING as i32 + self.entries[..index].iter().map(MenuEntry::height).sum::<i32>();
        Some(Region::new(0, top, self.width(), entry.height()))
    }

    /// Index of the clickable item under a menu-local point
    pub fn item_at(&self, local: Point) -> Option<usize> {
        (0..self.entries.len()).find(|&index| {
            matches!(self.entries[index], MenuEntry::Item { .. })
                && self.entry_rect(index).is_some_and(|rect| rect.contains(local))
        })
    }

    pub fn action_at(&self, local: Point) -> Option<MenuAction> {
        match self.entries.get(self.item_at(local)?)? {
            MenuEntry::Item { action, .. } => Some(*action),
            MenuEntry::Separator => None,
        }
    }

    /// Update the highlighted item; returns true when it changed
    pub fn hover(&mut self, local: Point) -> bool {
        let hovered = self.item_at(local);
        if hovered == self.hovered {
            return false;
        }
        self.hovered = hovered;
        true
    }
}
