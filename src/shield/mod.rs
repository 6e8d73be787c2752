//! A privacy shield: one blur window and one interaction window owned together
//!
//! The two halves are created as a pair and dropped as a pair (blur window
//! first), so no code path can observe a half-built or half-torn-down shield.

mod gesture;

pub use gesture::{Edges, Gesture};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::region::{Point, Region};

/// Native window identifier (an X11 window id on the X11 backend)
pub type WindowId = u32;

/// Operations shared by both halves of a shield
pub trait ShieldWindow {
    fn id(&self) -> WindowId;
    fn set_geometry(&mut self, region: Region) -> Result<()>;
    fn set_always_on_top(&mut self, enabled: bool) -> Result<()>;
    fn show(&mut self) -> Result<()>;
}

/// The visual half: renders the blurred backdrop and ignores pointer input
pub trait BlurSurface: ShieldWindow {
    /// Ask the compositor for a blur-behind effect. May fail on setups
    /// without a compositing manager; callers degrade to a plain window.
    fn apply_blur(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockState {
    pub position: bool,
    pub size: bool,
}

impl LockState {
    pub fn both(locked: bool) -> Self {
        Self { position: locked, size: locked }
    }
}

pub struct Shield<B, H> {
    // Field order is drop order: the blur window goes before its handler
    blur: B,
    handle: H,
    region: Region,
    locks: LockState,
    always_on_top: bool,
    gesture: Option<Gesture>,
    blur_applied: bool,
}

impl<B: BlurSurface, H: ShieldWindow> Shield<B, H> {
    /// Pair two freshly created windows and move them to `region`
    pub fn new(mut blur: B, mut handle: H, region: Region, locks: LockState) -> Result<Self> {
        blur.set_geometry(region)
            .context("Failed to position blur window")?;
        handle.set_geometry(region)
            .context("Failed to position interaction window")?;
        Ok(Self {
            blur,
            handle,
            region,
            locks,
            always_on_top: true,
            gesture: None,
            blur_applied: false,
        })
    }

    /// Map both windows; the interaction window goes on top so it receives input
    pub fn show(&mut self) -> Result<()> {
        self.blur.set_always_on_top(self.always_on_top)?;
        self.handle.set_always_on_top(self.always_on_top)?;
        self.blur.show().context("Failed to show blur window")?;
        self.handle.show().context("Failed to show interaction window")?;
        info!(region = %self.region, blur = self.blur.id(), handle = self.handle.id(), "Shield shown");
        Ok(())
    }

    /// Called when the blur window becomes visible. The blur request is only
    /// made on the first call; a failure leaves a plain tinted window.
    pub fn on_blur_visible(&mut self) {
        if self.blur_applied {
            return;
        }
        self.blur_applied = true;
        match self.blur.apply_blur() {
            Ok(()) => info!(window = self.blur.id(), "Blur effect requested"),
            Err(e) => warn!(window = self.blur.id(), error = ?e, "Blur effect unavailable, shield stays unblurred"),
        }
    }

    pub fn blur_id(&self) -> WindowId {
        self.blur.id()
    }

    pub fn handle_id(&self) -> WindowId {
        self.handle.id()
    }

    pub fn owns(&self, window: WindowId) -> bool {
        window == self.blur.id() || window == self.handle.id()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn locks(&self) -> LockState {
        self.locks
    }

    pub fn always_on_top(&self) -> bool {
        self.always_on_top
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.is_some()
    }

    /// Lock or unlock both position and size
    pub fn set_lock(&mut self, locked: bool) {
        self.set_locks(LockState::both(locked));
    }

    pub fn set_locks(&mut self, locks: LockState) {
        self.locks = locks;
        // A lock taking effect mid-gesture ends the gesture
        if locks.position && matches!(self.gesture, Some(Gesture::Move { .. })) {
            self.gesture = None;
        }
        if locks.size && matches!(self.gesture, Some(Gesture::Resize { .. })) {
            self.gesture = None;
        }
        debug!(position = locks.position, size = locks.size, "Shield lock changed");
    }

    pub fn set_always_on_top(&mut self, enabled: bool) -> Result<()> {
        self.always_on_top = enabled;
        self.blur.set_always_on_top(enabled)?;
        self.handle.set_always_on_top(enabled)?;
        Ok(())
    }

    /// Left press on the interaction window. `root` is the global cursor
    /// position, `local` the position inside the window.
    pub fn press(&mut self, root: Point, local: Point) {
        let edges = Edges::hit(local, self.region.width, self.region.height);
        self.gesture = if edges.any() && !self.locks.size {
            Some(Gesture::Resize { edges, anchor: self.region, start: root })
        } else if !self.locks.position {
            Some(Gesture::Move { last: root })
        } else {
            None
        };
    }

    /// Pointer motion while pressed: moves or resizes both windows together
    pub fn motion(&mut self, root: Point) -> Result<()> {
        let Some(gesture) = self.gesture.as_mut() else {
            return Ok(());
        };
        let target = match gesture {
            Gesture::Move { .. } => match gesture.step(root) {
                Some(delta) => self.region.translated(delta),
                None => return Ok(()),
            },
            Gesture::Resize { .. } => match gesture.resized(root) {
                Some(region) if region != self.region => region,
                _ => return Ok(()),
            },
        };
        self.apply_region(target)
    }

    pub fn release(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            debug!(?gesture, region = %self.region, "Shield gesture finished");
        }
    }

    fn apply_region(&mut self, region: Region) -> Result<()> {
        self.blur.set_geometry(region)
            .context(format!("Failed to move blur window to {}", region))?;
        if let Err(e) = self.handle.set_geometry(region) {
            // Keep both halves on the last region both accepted
            if let Err(rollback) = self.blur.set_geometry(self.region) {
                warn!(region = %self.region, error = ?rollback, "Failed to move blur window back");
            }
            return Err(e).context(format!("Failed to move interaction window to {}", region));
        }
        self.region = region;
        Ok(())
    }
}
