//! Orchestration of the shield lifecycle
//!
//! [`Controller`] owns every native window of the application through a
//! [`Platform`] implementation and reacts to two inputs: window events from
//! the display server and [`Command`]s from the control panel, tray and signal
//! handlers. It reports back to the control panel through a [`PanelLink`].
//! All of it runs on one thread, so shield state and teardown ordering never
//! race.

use anyhow::Result;
use std::ops::ControlFlow;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::menu::{MenuAction, MenuModel};
use crate::region::{Point, Region, RegionError};
use crate::selection::SelectionState;
use crate::shield::{BlurSurface, LockState, Shield, ShieldWindow, WindowId};

/// Full-screen overlay used to drag out a region
pub trait OverlaySurface {
    fn id(&self) -> WindowId;
    /// Position of the overlay on the root window
    fn origin(&self) -> Point;
    fn show(&mut self) -> Result<()>;
    /// Grab the keyboard once the overlay is viewable
    fn grab_input(&mut self) -> Result<()>;
    /// Repaint the scrim with a hole for `selection` (overlay-local)
    fn redraw(&mut self, selection: Option<Region>) -> Result<()>;
}

/// Popup window drawing a [`MenuModel`]
pub trait MenuSurface {
    fn id(&self) -> WindowId;
    fn show(&mut self) -> Result<()>;
    /// Grab pointer and keyboard once the popup is viewable
    fn grab_input(&mut self) -> Result<()>;
    fn redraw(&mut self, model: &MenuModel) -> Result<()>;
}

/// Native window factory
pub trait Platform {
    type Blur: BlurSurface;
    type Handle: ShieldWindow;
    type Overlay: OverlaySurface;
    type Menu: MenuSurface;

    fn create_blur_window(&mut self, region: Region) -> Result<Self::Blur>;
    fn create_interaction_window(&mut self, region: Region) -> Result<Self::Handle>;
    fn create_selection_overlay(&mut self) -> Result<Self::Overlay>;
    /// Popup at a root position; implementations keep it on screen
    fn create_context_menu(&mut self, at: Point, model: &MenuModel) -> Result<Self::Menu>;
}

/// Shield details shown on the control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShieldStatus {
    pub region: Region,
    pub locks: LockState,
    pub always_on_top: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelStatus {
    pub shield: Option<ShieldStatus>,
    /// State of the panel's lock checkbox
    pub lock: bool,
    pub minimize_to_tray: bool,
    pub selecting: bool,
}

/// Channel from the controller back to the control panel
pub trait PanelLink {
    fn show(&mut self);
    fn hide(&mut self);
    fn sync(&mut self, status: PanelStatus);
    /// The application is shutting down; the panel may close for good
    fn exit(&mut self);
}

/// Requests from the control panel, tray and signal handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartSelection,
    CloseShield,
    SetLock(bool),
    SetMinimizeToTray(bool),
    ShowPanel,
    /// The panel's window close button was pressed
    CloseRequested,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Middle,
    Right,
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Other,
}

/// Display-server events, already narrowed to what the controller handles.
/// `root` positions are global, `local` positions relative to `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    ButtonPress { window: WindowId, button: Button, root: Point, local: Point },
    ButtonRelease { window: WindowId, button: Button, root: Point, local: Point },
    Motion { window: WindowId, root: Point, local: Point },
    Key { window: WindowId, key: Key },
    Exposed { window: WindowId },
    Mapped { window: WindowId },
    Destroyed { window: WindowId },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownState {
    #[default]
    Running,
    ShuttingDown,
}

#[derive(Debug, Error)]
pub enum ShieldError {
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] RegionError),
    #[error(transparent)]
    Platform(#[from] anyhow::Error),
}

struct ActiveSelection<O> {
    overlay: O,
    state: SelectionState,
}

struct OpenMenu<M> {
    surface: M,
    model: MenuModel,
}

pub struct Controller<P: Platform, L: PanelLink> {
    // Windows are declared before the platform so they drop first
    menu: Option<OpenMenu<P::Menu>>,
    selection: Option<ActiveSelection<P::Overlay>>,
    shield: Option<Shield<P::Blur, P::Handle>>,
    platform: P,
    panel: L,
    settings: Settings,
    lock: bool,
    state: ShutdownState,
}

impl<P: Platform, L: PanelLink> Controller<P, L> {
    pub fn new(platform: P, panel: L, settings: Settings) -> Self {
        Self {
            menu: None,
            selection: None,
            shield: None,
            platform,
            panel,
            settings,
            lock: false,
            state: ShutdownState::Running,
        }
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    pub fn shield(&self) -> Option<&Shield<P::Blur, P::Handle>> {
        self.shield.as_ref()
    }

    pub fn is_selecting(&self) -> bool {
        self.selection.is_some()
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu.is_some()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> PanelStatus {
        PanelStatus {
            shield: self.shield.as_ref().map(|shield| ShieldStatus {
                region: shield.region(),
                locks: shield.locks(),
                always_on_top: shield.always_on_top(),
            }),
            lock: self.lock,
            minimize_to_tray: self.settings.minimize_to_tray(),
            selecting: self.selection.is_some(),
        }
    }

    pub fn sync_panel(&mut self) {
        let status = self.status();
        self.panel.sync(status);
    }

    pub fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        debug!(?command, "Handling command");
        if self.state == ShutdownState::ShuttingDown {
            // Everything is already torn down; just let the panel go
            self.panel.exit();
            return ControlFlow::Break(());
        }

        match command {
            Command::StartSelection => self.start_selection(),
            Command::CloseShield => self.close_shield(),
            Command::SetLock(locked) => self.set_lock(locked),
            Command::SetMinimizeToTray(enabled) => self.set_minimize_to_tray(enabled),
            Command::ShowPanel => self.panel.show(),
            Command::CloseRequested => return self.request_close(),
            Command::Quit => return self.quit(),
        }
        ControlFlow::Continue(())
    }

    pub fn handle_event(&mut self, event: WindowEvent) -> ControlFlow<()> {
        if self.state == ShutdownState::ShuttingDown {
            return ControlFlow::Break(());
        }

        match event {
            WindowEvent::ButtonPress { window, button, root, local } => {
                if self.menu_owns(window) {
                    self.menu_press(button, local);
                } else if self.overlay_owns(window) {
                    self.overlay_press(button, local);
                } else if self.handle_owns(window) {
                    self.shield_press(button, root, local);
                }
            }
            WindowEvent::ButtonRelease { window, button, local, .. } => {
                if button != Button::Left {
                    return ControlFlow::Continue(());
                }
                if self.overlay_owns(window) {
                    self.overlay_release(local);
                } else if self.handle_owns(window)
                    && let Some(shield) = self.shield.as_mut()
                    && shield.is_dragging()
                {
                    shield.release();
                    self.sync_panel();
                }
            }
            WindowEvent::Motion { window, root, local } => {
                if self.menu_owns(window) {
                    self.menu_hover(local);
                } else if self.overlay_owns(window) {
                    self.overlay_motion(local);
                } else if self.handle_owns(window)
                    && let Some(shield) = self.shield.as_mut()
                    && let Err(e) = shield.motion(root)
                {
                    warn!(error = ?e, "Failed to update shield geometry");
                }
            }
            WindowEvent::Key { window, key: Key::Escape } => {
                if self.menu_owns(window) {
                    self.close_menu();
                } else if self.overlay_owns(window) {
                    info!("Selection cancelled");
                    self.finish_selection(None);
                }
            }
            WindowEvent::Key { .. } => {}
            WindowEvent::Exposed { window } => {
                if self.menu_owns(window) {
                    self.redraw_menu();
                } else if self.overlay_owns(window) {
                    self.redraw_overlay();
                }
            }
            WindowEvent::Mapped { window } => self.on_mapped(window),
            WindowEvent::Destroyed { window } => {
                if self.shield.as_ref().is_some_and(|shield| shield.owns(window)) {
                    warn!(window, "Shield window was destroyed externally");
                    self.close_shield();
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Hide the panel and let the user drag out a region
    pub fn start_selection(&mut self) {
        if self.selection.is_some() {
            debug!("Selection already in progress");
            return;
        }
        self.close_menu();
        self.panel.hide();

        let overlay = self.platform.create_selection_overlay().and_then(|mut overlay| {
            overlay.show()?;
            Ok(overlay)
        });
        match overlay {
            Ok(overlay) => {
                info!(origin = ?overlay.origin(), "Selection started");
                let state = SelectionState::new(overlay.origin());
                self.selection = Some(ActiveSelection { overlay, state });
                self.sync_panel();
            }
            Err(e) => {
                error!(error = ?e, "Failed to open selection overlay");
                self.panel.show();
            }
        }
    }

    /// Replace any existing shield with a new one covering `region`.
    ///
    /// An invalid region is rejected before anything else happens, so the
    /// current shield stays in place.
    pub fn create_shield(&mut self, region: Region) -> Result<(), ShieldError> {
        region.validate()?;
        self.close_shield();

        // A failure creating the handle drops the blur window with it
        let blur = self.platform.create_blur_window(region)?;
        let handle = self.platform.create_interaction_window(region)?;
        let mut shield = Shield::new(blur, handle, region, LockState::both(self.lock))?;
        shield.show()?;

        info!(region = %region, locked = self.lock, "Shield created");
        self.shield = Some(shield);
        self.sync_panel();
        Ok(())
    }

    pub fn close_shield(&mut self) {
        let Some(shield) = self.shield.as_ref() else {
            return;
        };
        info!(region = %shield.region(), blur = shield.blur_id(), "Closing shield");
        self.close_menu();
        // Blur window is destroyed first, then the interaction window
        self.shield = None;
        self.sync_panel();
    }

    pub fn set_lock(&mut self, locked: bool) {
        self.lock = locked;
        if let Some(shield) = self.shield.as_mut() {
            shield.set_lock(locked);
        }
        info!(locked, "Lock changed");
        self.sync_panel();
    }

    pub fn set_minimize_to_tray(&mut self, enabled: bool) {
        self.settings.set_minimize_to_tray(enabled);
        self.sync_panel();
    }

    /// The panel's close button: hide to the tray or shut down per settings
    pub fn request_close(&mut self) -> ControlFlow<()> {
        match self.state {
            ShutdownState::ShuttingDown => {
                self.panel.exit();
                ControlFlow::Break(())
            }
            ShutdownState::Running if self.settings.minimize_to_tray() => {
                info!("Control panel minimized to tray");
                self.panel.hide();
                ControlFlow::Continue(())
            }
            ShutdownState::Running => self.shutdown(),
        }
    }

    /// Quit from the tray or a signal, regardless of settings
    pub fn quit(&mut self) -> ControlFlow<()> {
        info!("Quit requested");
        self.shutdown()
    }

    /// Tear everything down once. Later calls only repeat the exit notice.
    pub fn shutdown(&mut self) -> ControlFlow<()> {
        if self.state == ShutdownState::ShuttingDown {
            return ControlFlow::Break(());
        }
        self.state = ShutdownState::ShuttingDown;
        info!("Shutting down");

        self.close_menu();
        self.selection = None;
        self.close_shield();
        self.panel.exit();
        ControlFlow::Break(())
    }

    fn menu_owns(&self, window: WindowId) -> bool {
        self.menu.as_ref().is_some_and(|menu| menu.surface.id() == window)
    }

    fn overlay_owns(&self, window: WindowId) -> bool {
        self.selection.as_ref().is_some_and(|selection| selection.overlay.id() == window)
    }

    fn handle_owns(&self, window: WindowId) -> bool {
        self.shield.as_ref().is_some_and(|shield| shield.handle_id() == window)
    }

    fn on_mapped(&mut self, window: WindowId) {
        if let Some(shield) = self.shield.as_mut()
            && shield.blur_id() == window
        {
            shield.on_blur_visible();
        } else if let Some(selection) = self.selection.as_mut()
            && selection.overlay.id() == window
        {
            if let Err(e) = selection.overlay.grab_input() {
                warn!(error = ?e, "Failed to grab keyboard for selection, Escape will not cancel");
            }
            self.redraw_overlay();
        } else if let Some(menu) = self.menu.as_mut()
            && menu.surface.id() == window
            && let Err(e) = menu.surface.grab_input()
        {
            warn!(error = ?e, "Failed to grab input for context menu");
        }
    }

    fn overlay_press(&mut self, button: Button, local: Point) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        match button {
            Button::Left => {
                selection.state.press(local);
                self.redraw_overlay();
            }
            Button::Right => {
                info!("Selection cancelled");
                self.finish_selection(None);
            }
            _ => {}
        }
    }

    fn overlay_motion(&mut self, local: Point) {
        if let Some(selection) = self.selection.as_mut()
            && selection.state.motion(local)
        {
            self.redraw_overlay();
        }
    }

    fn overlay_release(&mut self, local: Point) {
        let region = match self.selection.as_mut() {
            Some(selection) if selection.state.is_dragging() => selection.state.release(local),
            _ => return,
        };
        if region.is_none() {
            info!("Selection was empty, nothing to shield");
        }
        self.finish_selection(region);
    }

    /// Close the overlay, create the shield if a region was chosen and bring
    /// the panel back in every case
    fn finish_selection(&mut self, region: Option<Region>) {
        self.selection = None;

        if let Some(region) = region {
            match self.create_shield(region) {
                Ok(()) => {}
                Err(ShieldError::InvalidRegion(e)) => {
                    warn!(region = %region, error = %e, "Discarding invalid selection");
                }
                Err(ShieldError::Platform(e)) => {
                    error!(region = %region, error = ?e, "Failed to create shield");
                }
            }
        }
        self.sync_panel();
        self.panel.show();
    }

    fn redraw_overlay(&mut self) {
        if let Some(selection) = self.selection.as_mut()
            && let Err(e) = selection.overlay.redraw(selection.state.current_rect())
        {
            warn!(error = ?e, "Failed to redraw selection overlay");
        }
    }

    fn shield_press(&mut self, button: Button, root: Point, local: Point) {
        let Some(shield) = self.shield.as_mut() else {
            return;
        };
        match button {
            Button::Left => shield.press(root, local),
            Button::Right => self.open_menu(root),
            _ => {}
        }
    }

    fn open_menu(&mut self, at: Point) {
        self.close_menu();
        let Some(shield) = self.shield.as_ref() else {
            return;
        };

        let model = MenuModel::for_shield(shield.always_on_top(), shield.locks());
        let surface = self.platform.create_context_menu(at, &model).and_then(|mut surface| {
            surface.show()?;
            Ok(surface)
        });
        match surface {
            Ok(surface) => {
                debug!(at = ?at, "Context menu opened");
                self.menu = Some(OpenMenu { surface, model });
            }
            Err(e) => error!(error = ?e, "Failed to open context menu"),
        }
    }

    fn close_menu(&mut self) {
        if self.menu.take().is_some() {
            debug!("Context menu closed");
        }
    }

    fn menu_hover(&mut self, local: Point) {
        if let Some(menu) = self.menu.as_mut()
            && menu.model.hover(local)
        {
            self.redraw_menu();
        }
    }

    fn redraw_menu(&mut self) {
        if let Some(menu) = self.menu.as_mut()
            && let Err(e) = menu.surface.redraw(&menu.model)
        {
            warn!(error = ?e, "Failed to redraw context menu");
        }
    }

    fn menu_press(&mut self, button: Button, local: Point) {
        let action = match self.menu.as_ref() {
            Some(menu) if button == Button::Left => menu.model.action_at(local),
            _ => None,
        };
        self.close_menu();
        if let Some(action) = action {
            self.apply_menu_action(action);
        }
    }

    fn apply_menu_action(&mut self, action: MenuAction) {
        info!(?action, "Context menu action");
        if action == MenuAction::CloseShield {
            self.close_shield();
            return;
        }

        let Some(shield) = self.shield.as_mut() else {
            return;
        };
        let mut locks = shield.locks();
        match action {
            MenuAction::ToggleAlwaysOnTop => {
                let enabled = !shield.always_on_top();
                if let Err(e) = shield.set_always_on_top(enabled) {
                    warn!(enabled, error = ?e, "Failed to change stacking of shield");
                }
            }
            MenuAction::TogglePositionLock => {
                locks.position = !locks.position;
                shield.set_locks(locks);
            }
            MenuAction::ToggleSizeLock => {
                locks.size = !locks.size;
                shield.set_locks(locks);
            }
            MenuAction::CloseShield => {}
        }
        self.sync_panel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::menu::{ITEM_HEIGHT, PADDING, SEPARATOR_HEIGHT};
    use crate::shield::testing::{FakeWindow, WindowLog};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct PlatformLog {
        next_id: WindowId,
        blur_windows: Vec<Rc<RefCell<WindowLog>>>,
        handle_windows: Vec<Rc<RefCell<WindowLog>>>,
        overlays_created: usize,
        overlay_redraws: Vec<Option<Region>>,
        overlay_grabs: usize,
        overlay_live: bool,
        menus_created: usize,
        menu_live: bool,
        menu_at: Option<Point>,
        fail_handle: bool,
        fail_overlay: bool,
    }

    type Shared = Rc<RefCell<PlatformLog>>;

    struct FakePlatform(Shared);

    struct FakeOverlay {
        id: WindowId,
        origin: Point,
        log: Shared,
    }

    struct FakeMenu {
        id: WindowId,
        log: Shared,
    }

    impl OverlaySurface for FakeOverlay {
        fn id(&self) -> WindowId {
            self.id
        }
        fn origin(&self) -> Point {
            self.origin
        }
        fn show(&mut self) -> Result<()> {
            Ok(())
        }
        fn grab_input(&mut self) -> Result<()> {
            self.log.borrow_mut().overlay_grabs += 1;
            Ok(())
        }
        fn redraw(&mut self, selection: Option<Region>) -> Result<()> {
            self.log.borrow_mut().overlay_redraws.push(selection);
            Ok(())
        }
    }

    impl Drop for FakeOverlay {
        fn drop(&mut self) {
            self.log.borrow_mut().overlay_live = false;
        }
    }

    impl MenuSurface for FakeMenu {
        fn id(&self) -> WindowId {
            self.id
        }
        fn show(&mut self) -> Result<()> {
            Ok(())
        }
        fn grab_input(&mut self) -> Result<()> {
            Ok(())
        }
        fn redraw(&mut self, _model: &MenuModel) -> Result<()> {
            Ok(())
        }
    }

    impl Drop for FakeMenu {
        fn drop(&mut self) {
            self.log.borrow_mut().menu_live = false;
        }
    }

    impl FakePlatform {
        fn next_id(&self) -> WindowId {
            let mut log = self.0.borrow_mut();
            log.next_id += 1;
            log.next_id
        }
    }

    impl Platform for FakePlatform {
        type Blur = FakeWindow;
        type Handle = FakeWindow;
        type Overlay = FakeOverlay;
        type Menu = FakeMenu;

        fn create_blur_window(&mut self, _region: Region) -> Result<FakeWindow> {
            let (window, log) = FakeWindow::new(self.next_id());
            self.0.borrow_mut().blur_windows.push(log);
            Ok(window)
        }

        fn create_interaction_window(&mut self, _region: Region) -> Result<FakeWindow> {
            if self.0.borrow().fail_handle {
                anyhow::bail!("interaction window refused");
            }
            let (window, log) = FakeWindow::new(self.next_id());
            self.0.borrow_mut().handle_windows.push(log);
            Ok(window)
        }

        fn create_selection_overlay(&mut self) -> Result<FakeOverlay> {
            if self.0.borrow().fail_overlay {
                anyhow::bail!("no screen");
            }
            let id = self.next_id();
            let mut log = self.0.borrow_mut();
            log.overlays_created += 1;
            log.overlay_live = true;
            Ok(FakeOverlay { id, origin: Point::new(1920, 0), log: self.0.clone() })
        }

        fn create_context_menu(&mut self, at: Point, _model: &MenuModel) -> Result<FakeMenu> {
            let id = self.next_id();
            let mut log = self.0.borrow_mut();
            log.menus_created += 1;
            log.menu_live = true;
            log.menu_at = Some(at);
            Ok(FakeMenu { id, log: self.0.clone() })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum PanelCall {
        Show,
        Hide,
        Sync(PanelStatus),
        Exit,
    }

    #[derive(Clone, Default)]
    struct FakePanel(Rc<RefCell<Vec<PanelCall>>>);

    impl FakePanel {
        fn calls(&self) -> Vec<PanelCall> {
            self.0.borrow().clone()
        }

        fn count(&self, call: PanelCall) -> usize {
            self.0.borrow().iter().filter(|c| **c == call).count()
        }

        fn last_status(&self) -> Option<PanelStatus> {
            self.0.borrow().iter().rev().find_map(|call| match call {
                PanelCall::Sync(status) => Some(*status),
                _ => None,
            })
        }
    }

    impl PanelLink for FakePanel {
        fn show(&mut self) {
            self.0.borrow_mut().push(PanelCall::Show);
        }
        fn hide(&mut self) {
            self.0.borrow_mut().push(PanelCall::Hide);
        }
        fn sync(&mut self, status: PanelStatus) {
            self.0.borrow_mut().push(PanelCall::Sync(status));
        }
        fn exit(&mut self) {
            self.0.borrow_mut().push(PanelCall::Exit);
        }
    }

    struct Harness {
        controller: Controller<FakePlatform, FakePanel>,
        platform: Shared,
        panel: FakePanel,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(dir.path().join("settings.json"));
        let platform = Shared::default();
        let panel = FakePanel::default();
        let controller = Controller::new(FakePlatform(platform.clone()), panel.clone(), settings);
        Harness { controller, platform, panel, _dir: dir }
    }

    fn press(window: WindowId, button: Button, root: Point, local: Point) -> WindowEvent {
        WindowEvent::ButtonPress { window, button, root, local }
    }

    fn release(window: WindowId, button: Button, root: Point, local: Point) -> WindowEvent {
        WindowEvent::ButtonRelease { window, button, root, local }
    }

    fn live_windows(log: &[Rc<RefCell<WindowLog>>]) -> usize {
        log.iter().filter(|window| !window.borrow().destroyed).count()
    }

    #[test]
    fn test_create_shield_valid_region() {
        let mut h = harness();
        let region = Region::new(100, 100, 400, 300);
        h.controller.create_shield(region).unwrap();

        let shield = h.controller.shield().unwrap();
        assert_eq!(shield.region(), region);

        // Blur attempted exactly once even with repeated map notifications
        let blur_id = shield.blur_id();
        let _ = h.controller.handle_event(WindowEvent::Mapped { window: blur_id });
        let _ = h.controller.handle_event(WindowEvent::Mapped { window: blur_id });
        let platform = h.platform.borrow();
        assert_eq!(platform.blur_windows[0].borrow().blur_attempts, 1);
        assert_eq!(platform.blur_windows[0].borrow().shown, 1);
        assert_eq!(platform.handle_windows[0].borrow().shown, 1);
        assert_eq!(h.panel.last_status().unwrap().shield.unwrap().region, region);
    }

    #[test]
    fn test_create_shield_rejects_empty_region() {
        let mut h = harness();
        let err = h.controller.create_shield(Region::new(0, 0, 0, 50)).unwrap_err();
        assert!(matches!(err, ShieldError::InvalidRegion(RegionError::EmptySize { .. })));
        assert!(h.controller.shield().is_none());
        assert!(h.platform.borrow().blur_windows.is_empty());
    }

    #[test]
    fn test_create_shield_rejects_far_region() {
        let mut h = harness();
        let err = h.controller.create_shield(Region::new(-20_000, 0, 100, 100)).unwrap_err();
        assert!(matches!(err, ShieldError::InvalidRegion(RegionError::OutOfBounds { .. })));
        assert!(h.platform.borrow().blur_windows.is_empty());
    }

    #[test]
    fn test_invalid_region_keeps_existing_shield() {
        let mut h = harness();
        let region = Region::new(10, 10, 100, 100);
        h.controller.create_shield(region).unwrap();
        assert!(h.controller.create_shield(Region::new(0, 0, 50, 0)).is_err());

        assert_eq!(h.controller.shield().unwrap().region(), region);
        assert_eq!(live_windows(&h.platform.borrow().blur_windows), 1);
    }

    #[test]
    fn test_second_shield_replaces_first() {
        let mut h = harness();
        h.controller.create_shield(Region::new(10, 10, 100, 100)).unwrap();
        let second = Region::new(500, 400, 200, 150);
        h.controller.create_shield(second).unwrap();

        assert_eq!(h.controller.shield().unwrap().region(), second);
        let platform = h.platform.borrow();
        assert_eq!(platform.blur_windows.len(), 2);
        assert_eq!(live_windows(&platform.blur_windows), 1);
        assert_eq!(live_windows(&platform.handle_windows), 1);
        assert!(platform.blur_windows[0].borrow().destroyed);
    }

    #[test]
    fn test_failed_handle_releases_blur_window() {
        let mut h = harness();
        h.platform.borrow_mut().fail_handle = true;
        let err = h.controller.create_shield(Region::new(10, 10, 100, 100)).unwrap_err();
        assert!(matches!(err, ShieldError::Platform(_)));
        assert!(h.controller.shield().is_none());
        assert_eq!(live_windows(&h.platform.borrow().blur_windows), 0);
    }

    #[test]
    fn test_lock_checkbox_applies_to_new_and_live_shields() {
        let mut h = harness();
        let _ = h.controller.handle_command(Command::SetLock(true));
        h.controller.create_shield(Region::new(0, 0, 100, 100)).unwrap();
        assert_eq!(h.controller.shield().unwrap().locks(), LockState::both(true));

        let _ = h.controller.handle_command(Command::SetLock(false));
        assert_eq!(h.controller.shield().unwrap().locks(), LockState::both(false));
    }

    #[test]
    fn test_drag_moves_both_windows_unless_locked() {
        let mut h = harness();
        h.controller.create_shield(Region::new(100, 100, 400, 300)).unwrap();
        let handle = h.controller.shield().unwrap().handle_id();

        let _ = h.controller.handle_event(press(handle, Button::Left, Point::new(300, 250), Point::new(200, 150)));
        let _ = h.controller.handle_event(WindowEvent::Motion { window: handle, root: Point::new(320, 240), local: Point::new(220, 140) });
        let _ = h.controller.handle_event(WindowEvent::Motion { window: handle, root: Point::new(340, 260), local: Point::new(240, 160) });
        let _ = h.controller.handle_event(release(handle, Button::Left, Point::new(340, 260), Point::new(240, 160)));

        let moved = Region::new(140, 110, 400, 300);
        assert_eq!(h.controller.shield().unwrap().region(), moved);
        assert_eq!(h.platform.borrow().blur_windows[0].borrow().geometry.last(), Some(&moved));

        let _ = h.controller.handle_command(Command::SetLock(true));
        let _ = h.controller.handle_event(press(handle, Button::Left, Point::new(300, 250), Point::new(160, 140)));
        let _ = h.controller.handle_event(WindowEvent::Motion { window: handle, root: Point::new(400, 400), local: Point::new(260, 290) });
        assert_eq!(h.controller.shield().unwrap().region(), moved);
    }

    #[test]
    fn test_selection_creates_shield_and_reshows_panel() {
        let mut h = harness();
        let _ = h.controller.handle_command(Command::StartSelection);
        assert!(h.controller.is_selecting());
        assert_eq!(h.panel.count(PanelCall::Hide), 1);

        let overlay = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(WindowEvent::Mapped { window: overlay });
        assert_eq!(h.platform.borrow().overlay_grabs, 1);

        let _ = h.controller.handle_event(press(overlay, Button::Left, Point::new(2020, 100), Point::new(100, 100)));
        let _ = h.controller.handle_event(WindowEvent::Motion { window: overlay, root: Point::new(2220, 200), local: Point::new(300, 200) });
        let _ = h.controller.handle_event(release(overlay, Button::Left, Point::new(2420, 400), Point::new(500, 400)));

        assert!(!h.controller.is_selecting());
        assert!(!h.platform.borrow().overlay_live);
        // Overlay origin (1920, 0) is added back
        assert_eq!(h.controller.shield().unwrap().region(), Region::new(2020, 100, 400, 300));
        assert_eq!(h.panel.calls().last(), Some(&PanelCall::Show));
        assert!(h.platform.borrow().overlay_redraws.contains(&Some(Region::new(100, 100, 200, 100))));
    }

    #[test]
    fn test_empty_selection_creates_nothing() {
        let mut h = harness();
        let _ = h.controller.handle_command(Command::StartSelection);
        let overlay = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(press(overlay, Button::Left, Point::new(50, 50), Point::new(50, 50)));
        let _ = h.controller.handle_event(release(overlay, Button::Left, Point::new(50, 50), Point::new(50, 50)));

        assert!(h.controller.shield().is_none());
        assert!(!h.controller.is_selecting());
        assert_eq!(h.panel.calls().last(), Some(&PanelCall::Show));
    }

    #[test]
    fn test_escape_cancels_selection() {
        let mut h = harness();
        h.controller.create_shield(Region::new(0, 0, 100, 100)).unwrap();
        let _ = h.controller.handle_command(Command::StartSelection);
        let overlay = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(press(overlay, Button::Left, Point::new(0, 0), Point::new(0, 0)));
        let _ = h.controller.handle_event(WindowEvent::Key { window: overlay, key: Key::Escape });

        assert!(!h.controller.is_selecting());
        assert!(!h.platform.borrow().overlay_live);
        // Cancelling keeps the shield that was already there
        assert_eq!(h.controller.shield().unwrap().region(), Region::new(0, 0, 100, 100));
        assert_eq!(h.panel.calls().last(), Some(&PanelCall::Show));
    }

    #[test]
    fn test_right_click_cancels_selection() {
        let mut h = harness();
        let _ = h.controller.handle_command(Command::StartSelection);
        let overlay = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(press(overlay, Button::Right, Point::new(5, 5), Point::new(5, 5)));
        assert!(!h.controller.is_selecting());
        assert_eq!(h.panel.calls().last(), Some(&PanelCall::Show));
    }

    #[test]
    fn test_overlay_failure_reshows_panel() {
        let mut h = harness();
        h.platform.borrow_mut().fail_overlay = true;
        let _ = h.controller.handle_command(Command::StartSelection);
        assert!(!h.controller.is_selecting());
        assert_eq!(h.panel.calls(), vec![PanelCall::Hide, PanelCall::Show]);
    }

    #[test]
    fn test_second_start_selection_is_ignored() {
        let mut h = harness();
        let _ = h.controller.handle_command(Command::StartSelection);
        let _ = h.controller.handle_command(Command::StartSelection);
        assert_eq!(h.platform.borrow().overlays_created, 1);
    }

    #[test]
    fn test_context_menu_toggles_locks() {
        let mut h = harness();
        h.controller.create_shield(Region::new(100, 100, 400, 300)).unwrap();
        let handle = h.controller.shield().unwrap().handle_id();

        let _ = h.controller.handle_event(press(handle, Button::Right, Point::new(200, 200), Point::new(100, 100)));
        assert!(h.controller.is_menu_open());
        assert_eq!(h.platform.borrow().menu_at, Some(Point::new(200, 200)));

        // Second row: lock position
        let menu = h.platform.borrow().next_id;
        let row = PADDING as i32 + ITEM_HEIGHT as i32 + 4;
        let _ = h.controller.handle_event(press(menu, Button::Left, Point::new(0, 0), Point::new(20, row)));

        assert!(!h.controller.is_menu_open());
        assert!(!h.platform.borrow().menu_live);
        let locks = h.controller.shield().unwrap().locks();
        assert_eq!(locks, LockState { position: true, size: false });
    }

    #[test]
    fn test_second_right_click_replaces_open_menu() {
        let mut h = harness();
        h.controller.create_shield(Region::new(100, 100, 400, 300)).unwrap();
        let handle = h.controller.shield().unwrap().handle_id();

        let _ = h.controller.handle_event(press(handle, Button::Right, Point::new(200, 200), Point::new(100, 100)));
        let first = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(press(handle, Button::Right, Point::new(250, 220), Point::new(150, 120)));

        let platform = h.platform.borrow();
        assert_eq!(platform.menus_created, 2);
        assert!(platform.menu_live);
        assert_eq!(platform.menu_at, Some(Point::new(250, 220)));
        assert!(h.controller.is_menu_open());
        assert_ne!(platform.next_id, first);
    }

    #[test]
    fn test_context_menu_always_on_top() {
        let mut h = harness();
        h.controller.create_shield(Region::new(100, 100, 400, 300)).unwrap();
        let handle = h.controller.shield().unwrap().handle_id();
        let _ = h.controller.handle_event(press(handle, Button::Right, Point::new(200, 200), Point::new(100, 100)));
        let menu = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(press(menu, Button::Left, Point::new(0, 0), Point::new(20, PADDING as i32 + 2)));

        assert!(!h.controller.shield().unwrap().always_on_top());
        assert_eq!(h.platform.borrow().blur_windows[0].borrow().on_top, Some(false));
    }

    #[test]
    fn test_context_menu_close_shield() {
        let mut h = harness();
        h.controller.create_shield(Region::new(100, 100, 400, 300)).unwrap();
        let handle = h.controller.shield().unwrap().handle_id();
        let _ = h.controller.handle_event(press(handle, Button::Right, Point::new(200, 200), Point::new(100, 100)));

        let menu = h.platform.borrow().next_id;
        let last_row = PADDING as i32 + 3 * ITEM_HEIGHT as i32 + SEPARATOR_HEIGHT as i32 + 5;
        let _ = h.controller.handle_event(press(menu, Button::Left, Point::new(0, 0), Point::new(20, last_row)));

        assert!(h.controller.shield().is_none());
        let platform = h.platform.borrow();
        assert_eq!(live_windows(&platform.blur_windows), 0);
        assert_eq!(live_windows(&platform.handle_windows), 0);
    }

    #[test]
    fn test_context_menu_dismissed_outside_or_escape() {
        let mut h = harness();
        h.controller.create_shield(Region::new(100, 100, 400, 300)).unwrap();
        let handle = h.controller.shield().unwrap().handle_id();

        let _ = h.controller.handle_event(press(handle, Button::Right, Point::new(200, 200), Point::new(100, 100)));
        let menu = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(press(menu, Button::Left, Point::new(900, 900), Point::new(-300, -300)));
        assert!(!h.controller.is_menu_open());

        let _ = h.controller.handle_event(press(handle, Button::Right, Point::new(200, 200), Point::new(100, 100)));
        let menu = h.platform.borrow().next_id;
        let _ = h.controller.handle_event(WindowEvent::Key { window: menu, key: Key::Escape });
        assert!(!h.controller.is_menu_open());

        // Nothing toggled along the way
        assert_eq!(h.controller.shield().unwrap().locks(), LockState::default());
        assert!(h.controller.shield().unwrap().always_on_top());
    }

    #[test]
    fn test_external_blur_destroy_closes_pair() {
        let mut h = harness();
        h.controller.create_shield(Region::new(0, 0, 100, 100)).unwrap();
        let blur = h.controller.shield().unwrap().blur_id();
        let _ = h.controller.handle_event(WindowEvent::Destroyed { window: blur });

        assert!(h.controller.shield().is_none());
        assert_eq!(live_windows(&h.platform.borrow().handle_windows), 0);
        assert_eq!(h.panel.last_status().unwrap().shield, None);
    }

    #[test]
    fn test_close_request_minimizes_to_tray_by_default() {
        let mut h = harness();
        let flow = h.controller.handle_command(Command::CloseRequested);
        assert_eq!(flow, ControlFlow::Continue(()));
        assert_eq!(h.controller.state(), ShutdownState::Running);
        assert_eq!(h.panel.calls(), vec![PanelCall::Hide]);
    }

    #[test]
    fn test_close_request_shuts_down_without_tray() {
        let mut h = harness();
        h.controller.create_shield(Region::new(0, 0, 100, 100)).unwrap();
        let _ = h.controller.handle_command(Command::SetMinimizeToTray(false));
        assert!(!h.controller.settings().minimize_to_tray());

        let flow = h.controller.handle_command(Command::CloseRequested);
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(h.controller.state(), ShutdownState::ShuttingDown);
        assert!(h.controller.shield().is_none());
        assert_eq!(h.panel.count(PanelCall::Exit), 1);
    }

    #[test]
    fn test_quit_ignores_minimize_setting() {
        let mut h = harness();
        assert!(h.controller.settings().minimize_to_tray());
        let _ = h.controller.handle_command(Command::StartSelection);
        h.controller.create_shield(Region::new(0, 0, 100, 100)).unwrap();

        assert_eq!(h.controller.handle_command(Command::Quit), ControlFlow::Break(()));
        assert!(h.controller.shield().is_none());
        assert!(!h.controller.is_selecting());
        assert!(!h.platform.borrow().overlay_live);
        assert_eq!(h.panel.count(PanelCall::Exit), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut h = harness();
        h.controller.create_shield(Region::new(0, 0, 100, 100)).unwrap();
        assert_eq!(h.controller.shutdown(), ControlFlow::Break(()));
        assert_eq!(h.controller.shutdown(), ControlFlow::Break(()));
        assert_eq!(h.panel.count(PanelCall::Exit), 1);

        // Commands after shutdown build nothing new
        let _ = h.controller.handle_command(Command::StartSelection);
        assert_eq!(h.platform.borrow().overlays_created, 0);
        assert_eq!(h.platform.borrow().blur_windows.len(), 1);
    }

    #[test]
    fn test_show_panel_command() {
        let mut h = harness();
        let _ = h.controller.handle_command(Command::ShowPanel);
        assert_eq!(h.panel.calls(), vec![PanelCall::Show]);
    }

    #[test]
    fn test_minimize_setting_is_persisted() {
        let mut h = harness();
        let path = h.controller.settings().path().to_path_buf();
        let _ = h.controller.handle_command(Command::SetMinimizeToTray(false));

        assert!(!Settings::load_from(&path).minimize_to_tray());
        assert!(!h.panel.last_status().unwrap().minimize_to_tray);
    }
}
