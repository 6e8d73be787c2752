//! Control panel window implemented with egui/eframe
//!
//! The panel never touches native shield windows itself. Buttons become
//! [`Command`]s for the engine thread, and the engine answers through
//! [`EguiPanelLink`], which can show, hide and close the panel from any thread.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use anyhow::{Result, anyhow};
use eframe::{CreationContext, NativeOptions, egui};
use tracing::{debug, error, info, warn};

use super::constants::*;
use super::tray::{self, TrayHandle};
use crate::config::Settings;
use crate::controller::{Command, PanelLink, PanelStatus, ShieldStatus};
use crate::engine::{self, EngineHandle};
use crate::signals;

/// Messages from the engine thread to the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    Status(PanelStatus),
    Exit,
}

pub struct EguiPanelLink {
    ctx: egui::Context,
    tx: Sender<PanelEvent>,
}

impl EguiPanelLink {
    fn post(&self, event: PanelEvent) {
        if self.tx.send(event).is_err() {
            debug!(?event, "Control panel already closed");
        }
        self.ctx.request_repaint();
    }

    fn viewport(&self, command: egui::ViewportCommand) {
        self.ctx.send_viewport_cmd_to(egui::ViewportId::ROOT, command);
        self.ctx.request_repaint();
    }
}

impl PanelLink for EguiPanelLink {
    fn show(&mut self) {
        self.viewport(egui::ViewportCommand::Visible(true));
        self.viewport(egui::ViewportCommand::Minimized(false));
        self.viewport(egui::ViewportCommand::Focus);
    }

    // Minimized rather than invisible: an invisible root viewport stops
    // receiving update() calls on some backends and never comes back.
    fn hide(&mut self) {
        self.viewport(egui::ViewportCommand::Minimized(true));
    }

    fn sync(&mut self, status: PanelStatus) {
        self.post(PanelEvent::Status(status));
    }

    fn exit(&mut self) {
        self.post(PanelEvent::Exit);
    }
}

fn describe_shield(shield: &ShieldStatus) -> String {
    let region = shield.region;
    format!("{} × {} at ({}, {})", region.width, region.height, region.x, region.y)
}

fn describe_locks(shield: &ShieldStatus) -> &'static str {
    match (shield.locks.position, shield.locks.size) {
        (true, true) => "Position and size locked",
        (true, false) => "Position locked",
        (false, true) => "Size locked",
        (false, false) => "Unlocked",
    }
}

struct ControlPanel {
    engine: EngineHandle,
    events: Receiver<PanelEvent>,
    status: PanelStatus,
    allow_close: bool,
    engine_thread: Option<JoinHandle<()>>,
    _tray: Option<TrayHandle>,
}

impl ControlPanel {
    fn new(cc: &CreationContext<'_>, settings: Settings) -> Result<Self> {
        info!("Initializing control panel");

        let (tx, events) = mpsc::channel();
        let link = EguiPanelLink { ctx: cc.egui_ctx.clone(), tx };
        let status = PanelStatus {
            shield: None,
            lock: false,
            minimize_to_tray: settings.minimize_to_tray(),
            selecting: false,
        };

        let (engine, engine_thread) = engine::spawn(settings, link)?;

        let tray = tray::spawn(engine.clone())
            .inspect_err(|e| error!(error = ?e, "Failed to start tray"))
            .ok();
        if let Err(e) = signals::spawn_listener(engine.clone()) {
            warn!(error = ?e, "Signal handling unavailable");
        }

        Ok(Self {
            engine,
            events,
            status,
            allow_close: false,
            engine_thread: Some(engine_thread),
            _tray: tray,
        })
    }

    fn process_engine_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                PanelEvent::Status(status) => self.status = status,
                PanelEvent::Exit => {
                    info!("Engine finished, closing control panel");
                    self.allow_close = true;
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        }
    }

    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.allow_close {
            // The engine decides between hiding to the tray and quitting
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.engine.send(Command::CloseRequested);
        }
    }

    fn shield_section(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(egui::RichText::new("Shield").strong());
            ui.add_space(ITEM_SPACING);

            if self.status.selecting {
                ui.colored_label(STATUS_SELECTING, "\u{25CF}  Selecting area...");
            } else if let Some(shield) = &self.status.shield {
                ui.colored_label(STATUS_ACTIVE, "\u{25CF}  Active");
                ui.label(describe_shield(shield));
                ui.label(describe_locks(shield));
                if !shield.always_on_top {
                    ui.label("Not kept on top");
                }
            } else {
                ui.colored_label(STATUS_INACTIVE, "\u{25CF}  No shield");
            }
        });
    }
}

impl eframe::App for ControlPanel {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_engine_events(ctx);
        self.handle_close_request(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(PADDING);
            ui.heading(WINDOW_TITLE);
            ui.add_space(SECTION_SPACING);

            self.shield_section(ui);
            ui.add_space(SECTION_SPACING);

            ui.horizontal(|ui| {
                if ui.button("Select area").clicked() {
                    self.engine.send(Command::StartSelection);
                }
                let has_shield = self.status.shield.is_some();
                if ui.add_enabled(has_shield, egui::Button::new("Close shield")).clicked() {
                    self.engine.send(Command::CloseShield);
                }
            });

            ui.add_space(SECTION_SPACING);
            ui.separator();
            ui.add_space(ITEM_SPACING);

            let mut lock = self.status.lock;
            if ui.checkbox(&mut lock, "Lock shield position and size").changed() {
                self.status.lock = lock;
                self.engine.send(Command::SetLock(lock));
            }

            let mut minimize = self.status.minimize_to_tray;
            if ui.checkbox(&mut minimize, "Minimize to tray on close").changed() {
                self.status.minimize_to_tray = minimize;
                self.engine.send(Command::SetMinimizeToTray(minimize));
            }

            ui.add_space(SECTION_SPACING);
            ui.group(|ui| {
                ui.label(egui::RichText::new("Tips").strong());
                ui.label("• Drag on the shield to move it, drag its edges to resize");
                ui.label("• Right-click the shield for more options");
                ui.label("• Escape or right-click cancels a selection");
            });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // No-op when the engine already shut down
        self.engine.send(Command::Quit);
        if let Some(thread) = self.engine_thread.take()
            && thread.join().is_err()
        {
            error!("Engine thread panicked");
        }
        info!("Control panel exiting");
    }
}

pub fn run_gui(settings: Settings) -> Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([WINDOW_WIDTH, WINDOW_HEIGHT])
            .with_min_inner_size([WINDOW_MIN_WIDTH, WINDOW_MIN_HEIGHT])
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(|cc| Ok(Box::new(ControlPanel::new(cc, settings)?))),
    )
    .map_err(|err| anyhow!("Failed to launch control panel: {err}"))
}
