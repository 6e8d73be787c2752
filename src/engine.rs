//! Engine thread: owns the X11 connection, every native window and the
//! [`Controller`]
//!
//! The thread blocks in `wait_for_event`. Other threads talk to it through an
//! [`EngineHandle`], which queues a [`Command`] and then sends a client
//! message to a private unmapped window so the blocked wait returns.

use anyhow::{Context, Result};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::Settings;
use crate::controller::{Command, Controller, PanelLink, Platform};
use crate::x11::{X11Context, X11Platform, events};

/// Posts wake-up messages to the engine's private window
struct Waker {
    conn: Arc<RustConnection>,
    window: Window,
    atom: Atom,
}

impl Waker {
    fn create(ctx: &X11Context) -> Result<Self> {
        let window = ctx.conn.generate_id()
            .context("Failed to generate ID for wake window")?;
        ctx.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            ctx.root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )
        .context("Failed to create wake window")?;
        Ok(Self { conn: ctx.conn.clone(), window, atom: ctx.atoms.wake })
    }

    fn wake(&self) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: self.window,
            type_: self.atom,
            data: ClientMessageData::from([0u32; 5]),
        };
        // An empty mask delivers the event to the window's creator: us
        self.conn.send_event(false, self.window, EventMask::NO_EVENT, event)
            .context("Failed to send wake message to engine")?;
        self.conn.flush()
            .context("Failed to flush X11 connection after wake message")?;
        Ok(())
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        if let Err(e) = self.conn.destroy_window(self.window) {
            debug!(window = self.window, error = %e, "Failed to destroy wake window");
        }
        let _ = self.conn.flush();
    }
}

/// Cloneable sender of [`Command`]s to the engine thread
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<Command>,
    waker: Arc<Waker>,
}

impl EngineHandle {
    pub fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!(?command, "Engine already stopped, dropping command");
            return;
        }
        if let Err(e) = self.waker.wake() {
            error!(?command, error = ?e, "Failed to wake engine");
        }
    }
}

/// Connect to the X server and start the engine thread
pub fn spawn<L>(settings: Settings, panel: L) -> Result<(EngineHandle, JoinHandle<()>)>
where
    L: PanelLink + Send + 'static,
{
    let (conn, screen_num) = x11rb::connect(None)
        .context("Failed to connect to the X server")?;
    info!(screen = screen_num, "Connected to X11");

    let ctx = X11Context::new(Arc::new(conn), screen_num)?;
    let waker = Arc::new(Waker::create(&ctx)?);
    ctx.conn.flush()
        .context("Failed to flush X11 connection after engine setup")?;

    let (tx, rx) = mpsc::channel();
    let thread = thread::Builder::new()
        .name("x11-engine".to_string())
        .spawn(move || run(ctx, rx, panel, settings))
        .context("Failed to spawn engine thread")?;

    Ok((EngineHandle { tx, waker }, thread))
}

fn run<L: PanelLink>(ctx: X11Context, commands: Receiver<Command>, panel: L, settings: Settings) {
    let mut controller = Controller::new(X11Platform::new(&ctx), panel, settings);
    controller.sync_panel();
    info!("Engine running");

    loop {
        if drain_commands(&commands, &mut controller).is_break() {
            break;
        }
        if let Err(e) = ctx.conn.flush() {
            error!(error = %e, "Failed to flush X11 connection");
            let _ = controller.shutdown();
            break;
        }

        let event = match ctx.conn.wait_for_event() {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "Lost connection to the X server");
                let _ = controller.shutdown();
                break;
            }
        };
        if dispatch(&ctx, &mut controller, &event).is_break() {
            break;
        }
    }

    drop(controller);
    let _ = ctx.conn.flush();
    info!("Engine stopped");
}

fn drain_commands<P: Platform, L: PanelLink>(
    commands: &Receiver<Command>,
    controller: &mut Controller<P, L>,
) -> ControlFlow<()> {
    loop {
        match commands.try_recv() {
            Ok(command) => {
                if controller.handle_command(command).is_break() {
                    return ControlFlow::Break(());
                }
            }
            Err(TryRecvError::Empty) => return ControlFlow::Continue(()),
            Err(TryRecvError::Disconnected) => {
                warn!("Every command sender is gone, shutting down");
                return controller.shutdown();
            }
        }
    }
}

fn dispatch<P: Platform, L: PanelLink>(
    ctx: &X11Context,
    controller: &mut Controller<P, L>,
    event: &Event,
) -> ControlFlow<()> {
    match event {
        // Windows destroyed behind our back produce BadWindow on cleanup
        Event::Error(e) => {
            debug!(error = ?e, "X11 protocol error");
            ControlFlow::Continue(())
        }
        // Queued commands are drained at the top of the loop
        Event::ClientMessage(e) if e.type_ == ctx.atoms.wake => ControlFlow::Continue(()),
        _ => match events::translate(event, &ctx.escape_keycodes) {
            Some(window_event) => controller.handle_event(window_event),
            None => ControlFlow::Continue(()),
        },
    }
}
