//! System tray entry (StatusNotifierItem over D-Bus via ksni)

use anyhow::{Context, Result, anyhow};
use ksni::TrayMethods;
use ksni::menu::StandardItem;
use std::io::Cursor;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::constants::tray;
use crate::controller::Command;
use crate::engine::EngineHandle;

struct ShieldTray {
    engine: EngineHandle,
    icon: Option<ksni::Icon>,
}

impl ksni::Tray for ShieldTray {
    fn id(&self) -> String {
        tray::ID.to_string()
    }

    fn title(&self) -> String {
        tray::TITLE.to_string()
    }

    fn icon_name(&self) -> String {
        // Themed fallback when the embedded pixmap failed to decode
        "security-medium".to_string()
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        self.icon.iter().cloned().collect()
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            title: tray::TOOLTIP.to_string(),
            ..Default::default()
        }
    }

    fn activate(&mut self, _x: i32, _y: i32) {
        info!("Tray activated, showing controller");
        self.engine.send(Command::ShowPanel);
    }

    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        vec![
            StandardItem {
                label: "Show controller".into(),
                activate: Box::new(|this: &mut Self| this.engine.send(Command::ShowPanel)),
                ..Default::default()
            }
            .into(),
            ksni::MenuItem::Separator,
            StandardItem {
                label: "Quit".into(),
                activate: Box::new(|this: &mut Self| {
                    info!("Quit requested from tray menu");
                    this.engine.send(Command::Quit);
                }),
                ..Default::default()
            }
            .into(),
        ]
    }
}

/// Keeps the tray thread alive; dropping it removes the tray entry
pub struct TrayHandle {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for TrayHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Tray thread panicked");
        }
    }
}

/// Register the tray entry on its own thread with a single-threaded runtime
pub fn spawn(engine: EngineHandle) -> Result<TrayHandle> {
    let icon = load_tray_icon()
        .inspect_err(|e| warn!(error = ?e, "Failed to load tray icon, using themed icon"))
        .ok();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let thread = thread::Builder::new()
        .name("tray".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = ?e, "Failed to build tray runtime");
                    return;
                }
            };
            runtime.block_on(async move {
                let tray = ShieldTray { engine, icon };
                match tray.spawn().await {
                    Ok(handle) => {
                        info!("Tray icon registered");
                        let _ = shutdown_rx.await;
                        handle.shutdown().await;
                        info!("Tray icon removed");
                    }
                    Err(e) => error!(error = ?e, "Failed to register tray icon, use the control panel instead"),
                }
            });
        })
        .context("Failed to spawn tray thread")?;

    Ok(TrayHandle { shutdown: Some(shutdown_tx), thread: Some(thread) })
}

fn load_tray_icon() -> Result<ksni::Icon> {
    let icon_bytes = include_bytes!("../../assets/tray-icon.png");
    let decoder = png::Decoder::new(Cursor::new(icon_bytes));
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size().context("Tray icon too large to decode")?];
    let info = reader.next_frame(&mut buf)?;
    let pixels = &buf[..info.buffer_size()];

    let data = match info.color_type {
        png::ColorType::Rgba => rgba_to_argb(pixels),
        png::ColorType::Rgb => rgba_to_argb(
            &pixels.chunks_exact(3).flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 0xFF]).collect::<Vec<_>>(),
        ),
        other => {
            return Err(anyhow!(
                "Unsupported tray icon color type {:?} (expected RGB or RGBA)",
                other
            ));
        }
    };

    Ok(ksni::Icon {
        width: info.width as i32,
        height: info.height as i32,
        data,
    })
}

/// StatusNotifierItem pixmaps are ARGB32 in network byte order
fn rgba_to_argb(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|px| [px[3], px[0], px[1], px[2]])
        .collect()
}
