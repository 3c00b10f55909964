//! X11 RandR monitor enumeration and change notifications

use anyhow::{Context, Result, anyhow};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::Event;
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt};
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use super::{MonitorSource, TopologyNotifier, TopologySource, TopologySubscription};
use crate::common::constants::x11;
use crate::common::types::MonitorDescriptor;

/// Reads monitor geometry from the X server
///
/// Opens a short-lived connection per query, so it keeps working across X
/// server restarts and is trivially `Send + Sync`.
#[derive(Debug, Default, Clone, Copy)]
pub struct X11MonitorSource;

impl MonitorSource for X11MonitorSource {
    fn monitors(&self) -> Result<Vec<MonitorDescriptor>> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X11 for monitor query")?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;

        match randr_monitors(&conn, root) {
            Ok(monitors) if !monitors.is_empty() => Ok(monitors),
            Ok(_) => {
                debug!("RandR reported no monitors, using root window size");
                Ok(vec![root_monitor(screen)])
            }
            Err(e) => {
                warn!(error = %e, "RandR unavailable, using root window size");
                Ok(vec![root_monitor(screen)])
            }
        }
    }
}

fn root_monitor(screen: &x11rb::protocol::xproto::Screen) -> MonitorDescriptor {
    MonitorDescriptor::new(
        u32::from(screen.width_in_pixels),
        u32::from(screen.height_in_pixels),
        0,
        0,
    )
}

/// Active monitors via RandR 1.5 `GetMonitors`, or enabled CRTCs on 1.2-1.4
fn randr_monitors(conn: &RustConnection, root: Window) -> Result<Vec<MonitorDescriptor>> {
    let version = query_randr_version(conn)?;

    if (version.major_version, version.minor_version) >= (1, 5) {
        let reply = conn
            .randr_get_monitors(root, true)
            .context("Failed to request RandR monitors")?
            .reply()
            .context("Failed to get RandR monitors reply")?;
        return Ok(reply
            .monitors
            .iter()
            .map(|m| {
                MonitorDescriptor::new(
                    u32::from(m.width),
                    u32::from(m.height),
                    i32::from(m.x),
                    i32::from(m.y),
                )
            })
            .collect());
    }

    let resources = conn
        .randr_get_screen_resources_current(root)
        .context("Failed to request RandR screen resources")?
        .reply()
        .context("Failed to get RandR screen resources reply")?;

    let mut monitors = Vec::new();
    for crtc in resources.crtcs {
        let info = conn
            .randr_get_crtc_info(crtc, resources.config_timestamp)
            .context("Failed to request CRTC info")?
            .reply()
            .context("Failed to get CRTC info reply")?;
        // Mode 0 means the CRTC drives nothing
        if info.mode == 0 {
            continue;
        }
        monitors.push(MonitorDescriptor::new(
            u32::from(info.width),
            u32::from(info.height),
            i32::from(info.x),
            i32::from(info.y),
        ));
    }
    Ok(monitors)
}

fn query_randr_version(conn: &RustConnection) -> Result<randr::QueryVersionReply> {
    if conn
        .extension_information(randr::X11_EXTENSION_NAME)
        .context("Failed to query RandR extension")?
        .is_none()
    {
        return Err(anyhow!("X server does not support RandR"));
    }
    conn.randr_query_version(1, 5)
        .context("Failed to request RandR version")?
        .reply()
        .context("Failed to get RandR version reply")
}

/// Delivers RandR screen, CRTC and output change events as notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct X11TopologySource;

impl TopologySource for X11TopologySource {
    fn subscribe(&self, notifier: TopologyNotifier) -> Result<Box<dyn TopologySubscription>> {
        // Connect and select input here so setup failures reach the caller
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X11 for topology events")?;
        let root = conn.setup().roots[screen_num].root;

        query_randr_version(&conn)?;
        conn.randr_select_input(
            root,
            randr::NotifyMask::SCREEN_CHANGE
                | randr::NotifyMask::CRTC_CHANGE
                | randr::NotifyMask::OUTPUT_CHANGE,
        )
        .context("Failed to select RandR input")?;
        conn.flush().context("Failed to flush X11 connection")?;

        info!("Listening for RandR topology changes");

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("randr-listener".to_string())
            .spawn(move || {
                if let Err(e) = run_listener(&conn, &notifier, &thread_stop) {
                    error!(error = %e, "RandR listener stopped");
                }
            })
            .context("Failed to spawn RandR listener thread")?;

        Ok(Box::new(X11Subscription {
            stop,
            handle: Some(handle),
        }))
    }
}

struct X11Subscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TopologySubscription for X11Subscription {
    fn unsubscribe(mut self: Box<Self>) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("RandR listener thread panicked");
        }
        debug!("Stopped RandR listener");
    }
}

impl Drop for X11Subscription {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Block on the X11 fd and forward RandR events until `stop` is set
#[allow(unsafe_code)] // Required for libc::poll() system call
fn run_listener(
    conn: &RustConnection,
    notifier: &TopologyNotifier,
    stop: &AtomicBool,
) -> Result<()> {
    let x11_fd = conn.stream().as_raw_fd();

    while !stop.load(Ordering::SeqCst) {
        let mut poll_fds = [libc::pollfd {
            fd: x11_fd,
            events: libc::POLLIN,
            revents: 0,
        }];

        // SAFETY: `poll_fds` is a valid pointer to a stack-allocated array of `pollfd`.
        // The array length is 1, which matches the second argument.
        let poll_result =
            unsafe { libc::poll(poll_fds.as_mut_ptr(), 1, x11::LISTENER_POLL_TIMEOUT_MS) };

        if poll_result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(anyhow!("poll() failed: {}", err));
        }

        if poll_result == 0 || (poll_fds[0].revents & libc::POLLIN) == 0 {
            continue;
        }

        // Several events usually arrive together for one hotplug
        let mut changed = false;
        while let Some(event) = conn.poll_for_event()? {
            match event {
                Event::RandrScreenChangeNotify(e) => {
                    debug!(width = e.width, height = e.height, "RandR screen change");
                    changed = true;
                }
                Event::RandrNotify(_) => changed = true,
                _ => {}
            }
        }
        if changed && !stop.load(Ordering::SeqCst) {
            notifier.notify();
        }
    }

    Ok(())
}
