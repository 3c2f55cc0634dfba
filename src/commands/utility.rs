//! Utility command handlers.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;
use vial_transport::{DiscoveryEvent, PresenceMonitor};

use super::{setup_interrupt_handler, CommandResult, Context};

/// Print hot-plug events until Ctrl-C
pub fn watch(ctx: &Context) -> CommandResult {
    let monitor = Arc::new(PresenceMonitor::new(
        Arc::new(ctx.discovery()),
        ctx.config.presence_interval(),
    ));
    let mut rx = monitor.subscribe();
    let running = setup_interrupt_handler();
    let handle = monitor.spawn();

    println!("Watching for keyboards (Ctrl+C to stop)...");
    while running.load(Ordering::SeqCst) {
        match rx.try_recv() {
            Ok(DiscoveryEvent::DeviceAdded(dev)) => println!(
                "+ {:04X}:{:04X} {} {}",
                dev.info.vid,
                dev.info.pid,
                dev.info.product_name.as_deref().unwrap_or("?"),
                dev.info.device_path
            ),
            Ok(DiscoveryEvent::DeviceRemoved(info)) => println!(
                "- {:04X}:{:04X} {}",
                info.vid, info.pid, info.device_path
            ),
            Err(TryRecvError::Empty) | Err(TryRecvError::Lagged(_)) => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(TryRecvError::Closed) => break,
        }
    }

    monitor.stop();
    let _ = handle.join();
    Ok(())
}
