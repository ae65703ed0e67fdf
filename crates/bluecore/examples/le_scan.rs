//! Example: Scanning for BLE devices through the HCI layer
//!
//! This example acquires the LE scanning facade, which routes advertising
//! reports to the supplied handler, then enables scanning for ten seconds.
//!
//! Note: This example requires root privileges to run, as opening raw HCI
//! sockets requires elevated permissions.

use bluecore::{HciCommand, HciConfig, HciLayer, SocketHal};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Opening HCI socket for device 0...");
    let hal = SocketHal::open(0)?;

    println!("Starting the HCI layer...");
    let layer = HciLayer::start(hal as Arc<dyn bluecore::HciHal>, HciConfig::default());
    std::thread::sleep(Duration::from_secs(1));

    let scanning = layer.le_scanning_interface(|report| {
        println!(
            "LE subevent {:#04x}: {} parameter bytes",
            report.subevent_code(),
            report.parameters().len()
        );
    });

    println!("Setting up LE scan parameters...");
    scanning.enqueue_command(
        HciCommand::LeSetScanParameters {
            scan_type: 1,          // 0 = passive, 1 = active
            scan_interval: 0x0010, // 10ms in 0.625ms units (0x0010 * 0.625 = 10ms)
            scan_window: 0x0010,   // 10ms in 0.625ms units
            own_address_type: 0,   // Public Device Address
            filter_policy: 0,      // Accept all advertisements
        },
        |complete| println!("Scan parameters set, status {:?}", complete.return_parameters()),
    );

    println!("Enabling LE scanning...");
    scanning.enqueue_command(
        HciCommand::LeSetScanEnable { enable: true, filter_duplicates: true },
        |_| println!("LE scan enabled!"),
    );

    println!("Scanning for 10 seconds...");
    std::thread::sleep(Duration::from_secs(10));

    println!("Disabling LE scanning...");
    scanning.enqueue_command(
        HciCommand::LeSetScanEnable { enable: false, filter_duplicates: false },
        |_| println!("LE scan disabled!"),
    );
    std::thread::sleep(Duration::from_secs(1));

    println!("Scan complete!");
    layer.stop();
    Ok(())
}
