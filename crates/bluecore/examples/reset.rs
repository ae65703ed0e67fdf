//! Example: Bringing the HCI layer up
//!
//! This example demonstrates how to start the HCI layer over a raw socket
//! HAL. Starting the layer resets the controller and leaves the command
//! engine idle, ready for further commands.
//!
//! Note: This example requires root privileges to run, as opening raw HCI
//! sockets requires elevated permissions.

use bluecore::{HciConfig, HciLayer, SocketHal};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Opening HCI socket for device 0...");
    let hal = SocketHal::open(0)?;

    println!("Starting the HCI layer (controller will be reset)...");
    let layer = HciLayer::start(hal as Arc<dyn bluecore::HciHal>, HciConfig::default());

    // Give the controller a moment to answer the reset
    std::thread::sleep(Duration::from_secs(1));

    println!("Reading the controller's buffer sizes...");
    layer.enqueue_command(
        bluecore::HciCommand::new(0x04, 0x0005, vec![]), // Read Buffer Size
        |complete| {
            println!(
                "Read Buffer Size returned {} parameter bytes",
                complete.return_parameters().len()
            );
        },
    );

    std::thread::sleep(Duration::from_secs(1));

    println!("Stopping the HCI layer...");
    layer.stop();
    Ok(())
}
