//! Raw HCI socket HAL for Linux
//!
//! This module provides a [`HciHal`] implementation over the kernel's raw
//! HCI socket interface, allowing for communication with Bluetooth
//! controllers without an intermediate daemon.

use crate::error::HciError;
use crate::hal::{HalCallbacks, HciHal};
use crate::hci::constants::{HCI_ACL_PKT, HCI_COMMAND_PKT, HCI_EVENT_PKT, HCI_SCO_PKT};
use log::{error, warn};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

// Bluetooth socket constants
const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;
const HCI_CHANNEL_RAW: i32 = 0;

// One poll() period; bounds how long unregister waits for the reader
const READER_POLL_TIMEOUT_MS: i32 = 500;

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

/// HAL over a raw Linux HCI socket, with H4 framing on the wire
pub struct SocketHal {
    fd: RawFd,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SocketHal {
    /// Opens a raw HCI socket bound to the given device
    ///
    /// # Arguments
    ///
    /// * `dev_id` - The device ID to open (0 for the first device)
    pub fn open(dev_id: u16) -> Result<Arc<Self>, HciError> {
        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW, BTPROTO_HCI) };

        if fd < 0 {
            return Err(HciError::SocketError(std::io::Error::last_os_error()));
        }

        // Bind to the specified device
        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW as u16,
        };

        let result = unsafe {
            libc::bind(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            unsafe { libc::close(fd) };
            return Err(HciError::BindError(std::io::Error::last_os_error()));
        }

        Ok(Arc::new(SocketHal {
            fd,
            running: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        }))
    }

    /// Gets the raw file descriptor for the socket
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    fn write_packet(&self, indicator: u8, packet: &[u8]) {
        let mut framed = Vec::with_capacity(1 + packet.len());
        framed.push(indicator);
        framed.extend_from_slice(packet);

        let written = unsafe {
            libc::write(
                self.fd,
                framed.as_ptr() as *const libc::c_void,
                framed.len(),
            )
        };
        if written < 0 {
            error!(
                "failed to write HCI packet (type {:#04x}): {}",
                indicator,
                std::io::Error::last_os_error()
            );
        }
    }

    fn read_loop(fd: RawFd, running: Arc<AtomicBool>, callbacks: Arc<dyn HalCallbacks>) {
        let mut buf = [0u8; 1024];
        while running.load(Ordering::SeqCst) {
            let mut pollfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let ready = unsafe { libc::poll(&mut pollfd, 1, READER_POLL_TIMEOUT_MS) };
            if ready < 0 {
                error!(
                    "HCI socket poll failed: {}",
                    std::io::Error::last_os_error()
                );
                return;
            }
            if ready == 0 {
                continue;
            }

            let count =
                unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if count < 0 {
                if running.load(Ordering::SeqCst) {
                    error!(
                        "HCI socket read failed: {}",
                        std::io::Error::last_os_error()
                    );
                }
                return;
            }
            if count < 2 {
                continue;
            }

            let packet = buf[1..count as usize].to_vec();
            match buf[0] {
                HCI_EVENT_PKT => callbacks.event_received(packet),
                HCI_ACL_PKT => callbacks.acl_received(packet),
                HCI_SCO_PKT => callbacks.sco_received(packet),
                indicator => warn!("dropping packet with unknown H4 type {indicator:#04x}"),
            }
        }
    }
}

impl HciHal for SocketHal {
    fn send_command(&self, packet: &[u8]) {
        self.write_packet(HCI_COMMAND_PKT, packet);
    }

    fn send_acl(&self, packet: &[u8]) {
        self.write_packet(HCI_ACL_PKT, packet);
    }

    fn send_sco(&self, packet: &[u8]) {
        self.write_packet(HCI_SCO_PKT, packet);
    }

    fn register_callbacks(&self, callbacks: Arc<dyn HalCallbacks>) {
        let mut reader = self.reader.lock().unwrap();
        self.running.store(true, Ordering::SeqCst);

        let fd = self.fd;
        let running = Arc::clone(&self.running);
        *reader = Some(thread::spawn(move || {
            SocketHal::read_loop(fd, running, callbacks);
        }));
    }

    fn unregister_callbacks(&self) {
        let mut reader = self.reader.lock().unwrap();
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = reader.take() {
            let _ = thread.join();
        }
    }
}

impl AsRawFd for SocketHal {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for SocketHal {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        unsafe {
            libc::close(self.fd);
        }
    }
}
