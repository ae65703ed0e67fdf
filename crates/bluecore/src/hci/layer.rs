//! The HCI layer core: command flow control, event routing, lifecycle
//!
//! All mutable state lives in [`LayerState`] and is only touched from tasks
//! posted to the layer's dispatcher handler. The command engine keeps at
//! most one command outstanding at any time and correlates each response
//! with the head of the pending queue; any disagreement with the controller
//! is treated as fatal.

use crate::hal::{HalCallbacks, HciHal};
use crate::hci::acl_queue::{AclQueue, AclQueueUpEnd, EnqueueBuffer};
use crate::hci::catalog;
use crate::hci::constants::*;
use crate::hci::facade::{
    AclConnectionInterface, LeAclConnectionInterface, LeAdvertisingInterface,
    LeScanningInterface, LeSecurityInterface, SecurityInterface,
};
use crate::hci::handler::{Alarm, Handler};
use crate::hci::packet::{
    AclPacket, CommandCompleteView, CommandStatusView, HciCommand, HciCommandView, HciEvent,
    LeMetaEventView, ResetCompleteView,
};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tunables of the HCI layer
#[derive(Debug, Clone)]
pub struct HciConfig {
    /// Watchdog duration for a command the controller has not answered
    pub hci_timeout: Duration,
    /// Depth bound of the bidirectional ACL queue, per direction
    pub acl_queue_depth: usize,
}

impl Default for HciConfig {
    fn default() -> Self {
        Self {
            hci_timeout: Duration::from_secs(2),
            acl_queue_depth: 3,
        }
    }
}

type EventHandler = Box<dyn FnMut(HciEvent) + Send>;
type LeEventHandler = Box<dyn FnMut(LeMetaEventView) + Send>;

/// One-shot response sink; the enum arm records which response form the
/// command expects
pub(crate) enum ResponseSink {
    OnComplete(Box<dyn FnOnce(CommandCompleteView) + Send>),
    OnStatus(Box<dyn FnOnce(CommandStatusView) + Send>),
}

struct CommandQueueEntry {
    command: HciCommand,
    sink: ResponseSink,
}

/// Fatal path taken when the command watchdog expires
pub(crate) fn on_hci_timeout(op_code: u16) {
    panic!(
        "Timed out waiting for {:#06x} ({})",
        op_code,
        opcode_text(op_code)
    );
}

fn is_dispatch_event(event_code: u8) -> bool {
    matches!(
        event_code,
        EVT_CMD_COMPLETE | EVT_CMD_STATUS | EVT_LE_META_EVENT
    )
}

/// Startup reset must succeed; anything else means the controller is unusable
fn fail_if_reset_complete_not_success(complete: CommandCompleteView) {
    let reset_complete = match ResetCompleteView::parse(&complete) {
        Ok(view) => view,
        Err(e) => panic!("Invalid reset complete event: {e}"),
    };
    assert!(
        reset_complete.status() == HCI_SUCCESS,
        "Reset failed with status {:#04x}",
        reset_complete.status()
    );
}

pub(crate) struct LayerState {
    hal: Arc<dyn HciHal>,
    command_queue: VecDeque<CommandQueueEntry>,
    command_credits: u8,
    waiting_command: Option<u16>,
    hci_timeout: Duration,
    hci_timeout_alarm: Alarm,
    event_handlers: HashMap<u8, EventHandler>,
    subevent_handlers: HashMap<u8, LeEventHandler>,
    acl_queue: AclQueue,
}

impl LayerState {
    pub(crate) fn new(
        hal: Arc<dyn HciHal>,
        hci_timeout_alarm: Alarm,
        hci_timeout: Duration,
        acl_queue: AclQueue,
    ) -> Self {
        Self {
            hal,
            command_queue: VecDeque::new(),
            command_credits: 1, // Send reset first
            waiting_command: None,
            hci_timeout,
            hci_timeout_alarm,
            event_handlers: HashMap::new(),
            subevent_handlers: HashMap::new(),
            acl_queue,
        }
    }

    pub(crate) fn handle_enqueue_command(&mut self, command: HciCommand, sink: ResponseSink) {
        self.command_queue.push_back(CommandQueueEntry { command, sink });
        self.send_next_command();
    }

    fn send_next_command(&mut self) {
        if self.command_credits == 0 {
            return;
        }
        if self.waiting_command.is_some() {
            return;
        }
        let Some(entry) = self.command_queue.front() else {
            return;
        };

        let bytes = entry.command.encode();
        self.hal.send_command(&bytes);

        // The opcode parsed back out of the wire bytes is the authoritative
        // one correlated against responses
        let command_view = match HciCommandView::parse(&bytes) {
            Ok(view) => view,
            Err(e) => panic!("Invalid serialized command: {e}"),
        };
        let op_code = command_view.opcode();

        self.waiting_command = Some(op_code);
        self.command_credits = 0; // Only allow one outstanding command
        self.hci_timeout_alarm
            .schedule(self.hci_timeout, Box::new(move || on_hci_timeout(op_code)));
    }

    pub(crate) fn on_command_status(&mut self, event: HciEvent) {
        let status_view = match CommandStatusView::parse(&event) {
            Ok(view) => view,
            Err(e) => panic!("Invalid command status event: {e}"),
        };
        self.command_credits = status_view.num_hci_command_packets();
        let op_code = status_view.command_opcode();

        if op_code == OPCODE_NONE {
            // Credit grant without a completed command
            self.send_next_command();
            return;
        }

        let Some(entry) = self.command_queue.pop_front() else {
            panic!(
                "Unexpected command status with opcode {:#06x} ({})",
                op_code,
                opcode_text(op_code)
            );
        };
        let waiting = self.waiting_command.unwrap_or(OPCODE_NONE);
        assert!(
            waiting == op_code,
            "Waiting for {:#06x} ({}), got {:#06x} ({})",
            waiting,
            opcode_text(waiting),
            op_code,
            opcode_text(op_code)
        );

        self.waiting_command = None;
        self.hci_timeout_alarm.cancel();

        match entry.sink {
            ResponseSink::OnStatus(on_status) => on_status(status_view),
            ResponseSink::OnComplete(_) => panic!(
                "Waiting for command complete for {:#06x} ({}), got command status",
                op_code,
                opcode_text(op_code)
            ),
        }

        self.send_next_command();
    }

    pub(crate) fn on_command_complete(&mut self, event: HciEvent) {
        let complete_view = match CommandCompleteView::parse(&event) {
            Ok(view) => view,
            Err(e) => panic!("Invalid command complete event: {e}"),
        };
        self.command_credits = complete_view.num_hci_command_packets();
        let op_code = complete_view.command_opcode();

        if op_code == OPCODE_NONE {
            // Credit grant without a completed command
            self.send_next_command();
            return;
        }

        let Some(entry) = self.command_queue.pop_front() else {
            panic!(
                "Unexpected command complete with opcode {:#06x} ({})",
                op_code,
                opcode_text(op_code)
            );
        };
        let waiting = self.waiting_command.unwrap_or(OPCODE_NONE);
        assert!(
            waiting == op_code,
            "Waiting for {:#06x} ({}), got {:#06x} ({})",
            waiting,
            opcode_text(waiting),
            op_code,
            opcode_text(op_code)
        );

        self.waiting_command = None;
        self.hci_timeout_alarm.cancel();

        match entry.sink {
            ResponseSink::OnComplete(on_complete) => on_complete(complete_view),
            ResponseSink::OnStatus(_) => panic!(
                "Waiting for command status for {:#06x} ({}), got command complete",
                op_code,
                opcode_text(op_code)
            ),
        }

        self.send_next_command();
    }

    pub(crate) fn on_le_meta_event(&mut self, event: HciEvent) {
        let meta_event_view = match LeMetaEventView::parse(&event) {
            Ok(view) => view,
            Err(e) => panic!("Invalid LE meta event: {e}"),
        };
        let subevent_code = meta_event_view.subevent_code();

        // LE subevents only occur in response to features the host enabled,
        // so a missing handler is a programming error, not controller noise
        let Some(handler) = self.subevent_handlers.get_mut(&subevent_code) else {
            panic!(
                "Unhandled LE subevent {:#04x} ({})",
                subevent_code,
                subevent_code_text(subevent_code)
            );
        };
        handler(meta_event_view);
    }

    pub(crate) fn on_hci_event(&mut self, event: HciEvent) {
        match event.event_code {
            EVT_CMD_COMPLETE => self.on_command_complete(event),
            EVT_CMD_STATUS => self.on_command_status(event),
            EVT_LE_META_EVENT => self.on_le_meta_event(event),
            event_code => match self.event_handlers.get_mut(&event_code) {
                Some(handler) => handler(event),
                None => debug!(
                    "Dropping unregistered event of type {:#04x} ({})",
                    event_code,
                    event_code_text(event_code)
                ),
            },
        }
    }

    pub(crate) fn handle_register_event_handler(&mut self, event_code: u8, handler: EventHandler) {
        assert!(
            !is_dispatch_event(event_code),
            "Can not register a second handler for event_code {:#04x} ({})",
            event_code,
            event_code_text(event_code)
        );
        let previous = self.event_handlers.insert(event_code, handler);
        assert!(
            previous.is_none(),
            "Can not register a second handler for event_code {:#04x} ({})",
            event_code,
            event_code_text(event_code)
        );
    }

    pub(crate) fn handle_unregister_event_handler(&mut self, event_code: u8) {
        let removed = self.event_handlers.remove(&event_code);
        assert!(
            removed.is_some(),
            "No handler registered for event_code {:#04x} ({})",
            event_code,
            event_code_text(event_code)
        );
    }

    pub(crate) fn handle_register_le_event_handler(
        &mut self,
        subevent_code: u8,
        handler: LeEventHandler,
    ) {
        let previous = self.subevent_handlers.insert(subevent_code, handler);
        assert!(
            previous.is_none(),
            "Can not register a second handler for subevent_code {:#04x} ({})",
            subevent_code,
            subevent_code_text(subevent_code)
        );
    }

    pub(crate) fn handle_unregister_le_event_handler(&mut self, subevent_code: u8) {
        let removed = self.subevent_handlers.remove(&subevent_code);
        assert!(
            removed.is_some(),
            "No handler registered for subevent_code {:#04x} ({})",
            subevent_code,
            subevent_code_text(subevent_code)
        );
    }

    pub(crate) fn on_outbound_acl_ready(&mut self) {
        if let Some(packet) = self.acl_queue.dequeue_outbound() {
            self.hal.send_acl(&packet.encode());
        }
    }

    fn teardown(&mut self) {
        self.command_queue.clear();
        self.hci_timeout_alarm.cancel();
        self.event_handlers.clear();
        self.subevent_handlers.clear();
    }

    #[cfg(test)]
    pub(crate) fn command_credits(&self) -> u8 {
        self.command_credits
    }

    #[cfg(test)]
    pub(crate) fn waiting_command(&self) -> Option<u16> {
        self.waiting_command
    }

    #[cfg(test)]
    pub(crate) fn queue_len(&self) -> usize {
        self.command_queue.len()
    }
}

/// Shared handle used by the layer and its facades to submit commands
#[derive(Clone)]
pub(crate) struct CommandSender {
    state: Arc<Mutex<LayerState>>,
    handler: Handler,
}

impl CommandSender {
    pub(crate) fn enqueue_command(
        &self,
        command: HciCommand,
        on_complete: impl FnOnce(CommandCompleteView) + Send + 'static,
    ) {
        let state = Arc::clone(&self.state);
        self.handler.post(move || {
            state
                .lock()
                .unwrap()
                .handle_enqueue_command(command, ResponseSink::OnComplete(Box::new(on_complete)));
        });
    }

    pub(crate) fn enqueue_command_with_status(
        &self,
        command: HciCommand,
        on_status: impl FnOnce(CommandStatusView) + Send + 'static,
    ) {
        let state = Arc::clone(&self.state);
        self.handler.post(move || {
            state
                .lock()
                .unwrap()
                .handle_enqueue_command(command, ResponseSink::OnStatus(Box::new(on_status)));
        });
    }
}

// All callbacks here run on the HAL thread; work is posted to the layer
// handler before any state is touched
struct HalCallbackBridge {
    state: Arc<Mutex<LayerState>>,
    handler: Handler,
    enqueue_buffer: Arc<EnqueueBuffer>,
}

impl HalCallbacks for HalCallbackBridge {
    fn event_received(&self, packet: Vec<u8>) {
        let state = Arc::clone(&self.state);
        self.handler.post(move || {
            let event = match HciEvent::parse(&packet) {
                Ok(event) => event,
                Err(e) => panic!("Invalid event packet from controller: {e}"),
            };
            state.lock().unwrap().on_hci_event(event);
        });
    }

    fn acl_received(&self, packet: Vec<u8>) {
        match AclPacket::parse(&packet) {
            Ok(acl) => self.enqueue_buffer.enqueue(acl),
            Err(e) => self
                .handler
                .post(move || panic!("Invalid ACL packet from controller: {e}")),
        }
    }

    fn sco_received(&self, _packet: Vec<u8>) {
        // SCO is not implemented; dropped
    }
}

/// The HCI layer
///
/// Create with [`HciLayer::start`]; all operations are posted onto the
/// layer's dispatcher and return without blocking.
pub struct HciLayer {
    state: Arc<Mutex<LayerState>>,
    handler: Handler,
    hal: Arc<dyn HciHal>,
    acl_queue: AclQueue,
    enqueue_buffer: Arc<EnqueueBuffer>,
}

impl HciLayer {
    /// Bring the layer up over the given HAL
    ///
    /// Registers the dispatch and nuisance-event handlers, arms the ACL
    /// outbound drain, enqueues the initial HCI Reset, and subscribes to the
    /// HAL.
    pub fn start(hal: Arc<dyn HciHal>, config: HciConfig) -> HciLayer {
        let handler = Handler::new();
        let alarm = Alarm::new(handler.clone());
        let acl_queue = AclQueue::new(config.acl_queue_depth);
        let state = Arc::new(Mutex::new(LayerState::new(
            Arc::clone(&hal),
            alarm,
            config.hci_timeout,
            acl_queue.clone(),
        )));

        {
            let state = Arc::clone(&state);
            let drain_handler = handler.clone();
            acl_queue.register_outbound_drain(Arc::new(move || {
                let state = Arc::clone(&state);
                drain_handler.post(move || state.lock().unwrap().on_outbound_acl_ready());
            }));
        }

        let enqueue_buffer = EnqueueBuffer::new(acl_queue.clone(), handler.clone());

        let layer = HciLayer {
            state,
            handler,
            hal: Arc::clone(&hal),
            acl_queue,
            enqueue_buffer: Arc::clone(&enqueue_buffer),
        };

        // Nuisance events some controllers emit without being asked
        layer.register_event_handler(EVT_PAGE_SCAN_REPETITION_MODE_CHANGE, drop_event);
        layer.register_event_handler(EVT_MAX_SLOTS_CHANGE, drop_event);
        layer.register_event_handler(EVT_VENDOR_SPECIFIC, drop_event);

        layer.enqueue_command(HciCommand::Reset, fail_if_reset_complete_not_success);

        hal.register_callbacks(Arc::new(HalCallbackBridge {
            state: Arc::clone(&layer.state),
            handler: layer.handler.clone(),
            enqueue_buffer,
        }));

        layer
    }

    /// Tear the layer down
    ///
    /// Unsubscribes from the HAL, stops the ACL drain, drains the dispatcher
    /// and clears the engine. Pending response sinks are not invoked.
    pub fn stop(self) {
        self.hal.unregister_callbacks();
        self.acl_queue.unregister_outbound_drain();
        self.acl_queue.close();
        self.enqueue_buffer.clear();
        self.handler.stop();
        self.state.lock().unwrap().teardown();
    }

    fn command_sender(&self) -> CommandSender {
        CommandSender {
            state: Arc::clone(&self.state),
            handler: self.handler.clone(),
        }
    }

    /// Queue a command expecting a Command Complete response
    pub fn enqueue_command(
        &self,
        command: HciCommand,
        on_complete: impl FnOnce(CommandCompleteView) + Send + 'static,
    ) {
        self.command_sender().enqueue_command(command, on_complete);
    }

    /// Queue a command expecting a Command Status response
    pub fn enqueue_command_with_status(
        &self,
        command: HciCommand,
        on_status: impl FnOnce(CommandStatusView) + Send + 'static,
    ) {
        self.command_sender()
            .enqueue_command_with_status(command, on_status);
    }

    /// Register a handler for an event code. Registering a second handler
    /// for the same code is fatal.
    pub fn register_event_handler(
        &self,
        event_code: u8,
        handler: impl FnMut(HciEvent) + Send + 'static,
    ) {
        let state = Arc::clone(&self.state);
        self.handler.post(move || {
            state
                .lock()
                .unwrap()
                .handle_register_event_handler(event_code, Box::new(handler));
        });
    }

    /// Unregister the handler for an event code. Unregistering a code with
    /// no handler is fatal.
    pub fn unregister_event_handler(&self, event_code: u8) {
        let state = Arc::clone(&self.state);
        self.handler.post(move || {
            state
                .lock()
                .unwrap()
                .handle_unregister_event_handler(event_code);
        });
    }

    /// Register a handler for an LE subevent code
    pub fn register_le_event_handler(
        &self,
        subevent_code: u8,
        handler: impl FnMut(LeMetaEventView) + Send + 'static,
    ) {
        let state = Arc::clone(&self.state);
        self.handler.post(move || {
            state
                .lock()
                .unwrap()
                .handle_register_le_event_handler(subevent_code, Box::new(handler));
        });
    }

    /// Unregister the handler for an LE subevent code
    pub fn unregister_le_event_handler(&self, subevent_code: u8) {
        let state = Arc::clone(&self.state);
        self.handler.post(move || {
            state
                .lock()
                .unwrap()
                .handle_unregister_le_event_handler(subevent_code);
        });
    }

    /// Upper end of the bidirectional ACL queue
    pub fn acl_queue_end(&self) -> AclQueueUpEnd {
        self.acl_queue.up_end()
    }

    /// ACL connection facade; registers the handler for connection
    /// management events
    pub fn acl_connection_interface(
        &self,
        event_handler: impl FnMut(HciEvent) + Send + 'static,
    ) -> AclConnectionInterface {
        self.register_event_handler_set(catalog::ACL_CONNECTION_EVENTS, event_handler);
        AclConnectionInterface::new(self.command_sender())
    }

    /// LE ACL connection facade; registers the handler for LE connection
    /// management subevents
    pub fn le_acl_connection_interface(
        &self,
        event_handler: impl FnMut(LeMetaEventView) + Send + 'static,
    ) -> LeAclConnectionInterface {
        self.register_le_event_handler_set(catalog::LE_CONNECTION_MANAGEMENT_EVENTS, event_handler);
        LeAclConnectionInterface::new(self.command_sender())
    }

    /// Classic security facade
    pub fn security_interface(
        &self,
        event_handler: impl FnMut(HciEvent) + Send + 'static,
    ) -> SecurityInterface {
        self.register_event_handler_set(catalog::SECURITY_EVENTS, event_handler);
        SecurityInterface::new(self.command_sender())
    }

    /// LE security facade
    pub fn le_security_interface(
        &self,
        event_handler: impl FnMut(LeMetaEventView) + Send + 'static,
    ) -> LeSecurityInterface {
        self.register_le_event_handler_set(catalog::LE_SECURITY_EVENTS, event_handler);
        LeSecurityInterface::new(self.command_sender())
    }

    /// LE advertising facade
    pub fn le_advertising_interface(
        &self,
        event_handler: impl FnMut(LeMetaEventView) + Send + 'static,
    ) -> LeAdvertisingInterface {
        self.register_le_event_handler_set(catalog::LE_ADVERTISING_EVENTS, event_handler);
        LeAdvertisingInterface::new(self.command_sender())
    }

    /// LE scanning facade
    pub fn le_scanning_interface(
        &self,
        event_handler: impl FnMut(LeMetaEventView) + Send + 'static,
    ) -> LeScanningInterface {
        self.register_le_event_handler_set(catalog::LE_SCANNING_EVENTS, event_handler);
        LeScanningInterface::new(self.command_sender())
    }

    fn register_event_handler_set(
        &self,
        event_codes: &[u8],
        event_handler: impl FnMut(HciEvent) + Send + 'static,
    ) {
        let shared = Arc::new(Mutex::new(event_handler));
        for &event_code in event_codes {
            let shared = Arc::clone(&shared);
            self.register_event_handler(event_code, move |event| {
                let mut handler = shared.lock().unwrap();
                (*handler)(event)
            });
        }
    }

    fn register_le_event_handler_set(
        &self,
        subevent_codes: &[u8],
        event_handler: impl FnMut(LeMetaEventView) + Send + 'static,
    ) {
        let shared = Arc::new(Mutex::new(event_handler));
        for &subevent_code in subevent_codes {
            let shared = Arc::clone(&shared);
            self.register_le_event_handler(subevent_code, move |event| {
                let mut handler = shared.lock().unwrap();
                (*handler)(event)
            });
        }
    }
}

fn drop_event(_event: HciEvent) {}
