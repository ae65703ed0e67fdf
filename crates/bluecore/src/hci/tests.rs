//! Unit tests for the HCI codec, command engine, event router and layer

use super::acl_queue::AclQueue;
use super::constants::*;
use super::handler::{Alarm, Handler};
use super::layer::{on_hci_timeout, HciConfig, HciLayer, LayerState, ResponseSink};
use super::packet::*;
use crate::hal::{HalCallbacks, HciHal};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test HAL

#[derive(Default)]
struct TestHal {
    /// Interleaved record of sends and sink invocations, for ordering checks
    log: Arc<Mutex<Vec<String>>>,
    sent_commands: Mutex<Vec<Vec<u8>>>,
    sent_acl: Mutex<Vec<Vec<u8>>>,
    callbacks: Mutex<Option<Arc<dyn HalCallbacks>>>,
}

impl TestHal {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn sent_command_count(&self) -> usize {
        self.sent_commands.lock().unwrap().len()
    }

    fn sent_command_opcodes(&self) -> Vec<u16> {
        self.sent_commands
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| HciCommandView::parse(bytes).unwrap().opcode())
            .collect()
    }

    fn callbacks(&self) -> Arc<dyn HalCallbacks> {
        self.callbacks
            .lock()
            .unwrap()
            .clone()
            .expect("callbacks not registered")
    }
}

impl HciHal for TestHal {
    fn send_command(&self, packet: &[u8]) {
        self.sent_commands.lock().unwrap().push(packet.to_vec());
        let op_code = HciCommandView::parse(packet).unwrap().opcode();
        self.log.lock().unwrap().push(format!("send {op_code:#06x}"));
    }

    fn send_acl(&self, packet: &[u8]) {
        self.sent_acl.lock().unwrap().push(packet.to_vec());
    }

    fn send_sco(&self, _packet: &[u8]) {}

    fn register_callbacks(&self, callbacks: Arc<dyn HalCallbacks>) {
        *self.callbacks.lock().unwrap() = Some(callbacks);
    }

    fn unregister_callbacks(&self) {
        *self.callbacks.lock().unwrap() = None;
    }
}

// ---------------------------------------------------------------------------
// Fixtures and event builders

struct EngineFixture {
    hal: Arc<TestHal>,
    state: LayerState,
    _handler: Handler,
}

fn engine() -> EngineFixture {
    let handler = Handler::new();
    let alarm = Alarm::new(handler.clone());
    let hal = TestHal::new();
    let state = LayerState::new(
        Arc::clone(&hal) as Arc<dyn HciHal>,
        alarm,
        Duration::from_secs(2),
        AclQueue::new(3),
    );
    EngineFixture {
        hal,
        state,
        _handler: handler,
    }
}

fn command_complete(credits: u8, op_code: u16, status: u8) -> HciEvent {
    let mut parameters = vec![credits];
    parameters.extend_from_slice(&op_code.to_le_bytes());
    parameters.push(status);
    HciEvent {
        event_code: EVT_CMD_COMPLETE,
        parameter_total_length: parameters.len() as u8,
        parameters,
    }
}

fn command_status(status: u8, credits: u8, op_code: u16) -> HciEvent {
    let mut parameters = vec![status, credits];
    parameters.extend_from_slice(&op_code.to_le_bytes());
    HciEvent {
        event_code: EVT_CMD_STATUS,
        parameter_total_length: parameters.len() as u8,
        parameters,
    }
}

fn le_meta_event(subevent_code: u8, rest: &[u8]) -> HciEvent {
    let mut parameters = vec![subevent_code];
    parameters.extend_from_slice(rest);
    HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: parameters.len() as u8,
        parameters,
    }
}

fn complete_sink(log: &Arc<Mutex<Vec<String>>>) -> ResponseSink {
    let log = Arc::clone(log);
    ResponseSink::OnComplete(Box::new(move |complete| {
        log.lock()
            .unwrap()
            .push(format!("complete {:#06x}", complete.command_opcode()));
    }))
}

fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("condition not met within timeout");
}

// ---------------------------------------------------------------------------
// Codec

#[test]
fn test_hci_command_serialization() {
    // Test Reset command
    let command = HciCommand::Reset;
    let packet = command.encode();

    // Opcode: Reset (0x0C03)
    let op_code = u16::from_le_bytes([packet[0], packet[1]]);
    assert_eq!(op_code, 0x0C03); // OGF_HOST_CTL << 10 | OCF_RESET

    // Param length: 0
    assert_eq!(packet[2], 0);
    assert_eq!(packet.len(), 3);

    // Test LE Set Scan Parameters command
    let command = HciCommand::LeSetScanParameters {
        scan_type: 0x01,
        scan_interval: 0x0010,
        scan_window: 0x0010,
        own_address_type: 0x00,
        filter_policy: 0x00,
    };

    let packet = command.encode();

    // Opcode: LE Set Scan Parameters (0x200B)
    let op_code = u16::from_le_bytes([packet[0], packet[1]]);
    assert_eq!(op_code, 0x200B); // OGF_LE << 10 | OCF_LE_SET_SCAN_PARAMETERS

    // Param length: 7
    assert_eq!(packet[2], 7);

    // Parameters
    assert_eq!(packet[3], 0x01); // scan_type
    assert_eq!(u16::from_le_bytes([packet[4], packet[5]]), 0x0010); // scan_interval
    assert_eq!(u16::from_le_bytes([packet[6], packet[7]]), 0x0010); // scan_window
    assert_eq!(packet[8], 0x00); // own_address_type
    assert_eq!(packet[9], 0x00); // filter_policy

    // Test Disconnect command
    let command = HciCommand::Disconnect {
        handle: 0x0040,
        reason: 0x13,
    };

    let packet = command.encode();

    // Opcode: Disconnect (0x0406)
    let op_code = u16::from_le_bytes([packet[0], packet[1]]);
    assert_eq!(op_code, 0x0406); // OGF_LINK_CTL << 10 | OCF_DISCONNECT

    // Param length: 3
    assert_eq!(packet[2], 3);

    // Parameters
    assert_eq!(u16::from_le_bytes([packet[3], packet[4]]), 0x0040); // handle
    assert_eq!(packet[5], 0x13); // reason

    // Test Raw command
    let command = HciCommand::new(OGF_LE, OCF_LE_CREATE_CONNECTION, vec![0x01, 0x02, 0x03]);

    let packet = command.encode();

    // Opcode: LE Create Connection (0x200D)
    let op_code = u16::from_le_bytes([packet[0], packet[1]]);
    assert_eq!(op_code, 0x200D); // OGF_LE << 10 | OCF_LE_CREATE_CONNECTION

    // Param length: 3
    assert_eq!(packet[2], 3);

    // Parameters
    assert_eq!(&packet[3..], &[0x01, 0x02, 0x03]);
}

#[test]
fn test_command_view_round_trips_opcode() {
    let commands = [
        HciCommand::Reset,
        HciCommand::Inquiry,
        HciCommand::Disconnect { handle: 0x40, reason: 0x13 },
        HciCommand::SetEventMask { event_mask: 0x3FFF_FFFF_FFFF },
        HciCommand::LeSetScanEnable { enable: true, filter_duplicates: false },
        HciCommand::new(OGF_STATUS_PARAM, 0x0001, vec![0xAA]),
    ];

    for command in commands {
        let view = HciCommandView::parse(&command.encode()).unwrap();
        assert_eq!(view.opcode(), command.opcode());
    }

    // Truncated and length-mismatched frames are rejected
    assert!(HciCommandView::parse(&[0x03]).is_err());
    assert!(HciCommandView::parse(&[0x03, 0x0C, 5, 0x00]).is_err());
}

#[test]
fn test_hci_event_parsing() {
    // Create a simple Command Complete event
    let data = [
        EVT_CMD_COMPLETE, // Event code
        4,                // Parameter length
        1,                // Num_HCI_Command_Packets
        0x03,             // Command_Opcode (low byte)
        0x0C,             // Command_Opcode (high byte)
        0x00,             // Status
    ];

    let event = HciEvent::parse(&data).unwrap();

    assert_eq!(event.event_code, EVT_CMD_COMPLETE);
    assert_eq!(event.parameter_total_length, 4);
    assert_eq!(event.parameters, vec![1, 0x03, 0x0C, 0x00]);

    let complete = CommandCompleteView::parse(&event).unwrap();
    assert_eq!(complete.num_hci_command_packets(), 1);
    assert_eq!(complete.command_opcode(), 0x0C03);
    assert_eq!(complete.return_parameters(), &[0x00]);

    let reset_complete = ResetCompleteView::parse(&complete).unwrap();
    assert_eq!(reset_complete.status(), HCI_SUCCESS);

    // Invalid data tests
    assert!(HciEvent::parse(&[]).is_err()); // Empty data
    assert!(HciEvent::parse(&[EVT_CMD_COMPLETE, 10, 1, 2]).is_err()); // Too short for parameter length
}

#[test]
fn test_command_status_view_parsing() {
    let data = [
        EVT_CMD_STATUS, // Event code
        4,              // Parameter length
        0x00,           // Status
        1,              // Num_HCI_Command_Packets
        0x05,           // Command_Opcode (low byte)
        0x04,           // Command_Opcode (high byte)
    ];

    let event = HciEvent::parse(&data).unwrap();
    let status = CommandStatusView::parse(&event).unwrap();

    assert_eq!(status.status(), 0x00);
    assert_eq!(status.num_hci_command_packets(), 1);
    assert_eq!(status.command_opcode(), 0x0405); // Create Connection

    // A command complete event is not a command status
    let complete = command_complete(1, OPCODE_RESET, 0x00);
    assert!(CommandStatusView::parse(&complete).is_err());
}

#[test]
fn test_le_meta_event_view_parsing() {
    let event = le_meta_event(EVT_LE_CONN_COMPLETE, &[0x00, 0x40, 0x00]);
    let view = LeMetaEventView::parse(&event).unwrap();

    assert_eq!(view.subevent_code(), EVT_LE_CONN_COMPLETE);
    assert_eq!(view.parameters(), &[0x00, 0x40, 0x00]);

    // Missing subevent byte
    let empty = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: 0,
        parameters: vec![],
    };
    assert!(LeMetaEventView::parse(&empty).is_err());

    // ResetCompleteView refuses a foreign opcode
    let other = command_complete(1, 0x0405, 0x00);
    let other_view = CommandCompleteView::parse(&other).unwrap();
    assert!(ResetCompleteView::parse(&other_view).is_err());
}

#[test]
fn test_acl_packet_encoding() {
    let packet = AclPacket {
        handle: 0x0040,
        packet_boundary_flag: 0b10,
        broadcast_flag: 0b00,
        data: vec![0x01, 0x02, 0x03],
    };

    let bytes = packet.encode();

    // Handle 0x040 with PB flag 0b10 in bits 12..14
    assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 0x2040);
    // Data length
    assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 3);
    assert_eq!(&bytes[4..], &[0x01, 0x02, 0x03]);

    let parsed = AclPacket::parse(&bytes).unwrap();
    assert_eq!(parsed, packet);

    // Length field mismatching the payload is rejected
    assert!(AclPacket::parse(&[0x40, 0x20, 0x05, 0x00, 0x01]).is_err());
    assert!(AclPacket::parse(&[0x40, 0x20]).is_err());
}

// ---------------------------------------------------------------------------
// Command engine

#[test]
fn reset_happy_path_returns_to_idle() {
    let mut fixture = engine();
    let log = Arc::clone(&fixture.hal.log);

    fixture
        .state
        .handle_enqueue_command(HciCommand::Reset, complete_sink(&log));

    // The startup credit pays for exactly one send
    assert_eq!(fixture.hal.sent_command_opcodes(), vec![OPCODE_RESET]);
    assert_eq!(fixture.state.waiting_command(), Some(OPCODE_RESET));
    assert_eq!(fixture.state.command_credits(), 0);

    fixture
        .state
        .on_hci_event(command_complete(1, OPCODE_RESET, HCI_SUCCESS));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["send 0x0c03", "complete 0x0c03"]
    );
    assert_eq!(fixture.state.waiting_command(), None);
    assert_eq!(fixture.state.command_credits(), 1);
    assert_eq!(fixture.state.queue_len(), 0);
    assert_eq!(fixture.hal.sent_command_count(), 1);
}

#[test]
fn credit_only_status_leaves_pending_command_untouched() {
    let mut fixture = engine();
    let log = Arc::clone(&fixture.hal.log);

    fixture
        .state
        .handle_enqueue_command(HciCommand::Inquiry, complete_sink(&log));
    let inquiry = opcode(OGF_LINK_CTL, OCF_INQUIRY);
    assert_eq!(fixture.state.waiting_command(), Some(inquiry));

    fixture
        .state
        .on_hci_event(command_status(HCI_SUCCESS, 1, OPCODE_NONE));

    // Credits replenished, but the in-flight command still blocks the queue
    assert_eq!(fixture.state.waiting_command(), Some(inquiry));
    assert_eq!(fixture.state.command_credits(), 1);
    assert_eq!(fixture.state.queue_len(), 1);
    // No sink ran and no further send happened
    assert_eq!(*log.lock().unwrap(), vec!["send 0x0401"]);
    assert_eq!(fixture.hal.sent_command_count(), 1);
}

#[test]
fn status_response_pops_head_and_cancels_watchdog() {
    let mut fixture = engine();
    let (tx, rx) = mpsc::channel();

    let create_connection = opcode(OGF_LINK_CTL, OCF_CREATE_CONNECTION);
    fixture.state.handle_enqueue_command(
        HciCommand::CreateConnection {
            bd_addr: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
            packet_type: 0xCC18,
        },
        ResponseSink::OnStatus(Box::new(move |status| {
            tx.send((status.status(), status.command_opcode())).unwrap();
        })),
    );

    fixture
        .state
        .on_hci_event(command_status(HCI_SUCCESS, 1, create_connection));

    assert_eq!(rx.try_recv().unwrap(), (HCI_SUCCESS, create_connection));
    assert!(rx.try_recv().is_err()); // invoked exactly once
    assert_eq!(fixture.state.waiting_command(), None);
    assert_eq!(fixture.state.command_credits(), 1);
    assert_eq!(fixture.state.queue_len(), 0);
}

#[test]
#[should_panic(expected = "got command status")]
fn status_for_command_expecting_complete_is_fatal() {
    let mut fixture = engine();
    let log = Arc::clone(&fixture.hal.log);

    fixture
        .state
        .handle_enqueue_command(HciCommand::Inquiry, complete_sink(&log));
    fixture.state.on_hci_event(command_status(
        HCI_SUCCESS,
        1,
        opcode(OGF_LINK_CTL, OCF_INQUIRY),
    ));
}

#[test]
#[should_panic(expected = "got command complete")]
fn complete_for_command_expecting_status_is_fatal() {
    let mut fixture = engine();

    let inquiry = opcode(OGF_LINK_CTL, OCF_INQUIRY);
    fixture.state.handle_enqueue_command(
        HciCommand::Inquiry,
        ResponseSink::OnStatus(Box::new(|_| {})),
    );
    fixture
        .state
        .on_hci_event(command_complete(1, inquiry, HCI_SUCCESS));
}

#[test]
#[should_panic(expected = "Waiting for")]
fn response_with_unexpected_opcode_is_fatal() {
    let mut fixture = engine();
    let log = Arc::clone(&fixture.hal.log);

    fixture
        .state
        .handle_enqueue_command(HciCommand::Reset, complete_sink(&log));
    // Controller answers for a command that was never sent
    fixture.state.on_hci_event(command_complete(
        1,
        opcode(OGF_LINK_CTL, OCF_DISCONNECT),
        HCI_SUCCESS,
    ));
}

#[test]
fn queued_pair_sends_second_after_first_completes() {
    let mut fixture = engine();
    let log = Arc::clone(&fixture.hal.log);

    fixture
        .state
        .handle_enqueue_command(HciCommand::Reset, complete_sink(&log));
    fixture
        .state
        .handle_enqueue_command(HciCommand::Inquiry, complete_sink(&log));

    // Only the first is on the wire
    assert_eq!(fixture.hal.sent_command_opcodes(), vec![OPCODE_RESET]);

    fixture
        .state
        .on_hci_event(command_complete(1, OPCODE_RESET, HCI_SUCCESS));

    let inquiry = opcode(OGF_LINK_CTL, OCF_INQUIRY);
    assert_eq!(
        fixture.hal.sent_command_opcodes(),
        vec![OPCODE_RESET, inquiry]
    );
    assert_eq!(fixture.state.waiting_command(), Some(inquiry));
    assert_eq!(fixture.state.command_credits(), 0);

    // The first sink ran before the second send hit the wire
    assert_eq!(
        *fixture.hal.log.lock().unwrap(),
        vec!["send 0x0c03", "complete 0x0c03", "send 0x0401"]
    );
}

#[test]
#[should_panic(expected = "Timed out waiting for")]
fn timeout_aborts_naming_the_stalled_opcode() {
    // The alarm posts this exact path onto the handler at expiry
    on_hci_timeout(opcode(OGF_LINK_CTL, OCF_INQUIRY));
}

#[test]
fn commands_are_sent_one_at_a_time_in_fifo_order() {
    let mut fixture = engine();
    let log = Arc::clone(&fixture.hal.log);

    let commands = [
        HciCommand::Reset,
        HciCommand::Inquiry,
        HciCommand::SetEventMask { event_mask: 0xFF },
        HciCommand::LeSetScanEnable { enable: true, filter_duplicates: true },
    ];
    let expected: Vec<u16> = commands.iter().map(|command| command.opcode()).collect();

    for command in commands {
        fixture
            .state
            .handle_enqueue_command(command, complete_sink(&log));
        // Sends minus responses never exceeds one
        assert_eq!(fixture.hal.sent_command_count(), 1);
    }

    for (i, &op_code) in expected.iter().enumerate() {
        assert_eq!(fixture.hal.sent_command_opcodes()[i], op_code);
        fixture
            .state
            .on_hci_event(command_complete(1, op_code, HCI_SUCCESS));
        // The response releases at most the next send
        assert_eq!(fixture.hal.sent_command_count(), (i + 2).min(expected.len()));
    }

    // Sinks ran in enqueue order
    let completions: Vec<String> = fixture
        .hal
        .log
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.starts_with("complete"))
        .cloned()
        .collect();
    let expected_completions: Vec<String> = expected
        .iter()
        .map(|op_code| format!("complete {op_code:#06x}"))
        .collect();
    assert_eq!(completions, expected_completions);
}

#[test]
fn credits_follow_the_last_response_when_queue_is_empty() {
    let mut fixture = engine();
    let log = Arc::clone(&fixture.hal.log);

    fixture
        .state
        .handle_enqueue_command(HciCommand::Reset, complete_sink(&log));
    fixture
        .state
        .on_hci_event(command_complete(3, OPCODE_RESET, HCI_SUCCESS));

    // No pending command to consume the grant
    assert_eq!(fixture.state.command_credits(), 3);
    assert_eq!(fixture.state.waiting_command(), None);
}

// ---------------------------------------------------------------------------
// Event router

#[test]
fn registered_event_handler_receives_events() {
    let mut fixture = engine();
    let (tx, rx) = mpsc::channel();

    fixture.state.handle_register_event_handler(
        EVT_ROLE_CHANGE,
        Box::new(move |event| tx.send(event.parameters).unwrap()),
    );

    fixture.state.on_hci_event(HciEvent {
        event_code: EVT_ROLE_CHANGE,
        parameter_total_length: 2,
        parameters: vec![0x00, 0x01],
    });

    assert_eq!(rx.try_recv().unwrap(), vec![0x00, 0x01]);
}

#[test]
fn unregistered_event_is_dropped_without_fault() {
    let mut fixture = engine();

    fixture.state.on_hci_event(HciEvent {
        event_code: EVT_HARDWARE_ERROR,
        parameter_total_length: 1,
        parameters: vec![0x42],
    });

    // Nothing observable; the event is logged at debug and discarded
    assert_eq!(fixture.hal.sent_command_count(), 0);
}

#[test]
#[should_panic(expected = "Can not register a second handler")]
fn double_event_registration_is_fatal() {
    let mut fixture = engine();
    fixture
        .state
        .handle_register_event_handler(EVT_ROLE_CHANGE, Box::new(|_| {}));
    fixture
        .state
        .handle_register_event_handler(EVT_ROLE_CHANGE, Box::new(|_| {}));
}

#[test]
#[should_panic(expected = "Can not register a second handler")]
fn registering_a_dispatch_event_is_fatal() {
    let mut fixture = engine();
    fixture
        .state
        .handle_register_event_handler(EVT_CMD_COMPLETE, Box::new(|_| {}));
}

#[test]
#[should_panic(expected = "No handler registered")]
fn unregistering_a_missing_event_handler_is_fatal() {
    let mut fixture = engine();
    fixture.state.handle_unregister_event_handler(EVT_ROLE_CHANGE);
}

#[test]
fn unregistered_handler_can_be_registered_again() {
    let mut fixture = engine();
    fixture
        .state
        .handle_register_event_handler(EVT_ROLE_CHANGE, Box::new(|_| {}));
    fixture.state.handle_unregister_event_handler(EVT_ROLE_CHANGE);
    fixture
        .state
        .handle_register_event_handler(EVT_ROLE_CHANGE, Box::new(|_| {}));
}

#[test]
fn le_meta_event_routes_by_subevent_code() {
    let mut fixture = engine();
    let (tx, rx) = mpsc::channel();

    fixture.state.handle_register_le_event_handler(
        EVT_LE_ADVERTISING_REPORT,
        Box::new(move |view| tx.send(view.parameters().to_vec()).unwrap()),
    );

    fixture
        .state
        .on_hci_event(le_meta_event(EVT_LE_ADVERTISING_REPORT, &[0x01, 0xC3]));

    assert_eq!(rx.try_recv().unwrap(), vec![0x01, 0xC3]);
}

#[test]
#[should_panic(expected = "Unhandled LE subevent")]
fn unhandled_le_subevent_is_fatal() {
    let mut fixture = engine();
    fixture
        .state
        .on_hci_event(le_meta_event(EVT_LE_CONN_COMPLETE, &[0x00]));
}

#[test]
#[should_panic(expected = "Can not register a second handler")]
fn double_le_registration_is_fatal() {
    let mut fixture = engine();
    fixture
        .state
        .handle_register_le_event_handler(EVT_LE_CONN_COMPLETE, Box::new(|_| {}));
    fixture
        .state
        .handle_register_le_event_handler(EVT_LE_CONN_COMPLETE, Box::new(|_| {}));
}

#[test]
#[should_panic(expected = "No handler registered")]
fn unregistering_a_missing_le_handler_is_fatal() {
    let mut fixture = engine();
    fixture
        .state
        .handle_unregister_le_event_handler(EVT_LE_CONN_COMPLETE);
}

// ---------------------------------------------------------------------------
// Full layer over the test HAL

fn test_config() -> HciConfig {
    HciConfig {
        // Generous watchdog so a slow test runner cannot trip the fatal path
        hci_timeout: Duration::from_secs(60),
        acl_queue_depth: 3,
    }
}

fn complete_reset(hal: &Arc<TestHal>) {
    wait_for(|| hal.sent_command_count() == 1);
    assert_eq!(
        hal.sent_commands.lock().unwrap()[0],
        HciCommand::Reset.encode()
    );
    hal.callbacks()
        .event_received(vec![EVT_CMD_COMPLETE, 4, 1, 0x03, 0x0C, HCI_SUCCESS]);
}

#[test]
fn startup_sends_reset_and_resumes_credit_flow() {
    let hal = TestHal::new();
    let layer = HciLayer::start(Arc::clone(&hal) as Arc<dyn HciHal>, test_config());
    complete_reset(&hal);

    let (tx, rx) = mpsc::channel();
    let set_event_mask = opcode(OGF_HOST_CTL, OCF_SET_EVENT_MASK);
    layer.enqueue_command(
        HciCommand::SetEventMask { event_mask: 0x3FFF_FFFF_FFFF },
        move |complete| tx.send(complete.command_opcode()).unwrap(),
    );

    wait_for(|| hal.sent_command_count() == 2);
    let mut response = vec![EVT_CMD_COMPLETE, 4, 1];
    response.extend_from_slice(&set_event_mask.to_le_bytes());
    response.push(HCI_SUCCESS);
    hal.callbacks().event_received(response);

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        set_event_mask
    );
    layer.stop();
}

#[test]
fn le_scanning_facade_routes_subevents_and_commands() {
    let hal = TestHal::new();
    let layer = HciLayer::start(Arc::clone(&hal) as Arc<dyn HciHal>, test_config());
    complete_reset(&hal);

    let (report_tx, report_rx) = mpsc::channel();
    let scanning = layer.le_scanning_interface(move |view| {
        report_tx.send(view.subevent_code()).unwrap();
    });

    let (tx, rx) = mpsc::channel();
    let scan_enable = opcode(OGF_LE, OCF_LE_SET_SCAN_ENABLE);
    scanning.enqueue_command(
        HciCommand::LeSetScanEnable { enable: true, filter_duplicates: true },
        move |complete| tx.send(complete.command_opcode()).unwrap(),
    );

    wait_for(|| hal.sent_command_count() == 2);
    let mut response = vec![EVT_CMD_COMPLETE, 4, 1];
    response.extend_from_slice(&scan_enable.to_le_bytes());
    response.push(HCI_SUCCESS);
    hal.callbacks().event_received(response);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), scan_enable);

    // An advertising report lands in the facade's handler
    hal.callbacks().event_received(vec![
        EVT_LE_META_EVENT,         // Event code
        3,                         // Parameter length
        EVT_LE_ADVERTISING_REPORT, // Subevent code
        1,                         // Num_Reports
        0,                         // Event_Type
    ]);
    assert_eq!(
        report_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        EVT_LE_ADVERTISING_REPORT
    );

    layer.stop();
}

#[test]
fn acl_data_flows_both_ways_through_the_layer() {
    let hal = TestHal::new();
    let layer = HciLayer::start(Arc::clone(&hal) as Arc<dyn HciHal>, test_config());
    complete_reset(&hal);

    let up = layer.acl_queue_end();
    let outbound = AclPacket {
        handle: 0x0040,
        packet_boundary_flag: 0b10,
        broadcast_flag: 0b00,
        data: vec![0x01, 0x02, 0x03],
    };
    up.send(outbound.clone()).unwrap();

    wait_for(|| !hal.sent_acl.lock().unwrap().is_empty());
    assert_eq!(hal.sent_acl.lock().unwrap()[0], outbound.encode());

    let inbound = AclPacket {
        handle: 0x0041,
        packet_boundary_flag: 0b01,
        broadcast_flag: 0b00,
        data: vec![0xAA, 0xBB],
    };
    hal.callbacks().acl_received(inbound.encode());
    assert_eq!(up.receive().unwrap(), inbound);

    // SCO is accepted and silently discarded
    hal.callbacks().sco_received(vec![0x00, 0x01, 0x02]);

    layer.stop();

    // The upper end observes the teardown
    assert!(matches!(up.try_send(outbound), Err(crate::error::HciError::Stopped)));
}
