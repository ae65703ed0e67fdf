//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol.

// HCI packet type indicators (H4 transport framing)
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_SCO_PKT: u8 = 0x03;
pub const HCI_EVENT_PKT: u8 = 0x04;
pub const HCI_ISO_PKT: u8 = 0x05;

// Maximum size of HCI command parameters
pub const HCI_MAX_PARAM_LEN: usize = 255;

/// Sentinel opcode carried by credit-only command status/complete events
pub const OPCODE_NONE: u16 = 0x0000;

/// Build a 16-bit opcode from an OGF/OCF pair
pub const fn opcode(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x03FF)
}

// Common OGF (Opcode Group Field) values
pub const OGF_LINK_CTL: u8 = 0x01;
pub const OGF_LINK_POLICY: u8 = 0x02;
pub const OGF_HOST_CTL: u8 = 0x03;
pub const OGF_INFO_PARAM: u8 = 0x04;
pub const OGF_STATUS_PARAM: u8 = 0x05;
pub const OGF_LE: u8 = 0x08;

// Link Control Commands (OGF: 0x01)
pub const OCF_INQUIRY: u16 = 0x0001;
pub const OCF_INQUIRY_CANCEL: u16 = 0x0002;
pub const OCF_CREATE_CONNECTION: u16 = 0x0005;
pub const OCF_DISCONNECT: u16 = 0x0006;

// Link Policy Commands (OGF: 0x02)
pub const OCF_SNIFF_MODE: u16 = 0x0003;
pub const OCF_EXIT_SNIFF_MODE: u16 = 0x0004;

// Host Controller Commands (OGF: 0x03)
pub const OCF_SET_EVENT_MASK: u16 = 0x0001;
pub const OCF_RESET: u16 = 0x0003;

// LE Command OCF values (OGF: 0x08)
pub const OCF_LE_SET_EVENT_MASK: u16 = 0x0001;
pub const OCF_LE_READ_BUFFER_SIZE: u16 = 0x0002;
pub const OCF_LE_SET_RANDOM_ADDRESS: u16 = 0x0005;
pub const OCF_LE_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;
pub const OCF_LE_SET_ADVERTISING_DATA: u16 = 0x0008;
pub const OCF_LE_SET_ADVERTISING_ENABLE: u16 = 0x000A;
pub const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
pub const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;
pub const OCF_LE_CREATE_CONNECTION: u16 = 0x000D;
pub const OCF_LE_CREATE_CONNECTION_CANCEL: u16 = 0x000E;

/// Opcode of the HCI Reset command sent at startup
pub const OPCODE_RESET: u16 = opcode(OGF_HOST_CTL, OCF_RESET);

// HCI Events
pub const EVT_INQUIRY_COMPLETE: u8 = 0x01;
pub const EVT_INQUIRY_RESULT: u8 = 0x02;
pub const EVT_CONN_COMPLETE: u8 = 0x03;
pub const EVT_CONN_REQUEST: u8 = 0x04;
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
pub const EVT_AUTH_COMPLETE: u8 = 0x06;
pub const EVT_REMOTE_NAME_REQ_COMPLETE: u8 = 0x07;
pub const EVT_ENCRYPTION_CHANGE: u8 = 0x08;
pub const EVT_CHANGE_CONN_LINK_KEY_COMPLETE: u8 = 0x09;
pub const EVT_READ_REMOTE_FEATURES_COMPLETE: u8 = 0x0B;
pub const EVT_READ_REMOTE_VERSION_COMPLETE: u8 = 0x0C;
pub const EVT_QOS_SETUP_COMPLETE: u8 = 0x0D;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;
pub const EVT_HARDWARE_ERROR: u8 = 0x10;
pub const EVT_FLUSH_OCCURRED: u8 = 0x11;
pub const EVT_ROLE_CHANGE: u8 = 0x12;
pub const EVT_NUM_COMPLETED_PACKETS: u8 = 0x13;
pub const EVT_MODE_CHANGE: u8 = 0x14;
pub const EVT_RETURN_LINK_KEYS: u8 = 0x15;
pub const EVT_PIN_CODE_REQUEST: u8 = 0x16;
pub const EVT_LINK_KEY_REQUEST: u8 = 0x17;
pub const EVT_LINK_KEY_NOTIFICATION: u8 = 0x18;
pub const EVT_MAX_SLOTS_CHANGE: u8 = 0x1B;
pub const EVT_READ_CLOCK_OFFSET_COMPLETE: u8 = 0x1C;
pub const EVT_CONN_PACKET_TYPE_CHANGED: u8 = 0x1D;
pub const EVT_PAGE_SCAN_REPETITION_MODE_CHANGE: u8 = 0x20;
pub const EVT_FLOW_SPECIFICATION_COMPLETE: u8 = 0x21;
pub const EVT_READ_REMOTE_EXT_FEATURES_COMPLETE: u8 = 0x23;
pub const EVT_ENCRYPTION_KEY_REFRESH_COMPLETE: u8 = 0x30;
pub const EVT_IO_CAPABILITY_REQUEST: u8 = 0x31;
pub const EVT_IO_CAPABILITY_RESPONSE: u8 = 0x32;
pub const EVT_USER_CONFIRMATION_REQUEST: u8 = 0x33;
pub const EVT_USER_PASSKEY_REQUEST: u8 = 0x34;
pub const EVT_REMOTE_OOB_DATA_REQUEST: u8 = 0x35;
pub const EVT_SIMPLE_PAIRING_COMPLETE: u8 = 0x36;
pub const EVT_USER_PASSKEY_NOTIFICATION: u8 = 0x3B;
pub const EVT_KEYPRESS_NOTIFICATION: u8 = 0x3C;
pub const EVT_LE_META_EVENT: u8 = 0x3E;
pub const EVT_VENDOR_SPECIFIC: u8 = 0xFF;

// LE Meta Event subevent codes
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;
pub const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;
pub const EVT_LE_CONN_UPDATE_COMPLETE: u8 = 0x03;
pub const EVT_LE_READ_REMOTE_FEATURES_COMPLETE: u8 = 0x04;
pub const EVT_LE_LONG_TERM_KEY_REQUEST: u8 = 0x05;
pub const EVT_LE_REMOTE_CONN_PARAM_REQUEST: u8 = 0x06;
pub const EVT_LE_DATA_LENGTH_CHANGE: u8 = 0x07;
pub const EVT_LE_READ_LOCAL_P256_PUBLIC_KEY_COMPLETE: u8 = 0x08;
pub const EVT_LE_GENERATE_DHKEY_COMPLETE: u8 = 0x09;
pub const EVT_LE_ENHANCED_CONN_COMPLETE: u8 = 0x0A;
pub const EVT_LE_DIRECTED_ADVERTISING_REPORT: u8 = 0x0B;
pub const EVT_LE_PHY_UPDATE_COMPLETE: u8 = 0x0C;
pub const EVT_LE_EXTENDED_ADVERTISING_REPORT: u8 = 0x0D;
pub const EVT_LE_PERIODIC_ADVERTISING_SYNC_ESTABLISHED: u8 = 0x0E;
pub const EVT_LE_PERIODIC_ADVERTISING_REPORT: u8 = 0x0F;
pub const EVT_LE_PERIODIC_ADVERTISING_SYNC_LOST: u8 = 0x10;
pub const EVT_LE_SCAN_TIMEOUT: u8 = 0x11;
pub const EVT_LE_ADVERTISING_SET_TERMINATED: u8 = 0x12;
pub const EVT_LE_SCAN_REQUEST_RECEIVED: u8 = 0x13;

// HCI status codes
pub const HCI_SUCCESS: u8 = 0x00;

/// Human-readable name of a command opcode, for log and panic messages
pub fn opcode_text(op: u16) -> &'static str {
    match op {
        OPCODE_NONE => "None",
        op if op == opcode(OGF_LINK_CTL, OCF_INQUIRY) => "Inquiry",
        op if op == opcode(OGF_LINK_CTL, OCF_INQUIRY_CANCEL) => "Inquiry Cancel",
        op if op == opcode(OGF_LINK_CTL, OCF_CREATE_CONNECTION) => "Create Connection",
        op if op == opcode(OGF_LINK_CTL, OCF_DISCONNECT) => "Disconnect",
        op if op == opcode(OGF_LINK_POLICY, OCF_SNIFF_MODE) => "Sniff Mode",
        op if op == opcode(OGF_LINK_POLICY, OCF_EXIT_SNIFF_MODE) => "Exit Sniff Mode",
        op if op == opcode(OGF_HOST_CTL, OCF_SET_EVENT_MASK) => "Set Event Mask",
        OPCODE_RESET => "Reset",
        op if op == opcode(OGF_LE, OCF_LE_SET_EVENT_MASK) => "LE Set Event Mask",
        op if op == opcode(OGF_LE, OCF_LE_READ_BUFFER_SIZE) => "LE Read Buffer Size",
        op if op == opcode(OGF_LE, OCF_LE_SET_RANDOM_ADDRESS) => "LE Set Random Address",
        op if op == opcode(OGF_LE, OCF_LE_SET_ADVERTISING_PARAMETERS) => {
            "LE Set Advertising Parameters"
        }
        op if op == opcode(OGF_LE, OCF_LE_SET_ADVERTISING_DATA) => "LE Set Advertising Data",
        op if op == opcode(OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE) => "LE Set Advertising Enable",
        op if op == opcode(OGF_LE, OCF_LE_SET_SCAN_PARAMETERS) => "LE Set Scan Parameters",
        op if op == opcode(OGF_LE, OCF_LE_SET_SCAN_ENABLE) => "LE Set Scan Enable",
        op if op == opcode(OGF_LE, OCF_LE_CREATE_CONNECTION) => "LE Create Connection",
        op if op == opcode(OGF_LE, OCF_LE_CREATE_CONNECTION_CANCEL) => {
            "LE Create Connection Cancel"
        }
        _ => "Unknown",
    }
}

/// Human-readable name of an event code
pub fn event_code_text(code: u8) -> &'static str {
    match code {
        EVT_INQUIRY_COMPLETE => "Inquiry Complete",
        EVT_INQUIRY_RESULT => "Inquiry Result",
        EVT_CONN_COMPLETE => "Connection Complete",
        EVT_CONN_REQUEST => "Connection Request",
        EVT_DISCONN_COMPLETE => "Disconnection Complete",
        EVT_AUTH_COMPLETE => "Authentication Complete",
        EVT_ENCRYPTION_CHANGE => "Encryption Change",
        EVT_CMD_COMPLETE => "Command Complete",
        EVT_CMD_STATUS => "Command Status",
        EVT_HARDWARE_ERROR => "Hardware Error",
        EVT_ROLE_CHANGE => "Role Change",
        EVT_NUM_COMPLETED_PACKETS => "Number Of Completed Packets",
        EVT_MODE_CHANGE => "Mode Change",
        EVT_MAX_SLOTS_CHANGE => "Max Slots Change",
        EVT_PAGE_SCAN_REPETITION_MODE_CHANGE => "Page Scan Repetition Mode Change",
        EVT_LE_META_EVENT => "LE Meta Event",
        EVT_VENDOR_SPECIFIC => "Vendor Specific",
        _ => "Unknown",
    }
}

/// Human-readable name of an LE subevent code
pub fn subevent_code_text(code: u8) -> &'static str {
    match code {
        EVT_LE_CONN_COMPLETE => "LE Connection Complete",
        EVT_LE_ADVERTISING_REPORT => "LE Advertising Report",
        EVT_LE_CONN_UPDATE_COMPLETE => "LE Connection Update Complete",
        EVT_LE_READ_REMOTE_FEATURES_COMPLETE => "LE Read Remote Features Complete",
        EVT_LE_LONG_TERM_KEY_REQUEST => "LE Long Term Key Request",
        EVT_LE_REMOTE_CONN_PARAM_REQUEST => "LE Remote Connection Parameter Request",
        EVT_LE_DATA_LENGTH_CHANGE => "LE Data Length Change",
        EVT_LE_ENHANCED_CONN_COMPLETE => "LE Enhanced Connection Complete",
        EVT_LE_DIRECTED_ADVERTISING_REPORT => "LE Directed Advertising Report",
        EVT_LE_PHY_UPDATE_COMPLETE => "LE PHY Update Complete",
        EVT_LE_EXTENDED_ADVERTISING_REPORT => "LE Extended Advertising Report",
        EVT_LE_SCAN_TIMEOUT => "LE Scan Timeout",
        EVT_LE_ADVERTISING_SET_TERMINATED => "LE Advertising Set Terminated",
        EVT_LE_SCAN_REQUEST_RECEIVED => "LE Scan Request Received",
        _ => "Unknown",
    }
}
