//! Event tables backing facade acquisition
//!
//! Requesting a facade registers the caller's handler against one of these
//! fixed sets of event codes or LE subevent codes.

use crate::hci::constants::*;

/// Events routed to the ACL connection facade
pub const ACL_CONNECTION_EVENTS: &[u8] = &[
    EVT_CONN_COMPLETE,
    EVT_CONN_REQUEST,
    EVT_DISCONN_COMPLETE,
    EVT_CONN_PACKET_TYPE_CHANGED,
    EVT_AUTH_COMPLETE,
    EVT_READ_CLOCK_OFFSET_COMPLETE,
    EVT_MODE_CHANGE,
    EVT_QOS_SETUP_COMPLETE,
    EVT_ROLE_CHANGE,
    EVT_FLOW_SPECIFICATION_COMPLETE,
    EVT_FLUSH_OCCURRED,
    EVT_READ_REMOTE_FEATURES_COMPLETE,
    EVT_READ_REMOTE_EXT_FEATURES_COMPLETE,
    EVT_READ_REMOTE_VERSION_COMPLETE,
];

/// LE subevents routed to the LE ACL connection facade
pub const LE_CONNECTION_MANAGEMENT_EVENTS: &[u8] = &[
    EVT_LE_CONN_COMPLETE,
    EVT_LE_CONN_UPDATE_COMPLETE,
    EVT_LE_READ_REMOTE_FEATURES_COMPLETE,
    EVT_LE_REMOTE_CONN_PARAM_REQUEST,
    EVT_LE_DATA_LENGTH_CHANGE,
    EVT_LE_PHY_UPDATE_COMPLETE,
    EVT_LE_ENHANCED_CONN_COMPLETE,
];

/// Events routed to the classic security facade
pub const SECURITY_EVENTS: &[u8] = &[
    EVT_ENCRYPTION_CHANGE,
    EVT_CHANGE_CONN_LINK_KEY_COMPLETE,
    EVT_ENCRYPTION_KEY_REFRESH_COMPLETE,
    EVT_IO_CAPABILITY_REQUEST,
    EVT_IO_CAPABILITY_RESPONSE,
    EVT_USER_CONFIRMATION_REQUEST,
    EVT_USER_PASSKEY_REQUEST,
    EVT_REMOTE_OOB_DATA_REQUEST,
    EVT_SIMPLE_PAIRING_COMPLETE,
    EVT_USER_PASSKEY_NOTIFICATION,
    EVT_KEYPRESS_NOTIFICATION,
    EVT_PIN_CODE_REQUEST,
    EVT_LINK_KEY_REQUEST,
    EVT_LINK_KEY_NOTIFICATION,
    EVT_RETURN_LINK_KEYS,
];

/// LE subevents routed to the LE security facade
pub const LE_SECURITY_EVENTS: &[u8] = &[
    EVT_LE_LONG_TERM_KEY_REQUEST,
    EVT_LE_READ_LOCAL_P256_PUBLIC_KEY_COMPLETE,
    EVT_LE_GENERATE_DHKEY_COMPLETE,
];

/// LE subevents routed to the LE advertising facade
pub const LE_ADVERTISING_EVENTS: &[u8] = &[
    EVT_LE_SCAN_REQUEST_RECEIVED,
    EVT_LE_ADVERTISING_SET_TERMINATED,
];

/// LE subevents routed to the LE scanning facade
pub const LE_SCANNING_EVENTS: &[u8] = &[
    EVT_LE_ADVERTISING_REPORT,
    EVT_LE_DIRECTED_ADVERTISING_REPORT,
    EVT_LE_EXTENDED_ADVERTISING_REPORT,
    EVT_LE_PERIODIC_ADVERTISING_SYNC_ESTABLISHED,
    EVT_LE_PERIODIC_ADVERTISING_REPORT,
    EVT_LE_PERIODIC_ADVERTISING_SYNC_LOST,
    EVT_LE_SCAN_TIMEOUT,
];
