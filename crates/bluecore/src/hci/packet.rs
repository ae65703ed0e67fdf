//! HCI packet structures, builders and typed views
//!
//! This module contains the command builder and the typed views the layer
//! reads from inbound byte frames. Frames at the HAL boundary carry no H4
//! packet-type indicator; transport framing belongs to the HAL.

use crate::error::HciError;
use crate::hci::constants::*;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Common HCI Commands
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum HciCommand {
    // Link Control Commands (OGF: 0x01)
    Inquiry,
    InquiryCancel,
    CreateConnection { bd_addr: [u8; 6], packet_type: u16 },
    Disconnect { handle: u16, reason: u8 },

    // Link Policy Commands (OGF: 0x02)
    SniffMode { handle: u16, max_interval: u16, min_interval: u16 },
    ExitSniffMode { handle: u16 },

    // Host Controller Commands (OGF: 0x03)
    Reset,
    SetEventMask { event_mask: u64 },

    // LE Commands (OGF: 0x08)
    LeSetScanParameters {
        scan_type: u8,
        scan_interval: u16,
        scan_window: u16,
        own_address_type: u8,
        filter_policy: u8,
    },
    LeSetScanEnable { enable: bool, filter_duplicates: bool },
    LeSetAdvertisingEnable { enable: bool },
    LeCreateConnection {
        peer_addr: [u8; 6],
        peer_addr_type: u8,
    },
    LeCreateConnectionCancel,

    /// Escape hatch for commands without a named variant
    Raw { ogf: u8, ocf: u16, parameters: Vec<u8> },
}

impl HciCommand {
    /// Create a raw command from an OGF/OCF pair and parameter bytes
    pub fn new(ogf: u8, ocf: u16, parameters: Vec<u8>) -> Self {
        Self::Raw { ogf, ocf, parameters }
    }

    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            // Link Control Commands
            Self::Inquiry => (OGF_LINK_CTL, OCF_INQUIRY),
            Self::InquiryCancel => (OGF_LINK_CTL, OCF_INQUIRY_CANCEL),
            Self::CreateConnection { .. } => (OGF_LINK_CTL, OCF_CREATE_CONNECTION),
            Self::Disconnect { .. } => (OGF_LINK_CTL, OCF_DISCONNECT),

            // Link Policy Commands
            Self::SniffMode { .. } => (OGF_LINK_POLICY, OCF_SNIFF_MODE),
            Self::ExitSniffMode { .. } => (OGF_LINK_POLICY, OCF_EXIT_SNIFF_MODE),

            // Host Controller Commands
            Self::Reset => (OGF_HOST_CTL, OCF_RESET),
            Self::SetEventMask { .. } => (OGF_HOST_CTL, OCF_SET_EVENT_MASK),

            // LE Commands
            Self::LeSetScanParameters { .. } => (OGF_LE, OCF_LE_SET_SCAN_PARAMETERS),
            Self::LeSetScanEnable { .. } => (OGF_LE, OCF_LE_SET_SCAN_ENABLE),
            Self::LeSetAdvertisingEnable { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE),
            Self::LeCreateConnection { .. } => (OGF_LE, OCF_LE_CREATE_CONNECTION),
            Self::LeCreateConnectionCancel => (OGF_LE, OCF_LE_CREATE_CONNECTION_CANCEL),

            Self::Raw { ogf, ocf, .. } => (*ogf, *ocf),
        }
    }

    /// The 16-bit opcode of this command
    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        opcode(ogf, ocf)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::Inquiry | Self::InquiryCancel | Self::Reset | Self::LeCreateConnectionCancel => {
                vec![]
            }

            Self::CreateConnection { bd_addr, packet_type } => {
                let mut params = Vec::with_capacity(8);
                params.extend_from_slice(bd_addr);
                params.extend_from_slice(&packet_type.to_le_bytes());
                params
            }

            Self::Disconnect { handle, reason } => {
                let mut params = Vec::with_capacity(3);
                params.extend_from_slice(&handle.to_le_bytes());
                params.push(*reason);
                params
            }

            Self::SniffMode { handle, max_interval, min_interval } => {
                let mut params = Vec::with_capacity(6);
                params.extend_from_slice(&handle.to_le_bytes());
                params.extend_from_slice(&max_interval.to_le_bytes());
                params.extend_from_slice(&min_interval.to_le_bytes());
                params
            }

            Self::ExitSniffMode { handle } => handle.to_le_bytes().to_vec(),

            Self::SetEventMask { event_mask } => event_mask.to_le_bytes().to_vec(),

            Self::LeSetScanParameters {
                scan_type,
                scan_interval,
                scan_window,
                own_address_type,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(7);
                params.push(*scan_type);
                params.extend_from_slice(&scan_interval.to_le_bytes());
                params.extend_from_slice(&scan_window.to_le_bytes());
                params.push(*own_address_type);
                params.push(*filter_policy);
                params
            }

            Self::LeSetScanEnable { enable, filter_duplicates } => {
                vec![*enable as u8, *filter_duplicates as u8]
            }

            Self::LeSetAdvertisingEnable { enable } => vec![*enable as u8],

            Self::LeCreateConnection { peer_addr, peer_addr_type } => {
                let mut params = Vec::with_capacity(7);
                params.extend_from_slice(peer_addr);
                params.push(*peer_addr_type);
                params
            }

            Self::Raw { parameters, .. } => parameters.clone(),
        }
    }

    /// Serialize the command to a byte frame: opcode (LE), parameter length,
    /// parameters
    pub fn encode(&self) -> Vec<u8> {
        let params = self.parameters();
        let mut packet = Vec::with_capacity(3 + params.len());
        packet.write_u16::<LittleEndian>(self.opcode()).unwrap();
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// Parsed view over a serialized command frame
///
/// The engine re-parses the bytes it hands to the HAL; the opcode recovered
/// here is the authoritative one correlated against responses.
#[derive(Debug, Clone)]
pub struct HciCommandView {
    opcode: u16,
    parameters: Vec<u8>,
}

impl HciCommandView {
    /// Parse a command frame produced by [`HciCommand::encode`]
    pub fn parse(data: &[u8]) -> Result<Self, HciError> {
        if data.len() < 3 {
            return Err(HciError::InvalidPacketFormat);
        }

        let mut cursor = Cursor::new(data);
        let opcode = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| HciError::InvalidPacketFormat)?;
        let param_len = data[2] as usize;

        if data.len() != 3 + param_len {
            return Err(HciError::InvalidPacketFormat);
        }

        Ok(Self {
            opcode,
            parameters: data[3..].to_vec(),
        })
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }
}

/// HCI Event packet
#[derive(Debug, Clone)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self, HciError> {
        if data.len() < 2 {
            return Err(HciError::InvalidPacketFormat);
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return Err(HciError::InvalidPacketFormat);
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Ok(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }
}

/// View over a Command Complete event
///
/// Parameters: Num_HCI_Command_Packets (1), Command_Opcode (2), return
/// parameters for the completed command.
#[derive(Debug, Clone)]
pub struct CommandCompleteView {
    num_hci_command_packets: u8,
    command_opcode: u16,
    return_parameters: Vec<u8>,
}

impl CommandCompleteView {
    pub fn parse(event: &HciEvent) -> Result<Self, HciError> {
        if event.event_code != EVT_CMD_COMPLETE {
            return Err(HciError::UnexpectedEventCode(event.event_code));
        }
        if event.parameters.len() < 3 {
            return Err(HciError::InvalidPacketFormat);
        }

        let mut cursor = Cursor::new(&event.parameters[..]);
        let num_hci_command_packets = cursor.read_u8().map_err(|_| HciError::InvalidPacketFormat)?;
        let command_opcode = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| HciError::InvalidPacketFormat)?;

        Ok(Self {
            num_hci_command_packets,
            command_opcode,
            return_parameters: event.parameters[3..].to_vec(),
        })
    }

    /// Command credits granted by the controller
    pub fn num_hci_command_packets(&self) -> u8 {
        self.num_hci_command_packets
    }

    pub fn command_opcode(&self) -> u16 {
        self.command_opcode
    }

    pub fn return_parameters(&self) -> &[u8] {
        &self.return_parameters
    }
}

/// View over a Command Status event
///
/// Parameters: Status (1), Num_HCI_Command_Packets (1), Command_Opcode (2).
#[derive(Debug, Clone)]
pub struct CommandStatusView {
    status: u8,
    num_hci_command_packets: u8,
    command_opcode: u16,
}

impl CommandStatusView {
    pub fn parse(event: &HciEvent) -> Result<Self, HciError> {
        if event.event_code != EVT_CMD_STATUS {
            return Err(HciError::UnexpectedEventCode(event.event_code));
        }
        if event.parameters.len() < 4 {
            return Err(HciError::InvalidPacketFormat);
        }

        let mut cursor = Cursor::new(&event.parameters[..]);
        let status = cursor.read_u8().map_err(|_| HciError::InvalidPacketFormat)?;
        let num_hci_command_packets = cursor.read_u8().map_err(|_| HciError::InvalidPacketFormat)?;
        let command_opcode = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| HciError::InvalidPacketFormat)?;

        Ok(Self {
            status,
            num_hci_command_packets,
            command_opcode,
        })
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    /// Command credits granted by the controller
    pub fn num_hci_command_packets(&self) -> u8 {
        self.num_hci_command_packets
    }

    pub fn command_opcode(&self) -> u16 {
        self.command_opcode
    }
}

/// Second-stage view over an LE Meta Event
///
/// The first parameter byte selects the subevent; the rest belongs to the
/// subevent-specific layout.
#[derive(Debug, Clone)]
pub struct LeMetaEventView {
    subevent_code: u8,
    parameters: Vec<u8>,
}

impl LeMetaEventView {
    pub fn parse(event: &HciEvent) -> Result<Self, HciError> {
        if event.event_code != EVT_LE_META_EVENT {
            return Err(HciError::UnexpectedEventCode(event.event_code));
        }
        if event.parameters.is_empty() {
            return Err(HciError::InvalidPacketFormat);
        }

        Ok(Self {
            subevent_code: event.parameters[0],
            parameters: event.parameters[1..].to_vec(),
        })
    }

    pub fn subevent_code(&self) -> u8 {
        self.subevent_code
    }

    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }
}

/// View over the completion of the HCI Reset command
#[derive(Debug, Clone)]
pub struct ResetCompleteView {
    status: u8,
}

impl ResetCompleteView {
    pub fn parse(complete: &CommandCompleteView) -> Result<Self, HciError> {
        if complete.command_opcode() != OPCODE_RESET {
            return Err(HciError::UnexpectedOpcode(complete.command_opcode()));
        }
        let status = *complete
            .return_parameters()
            .first()
            .ok_or(HciError::InvalidPacketFormat)?;
        Ok(Self { status })
    }

    pub fn status(&self) -> u8 {
        self.status
    }
}

/// ACL data packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclPacket {
    /// Connection handle (12 bits)
    pub handle: u16,
    /// Packet Boundary flag (2 bits)
    pub packet_boundary_flag: u8,
    /// Broadcast flag (2 bits)
    pub broadcast_flag: u8,
    /// Payload handed to or received from the link layer
    pub data: Vec<u8>,
}

impl AclPacket {
    /// Serialize to a byte frame: handle+flags (LE), data length (LE), data
    pub fn encode(&self) -> Vec<u8> {
        let handle_and_flags = (self.handle & 0x0FFF)
            | ((self.packet_boundary_flag as u16 & 0x3) << 12)
            | ((self.broadcast_flag as u16 & 0x3) << 14);

        let mut packet = Vec::with_capacity(4 + self.data.len());
        packet.write_u16::<LittleEndian>(handle_and_flags).unwrap();
        packet.write_u16::<LittleEndian>(self.data.len() as u16).unwrap();
        packet.extend_from_slice(&self.data);
        packet
    }

    /// Parse an ACL data frame
    pub fn parse(data: &[u8]) -> Result<Self, HciError> {
        if data.len() < 4 {
            return Err(HciError::InvalidPacketFormat);
        }

        let mut cursor = Cursor::new(data);
        let handle_and_flags = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| HciError::InvalidPacketFormat)?;
        let length = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| HciError::InvalidPacketFormat)?;

        if data.len() != 4 + length as usize {
            return Err(HciError::InvalidPacketFormat);
        }

        Ok(Self {
            handle: handle_and_flags & 0x0FFF,
            packet_boundary_flag: ((handle_and_flags >> 12) & 0x3) as u8,
            broadcast_flag: ((handle_and_flags >> 14) & 0x3) as u8,
            data: data[4..].to_vec(),
        })
    }
}
