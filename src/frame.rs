use serde::{Deserialize, Serialize};

/// Maximum payload length of a classic CAN frame.
pub const MAX_FRAME_LEN: usize = 8;

/// Standard-ID status frame from the motor controller / inverter.
pub const MOTOR_STATUS_ID: u16 = 0x06;
/// Standard-ID power-unit flags frame. Its arrival doubles as the
/// powertrain activity beacon.
pub const POWER_FLAGS_ID: u16 = 0x07;

/// High 16 bits shared by every frame of the BMS broadcast family
/// (extended 29-bit identifiers).
pub const BMS_FAMILY_BASE: u32 = 0x99B5_0000;
pub const BMS_FAMILY_MASK: u32 = 0xFFFF_0000;

// BMS family sub-addresses (low 16 bits of the extended identifier).
pub const BMS_SUB_STATE: u16 = 0x0000;
pub const BMS_SUB_MODULE_TEMPS: u16 = 0x0002;
pub const BMS_SUB_DIAGNOSTICS: u16 = 0x0007;
pub const BMS_SUB_CELL_TEMPS: u16 = 0x0008;
pub const BMS_SUB_CHARGE_PARAMS: u16 = 0x0500;

/// Bus identifier of a single frame. The motor controller uses 11-bit
/// standard IDs, the BMS family uses 29-bit extended IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameId {
    Standard(u16),
    Extended(u32),
}

impl FrameId {
    /// Raw numeric value, used for monitor filtering and logging.
    pub fn raw(&self) -> u32 {
        match *self {
            FrameId::Standard(id) => u32::from(id),
            FrameId::Extended(id) => id,
        }
    }

    /// Whether this identifier is the powertrain activity beacon.
    pub fn is_beacon(&self) -> bool {
        matches!(*self, FrameId::Standard(POWER_FLAGS_ID))
    }

    /// Sub-address within the BMS broadcast family, if this identifier
    /// belongs to it.
    pub fn bms_sub_address(&self) -> Option<u16> {
        match *self {
            FrameId::Extended(id) if id & BMS_FAMILY_MASK == BMS_FAMILY_BASE => {
                Some((id & 0xFFFF) as u16)
            }
            _ => None,
        }
    }
}

/// One message received from the vehicle bus. Ephemeral: lives for a
/// single ingestion-loop iteration and is never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: FrameId,
    pub len: u8,
    pub data: [u8; MAX_FRAME_LEN],
}

impl Frame {
    /// Build a frame from a payload slice, truncating at 8 bytes.
    pub fn new(id: FrameId, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_FRAME_LEN);
        let mut data = [0u8; MAX_FRAME_LEN];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id,
            len: len as u8,
            data,
        }
    }

    /// Convenience constructor for a BMS family frame.
    pub fn bms(sub_address: u16, payload: &[u8]) -> Self {
        Self::new(
            FrameId::Extended(BMS_FAMILY_BASE | u32::from(sub_address)),
            payload,
        )
    }

    /// The valid portion of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }
}
