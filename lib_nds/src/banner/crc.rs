use log::debug;
use serde::Serialize;

use super::format::{
    calc_banner_size, Banner, ANIM_TILE_DATA_OFFSET, CRC_OFFSET, CRC_SLOTS, TILE_DATA_OFFSET,
    VERSION_ANIMATED, VERSION_CHINESE, VERSION_KOREAN, VERSION_ORIGINAL,
};
use crate::checksum::crc16;

/// Oldest banner version that carries the given CRC slot.
pub fn min_version_for_slot(slot: usize) -> Option<u16> {
    match slot {
        0 => Some(VERSION_ORIGINAL),
        1 => Some(VERSION_CHINESE),
        2 => Some(VERSION_KOREAN),
        3 => Some(VERSION_ANIMATED),
        _ => None,
    }
}

fn slot_range(slot: usize) -> Option<(usize, usize)> {
    let min_version = min_version_for_slot(slot)?;
    let start = if slot == 3 {
        ANIM_TILE_DATA_OFFSET
    } else {
        TILE_DATA_OFFSET
    };
    Some((start, calc_banner_size(min_version)))
}

/// Reads the version field of a serialized banner.
pub fn read_version(bytes: &[u8]) -> Option<u16> {
    bytes
        .get(..2)
        .map(|field| u16::from_le_bytes([field[0], field[1]]))
}

/// Checksum for one slot of a serialized banner.
///
/// `bytes` may be shorter than the nominal record; the checksum then covers
/// only what is available, and is zero when the slot's range is not reached.
/// Slots newer than `version` are zero.
pub fn calc_banner_crc(bytes: &[u8], version: u16, slot: usize) -> u16 {
    let (Some(min_version), Some((start, end))) = (min_version_for_slot(slot), slot_range(slot))
    else {
        return 0;
    };
    if version < min_version || bytes.len() <= start {
        return 0;
    }
    crc16(&bytes[start..end.min(bytes.len())])
}

/// Recomputes and stores every CRC slot of a serialized banner in place.
pub fn insert_banner_crc(bytes: &mut [u8]) {
    let Some(version) = read_version(bytes) else {
        return;
    };
    for slot in 0..CRC_SLOTS {
        let crc = calc_banner_crc(bytes, version, slot);
        let offset = CRC_OFFSET + slot * 2;
        if let Some(field) = bytes.get_mut(offset..offset + 2) {
            field.copy_from_slice(&crc.to_le_bytes());
        }
        debug!("Banner CRC slot {}: 0x{:04X}", slot, crc);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrcStatus {
    Ok,
    Invalid,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotCheck {
    pub slot: usize,
    pub stored: u16,
    pub computed: u16,
    pub status: CrcStatus,
}

/// Validates every CRC slot of a serialized (possibly truncated) banner.
pub fn verify_banner_crc(bytes: &[u8]) -> Vec<SlotCheck> {
    let version = read_version(bytes).unwrap_or(0);
    (0..CRC_SLOTS)
        .map(|slot| {
            let offset = CRC_OFFSET + slot * 2;
            let stored = bytes
                .get(offset..offset + 2)
                .map(|field| u16::from_le_bytes([field[0], field[1]]))
                .unwrap_or(0);
            let computed = calc_banner_crc(bytes, version, slot);
            let applicable = min_version_for_slot(slot).is_some_and(|min| version >= min);
            let status = if !applicable {
                CrcStatus::NotApplicable
            } else if stored == computed {
                CrcStatus::Ok
            } else {
                CrcStatus::Invalid
            };
            SlotCheck {
                slot,
                stored,
                computed,
                status,
            }
        })
        .collect()
}

impl Banner {
    /// Stamps all CRC slots. Safe to call repeatedly.
    pub fn insert_crc(&mut self) {
        let bytes = self.to_bytes();
        for slot in 0..CRC_SLOTS {
            self.crc[slot] = calc_banner_crc(&bytes, self.version, slot);
        }
        debug!("Banner CRCs: {:04X?}", self.crc);
    }
}
