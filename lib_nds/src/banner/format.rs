use crate::constants::{
    ANIMATION_SEQUENCE_LENGTH, ICON_BITMAP_BYTES, MAX_ANIMATION_BITMAPS, MAX_TITLE_COUNT,
    PALETTE_ENTRIES, TITLE_LENGTH,
};

pub const VERSION_ORIGINAL: u16 = 0x0001;
pub const VERSION_CHINESE: u16 = 0x0002;
pub const VERSION_KOREAN: u16 = 0x0003;
pub const VERSION_ANIMATED: u16 = 0x0103;

pub const CRC_SLOTS: usize = 4;
pub const RESERVED_BYTES: usize = 22;

pub const VERSION_OFFSET: usize = 0x000;
pub const CRC_OFFSET: usize = 0x002;
pub const RESERVED_OFFSET: usize = 0x00A;
pub const TILE_DATA_OFFSET: usize = 0x020;
pub const PALETTE_OFFSET: usize = 0x220;
pub const TITLE_OFFSET: usize = 0x240;
pub const ANIM_TILE_DATA_OFFSET: usize = 0x1240;
pub const ANIM_PALETTE_OFFSET: usize = 0x2240;
pub const ANIM_SEQUENCE_OFFSET: usize = 0x2340;

/// Size of the largest banner revision.
pub const MAX_BANNER_SIZE: usize = 0x23C0;

pub type TileData = [u8; ICON_BITMAP_BYTES];
pub type BannerPalette = [u16; PALETTE_ENTRIES];
pub type TitleRow = [u16; TITLE_LENGTH];

/// Serialized size of a banner; unknown versions use the original layout.
pub fn calc_banner_size(version: u16) -> usize {
    match version {
        VERSION_CHINESE => 0x940,
        VERSION_KOREAN => 0xA40,
        VERSION_ANIMATED => MAX_BANNER_SIZE,
        _ => 0x840,
    }
}

/// Number of title languages present in a banner version.
pub fn language_count(version: u16) -> usize {
    match version {
        VERSION_CHINESE => 7,
        VERSION_KOREAN | VERSION_ANIMATED => 8,
        _ => 6,
    }
}

pub fn is_known_version(version: u16) -> bool {
    matches!(
        version,
        VERSION_ORIGINAL | VERSION_CHINESE | VERSION_KOREAN | VERSION_ANIMATED
    )
}

/// One step of the animation sequence.
///
/// Bits 0-7 hold the delay in 1/60 s ticks, bits 8-10 the bitmap slot,
/// bits 11-13 the palette slot, bit 14 the horizontal flip and bit 15 the
/// vertical flip. A zero entry ends the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceEntry(pub u16);

impl SequenceEntry {
    pub const END: SequenceEntry = SequenceEntry(0);

    /// Builds an entry whose bitmap and palette both come from `slot`.
    pub fn new(delay: u8, slot: u8, flip_h: bool, flip_v: bool) -> Self {
        let slot = (slot & 0x7) as u16;
        Self(
            delay as u16
                | slot << 8
                | slot << 11
                | (flip_h as u16) << 14
                | (flip_v as u16) << 15,
        )
    }

    pub fn delay(self) -> u8 {
        self.0 as u8
    }

    pub fn bitmap(self) -> usize {
        ((self.0 >> 8) & 0x7) as usize
    }

    pub fn palette(self) -> usize {
        ((self.0 >> 11) & 0x7) as usize
    }

    pub fn flip_h(self) -> bool {
        self.0 & (1 << 14) != 0
    }

    pub fn flip_v(self) -> bool {
        self.0 & (1 << 15) != 0
    }

    pub fn is_end(self) -> bool {
        self.0 == 0
    }
}

/// The icon/title resource of a cartridge.
///
/// Every revision is a strict superset of the previous one; fields past
/// `calc_banner_size(version)` are neither written nor read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub version: u16,
    pub crc: [u16; CRC_SLOTS],
    pub reserved: [u8; RESERVED_BYTES],
    pub tile_data: TileData,
    pub palette: BannerPalette,
    pub titles: [TitleRow; MAX_TITLE_COUNT],
    pub anim_tile_data: [TileData; MAX_ANIMATION_BITMAPS],
    pub anim_palettes: [BannerPalette; MAX_ANIMATION_BITMAPS],
    pub anim_sequence: [SequenceEntry; ANIMATION_SEQUENCE_LENGTH],
}

impl Banner {
    /// Creates a zero-filled banner of the given version.
    pub fn new(version: u16) -> Self {
        Self {
            version,
            crc: [0; CRC_SLOTS],
            reserved: [0; RESERVED_BYTES],
            tile_data: [0; ICON_BITMAP_BYTES],
            palette: [0; PALETTE_ENTRIES],
            titles: [[0; TITLE_LENGTH]; MAX_TITLE_COUNT],
            anim_tile_data: [[0; ICON_BITMAP_BYTES]; MAX_ANIMATION_BITMAPS],
            anim_palettes: [[0; PALETTE_ENTRIES]; MAX_ANIMATION_BITMAPS],
            anim_sequence: [SequenceEntry::END; ANIMATION_SEQUENCE_LENGTH],
        }
    }

    pub fn size(&self) -> usize {
        calc_banner_size(self.version)
    }

    pub fn language_count(&self) -> usize {
        language_count(self.version)
    }

    pub fn is_animated(&self) -> bool {
        self.version >= VERSION_ANIMATED && !self.anim_sequence[0].is_end()
    }

    /// Sequence entries up to the first terminator.
    pub fn sequence(&self) -> impl Iterator<Item = SequenceEntry> + '_ {
        self.anim_sequence
            .iter()
            .copied()
            .take_while(|entry| !entry.is_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_sizes() {
        assert_eq!(calc_banner_size(VERSION_ORIGINAL), 0x840);
        assert_eq!(calc_banner_size(VERSION_CHINESE), 0x940);
        assert_eq!(calc_banner_size(VERSION_KOREAN), 0xA40);
        assert_eq!(calc_banner_size(VERSION_ANIMATED), 0x23C0);
    }

    #[test]
    fn test_unknown_version_falls_back() {
        for version in [0x0000, 0x0004, 0x0102, 0x0104, 0xFFFF] {
            assert_eq!(calc_banner_size(version), 0x840);
            assert_eq!(language_count(version), 6);
        }
    }

    #[test]
    fn test_language_counts() {
        assert_eq!(language_count(VERSION_ORIGINAL), 6);
        assert_eq!(language_count(VERSION_CHINESE), 7);
        assert_eq!(language_count(VERSION_KOREAN), 8);
        assert_eq!(language_count(VERSION_ANIMATED), 8);
    }

    #[test]
    fn test_layout_matches_sizes() {
        assert_eq!(TITLE_OFFSET + 6 * TITLE_LENGTH * 2, 0x840);
        assert_eq!(TITLE_OFFSET + MAX_TITLE_COUNT * TITLE_LENGTH * 2, ANIM_TILE_DATA_OFFSET);
        assert_eq!(
            ANIM_SEQUENCE_OFFSET + ANIMATION_SEQUENCE_LENGTH * 2,
            MAX_BANNER_SIZE
        );
    }

    #[test]
    fn test_sequence_entry_fields() {
        let entry = SequenceEntry::new(30, 5, true, false);
        assert_eq!(entry.delay(), 30);
        assert_eq!(entry.bitmap(), 5);
        assert_eq!(entry.palette(), 5);
        assert!(entry.flip_h());
        assert!(!entry.flip_v());
        assert_eq!(entry.0, 30 | 5 << 8 | 5 << 11 | 1 << 14);
    }

    #[test]
    fn test_sequence_stops_at_end() {
        let mut banner = Banner::new(VERSION_ANIMATED);
        banner.anim_sequence[0] = SequenceEntry::new(10, 0, false, false);
        banner.anim_sequence[1] = SequenceEntry::new(10, 1, false, true);
        assert_eq!(banner.sequence().count(), 2);
        assert!(banner.is_animated());
    }
}
