use log::{debug, error};
use thiserror::Error;

use super::animation::ticks_to_delay;
use super::format::{
    calc_banner_size, is_known_version, Banner, BannerPalette, SequenceEntry, TileData,
    ANIM_PALETTE_OFFSET, ANIM_SEQUENCE_OFFSET, ANIM_TILE_DATA_OFFSET, CRC_OFFSET,
    MAX_BANNER_SIZE, PALETTE_OFFSET, RESERVED_OFFSET, TILE_DATA_OFFSET, TITLE_OFFSET,
};
use super::title::decode_title_lines;
use crate::constants::{
    ICON_BITMAP_BYTES, ICON_HEIGHT, ICON_WIDTH, PALETTE_ENTRIES, TILES_PER_ROW, TILE_BYTES,
    TILE_SIZE, TITLE_LENGTH,
};
use crate::raster::{FormatError, RasterImage, Rgba};

#[derive(Error, Debug)]
pub enum BannerDecodeError {
    #[error("Banner data too short ({0} bytes)")]
    TooShort(usize),
    #[error("Could not rebuild banner image: {0}")]
    Format(#[from] FormatError),
}

fn get_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_palette(bytes: &[u8], offset: usize) -> BannerPalette {
    let mut palette = [0u16; PALETTE_ENTRIES];
    for (i, entry) in palette.iter_mut().enumerate() {
        *entry = get_u16(bytes, offset + i * 2);
    }
    palette
}

fn read_tiles(bytes: &[u8], offset: usize) -> TileData {
    let mut tiles = [0u8; ICON_BITMAP_BYTES];
    tiles.copy_from_slice(&bytes[offset..offset + ICON_BITMAP_BYTES]);
    tiles
}

/// Expands tiled 4-bit data to one palette index per pixel, row major.
pub fn unpack_tiles(tiles: &TileData) -> Vec<u8> {
    let mut indices = vec![0u8; ICON_WIDTH * ICON_HEIGHT];
    for (offset, &byte) in tiles.iter().enumerate() {
        let tile = offset / TILE_BYTES;
        let within = offset % TILE_BYTES;
        let y = (tile / TILES_PER_ROW) * TILE_SIZE + within / (TILE_SIZE / 2);
        let x = (tile % TILES_PER_ROW) * TILE_SIZE + (within % (TILE_SIZE / 2)) * 2;
        indices[y * ICON_WIDTH + x] = byte & 0xF;
        indices[y * ICON_WIDTH + x + 1] = byte >> 4;
    }
    indices
}

/// RGBA palette for display; index 0 is always transparent.
pub fn expand_palette(palette: &BannerPalette) -> Vec<u32> {
    palette
        .iter()
        .enumerate()
        .map(|(i, &color)| {
            let alpha = if i == 0 { 0 } else { 0xFF };
            Rgba::from_rgb15(color, alpha).packed()
        })
        .collect()
}

fn flip_indices(indices: &[u8], flip_h: bool, flip_v: bool) -> Vec<u8> {
    let mut out = vec![0u8; indices.len()];
    for y in 0..ICON_HEIGHT {
        for x in 0..ICON_WIDTH {
            let in_x = if flip_h { ICON_WIDTH - 1 - x } else { x };
            let in_y = if flip_v { ICON_HEIGHT - 1 - y } else { y };
            out[y * ICON_WIDTH + x] = indices[in_y * ICON_WIDTH + in_x];
        }
    }
    out
}

impl Banner {
    /// Parses a serialized banner.
    ///
    /// At most `calc_banner_size(version)` bytes are read; a shorter input
    /// leaves the remaining fields zero.
    ///
    /// # Errors
    /// - Returns `BannerDecodeError::TooShort` if the version field is missing
    pub fn from_bytes(bytes: &[u8]) -> Result<Banner, BannerDecodeError> {
        if bytes.len() < 2 {
            error!("Banner data too short: {} bytes", bytes.len());
            return Err(BannerDecodeError::TooShort(bytes.len()));
        }
        let version = get_u16(bytes, 0);
        if !is_known_version(version) {
            debug!("Unknown banner version 0x{:04X}", version);
        }
        let size = calc_banner_size(version);
        let available = size.min(bytes.len());
        if available < size {
            debug!("Banner truncated: {} of {} bytes", available, size);
        }

        let mut buf = vec![0u8; MAX_BANNER_SIZE];
        buf[..available].copy_from_slice(&bytes[..available]);

        let mut banner = Banner::new(version);
        for (slot, crc) in banner.crc.iter_mut().enumerate() {
            *crc = get_u16(&buf, CRC_OFFSET + slot * 2);
        }
        let reserved_len = banner.reserved.len();
        banner
            .reserved
            .copy_from_slice(&buf[RESERVED_OFFSET..RESERVED_OFFSET + reserved_len]);
        banner.tile_data = read_tiles(&buf, TILE_DATA_OFFSET);
        banner.palette = read_palette(&buf, PALETTE_OFFSET);
        for (row, title) in banner.titles.iter_mut().enumerate() {
            let base = TITLE_OFFSET + row * TITLE_LENGTH * 2;
            for (i, unit) in title.iter_mut().enumerate() {
                *unit = get_u16(&buf, base + i * 2);
            }
        }
        for (slot, tiles) in banner.anim_tile_data.iter_mut().enumerate() {
            *tiles = read_tiles(&buf, ANIM_TILE_DATA_OFFSET + slot * ICON_BITMAP_BYTES);
        }
        for (slot, palette) in banner.anim_palettes.iter_mut().enumerate() {
            *palette = read_palette(&buf, ANIM_PALETTE_OFFSET + slot * PALETTE_ENTRIES * 2);
        }
        for (i, entry) in banner.anim_sequence.iter_mut().enumerate() {
            *entry = SequenceEntry(get_u16(&buf, ANIM_SEQUENCE_OFFSET + i * 2));
        }

        debug!("Parsed banner version 0x{:04X}", version);
        Ok(banner)
    }

    /// Title lines for one language; empty if the version has no such row.
    pub fn title_lines(&self, language: usize) -> Vec<String> {
        if language >= self.language_count() {
            return Vec::new();
        }
        decode_title_lines(&self.titles[language])
    }

    /// Static icon as a palettized 32x32 RGBA image.
    pub fn icon_image(&self) -> Result<RasterImage, BannerDecodeError> {
        Ok(RasterImage::from_indexed(
            ICON_WIDTH,
            ICON_HEIGHT,
            4,
            unpack_tiles(&self.tile_data),
            vec![expand_palette(&self.palette)],
        )?)
    }

    /// One frame per sequence entry, or `None` for a still banner.
    pub fn animation_image(&self) -> Result<Option<RasterImage>, BannerDecodeError> {
        if !self.is_animated() {
            return Ok(None);
        }

        let mut indices = Vec::new();
        let mut palettes = Vec::new();
        let mut delays = Vec::new();
        for entry in self.sequence() {
            let bitmap = unpack_tiles(&self.anim_tile_data[entry.bitmap()]);
            indices.extend(flip_indices(&bitmap, entry.flip_h(), entry.flip_v()));
            palettes.push(expand_palette(&self.anim_palettes[entry.palette()]));
            delays.push(ticks_to_delay(entry.delay()));
        }
        debug!("Rebuilt animation with {} frame(s)", delays.len());

        let image = RasterImage::from_indexed(ICON_WIDTH, ICON_HEIGHT, 4, indices, palettes)?
            .with_delays(delays)?;
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::format::{VERSION_ANIMATED, VERSION_CHINESE, VERSION_ORIGINAL};

    #[test]
    fn test_too_short() {
        assert!(matches!(
            Banner::from_bytes(&[1]),
            Err(BannerDecodeError::TooShort(1))
        ));
    }

    #[test]
    fn test_reads_only_version_size() {
        let mut bytes = vec![0xAAu8; MAX_BANNER_SIZE];
        bytes[..2].copy_from_slice(&VERSION_ORIGINAL.to_le_bytes());
        let banner = Banner::from_bytes(&bytes).unwrap();
        assert_eq!(banner.titles[5][0], 0xAAAA);
        assert_eq!(banner.titles[6][0], 0);
        assert!(banner.anim_tile_data[0].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_truncated_input_zero_fills() {
        let mut bytes = vec![0x11u8; 0x300];
        bytes[..2].copy_from_slice(&VERSION_CHINESE.to_le_bytes());
        let banner = Banner::from_bytes(&bytes).unwrap();
        assert_eq!(banner.palette[0], 0x1111);
        assert!(banner.titles[0].iter().all(|&unit| unit == 0x1111 || unit == 0));
        assert_eq!(banner.titles[1][0], 0);
    }

    #[test]
    fn test_unpack_tiles_layout() {
        let mut tiles = [0u8; ICON_BITMAP_BYTES];
        tiles[0] = 0x21;
        tiles[TILE_BYTES + 3] = 0x50;
        let indices = unpack_tiles(&tiles);
        assert_eq!(indices[0], 1);
        assert_eq!(indices[1], 2);
        assert_eq!(indices[8 + 7], 5);
    }

    #[test]
    fn test_icon_index_zero_transparent() {
        let mut banner = Banner::new(VERSION_ORIGINAL);
        banner.palette[0] = 0x7FFF;
        banner.palette[1] = 0x001F;
        banner.tile_data[0] = 0x10;
        let image = banner.icon_image().unwrap();
        assert_eq!(image.get_pixel(0, 0, 0).a, 0);
        assert_eq!(image.get_pixel(0, 1, 0), Rgba::new(0xF8, 0, 0, 0xFF));
    }

    #[test]
    fn test_animation_frames_follow_sequence() {
        let mut banner = Banner::new(VERSION_ANIMATED);
        banner.anim_tile_data[1][0] = 0x01;
        banner.anim_palettes[1][1] = 0x03E0;
        banner.anim_sequence[0] = SequenceEntry::new(6, 0, false, false);
        banner.anim_sequence[1] = SequenceEntry::new(12, 1, true, false);
        let image = banner.animation_image().unwrap().unwrap();
        assert_eq!(image.frames(), 2);
        assert_eq!(image.delays(), Some([100, 200].as_slice()));
        assert_eq!(image.get_pixel(1, 31, 0), Rgba::new(0, 0xF8, 0, 0xFF));
        assert_eq!(image.get_pixel(1, 0, 0).a, 0);
    }

    #[test]
    fn test_still_banner_has_no_animation() {
        let banner = Banner::new(VERSION_ORIGINAL);
        assert!(banner.animation_image().unwrap().is_none());
    }
}
