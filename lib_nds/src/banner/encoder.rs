use std::ffi::{OsStr, OsString};

use log::{debug, error, info, warn};
use thiserror::Error;

use super::animation::{build_animation, AnimationError};
use super::format::{
    language_count, Banner, BannerPalette, TileData, ANIM_PALETTE_OFFSET,
    ANIM_SEQUENCE_OFFSET, ANIM_TILE_DATA_OFFSET, CRC_OFFSET, MAX_BANNER_SIZE, PALETTE_OFFSET,
    RESERVED_OFFSET, TILE_DATA_OFFSET, TITLE_OFFSET, VERSION_ANIMATED, VERSION_CHINESE,
    VERSION_KOREAN, VERSION_OFFSET, VERSION_ORIGINAL,
};
use super::grf::GrfIcon;
use super::title::encode_title;
use crate::constants::{
    CHINESE, ENGLISH, ICON_BITMAP_BYTES, ICON_HEIGHT, ICON_WIDTH, KOREAN, MAX_TITLE_COUNT,
    PALETTE_ENTRIES, TILES_PER_ROW, TILE_BYTES, TILE_SIZE,
};
use crate::raster::format::unpack_components;
use crate::raster::{PaletteError, PixelSource, RasterImage, Subimage};

#[derive(Error, Debug)]
pub enum BannerEncodeError {
    #[error("No icon or GRF source was given")]
    MissingIcon,
    #[error("Invalid icon dimensions {0}x{1} (expected 32x32)")]
    InvalidDimensions(usize, usize),
    #[error("Invalid title language {0} (expected 0 to 15)")]
    InvalidLanguage(usize),
    #[error("Could not convert icon: {0}")]
    Palette(#[from] PaletteError),
    #[error("Could not build animation: {0}")]
    Animation(#[from] AnimationError),
}

/// Packs one palettized 32x32 frame into 4x4 tiles of 8x8 4-bit pixels.
pub fn pack_tiles(frame: &Subimage<'_>) -> TileData {
    let mut tiles = [0u8; ICON_BITMAP_BYTES];
    for y in 0..ICON_HEIGHT {
        for x in 0..ICON_WIDTH {
            let tile = (y / TILE_SIZE) * TILES_PER_ROW + x / TILE_SIZE;
            let offset = tile * TILE_BYTES + (y % TILE_SIZE) * (TILE_SIZE / 2) + (x % TILE_SIZE) / 2;
            let index = (frame.get_data(x, y) & 0xF) as u8;
            if x % 2 == 0 {
                tiles[offset] |= index;
            } else {
                tiles[offset] |= index << 4;
            }
        }
    }
    tiles
}

/// Converts a frame palette to RGB15. Unused entries stay zero.
pub fn pack_palette(frame: &Subimage<'_>) -> BannerPalette {
    let mut palette = [0u16; PALETTE_ENTRIES];
    if let Some(colors) = frame.palette() {
        for (entry, &color) in palette.iter_mut().zip(colors) {
            *entry = unpack_components(color, frame.components()).rgb15();
        }
    }
    palette
}

fn put_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

impl Banner {
    /// Serializes the banner. Only `calc_banner_size(version)` bytes are emitted.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; MAX_BANNER_SIZE];

        put_u16(&mut bytes, VERSION_OFFSET, self.version);
        for (slot, &crc) in self.crc.iter().enumerate() {
            put_u16(&mut bytes, CRC_OFFSET + slot * 2, crc);
        }
        bytes[RESERVED_OFFSET..RESERVED_OFFSET + self.reserved.len()]
            .copy_from_slice(&self.reserved);
        bytes[TILE_DATA_OFFSET..TILE_DATA_OFFSET + ICON_BITMAP_BYTES]
            .copy_from_slice(&self.tile_data);
        for (i, &color) in self.palette.iter().enumerate() {
            put_u16(&mut bytes, PALETTE_OFFSET + i * 2, color);
        }
        for (row, title) in self.titles.iter().enumerate() {
            let base = TITLE_OFFSET + row * title.len() * 2;
            for (i, &unit) in title.iter().enumerate() {
                put_u16(&mut bytes, base + i * 2, unit);
            }
        }
        for (slot, tiles) in self.anim_tile_data.iter().enumerate() {
            let base = ANIM_TILE_DATA_OFFSET + slot * ICON_BITMAP_BYTES;
            bytes[base..base + ICON_BITMAP_BYTES].copy_from_slice(tiles);
        }
        for (slot, palette) in self.anim_palettes.iter().enumerate() {
            let base = ANIM_PALETTE_OFFSET + slot * PALETTE_ENTRIES * 2;
            for (i, &color) in palette.iter().enumerate() {
                put_u16(&mut bytes, base + i * 2, color);
            }
        }
        for (i, entry) in self.anim_sequence.iter().enumerate() {
            put_u16(&mut bytes, ANIM_SEQUENCE_OFFSET + i * 2, entry.0);
        }

        bytes.truncate(self.size());
        bytes
    }
}

fn check_icon_size(image: &RasterImage) -> Result<(), BannerEncodeError> {
    if image.width() != ICON_WIDTH || image.height() != ICON_HEIGHT {
        error!(
            "Icon size {}x{} is not {}x{}",
            image.width(),
            image.height(),
            ICON_WIDTH,
            ICON_HEIGHT
        );
        return Err(BannerEncodeError::InvalidDimensions(image.width(), image.height()));
    }
    Ok(())
}

/// Assembles a [`Banner`] from decoded sources.
///
/// The version is chosen from what is supplied: animation needs 0x0103,
/// a Korean title 0x0003 and a Chinese title 0x0002.
#[derive(Debug, Default)]
pub struct BannerBuilder {
    icon: Option<RasterImage>,
    animation: Option<RasterImage>,
    grf: Option<GrfIcon>,
    titles: Vec<(usize, OsString)>,
}

impl BannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn icon(mut self, image: RasterImage) -> Self {
        self.icon = Some(image);
        self
    }

    pub fn animation(mut self, image: RasterImage) -> Self {
        self.animation = Some(image);
        self
    }

    /// Takes tile and palette data from a GRF file instead of an image.
    pub fn grf(mut self, grf: GrfIcon) -> Self {
        self.grf = Some(grf);
        self
    }

    /// Sets the title for one language; later calls win.
    pub fn title(mut self, language: usize, text: impl AsRef<OsStr>) -> Self {
        self.titles.retain(|(lang, _)| *lang != language);
        self.titles.push((language, text.as_ref().to_os_string()));
        self
    }

    fn title_for(&self, language: usize) -> Option<&OsStr> {
        self.titles
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, text)| text.as_os_str())
    }

    fn title_version(&self) -> u16 {
        if self.title_for(KOREAN).is_some() {
            VERSION_KOREAN
        } else if self.title_for(CHINESE).is_some() {
            VERSION_CHINESE
        } else {
            VERSION_ORIGINAL
        }
    }

    /// Builds the banner and stamps its CRCs.
    ///
    /// # Errors
    /// - Returns `BannerEncodeError::MissingIcon` without an icon or GRF source
    /// - Returns `BannerEncodeError::InvalidDimensions` unless the icon is 32x32
    /// - Returns `BannerEncodeError::Palette` when a frame does not fit 16 colors
    /// - Returns `BannerEncodeError::Animation` when the animation cannot be stored
    pub fn build(self) -> Result<Banner, BannerEncodeError> {
        if let Some(&(language, _)) = self.titles.iter().find(|(lang, _)| *lang >= MAX_TITLE_COUNT) {
            return Err(BannerEncodeError::InvalidLanguage(language));
        }

        let mut version = self.title_version();
        let mut banner;

        if let Some(grf) = &self.grf {
            if self.animation.is_some() {
                warn!("Animation is ignored when the icon comes from a GRF file");
            }
            banner = Banner::new(version);
            banner.tile_data = grf.tiles;
            banner.palette = grf.palette;
            debug!("Step 1: Copied GRF tiles and palette");
        } else {
            let mut icon = self.icon.clone().ok_or(BannerEncodeError::MissingIcon)?;
            check_icon_size(&icon)?;
            if icon.frames() > 1 {
                warn!("Icon has {} frames, only the first is used", icon.frames());
                icon = icon
                    .subimage(0)
                    .map(|frame| frame.to_image(false, false))
                    .ok_or(BannerEncodeError::MissingIcon)?;
            }
            icon.prepare_for_banner()?;
            debug!("Step 1: Prepared static icon");

            let animation = match self.animation.clone() {
                Some(mut animation) => {
                    check_icon_size(&animation)?;
                    animation.prepare_for_banner()?;
                    let differs = animation.frames() > 1
                        || animation.subimage(0).map_or(true, |frame| frame != icon);
                    if differs {
                        Some(animation)
                    } else {
                        debug!("Animation matches the static icon, storing a still banner");
                        None
                    }
                }
                None => None,
            };
            if animation.is_some() {
                version = VERSION_ANIMATED;
            }

            banner = Banner::new(version);
            if let Some(frame) = icon.subimage(0) {
                banner.tile_data = pack_tiles(&frame);
                banner.palette = pack_palette(&frame);
            }
            debug!("Step 2: Packed static icon tiles");

            if let Some(animation) = animation {
                let layout = build_animation(&icon, &animation)?;
                for (slot, bitmap) in layout.bitmaps.iter().enumerate() {
                    if let Some(frame) = bitmap.subimage(0) {
                        banner.anim_tile_data[slot] = pack_tiles(&frame);
                        banner.anim_palettes[slot] = pack_palette(&frame);
                    }
                }
                for (entry, step) in banner.anim_sequence.iter_mut().zip(&layout.sequence) {
                    *entry = *step;
                }
                debug!(
                    "Step 3: Stored {} bitmap(s), {} sequence entries",
                    layout.bitmaps.len(),
                    layout.sequence.len()
                );
            }
        }

        let count = language_count(version);
        for (language, _) in self.titles.iter().filter(|(lang, _)| *lang >= count) {
            warn!(
                "Title for language {} is not stored in a version 0x{:04X} banner",
                language, version
            );
        }

        let mut warned = false;
        for language in 0..count {
            let text = self
                .title_for(language)
                .or_else(|| self.title_for(ENGLISH))
                .unwrap_or_default();
            let (row, degraded) = encode_title(text);
            if degraded && !warned {
                warn!("Title text is not valid Unicode, copying it byte for byte");
                warned = true;
            }
            banner.titles[language] = row;
        }
        debug!("Step 4: Encoded {} title(s)", count);

        banner.insert_crc();
        info!(
            "Built banner version 0x{:04X} ({} bytes)",
            banner.version,
            banner.size()
        );
        Ok(banner)
    }
}
