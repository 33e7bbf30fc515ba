use std::collections::BTreeMap;

use log::{debug, error};
use thiserror::Error;

use super::format::RasterImage;
use crate::constants::MAX_PALETTE_SIZE;

#[derive(Error, Debug)]
pub enum PaletteError {
    #[error("Could not quantize image to RGB15: already paletted")]
    AlreadyPaletted,
    #[error("Palette overflow in frame {frame}: {count} colors exceed the limit of {limit}")]
    TooManyColors {
        frame: usize,
        count: usize,
        limit: usize,
    },
    #[error("Could not adjust image palette for transparency: no palette")]
    NotPaletted,
    #[error("Could not adjust image palette for transparency: unsupported component format = {0}")]
    UnsupportedComponents(usize),
    #[error("Could not adjust image palette for transparency: too many colors (frame {0})")]
    TransparencyOverflow(usize),
}

const ALPHA_THRESHOLD: u32 = 0x80;
/// Transparent entry inserted when a frame has no transparent color of its own.
const TRANSPARENT_KEY: u32 = 0x00FF_00FF;

impl RasterImage {
    /// Quantizes color values to the RGB15 format (1-bit alpha, 5-bit colors).
    ///
    /// Images without an alpha channel are left untouched.
    ///
    /// # Errors
    /// - Returns `PaletteError::AlreadyPaletted` if the image holds palette indices
    pub fn quantize_rgb15(&mut self) -> Result<(), PaletteError> {
        if self.has_palette() {
            error!("Cannot quantize a paletted image");
            return Err(PaletteError::AlreadyPaletted);
        }
        if !self.has_alpha() {
            debug!("No alpha channel, quantization unnecessary");
            return Ok(());
        }

        for z in 0..self.frames {
            for y in 0..self.height {
                for x in 0..self.width {
                    let mut pxl = self.get_data(z, x, y);
                    if self.components == 4 {
                        if (pxl >> 24) >= ALPHA_THRESHOLD {
                            pxl |= 0xFF00_0000;
                        } else {
                            pxl &= 0x0000_00FF;
                        }
                        pxl &= 0xFFF8_F8F8;
                    } else {
                        if (pxl >> 8) >= ALPHA_THRESHOLD {
                            pxl |= 0xFF00;
                        } else {
                            pxl &= 0x00FF;
                        }
                        pxl &= 0xFFF8;
                    }
                    self.set_data(z, x, y, pxl);
                }
            }
        }
        debug!("Quantized {} frame(s) to RGB15", self.frames);
        Ok(())
    }

    /// Converts every frame to one byte per pixel indexing a per-frame palette.
    ///
    /// Palette entries are ordered by their packed value, which places
    /// transparent colors (low alpha byte) first.
    ///
    /// # Errors
    /// - Returns `PaletteError::TooManyColors` if a frame has more than 16 unique colors
    pub fn convert_palette(&mut self) -> Result<(), PaletteError> {
        if self.has_palette() {
            return Ok(());
        }

        let frame_size = self.width * self.height;
        let mut indices = Vec::with_capacity(frame_size * self.frames);
        let mut palettes = Vec::with_capacity(self.frames);

        for z in 0..self.frames {
            let mut unique_colors = BTreeMap::new();
            for y in 0..self.height {
                for x in 0..self.width {
                    unique_colors.entry(self.get_data(z, x, y)).or_insert(0u8);
                }
            }

            if unique_colors.len() > MAX_PALETTE_SIZE {
                error!(
                    "Could not convert frame {} to palette ({} colors > {})",
                    z,
                    unique_colors.len(),
                    MAX_PALETTE_SIZE
                );
                return Err(PaletteError::TooManyColors {
                    frame: z,
                    count: unique_colors.len(),
                    limit: MAX_PALETTE_SIZE,
                });
            }

            let mut palette = Vec::with_capacity(unique_colors.len());
            for (index, (color, slot)) in unique_colors.iter_mut().enumerate() {
                *slot = index as u8;
                palette.push(*color);
            }

            for y in 0..self.height {
                for x in 0..self.width {
                    indices.push(unique_colors[&self.get_data(z, x, y)]);
                }
            }
            debug!("Frame {} palette: {} colors", z, palette.len());
            palettes.push(palette);
        }

        self.data = indices;
        self.palettes = Some(palettes);
        Ok(())
    }

    /// Reorders every frame palette so that index 0, and only index 0, is transparent.
    ///
    /// # Errors
    /// - Returns `PaletteError::NotPaletted` if `convert_palette` has not run
    /// - Returns `PaletteError::UnsupportedComponents` unless the image is RGBA
    /// - Returns `PaletteError::TransparencyOverflow` if a frame has 16 opaque colors
    pub fn make_zero_transparent(&mut self) -> Result<(), PaletteError> {
        if !self.has_palette() {
            error!("Cannot adjust transparency of an image without palette");
            return Err(PaletteError::NotPaletted);
        }
        if self.components != 4 {
            error!("Cannot adjust transparency of a {}-component image", self.components);
            return Err(PaletteError::UnsupportedComponents(self.components));
        }

        for z in 0..self.frames {
            let palette = match self.palettes.as_mut().and_then(|p| p.get_mut(z)) {
                Some(palette) => palette,
                None => return Err(PaletteError::NotPaletted),
            };

            // Alpha is the highest-order byte and the palette is sorted.
            let transparent_count = palette
                .iter()
                .take_while(|&&color| (color >> 24) < ALPHA_THRESHOLD)
                .count();

            if transparent_count == 1 {
                palette[0] &= 0x00FF_FFFF;
                continue;
            }
            if transparent_count == 0 && palette.len() == MAX_PALETTE_SIZE {
                error!("Frame {} has no room for a transparent color", z);
                return Err(PaletteError::TransparencyOverflow(z));
            }

            let mut adjusted = Vec::with_capacity(palette.len() + 1);
            adjusted.push(TRANSPARENT_KEY);
            adjusted.extend_from_slice(&palette[transparent_count..]);
            *palette = adjusted;
            debug!(
                "Frame {}: merged {} transparent color(s) into index 0",
                z, transparent_count
            );

            for y in 0..self.height {
                for x in 0..self.width {
                    let pxl = self.get_data(z, x, y) as usize;
                    let remapped = if pxl < transparent_count {
                        0
                    } else {
                        pxl + 1 - transparent_count
                    };
                    self.set_data(z, x, y, remapped as u32);
                }
            }
        }

        Ok(())
    }

    /// Runs the full banner preparation pipeline: quantize, palettize, fix transparency.
    ///
    /// Images without four components are expanded to opaque RGBA first, so
    /// index 0 never holds one of their colors.
    pub fn prepare_for_banner(&mut self) -> Result<(), PaletteError> {
        if self.components != 4 {
            debug!("Expanding {}-component image to RGBA", self.components);
            *self = self.expand_to_rgba();
        }
        if !self.has_palette() {
            self.quantize_rgb15()?;
            self.convert_palette()?;
        }
        self.make_zero_transparent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::format::Rgba;

    fn image_from_colors(colors: &[[u8; 4]], width: usize, height: usize) -> RasterImage {
        let mut data = Vec::with_capacity(width * height * 4);
        for i in 0..width * height {
            data.extend_from_slice(&colors[i % colors.len()]);
        }
        RasterImage::from_raw(width, height, 1, 4, data).unwrap()
    }

    #[test]
    fn test_quantize_masks_low_bits() {
        let mut image = image_from_colors(&[[0xFF, 0x0F, 0x87, 0x90]], 1, 1);
        image.quantize_rgb15().unwrap();
        assert_eq!(image.get_pixel(0, 0, 0), Rgba::new(0xF8, 0x08, 0x80, 0xFF));
    }

    #[test]
    fn test_quantize_binary_alpha() {
        let mut image = image_from_colors(&[[0x37, 0x40, 0x50, 0x7F]], 1, 1);
        image.quantize_rgb15().unwrap();
        let pixel = image.get_pixel(0, 0, 0);
        assert_eq!(pixel.a, 0);
        assert_eq!((pixel.g, pixel.b), (0, 0));
        assert_eq!(pixel.r, 0x30);
    }

    #[test]
    fn test_quantize_without_alpha_is_noop() {
        let mut image = RasterImage::from_raw(1, 1, 1, 3, vec![0x13, 0x57, 0x9B]).unwrap();
        image.quantize_rgb15().unwrap();
        assert_eq!(image.get_data(0, 0, 0), 0x9B5713);
    }

    #[test]
    fn test_quantize_rejects_paletted() {
        let mut image = image_from_colors(&[[0, 0, 0, 255]], 2, 2);
        image.convert_palette().unwrap();
        assert!(matches!(
            image.quantize_rgb15(),
            Err(PaletteError::AlreadyPaletted)
        ));
    }

    #[test]
    fn test_convert_palette_orders_by_value() {
        let mut image = image_from_colors(&[[0, 0, 0xF8, 0xFF], [0xF8, 0, 0, 0xFF]], 2, 1);
        image.convert_palette().unwrap();
        let palette = image.palette(0).unwrap();
        assert_eq!(palette.len(), 2);
        assert!(palette[0] < palette[1]);
        assert_eq!(image.get_data(0, 0, 0), 1);
        assert_eq!(image.get_data(0, 1, 0), 0);
        assert_eq!(image.get_pixel(0, 0, 0), Rgba::new(0, 0, 0xF8, 0xFF));
    }

    #[test]
    fn test_convert_palette_overflow() {
        let colors: Vec<[u8; 4]> = (0..17).map(|i| [i as u8 * 8, 0, 0, 255]).collect();
        let mut image = image_from_colors(&colors, 17, 1);
        let result = image.convert_palette();
        assert!(matches!(
            result,
            Err(PaletteError::TooManyColors {
                frame: 0,
                count: 17,
                limit: 16
            })
        ));
        assert!(!image.has_palette());
    }

    #[test]
    fn test_make_zero_transparent_requires_palette() {
        let mut image = image_from_colors(&[[0, 0, 0, 0]], 1, 1);
        assert!(matches!(
            image.make_zero_transparent(),
            Err(PaletteError::NotPaletted)
        ));
    }

    #[test]
    fn test_make_zero_transparent_single() {
        let mut image = image_from_colors(&[[0x10, 0, 0, 0], [0xF8, 0xF8, 0xF8, 0xFF]], 2, 2);
        image.prepare_for_banner().unwrap();
        let palette = image.palette(0).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette[0] >> 24, 0);
        assert_eq!(image.get_data(0, 0, 0), 0);
        assert_eq!(image.get_data(0, 1, 0), 1);
    }

    #[test]
    fn test_make_zero_transparent_merges() {
        let colors = [
            [0x10, 0, 0, 0x00],
            [0x20, 0, 0, 0x10],
            [0x30, 0, 0, 0x20],
            [0xF8, 0, 0, 0xFF],
        ];
        let mut image = image_from_colors(&colors, 4, 1);
        image.prepare_for_banner().unwrap();
        let palette = image.palette(0).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette[0], TRANSPARENT_KEY);
        for x in 0..3 {
            assert_eq!(image.get_data(0, x, 0), 0);
        }
        assert_eq!(image.get_data(0, 3, 0), 1);
    }

    #[test]
    fn test_make_zero_transparent_inserts() {
        let colors = [[0x08, 0, 0, 0xFF], [0x10, 0, 0, 0xFF]];
        let mut image = image_from_colors(&colors, 2, 1);
        image.prepare_for_banner().unwrap();
        let palette = image.palette(0).unwrap();
        assert_eq!(palette.len(), 3);
        assert_eq!(palette[0], TRANSPARENT_KEY);
        assert_eq!(image.get_data(0, 0, 0), 1);
        assert_eq!(image.get_data(0, 1, 0), 2);
    }

    #[test]
    fn test_make_zero_transparent_overflow() {
        let colors: Vec<[u8; 4]> = (0..16).map(|i| [i as u8 * 8, 0, 0, 255]).collect();
        let mut image = image_from_colors(&colors, 16, 1);
        let result = image.prepare_for_banner();
        assert!(matches!(result, Err(PaletteError::TransparencyOverflow(0))));
    }

    #[test]
    fn test_make_zero_transparent_rejects_rgb() {
        let mut image = RasterImage::from_raw(1, 1, 1, 3, vec![1, 2, 3]).unwrap();
        image.convert_palette().unwrap();
        assert!(matches!(
            image.make_zero_transparent(),
            Err(PaletteError::UnsupportedComponents(3))
        ));
    }

    #[test]
    fn test_prepare_rgb_keeps_colors_opaque() {
        let mut image =
            RasterImage::from_raw(2, 1, 1, 3, vec![0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF]).unwrap();
        image.prepare_for_banner().unwrap();
        assert_eq!(image.components(), 4);
        let palette = image.palette(0).unwrap();
        assert_eq!(palette, &[TRANSPARENT_KEY, 0xFF00_0000, 0xFFF8_F8F8]);
        assert_eq!(image.get_pixel(0, 0, 0), Rgba::new(0, 0, 0, 0xFF));
        assert_eq!(image.get_data(0, 0, 0), 1);
        assert_eq!(image.get_data(0, 1, 0), 2);
    }
}
