#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use lib_nds::RasterImage;

pub const SIZE: usize = 32;

pub const CLEAR: [u8; 4] = [0, 0, 0, 0];
pub const RED: [u8; 4] = [0xF8, 0x00, 0x00, 0xFF];
pub const GREEN: [u8; 4] = [0x00, 0xF8, 0x00, 0xFF];
pub const BLUE: [u8; 4] = [0x00, 0x00, 0xF8, 0xFF];
pub const WHITE: [u8; 4] = [0xF8, 0xF8, 0xF8, 0xFF];

/// 32x32 RGBA pixels produced by `color(x, y)`.
pub fn icon_from_fn(color: impl Fn(usize, usize) -> [u8; 4]) -> Vec<u8> {
    let mut data = Vec::with_capacity(SIZE * SIZE * 4);
    for y in 0..SIZE {
        for x in 0..SIZE {
            data.extend_from_slice(&color(x, y));
        }
    }
    data
}

pub fn single(data: Vec<u8>) -> RasterImage {
    RasterImage::from_raw(SIZE, SIZE, 1, 4, data).unwrap()
}

/// Four-color icon with a transparent border.
pub fn sample_icon() -> RasterImage {
    single(icon_from_fn(|x, y| {
        if x < 2 || y < 2 || x > 29 || y > 29 {
            CLEAR
        } else if x < 12 {
            RED
        } else if y < 16 {
            GREEN
        } else {
            BLUE
        }
    }))
}

/// Icon with `count` distinct opaque colors.
pub fn icon_with_colors(count: usize) -> RasterImage {
    single(icon_from_fn(|x, y| {
        let i = (y * SIZE + x) % count;
        [(i * 8) as u8, 0x40, 0x80, 0xFF]
    }))
}

/// Animation frame with a red marker at (`position`, 0) and a green marker
/// at (0, 1). The green marker keeps mirrored frames distinct from plain ones.
pub fn marker_frame(position: usize) -> Vec<u8> {
    icon_from_fn(|x, y| {
        if (x, y) == (position, 0) {
            RED
        } else if (x, y) == (0, 1) {
            GREEN
        } else {
            CLEAR
        }
    })
}

pub fn mirror_h(frame: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; frame.len()];
    for y in 0..SIZE {
        for x in 0..SIZE {
            let from = (y * SIZE + (SIZE - 1 - x)) * 4;
            let to = (y * SIZE + x) * 4;
            out[to..to + 4].copy_from_slice(&frame[from..from + 4]);
        }
    }
    out
}

pub fn animation(frames: Vec<Vec<u8>>, delay_ms: u32) -> RasterImage {
    let count = frames.len();
    RasterImage::from_raw(SIZE, SIZE, count, 4, frames.concat())
        .unwrap()
        .with_delays(vec![delay_ms; count])
        .unwrap()
}

pub fn encode_png(data: &[u8]) -> Vec<u8> {
    let image = RgbaImage::from_raw(SIZE as u32, SIZE as u32, data.to_vec()).unwrap();
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub fn encode_gif(frames: &[Vec<u8>], delay_ms: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for data in frames {
            let image = RgbaImage::from_raw(SIZE as u32, SIZE as u32, data.clone()).unwrap();
            let frame = Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1));
            encoder.encode_frame(frame).unwrap();
        }
    }
    bytes
}

/// A scratch file path unique to this test process.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("lib_nds_{}_{}", std::process::id(), name))
}
