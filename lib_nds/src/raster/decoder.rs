use std::fs;
use std::io::{BufRead, Cursor, Seek};
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader};
use log::{debug, error, info};
use thiserror::Error;

use super::format::{FormatError, RasterImage};
use crate::constants::{IMAGE_EXTENSIONS, MAX_FRAME_COUNT};

#[derive(Error, Debug)]
pub enum RasterDecodeError {
    #[error("Could not open image file \"{path}\": {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Could not read image file: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unsupported image format (expected BMP, GIF or PNG)")]
    UnsupportedFormat,
    #[error("Could not read image file (too many frames = {0} > {max})", max = MAX_FRAME_COUNT)]
    TooManyFrames(usize),
    #[error("Could not read image file (invalid bpc = {0})")]
    UnsupportedBitDepth(u16),
    #[error("Could not read image file (no frames)")]
    NoFrames,
    #[error("Decoded frames have inconsistent dimensions")]
    InconsistentFrames,
    #[error("Invalid raster data")]
    Format(#[from] FormatError),
}

/// Checks whether a filename has a raster-compatible extension.
pub fn is_raster_image_filename(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

impl RasterImage {
    /// Loads a BMP, GIF or PNG file. Only GIF files carry animation.
    pub fn load(path: impl AsRef<Path>) -> Result<RasterImage, RasterDecodeError> {
        let path = path.as_ref();
        info!("Loading image {}", path.display());
        let bytes = fs::read(path).map_err(|source| {
            error!("Could not open image file {}", path.display());
            RasterDecodeError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::load_from_memory(&bytes)
    }

    /// Decodes an in-memory BMP, GIF or PNG file.
    pub fn load_from_memory(bytes: &[u8]) -> Result<RasterImage, RasterDecodeError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?;
        let format = reader.format().ok_or(RasterDecodeError::UnsupportedFormat)?;
        debug!("Detected image format: {:?}", format);

        match format {
            ImageFormat::Gif => decode_gif(Cursor::new(bytes)),
            ImageFormat::Png | ImageFormat::Bmp => decode_still(reader.decode()?),
            _ => {
                error!("Unsupported image format {:?}", format);
                Err(RasterDecodeError::UnsupportedFormat)
            }
        }
    }
}

fn decode_still(image: DynamicImage) -> Result<RasterImage, RasterDecodeError> {
    let bits = image.color().bits_per_pixel() / image.color().channel_count() as u16;
    // 16 bpc sources are converted down to 8 bpc.
    if bits != 8 && bits != 16 {
        error!("Unsupported bit depth: {} bits per channel", bits);
        return Err(RasterDecodeError::UnsupportedBitDepth(bits));
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!("Decoded still image: {}x{} ({} bpc)", width, height, bits);
    Ok(RasterImage::from_raw(
        width as usize,
        height as usize,
        1,
        4,
        rgba.into_raw(),
    )?)
}

fn decode_gif<R: BufRead + Seek>(reader: R) -> Result<RasterImage, RasterDecodeError> {
    let decoder = GifDecoder::new(reader)?;
    let frames = decoder.into_frames().collect_frames()?;

    if frames.is_empty() {
        return Err(RasterDecodeError::NoFrames);
    }
    if frames.len() > MAX_FRAME_COUNT {
        error!("Too many frames: {} > {}", frames.len(), MAX_FRAME_COUNT);
        return Err(RasterDecodeError::TooManyFrames(frames.len()));
    }

    let (width, height) = frames[0].buffer().dimensions();
    let mut data = Vec::with_capacity((width * height * 4) as usize * frames.len());
    let mut delays = Vec::with_capacity(frames.len());

    for frame in frames {
        if frame.buffer().dimensions() != (width, height) {
            return Err(RasterDecodeError::InconsistentFrames);
        }
        let (numer, denom) = frame.delay().numer_denom_ms();
        let delay = if denom == 0 {
            0
        } else {
            (numer + denom / 2) / denom
        };
        delays.push(delay);
        data.extend_from_slice(frame.buffer().as_raw());
    }

    debug!(
        "Decoded GIF: {}x{}, {} frame(s), delays {:?}",
        width,
        height,
        delays.len(),
        delays
    );
    let frame_count = delays.len();
    Ok(RasterImage::from_raw(width as usize, height as usize, frame_count, 4, data)?
        .with_delays(delays)?)
}
