use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use log::{debug, error, info};
use thiserror::Error;

use super::format::RasterImage;

#[derive(Error, Debug)]
pub enum RasterEncodeError {
    #[error("Could not write image file \"{path}\": {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Animated images can only be saved as GIF")]
    AnimationRequiresGif,
    #[error("Image buffer does not match its dimensions")]
    InvalidBuffer,
}

impl RasterImage {
    /// Converts one frame into an `image` crate buffer.
    pub fn frame_to_rgba_image(&self, frame: usize) -> Result<RgbaImage, RasterEncodeError> {
        RgbaImage::from_raw(
            self.width as u32,
            self.height as u32,
            self.to_rgba8(frame),
        )
        .ok_or(RasterEncodeError::InvalidBuffer)
    }

    /// Saves the image. The format follows the file extension; animated
    /// images are written as GIF with their frame delays.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RasterEncodeError> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path)?;
        info!(
            "Saving {} frame(s) to {} as {:?}",
            self.frames,
            path.display(),
            format
        );

        if self.frames == 1 {
            self.frame_to_rgba_image(0)?
                .save_with_format(path, format)?;
            return Ok(());
        }

        if format != ImageFormat::Gif {
            error!("Cannot save {} frames as {:?}", self.frames, format);
            return Err(RasterEncodeError::AnimationRequiresGif);
        }

        let file = File::create(path).map_err(|source| RasterEncodeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder.set_repeat(Repeat::Infinite)?;

        for z in 0..self.frames {
            let delay_ms = self
                .delays()
                .and_then(|delays| delays.get(z))
                .copied()
                .unwrap_or(0);
            let frame = Frame::from_parts(
                self.frame_to_rgba_image(z)?,
                0,
                0,
                Delay::from_numer_denom_ms(delay_ms, 1),
            );
            encoder.encode_frame(frame)?;
            debug!("Encoded frame {} ({} ms)", z, delay_ms);
        }

        Ok(())
    }
}
