use log::{debug, error, warn};
use thiserror::Error;

use super::format::SequenceEntry;
use crate::constants::{
    ANIMATION_SEQUENCE_LENGTH, ICON_HEIGHT, ICON_WIDTH, MAX_ANIMATION_BITMAPS,
};
use crate::raster::RasterImage;

#[derive(Error, Debug)]
pub enum AnimationError {
    #[error("Too many animation frames ({0} > {max})", max = ANIMATION_SEQUENCE_LENGTH)]
    TooManyFrames(usize),
    #[error("Too many unique animation frames (more than {max})", max = MAX_ANIMATION_BITMAPS)]
    TooManyUniqueFrames,
    #[error("Invalid animation dimensions {0}x{1} (expected 32x32)")]
    InvalidDimensions(usize, usize),
    #[error("Animation frames must be converted to a palette first")]
    NotPaletted,
}

/// Delay applied to frames whose source carries no timing.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

// Mirror variants, in the order they are tried.
const FLIP_VARIANTS: [(bool, bool); 4] = [(false, false), (true, false), (false, true), (true, true)];

/// Stored bitmaps and the sequence that plays them back.
#[derive(Debug, Clone)]
pub struct AnimationLayout {
    /// Single-frame palettized images, one per bitmap slot.
    pub bitmaps: Vec<RasterImage>,
    pub sequence: Vec<SequenceEntry>,
}

/// Converts a millisecond delay to 1/60 s ticks, clamped to what a sequence
/// entry can hold.
pub fn delay_to_ticks(delay_ms: u32) -> u8 {
    let ticks = (delay_ms as u64 * 60 + 500) / 1000;
    if ticks < 1 || ticks > u8::MAX as u64 {
        let clamped = ticks.clamp(1, u8::MAX as u64);
        warn!(
            "Frame delay of {} ms clamped to {} ticks",
            delay_ms, clamped
        );
        return clamped as u8;
    }
    ticks as u8
}

pub fn ticks_to_delay(ticks: u8) -> u32 {
    (ticks as u32 * 1000 + 30) / 60
}

fn check_frames(image: &RasterImage) -> Result<(), AnimationError> {
    if image.width() != ICON_WIDTH || image.height() != ICON_HEIGHT {
        error!(
            "Animation frame size {}x{} is not 32x32",
            image.width(),
            image.height()
        );
        return Err(AnimationError::InvalidDimensions(image.width(), image.height()));
    }
    if !image.has_palette() {
        return Err(AnimationError::NotPaletted);
    }
    Ok(())
}

/// Assigns every animation frame to one of at most eight bitmap slots.
///
/// Slot 0 always holds the static icon. Up to eight frames are stored as
/// they are. Longer animations are deduplicated greedily: each frame is
/// matched against the slots in allocation order, trying the identity,
/// horizontal, vertical and combined mirror in turn, and only gets a new
/// slot when nothing matches.
///
/// # Arguments
/// - `icon` - prepared static icon (32x32, palettized)
/// - `animation` - prepared animation frames (32x32, palettized)
///
/// # Errors
/// - Returns `AnimationError::TooManyUniqueFrames` when a ninth slot would be needed
pub fn build_animation(
    icon: &RasterImage,
    animation: &RasterImage,
) -> Result<AnimationLayout, AnimationError> {
    check_frames(icon)?;
    check_frames(animation)?;

    let frames = animation.frames();
    if frames > ANIMATION_SEQUENCE_LENGTH {
        error!("Animation has {} frames", frames);
        return Err(AnimationError::TooManyFrames(frames));
    }

    let delay_ticks = |frame: usize| {
        let delay = animation
            .delays()
            .and_then(|delays| delays.get(frame))
            .copied()
            .unwrap_or(DEFAULT_FRAME_DELAY_MS);
        delay_to_ticks(delay)
    };

    let mut bitmaps = vec![icon.subimage(0).ok_or(AnimationError::NotPaletted)?.to_image(false, false)];
    let mut sequence = Vec::with_capacity(frames);

    if frames <= MAX_ANIMATION_BITMAPS {
        debug!("Storing {} animation frame(s) without deduplication", frames);
        for (index, frame) in animation.subimages().enumerate() {
            if index > 0 {
                bitmaps.push(frame.to_image(false, false));
            }
            sequence.push(SequenceEntry::new(delay_ticks(index), index as u8, false, false));
        }
        return Ok(AnimationLayout { bitmaps, sequence });
    }

    sequence.push(SequenceEntry::new(delay_ticks(0), 0, false, false));
    for frame in animation.subimages().skip(1) {
        let variants: Vec<RasterImage> = FLIP_VARIANTS
            .iter()
            .map(|&(flip_h, flip_v)| frame.to_image(flip_h, flip_v))
            .collect();

        let found = bitmaps.iter().enumerate().find_map(|(slot, bitmap)| {
            variants
                .iter()
                .position(|variant| variant == bitmap)
                .map(|variant| (slot, FLIP_VARIANTS[variant]))
        });

        let (slot, (flip_h, flip_v)) = match found {
            Some(found) => found,
            None => {
                if bitmaps.len() == MAX_ANIMATION_BITMAPS {
                    error!(
                        "Frame {} needs a new bitmap slot but all {} are used",
                        frame.frame(),
                        MAX_ANIMATION_BITMAPS
                    );
                    return Err(AnimationError::TooManyUniqueFrames);
                }
                bitmaps.push(frame.to_image(false, false));
                (bitmaps.len() - 1, (false, false))
            }
        };

        debug!(
            "Frame {} -> slot {} (flip_h={}, flip_v={})",
            frame.frame(),
            slot,
            flip_h,
            flip_v
        );
        sequence.push(SequenceEntry::new(
            delay_ticks(frame.frame()),
            slot as u8,
            flip_h,
            flip_v,
        ));
    }

    debug!(
        "Deduplicated {} frames into {} bitmap(s)",
        frames,
        bitmaps.len()
    );
    Ok(AnimationLayout { bitmaps, sequence })
}
