pub mod animation;
pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod format;
pub mod grf;
pub mod report;
pub mod title;

pub use animation::{build_animation, AnimationError, AnimationLayout};
pub use crc::{calc_banner_crc, insert_banner_crc, verify_banner_crc, CrcStatus, SlotCheck};
pub use decoder::BannerDecodeError;
pub use encoder::{BannerBuilder, BannerEncodeError};
pub use format::{calc_banner_size, language_count, Banner, SequenceEntry};
pub use grf::{parse_grf, GrfError, GrfIcon};
pub use report::BannerReport;
pub use title::{decode_title_lines, encode_title};
