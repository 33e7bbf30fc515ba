pub mod banner;
pub mod checksum;
pub mod constants;
pub mod header;
pub mod raster;
pub mod rom;

use log::*;
use std::io::Write;

pub use crate::banner::{Banner, BannerBuilder, BannerReport};
pub use crate::raster::RasterImage;
pub use crate::rom::Cartridge;

/// Sets up stderr logging for the library and the command line tool.
pub fn init_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .target(env_logger::Target::Stderr)
        .filter(Some("lib_nds"), level)
        .filter(Some("ndsbanner"), level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}
