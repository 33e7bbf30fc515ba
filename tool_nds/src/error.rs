use std::io;

use lib_nds::banner::{BannerDecodeError, BannerEncodeError, GrfError};
use lib_nds::raster::{RasterDecodeError, RasterEncodeError};
use lib_nds::rom::RomError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Could not access \"{path}\": {source}")]
    Io { path: String, source: io::Error },

    #[error("{0}")]
    Rom(#[from] RomError),

    #[error("{0}")]
    Encode(#[from] BannerEncodeError),

    #[error("{0}")]
    Decode(#[from] BannerDecodeError),

    #[error("{0}")]
    ImageRead(#[from] RasterDecodeError),

    #[error("{0}")]
    ImageWrite(#[from] RasterEncodeError),

    #[error("{0}")]
    Grf(#[from] GrfError),

    #[error("Invalid manifest \"{path}\": {source}")]
    Manifest {
        path: String,
        source: serde_json::Error,
    },

    #[error("Could not format report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown language \"{0}\" (use 0-15 or a language name)")]
    InvalidLanguage(String),

    #[error("Invalid title \"{0}\" (expected LANGUAGE=TEXT)")]
    InvalidTitleSpec(String),

    #[error("Banner is not animated")]
    NoAnimation,

    #[error("Nothing to extract (use --bin, --icon or --animation)")]
    NothingToExtract,
}
