pub mod decoder;
pub mod encoder;
pub mod format;
pub mod palette;

pub use decoder::{is_raster_image_filename, RasterDecodeError};
pub use encoder::RasterEncodeError;
pub use format::{pixels_equal, FormatError, PixelSource, RasterImage, Rgba, Subimage};
pub use palette::PaletteError;
