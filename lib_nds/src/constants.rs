/// Source image extensions accepted by the raster loader.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["bmp", "gif", "png"];
pub const GRF_EXTENSION: &str = "grf";

pub const ICON_WIDTH: usize = 32;
pub const ICON_HEIGHT: usize = 32;
pub const TILE_SIZE: usize = 8;
pub const TILES_PER_ROW: usize = ICON_WIDTH / TILE_SIZE;
pub const TILE_BYTES: usize = TILE_SIZE * TILE_SIZE / 2;
pub const ICON_BITMAP_BYTES: usize = TILES_PER_ROW * TILES_PER_ROW * TILE_BYTES;
pub const PALETTE_ENTRIES: usize = 16;

/// Maximum frame sequence count for banner icons.
pub const MAX_FRAME_COUNT: usize = 64;
/// Banners only support 16 colors per palette.
pub const MAX_PALETTE_SIZE: usize = 16;
pub const MAX_ANIMATION_BITMAPS: usize = 8;
pub const ANIMATION_SEQUENCE_LENGTH: usize = 64;

pub const TITLE_LENGTH: usize = 128;
pub const MAX_TITLE_COUNT: usize = 16;
pub const TITLE_LINE_SEPARATOR: char = ';';
pub const TITLE_NEWLINE: u16 = 0x000A;

pub const ENGLISH: usize = 1;
pub const CHINESE: usize = 6;
pub const KOREAN: usize = 7;

pub const LANGUAGE_NAMES: [&str; 8] = [
    "Japanese", "English", "French", "German", "Italian", "Spanish", "Chinese", "Korean",
];

/// Returns the display name for a title slot.
pub fn language_name(index: usize) -> &'static str {
    LANGUAGE_NAMES.get(index).copied().unwrap_or("Unknown")
}

/// Looks a language up by index ("1") or case-insensitive name ("english").
pub fn parse_language(text: &str) -> Option<usize> {
    if let Ok(index) = text.trim().parse::<usize>() {
        return (index < MAX_TITLE_COUNT).then_some(index);
    }
    LANGUAGE_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(text.trim()))
}
