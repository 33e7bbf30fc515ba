use std::fs;
use std::path::Path;

use log::{debug, error, info};
use thiserror::Error;

use super::format::{BannerPalette, TileData};
use crate::constants::{ICON_BITMAP_BYTES, ICON_HEIGHT, ICON_WIDTH, PALETTE_ENTRIES, TILE_SIZE};

#[derive(Error, Debug)]
pub enum GrfError {
    #[error("Could not open GRF file \"{path}\": {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("File is not a GRF file")]
    NotGrf,
    #[error("GRF file is incomplete (missing {0} chunk)")]
    MissingChunk(&'static str),
    #[error("GRF chunk {0} is truncated")]
    TruncatedChunk(String),
    #[error("GRF image must be 32x32 pixels (got {0}x{1})")]
    InvalidDimensions(u32, u32),
    #[error("GRF image must have 16 colors (GfxAttr = {0})")]
    InvalidColorDepth(u8),
    #[error("GRF image must consist of 8x8 pixel tiles (got {0}x{1})")]
    InvalidTileSize(u8, u8),
    #[error("GRF {0} data must be uncompressed")]
    Compressed(&'static str),
}

const HEADER_SIZE: usize = 16;
const COMPRESSION_HEADER_SIZE: usize = 4;
const BITS_PER_PIXEL: u8 = 4;

/// Tile and palette data imported from a GRF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrfIcon {
    pub tiles: TileData,
    pub palette: BannerPalette,
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Strips the compression header of a GFX or PAL payload.
fn uncompressed_payload<'a>(
    name: &'static str,
    chunk: &'a [u8],
    needed: usize,
) -> Result<&'a [u8], GrfError> {
    let kind = chunk.first().ok_or(GrfError::Compressed(name))?;
    if kind & 0xF0 != 0 {
        error!("GRF {} data is compressed (type 0x{:02X})", name, kind & 0xF0);
        return Err(GrfError::Compressed(name));
    }
    chunk
        .get(COMPRESSION_HEADER_SIZE..COMPRESSION_HEADER_SIZE + needed)
        .ok_or_else(|| GrfError::TruncatedChunk(name.to_string()))
}

impl GrfIcon {
    pub fn load(path: impl AsRef<Path>) -> Result<GrfIcon, GrfError> {
        let path = path.as_ref();
        info!("Loading GRF icon {}", path.display());
        let bytes = fs::read(path).map_err(|source| GrfError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_grf(&bytes)
    }
}

/// Parses a 32x32, 16-color, tiled GRF file.
///
/// # Errors
/// - Returns `GrfError::NotGrf` if the RIFF signature or size is wrong
/// - Returns `GrfError::MissingChunk` if HDR, GFX or PAL is absent
/// - Returns `GrfError::Compressed` if image or palette data is compressed
pub fn parse_grf(bytes: &[u8]) -> Result<GrfIcon, GrfError> {
    // Step 1: Check the RIFF container
    let riff_size = read_u32(bytes, 4).ok_or(GrfError::NotGrf)?;
    if bytes.get(0..4) != Some(b"RIFF".as_slice())
        || bytes.get(8..12) != Some(b"GRF ".as_slice())
        || riff_size as usize != bytes.len() - 8
    {
        error!("File is no GRF file");
        return Err(GrfError::NotGrf);
    }

    // Step 2: Walk the chunks
    let mut header = None;
    let mut gfx = None;
    let mut pal = None;
    let mut pos = 12;
    while pos < bytes.len() {
        let id = bytes.get(pos..pos + 4).ok_or_else(|| {
            GrfError::TruncatedChunk(String::from_utf8_lossy(&bytes[pos..]).into_owned())
        })?;
        let name = String::from_utf8_lossy(id).into_owned();
        let size = read_u32(bytes, pos + 4)
            .ok_or_else(|| GrfError::TruncatedChunk(name.clone()))? as usize;
        let data = bytes
            .get(pos + 8..pos + 8 + size)
            .ok_or_else(|| GrfError::TruncatedChunk(name.clone()))?;
        debug!("GRF chunk {:?}: {} bytes", name, size);

        match id {
            b"HDR " => header = Some(data),
            b"GFX " => gfx = Some(data),
            b"PAL " => pal = Some(data),
            _ => {}
        }
        pos += 8 + size;
    }

    let header = header.ok_or(GrfError::MissingChunk("HDR"))?;
    let gfx = gfx.ok_or(GrfError::MissingChunk("GFX"))?;
    let pal = pal.ok_or(GrfError::MissingChunk("PAL"))?;

    // Step 3: Check the image header
    if header.len() < HEADER_SIZE {
        return Err(GrfError::TruncatedChunk("HDR".to_string()));
    }
    let gfx_attr = header[0];
    let (tile_width, tile_height) = (header[4], header[5]);
    let gfx_width = read_u32(header, 8).unwrap_or(0);
    let gfx_height = read_u32(header, 12).unwrap_or(0);

    if gfx_width as usize != ICON_WIDTH || gfx_height as usize != ICON_HEIGHT {
        error!("GRF image is {}x{}", gfx_width, gfx_height);
        return Err(GrfError::InvalidDimensions(gfx_width, gfx_height));
    }
    if gfx_attr != BITS_PER_PIXEL {
        error!("GRF image has GfxAttr {}", gfx_attr);
        return Err(GrfError::InvalidColorDepth(gfx_attr));
    }
    if tile_width as usize != TILE_SIZE || tile_height as usize != TILE_SIZE {
        error!("GRF tiles are {}x{}", tile_width, tile_height);
        return Err(GrfError::InvalidTileSize(tile_width, tile_height));
    }

    // Step 4: Copy the uncompressed payloads
    let gfx = uncompressed_payload("GFX", gfx, ICON_BITMAP_BYTES)?;
    let pal = uncompressed_payload("PAL", pal, PALETTE_ENTRIES * 2)?;

    let mut tiles = [0u8; ICON_BITMAP_BYTES];
    tiles.copy_from_slice(gfx);
    let mut palette = [0u16; PALETTE_ENTRIES];
    for (entry, pair) in palette.iter_mut().zip(pal.chunks_exact(2)) {
        *entry = u16::from_le_bytes([pair[0], pair[1]]);
    }

    info!("Imported GRF icon");
    Ok(GrfIcon { tiles, palette })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn header(gfx_attr: u8, width: u32, tile: u8) -> Vec<u8> {
        let mut hdr = vec![gfx_attr, 0, 0, 4, tile, tile, 1, 1];
        hdr.extend_from_slice(&width.to_le_bytes());
        hdr.extend_from_slice(&32u32.to_le_bytes());
        hdr
    }

    fn payload(kind: u8, body: &[u8]) -> Vec<u8> {
        let size = (body.len() as u32) << 8 | kind as u32;
        let mut out = size.to_le_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    fn grf(hdr: Vec<u8>, gfx_kind: u8) -> Vec<u8> {
        let tiles: Vec<u8> = (0..ICON_BITMAP_BYTES).map(|i| i as u8).collect();
        let pal: Vec<u8> = (0..PALETTE_ENTRIES as u16)
            .flat_map(|i| (i * 0x421).to_le_bytes())
            .collect();
        let mut body = b"GRF ".to_vec();
        body.extend(chunk(b"HDR ", &hdr));
        body.extend(chunk(b"GFX ", &payload(gfx_kind, &tiles)));
        body.extend(chunk(b"PAL ", &payload(0, &pal)));
        let mut file = b"RIFF".to_vec();
        file.extend_from_slice(&(body.len() as u32).to_le_bytes());
        file.extend(body);
        file
    }

    #[test]
    fn test_parse_valid() {
        let icon = parse_grf(&grf(header(4, 32, 8), 0)).unwrap();
        assert_eq!(icon.tiles[5], 5);
        assert_eq!(icon.tiles[511], 0xFF);
        assert_eq!(icon.palette[1], 0x421);
    }

    #[test]
    fn test_rejects_bad_signature() {
        let mut file = grf(header(4, 32, 8), 0);
        file[8] = b'X';
        assert!(matches!(parse_grf(&file), Err(GrfError::NotGrf)));
        assert!(matches!(parse_grf(b"RIFF"), Err(GrfError::NotGrf)));
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let mut file = grf(header(4, 32, 8), 0);
        file.push(0);
        assert!(matches!(parse_grf(&file), Err(GrfError::NotGrf)));
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(matches!(
            parse_grf(&grf(header(8, 32, 8), 0)),
            Err(GrfError::InvalidColorDepth(8))
        ));
        assert!(matches!(
            parse_grf(&grf(header(4, 64, 8), 0)),
            Err(GrfError::InvalidDimensions(64, 32))
        ));
        assert!(matches!(
            parse_grf(&grf(header(4, 32, 16), 0)),
            Err(GrfError::InvalidTileSize(16, 16))
        ));
    }

    #[test]
    fn test_rejects_compressed() {
        assert!(matches!(
            parse_grf(&grf(header(4, 32, 8), 0x10)),
            Err(GrfError::Compressed("GFX"))
        ));
    }

    #[test]
    fn test_missing_chunk() {
        let mut body = b"GRF ".to_vec();
        body.extend(chunk(b"HDR ", &header(4, 32, 8)));
        let mut file = b"RIFF".to_vec();
        file.extend_from_slice(&(body.len() as u32).to_le_bytes());
        file.extend(body);
        assert!(matches!(parse_grf(&file), Err(GrfError::MissingChunk("GFX"))));
    }
}
