use std::fmt;
use std::io::Read;

use log::{debug, error};
use serde::Serialize;
use thiserror::Error;

use crate::banner::calc_banner_size;
use crate::checksum::crc16;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Could not read cartridge header: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cartridge header too short ({actual} < {expected} bytes)")]
    TooShort { expected: usize, actual: usize },
}

/// Bytes of the header every cartridge has.
pub const HEADER_SIZE: usize = 0x200;
/// Bytes of the extended header of DSi-capable cartridges.
pub const DSI_HEADER_SIZE: usize = 0x1000;

const LOGO_START: usize = 0x0C0;
const LOGO_CRC_OFFSET: usize = 0x15C;
const HEADER_CRC_OFFSET: usize = 0x15E;
const DSI_BANNER_SIZE_OFFSET: usize = 0x208;

pub const SECURE_AREA_START: usize = 0x4000;
pub const SECURE_AREA_END: usize = 0x8000;
const DECRYPTED_SECURE_MARKER: u32 = 0xE7FF_DEFF;

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn ascii_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

/// Cartridge header fields used by the banner tools.
///
/// The raw bytes are kept so checksums can be recomputed and stamped back
/// without touching fields that are not modelled here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub game_code: String,
    pub maker_code: String,
    pub unit_code: u8,
    pub device_capacity: u8,
    pub arm9_rom_offset: u32,
    pub arm9_entry_address: u32,
    pub arm9_ram_address: u32,
    pub arm9_size: u32,
    pub arm7_rom_offset: u32,
    pub arm7_entry_address: u32,
    pub arm7_ram_address: u32,
    pub arm7_size: u32,
    pub fnt_offset: u32,
    pub fnt_size: u32,
    pub fat_offset: u32,
    pub fat_size: u32,
    pub banner_offset: u32,
    pub secure_area_crc: u16,
    pub application_end_offset: u32,
    pub rom_header_size: u32,
    pub logo_crc: u16,
    pub header_crc: u16,
    /// Only present on DSi-capable cartridges.
    pub dsi_banner_size: Option<u32>,
    raw: Vec<u8>,
}

impl CartridgeHeader {
    /// Parses a header from at least [`HEADER_SIZE`] bytes.
    pub fn parse(bytes: &[u8]) -> Result<CartridgeHeader, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            error!("Header is only {} bytes", bytes.len());
            return Err(HeaderError::TooShort {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let unit_code = bytes[0x12];
        let dsi_banner_size = (unit_code & 2 != 0)
            .then(|| bytes.get(DSI_BANNER_SIZE_OFFSET..DSI_BANNER_SIZE_OFFSET + 4))
            .flatten()
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));

        Ok(CartridgeHeader {
            title: ascii_field(&bytes[0x00..0x0C]),
            game_code: ascii_field(&bytes[0x0C..0x10]),
            maker_code: ascii_field(&bytes[0x10..0x12]),
            unit_code,
            device_capacity: bytes[0x14],
            arm9_rom_offset: u32_at(bytes, 0x20),
            arm9_entry_address: u32_at(bytes, 0x24),
            arm9_ram_address: u32_at(bytes, 0x28),
            arm9_size: u32_at(bytes, 0x2C),
            arm7_rom_offset: u32_at(bytes, 0x30),
            arm7_entry_address: u32_at(bytes, 0x34),
            arm7_ram_address: u32_at(bytes, 0x38),
            arm7_size: u32_at(bytes, 0x3C),
            fnt_offset: u32_at(bytes, 0x40),
            fnt_size: u32_at(bytes, 0x44),
            fat_offset: u32_at(bytes, 0x48),
            fat_size: u32_at(bytes, 0x4C),
            banner_offset: u32_at(bytes, 0x68),
            secure_area_crc: u16_at(bytes, 0x6C),
            application_end_offset: u32_at(bytes, 0x80),
            rom_header_size: u32_at(bytes, 0x84),
            logo_crc: u16_at(bytes, LOGO_CRC_OFFSET),
            header_crc: u16_at(bytes, HEADER_CRC_OFFSET),
            dsi_banner_size,
            raw: bytes.to_vec(),
        })
    }

    pub fn is_dsi(&self) -> bool {
        self.unit_code & 2 != 0
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn calc_header_crc(&self) -> u16 {
        crc16(&self.raw[..HEADER_CRC_OFFSET])
    }

    pub fn calc_logo_crc(&self) -> u16 {
        crc16(&self.raw[LOGO_START..LOGO_CRC_OFFSET])
    }

    /// Stamps the logo and header checksums, in that order since the header
    /// checksum covers the logo checksum.
    pub fn fix_crc(&mut self) {
        self.logo_crc = self.calc_logo_crc();
        self.raw[LOGO_CRC_OFFSET..LOGO_CRC_OFFSET + 2].copy_from_slice(&self.logo_crc.to_le_bytes());
        self.header_crc = self.calc_header_crc();
        self.raw[HEADER_CRC_OFFSET..HEADER_CRC_OFFSET + 2]
            .copy_from_slice(&self.header_crc.to_le_bytes());
        debug!(
            "Header CRCs: logo 0x{:04X}, header 0x{:04X}",
            self.logo_crc, self.header_crc
        );
    }

    /// Number of banner bytes to read for a banner of `version`.
    pub fn banner_size_limit(&self, version: u16) -> usize {
        let size = calc_banner_size(version);
        match self.dsi_banner_size {
            Some(limit) if (limit as usize) < size => limit as usize,
            _ => size,
        }
    }
}

/// Reads the header, including the extended part for DSi-capable cartridges.
pub fn read_header<R: Read>(reader: &mut R) -> Result<CartridgeHeader, HeaderError> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;
    if bytes[0x12] & 2 != 0 {
        bytes.resize(DSI_HEADER_SIZE, 0);
        reader.read_exact(&mut bytes[HEADER_SIZE..])?;
        debug!("Read extended DSi header");
    }
    CartridgeHeader::parse(&bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RomType {
    Homebrew,
    Multiboot,
    Decrypted,
    Encrypted,
    MaskRom,
}

impl fmt::Display for RomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RomType::Homebrew => "homebrew",
            RomType::Multiboot => "multiboot",
            RomType::Decrypted => "decrypted",
            RomType::Encrypted => "encrypted",
            RomType::MaskRom => "mask ROM",
        };
        f.write_str(name)
    }
}

/// Classifies a cartridge image from its first 0x8000 bytes (or fewer).
pub fn detect_rom_type(header: &CartridgeHeader, image: &[u8]) -> RomType {
    if header.arm9_rom_offset < SECURE_AREA_START as u32 {
        return RomType::Homebrew;
    }
    let word = |offset: usize| {
        image
            .get(offset..offset + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .unwrap_or(0)
    };
    let (first, second) = (word(SECURE_AREA_START), word(SECURE_AREA_START + 4));
    if first == 0 && second == 0 {
        return RomType::Multiboot;
    }
    if first == DECRYPTED_SECURE_MARKER && second == DECRYPTED_SECURE_MARKER {
        return RomType::Decrypted;
    }
    let gap = image.get(HEADER_SIZE..SECURE_AREA_START).unwrap_or(&[]);
    if gap.iter().any(|&b| b != 0) {
        return RomType::MaskRom;
    }
    RomType::Encrypted
}

/// CRC-16 of the secure area; missing bytes count as zero.
pub fn calc_secure_area_crc(image: &[u8]) -> u16 {
    let mut area = vec![0u8; SECURE_AREA_END - SECURE_AREA_START];
    if let Some(available) = image.get(SECURE_AREA_START..) {
        let len = available.len().min(area.len());
        area[..len].copy_from_slice(&available[..len]);
    }
    crc16(&area)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrcField {
    pub stored: u16,
    pub computed: u16,
    /// `None` when the value cannot be checked for this cartridge type.
    pub ok: Option<bool>,
}

impl CrcField {
    fn new(stored: u16, computed: u16) -> Self {
        Self {
            stored,
            computed,
            ok: Some(stored == computed),
        }
    }
}

impl fmt::Display for CrcField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.ok {
            Some(true) => "OK",
            Some(false) => "INVALID",
            None => "-",
        };
        write!(f, "0x{:04X} ({})", self.stored, status)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderReport {
    pub title: String,
    pub game_code: String,
    pub maker_code: String,
    pub unit_code: u8,
    pub device_capacity: u8,
    pub arm9_rom_offset: u32,
    pub arm9_size: u32,
    pub arm7_rom_offset: u32,
    pub arm7_size: u32,
    pub fnt_offset: u32,
    pub fat_offset: u32,
    pub banner_offset: u32,
    pub dsi_banner_size: Option<u32>,
    pub rom_type: RomType,
    pub secure_area_crc: CrcField,
    pub logo_crc: CrcField,
    pub header_crc: CrcField,
}

impl HeaderReport {
    /// `image` is the start of the cartridge, used for the secure area checks.
    pub fn new(header: &CartridgeHeader, image: &[u8]) -> Self {
        let rom_type = detect_rom_type(header, image);
        let mut secure_area_crc =
            CrcField::new(header.secure_area_crc, calc_secure_area_crc(image));
        if matches!(rom_type, RomType::Homebrew | RomType::Decrypted) {
            secure_area_crc.ok = None;
        }
        Self {
            title: header.title.clone(),
            game_code: header.game_code.clone(),
            maker_code: header.maker_code.clone(),
            unit_code: header.unit_code,
            device_capacity: header.device_capacity,
            arm9_rom_offset: header.arm9_rom_offset,
            arm9_size: header.arm9_size,
            arm7_rom_offset: header.arm7_rom_offset,
            arm7_size: header.arm7_size,
            fnt_offset: header.fnt_offset,
            fat_offset: header.fat_offset,
            banner_offset: header.banner_offset,
            dsi_banner_size: header.dsi_banner_size,
            rom_type,
            secure_area_crc,
            logo_crc: CrcField::new(header.logo_crc, header.calc_logo_crc()),
            header_crc: CrcField::new(header.header_crc, header.calc_header_crc()),
        }
    }
}

impl fmt::Display for HeaderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "0x00\t{:<25}\t{}", "Game title", self.title)?;
        writeln!(f, "0x0C\t{:<25}\t{}", "Game code", self.game_code)?;
        writeln!(f, "0x10\t{:<25}\t{}", "Maker code", self.maker_code)?;
        writeln!(f, "0x12\t{:<25}\t0x{:02X}", "Unit code", self.unit_code)?;
        writeln!(
            f,
            "0x14\t{:<25}\t0x{:02X} ({} Mbit)",
            "Device capacity",
            self.device_capacity,
            1u64.checked_shl(self.device_capacity as u32).unwrap_or(0)
        )?;
        writeln!(f, "0x20\t{:<25}\t0x{:X}", "ARM9 ROM offset", self.arm9_rom_offset)?;
        writeln!(f, "0x2C\t{:<25}\t0x{:X}", "ARM9 code size", self.arm9_size)?;
        writeln!(f, "0x30\t{:<25}\t0x{:X}", "ARM7 ROM offset", self.arm7_rom_offset)?;
        writeln!(f, "0x3C\t{:<25}\t0x{:X}", "ARM7 code size", self.arm7_size)?;
        writeln!(f, "0x40\t{:<25}\t0x{:X}", "File name table offset", self.fnt_offset)?;
        writeln!(f, "0x48\t{:<25}\t0x{:X}", "FAT offset", self.fat_offset)?;
        writeln!(f, "0x68\t{:<25}\t0x{:X}", "Icon/title offset", self.banner_offset)?;
        writeln!(
            f,
            "0x6C\t{:<25}\t{} ({})",
            "Secure area CRC", self.secure_area_crc, self.rom_type
        )?;
        writeln!(f, "0x15C\t{:<25}\t{}", "Logo CRC", self.logo_crc)?;
        writeln!(f, "0x15E\t{:<25}\t{}", "Header CRC", self.header_crc)?;
        if let Some(size) = self.dsi_banner_size {
            writeln!(f, "0x208\t{:<25}\t0x{:X}", "Banner size", size)?;
        }
        Ok(())
    }
}
