use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use thiserror::Error;

use crate::banner::crc::read_version;
use crate::banner::format::{calc_banner_size, CRC_OFFSET};
use crate::banner::{insert_banner_crc, Banner, BannerDecodeError, BannerReport};
use crate::header::{read_header, CartridgeHeader, HeaderError, HeaderReport, SECURE_AREA_END};

#[derive(Error, Debug)]
pub enum RomError {
    #[error("Could not access \"{path}\": {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{0}")]
    Header(#[from] HeaderError),
    #[error("{0}")]
    Banner(#[from] BannerDecodeError),
    #[error("Cartridge has no banner (offset is zero)")]
    NoBanner,
    #[error("Banner needs {needed} bytes but the cartridge only has room for {available}")]
    BannerTooLarge { available: usize, needed: usize },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RomError + '_ {
    move |source| {
        error!("I/O error on {}: {}", path.display(), source);
        RomError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

fn read_at(path: &Path, offset: u64, max_len: usize) -> Result<Vec<u8>, RomError> {
    let mut file = File::open(path).map_err(io_error(path))?;
    file.seek(SeekFrom::Start(offset)).map_err(io_error(path))?;
    let mut bytes = Vec::with_capacity(max_len);
    file.take(max_len as u64)
        .read_to_end(&mut bytes)
        .map_err(io_error(path))?;
    Ok(bytes)
}

fn write_at(path: &Path, offset: u64, bytes: &[u8]) -> Result<(), RomError> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(io_error(path))?;
    file.seek(SeekFrom::Start(offset)).map_err(io_error(path))?;
    file.write_all(bytes).map_err(io_error(path))?;
    Ok(())
}

/// Restamps the CRCs of the banner record at `offset` in place.
///
/// At most `size` bytes are read; a shorter record is checksummed over what
/// is there.
pub fn fix_banner_crc(path: impl AsRef<Path>, offset: u64, size: usize) -> Result<(), RomError> {
    let path = path.as_ref();
    let mut bytes = read_at(path, offset, size)?;
    if read_version(&bytes).is_none() {
        return Err(BannerDecodeError::TooShort(bytes.len()).into());
    }
    insert_banner_crc(&mut bytes);
    let crc_end = (CRC_OFFSET + 8).min(bytes.len());
    if crc_end > CRC_OFFSET {
        write_at(path, offset + CRC_OFFSET as u64, &bytes[CRC_OFFSET..crc_end])?;
    }
    info!("Fixed banner CRCs at 0x{:X} in {}", offset, path.display());
    Ok(())
}

/// Restamps the logo and header CRCs in place.
pub fn fix_header_crc(path: impl AsRef<Path>) -> Result<(), RomError> {
    let path = path.as_ref();
    let cartridge = Cartridge::open(path)?;
    let mut header = cartridge.header;
    header.fix_crc();
    write_at(path, 0, header.raw())?;
    info!(
        "Fixed header CRC of {} (0x{:04X})",
        path.display(),
        header.header_crc
    );
    Ok(())
}

/// An opened cartridge image: its path and parsed header.
#[derive(Debug, Clone)]
pub struct Cartridge {
    path: PathBuf,
    header: CartridgeHeader,
}

impl Cartridge {
    pub fn open(path: impl AsRef<Path>) -> Result<Cartridge, RomError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(io_error(path))?;
        let header = read_header(&mut file)?;
        debug!(
            "Opened {}: {} ({}), banner at 0x{:X}",
            path.display(),
            header.title,
            header.game_code,
            header.banner_offset
        );
        Ok(Cartridge {
            path: path.to_path_buf(),
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    fn banner_offset(&self) -> Result<u64, RomError> {
        match self.header.banner_offset {
            0 => Err(RomError::NoBanner),
            offset => Ok(offset as u64),
        }
    }

    pub fn banner_version(&self) -> Result<u16, RomError> {
        let bytes = read_at(&self.path, self.banner_offset()?, 2)?;
        read_version(&bytes).ok_or_else(|| BannerDecodeError::TooShort(bytes.len()).into())
    }

    /// Banner size for the stored version, capped by the DSi header field.
    pub fn banner_size(&self) -> Result<usize, RomError> {
        Ok(self.header.banner_size_limit(self.banner_version()?))
    }

    /// Reads the banner record; may return fewer bytes at the end of the file.
    pub fn read_banner_bytes(&self) -> Result<Vec<u8>, RomError> {
        let size = self.banner_size()?;
        let bytes = read_at(&self.path, self.banner_offset()?, size)?;
        if bytes.len() < size {
            debug!("Banner record truncated: {} of {} bytes", bytes.len(), size);
        }
        Ok(bytes)
    }

    pub fn read_banner(&self) -> Result<Banner, RomError> {
        Ok(Banner::from_bytes(&self.read_banner_bytes()?)?)
    }

    pub fn banner_report(&self) -> Result<BannerReport, RomError> {
        Ok(BannerReport::from_bytes(&self.read_banner_bytes()?)?)
    }

    pub fn header_report(&self) -> Result<HeaderReport, RomError> {
        let image = read_at(&self.path, 0, SECURE_AREA_END)?;
        Ok(HeaderReport::new(&self.header, &image))
    }

    /// Bytes reserved for the banner record, or `None` when nothing follows it.
    ///
    /// DSi cartridges declare the room in their header. Otherwise it is the
    /// size of the record currently stored, unless that record ends the file.
    pub fn banner_room(&self) -> Result<Option<usize>, RomError> {
        let offset = self.banner_offset()?;
        if let Some(limit) = self.header.dsi_banner_size {
            return Ok(Some(limit as usize));
        }
        let current = match read_version(&read_at(&self.path, offset, 2)?) {
            Some(version) => calc_banner_size(version),
            None => return Ok(None),
        };
        let file_len = fs::metadata(&self.path)
            .map_err(io_error(&self.path))?
            .len();
        if offset + current as u64 >= file_len {
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }

    /// Writes a serialized banner at the cartridge's banner offset.
    ///
    /// Fails without touching the file if the banner does not fit the room
    /// reserved for it.
    pub fn write_banner(&self, banner: &Banner) -> Result<(), RomError> {
        let offset = self.banner_offset()?;
        let needed = banner.size();
        if let Some(available) = self.banner_room()? {
            if needed > available {
                error!(
                    "Banner of 0x{:X} bytes does not fit 0x{:X} bytes at 0x{:X}",
                    needed, available, offset
                );
                return Err(RomError::BannerTooLarge { available, needed });
            }
        }
        write_at(&self.path, offset, &banner.to_bytes())?;
        info!(
            "Wrote banner version 0x{:04X} to {} at 0x{:X}",
            banner.version,
            self.path.display(),
            offset
        );
        Ok(())
    }

    /// Places a prebuilt banner record into the cartridge with fresh CRCs.
    pub fn put_banner_bytes(&self, bytes: &[u8]) -> Result<Banner, RomError> {
        let mut banner = Banner::from_bytes(bytes)?;
        banner.insert_crc();
        self.write_banner(&banner)?;
        Ok(banner)
    }

    pub fn fix_banner_crc(&self) -> Result<(), RomError> {
        fix_banner_crc(&self.path, self.banner_offset()?, self.banner_size()?)
    }
}
