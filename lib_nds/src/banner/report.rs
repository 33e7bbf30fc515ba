use std::fmt;

use serde::Serialize;

use super::crc::{verify_banner_crc, CrcStatus, SlotCheck};
use super::decoder::BannerDecodeError;
use super::format::{is_known_version, Banner};
use crate::constants::language_name;

#[derive(Debug, Clone, Serialize)]
pub struct TitleReport {
    pub language: usize,
    pub name: &'static str,
    pub lines: Vec<String>,
}

/// Human and machine readable summary of a serialized banner.
#[derive(Debug, Clone, Serialize)]
pub struct BannerReport {
    pub version: u16,
    pub known_version: bool,
    pub size: usize,
    /// Bytes actually present; less than `size` for a truncated record.
    pub available: usize,
    pub crc: Vec<SlotCheck>,
    pub animation_frames: usize,
    pub titles: Vec<TitleReport>,
}

impl BannerReport {
    pub fn from_bytes(bytes: &[u8]) -> Result<BannerReport, BannerDecodeError> {
        let banner = Banner::from_bytes(bytes)?;
        let size = banner.size();
        let available = size.min(bytes.len());
        let titles = (0..banner.language_count())
            .map(|language| TitleReport {
                language,
                name: language_name(language),
                lines: banner.title_lines(language),
            })
            .collect();

        Ok(BannerReport {
            version: banner.version,
            known_version: is_known_version(banner.version),
            size,
            available,
            crc: verify_banner_crc(&bytes[..available]),
            animation_frames: banner.sequence().count(),
            titles,
        })
    }

    pub fn crc_ok(&self) -> bool {
        self.crc
            .iter()
            .all(|check| check.status != CrcStatus::Invalid)
    }
}

impl fmt::Display for BannerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<32}\t0x{:04X}", "Banner version:", self.version)?;
        if !self.known_version {
            write!(f, " (unknown)")?;
        }
        writeln!(f)?;
        writeln!(f, "{:<32}\t0x{:X}", "Banner size:", self.size)?;
        if self.available < self.size {
            writeln!(f, "{:<32}\t0x{:X}", "Bytes available:", self.available)?;
        }

        for check in &self.crc {
            write!(
                f,
                "{:<32}\t0x{:04X}",
                format!("Banner CRC {}:", check.slot),
                check.stored
            )?;
            match check.status {
                CrcStatus::Ok => write!(f, " (OK)")?,
                CrcStatus::Invalid => write!(f, " (INVALID)")?,
                CrcStatus::NotApplicable => {}
            }
            writeln!(f)?;
        }

        if self.animation_frames > 0 {
            writeln!(f, "{:<32}\t{}", "Animation frames:", self.animation_frames)?;
        }

        for title in &self.titles {
            for (number, line) in title.lines.iter().enumerate() {
                writeln!(
                    f,
                    "{:<32}\t{}",
                    format!("{} banner text, line {}:", title.name, number + 1),
                    line
                )?;
            }
        }
        Ok(())
    }
}
