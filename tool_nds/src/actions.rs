use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use lib_nds::banner::GrfIcon;
use lib_nds::header::HeaderReport;
use lib_nds::constants::{ENGLISH, GRF_EXTENSION};
use lib_nds::raster::is_raster_image_filename;
use lib_nds::rom::fix_header_crc;
use lib_nds::{Banner, BannerBuilder, BannerReport, Cartridge, RasterImage};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::ActionError;
use crate::manifest::{language_index, Manifest};

/// How reports are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Per-invocation settings handed to every action.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext {
    pub format: OutputFormat,
}

/// Everything `build-banner` can be fed from the command line.
#[derive(Debug, Default)]
pub struct BuildRequest {
    pub icon: Option<PathBuf>,
    pub animation: Option<PathBuf>,
    pub grf: Option<PathBuf>,
    pub title: Option<OsString>,
    pub lang_titles: Vec<String>,
    pub manifest: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub rom: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ExtractRequest {
    pub bin: Option<PathBuf>,
    pub icon: Option<PathBuf>,
    pub animation: Option<PathBuf>,
}

fn is_grf_filename(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(GRF_EXTENSION))
        .unwrap_or(false)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ActionError> {
    fs::write(path, bytes).map_err(|source| ActionError::Io {
        path: path.display().to_string(),
        source,
    })
}

impl ActionContext {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn print<T: Serialize + std::fmt::Display>(&self, report: &T) -> Result<(), ActionError> {
        match self.format {
            OutputFormat::Text => print!("{}", report),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        }
        Ok(())
    }

    /// Prints the header and banner of a cartridge.
    pub fn info(&self, rom: &Path) -> Result<(), ActionError> {
        let cartridge = Cartridge::open(rom)?;
        let header = cartridge.header_report()?;
        let banner = if cartridge.header().banner_offset != 0 {
            Some(cartridge.banner_report()?)
        } else {
            None
        };

        match self.format {
            OutputFormat::Text => {
                println!("Header information:");
                print!("{}", header);
                if let Some(banner) = &banner {
                    println!();
                    print!("{}", banner);
                }
            }
            OutputFormat::Json => {
                #[derive(Serialize)]
                struct Info<'a> {
                    header: &'a HeaderReport,
                    banner: Option<&'a BannerReport>,
                }
                let info = Info {
                    header: &header,
                    banner: banner.as_ref(),
                };
                println!("{}", serde_json::to_string_pretty(&info)?);
            }
        }
        Ok(())
    }

    /// Prints a standalone banner record.
    pub fn banner_info(&self, path: &Path) -> Result<(), ActionError> {
        let bytes = fs::read(path).map_err(|source| ActionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let report = BannerReport::from_bytes(&bytes)?;
        self.print(&report)
    }

    pub fn fix_banner_crc(&self, rom: &Path) -> Result<(), ActionError> {
        Cartridge::open(rom)?.fix_banner_crc()?;
        println!("Banner CRCs updated.");
        Ok(())
    }

    pub fn fix_header_crc(&self, rom: &Path) -> Result<(), ActionError> {
        fix_header_crc(rom)?;
        println!("Header CRC updated.");
        Ok(())
    }

    /// Builds a banner from images and titles and writes it to a file or cartridge.
    pub fn build_banner(&self, request: BuildRequest) -> Result<(), ActionError> {
        // Step 1: Merge manifest and command line
        let manifest = match &request.manifest {
            Some(path) => Manifest::load(path)?,
            None => Manifest::default(),
        };
        let mut icon = request.icon.or(manifest.icon.clone());
        let animation = request.animation.or(manifest.animation.clone());
        let mut grf = request.grf.or(manifest.grf.clone());

        if let (Some(icon), Some(grf)) = (&icon, &grf) {
            warn!(
                "Both {} and {} given, the GRF icon is used",
                icon.display(),
                grf.display()
            );
        }
        if let Some(path) = icon.take() {
            if is_grf_filename(&path) {
                if grf.is_none() {
                    grf = Some(path);
                }
            } else if grf.is_some() {
                debug!("Dropping {} in favor of the GRF icon", path.display());
            } else {
                if !is_raster_image_filename(&path) {
                    warn!("{} has no known image extension", path.display());
                }
                icon = Some(path);
            }
        }

        let mut titles = manifest.title_entries()?;
        for spec in &request.lang_titles {
            let (language, text) = spec
                .split_once('=')
                .ok_or_else(|| ActionError::InvalidTitleSpec(spec.clone()))?;
            titles.push((language_index(language)?, text.to_string()));
        }

        // Step 2: Load the sources
        let mut builder = BannerBuilder::new();
        if let Some(text) = request.title {
            builder = builder.title(ENGLISH, text);
        }
        for (language, text) in titles {
            builder = builder.title(language, text);
        }

        if let Some(path) = &grf {
            builder = builder.grf(GrfIcon::load(path)?);
        }
        let animation = match &animation {
            Some(path) => Some(RasterImage::load(path)?),
            None => None,
        };
        match (&icon, &animation) {
            (Some(path), _) => builder = builder.icon(RasterImage::load(path)?),
            (None, Some(frames)) if grf.is_none() => {
                debug!("No icon given, using the first animation frame");
                if let Some(first) = frames.subimage(0) {
                    builder = builder.icon(first.to_image(false, false));
                }
            }
            _ => {}
        }
        if let Some(frames) = animation {
            builder = builder.animation(frames);
        }

        // Step 3: Build and write
        let banner = builder.build()?;
        self.write_built_banner(&banner, &request.out, &request.rom)?;
        println!(
            "Banner version 0x{:04X} written ({} bytes).",
            banner.version,
            banner.size()
        );
        Ok(())
    }

    fn write_built_banner(
        &self,
        banner: &Banner,
        out: &Option<PathBuf>,
        rom: &Option<PathBuf>,
    ) -> Result<(), ActionError> {
        if let Some(path) = out {
            write_file(path, &banner.to_bytes())?;
            info!("Wrote banner to {}", path.display());
        }
        if let Some(path) = rom {
            Cartridge::open(path)?.write_banner(banner)?;
        }
        Ok(())
    }

    /// Places a prebuilt banner record into a cartridge.
    pub fn put_banner(&self, rom: &Path, bin: &Path) -> Result<(), ActionError> {
        let bytes = fs::read(bin).map_err(|source| ActionError::Io {
            path: bin.display().to_string(),
            source,
        })?;
        let banner = Cartridge::open(rom)?.put_banner_bytes(&bytes)?;
        println!(
            "Banner version 0x{:04X} from {} written to {}.",
            banner.version,
            bin.display(),
            rom.display()
        );
        Ok(())
    }

    /// Exports the banner of a cartridge as raw bytes and/or images.
    pub fn extract_banner(&self, rom: &Path, request: ExtractRequest) -> Result<(), ActionError> {
        if request.bin.is_none() && request.icon.is_none() && request.animation.is_none() {
            return Err(ActionError::NothingToExtract);
        }

        let cartridge = Cartridge::open(rom)?;
        let bytes = cartridge.read_banner_bytes()?;
        let banner = Banner::from_bytes(&bytes)?;

        if let Some(path) = &request.bin {
            write_file(path, &bytes)?;
            println!("Banner record written to {}.", path.display());
        }
        if let Some(path) = &request.icon {
            banner.icon_image()?.save(path)?;
            println!("Icon written to {}.", path.display());
        }
        if let Some(path) = &request.animation {
            let frames = banner.animation_image()?.ok_or(ActionError::NoAnimation)?;
            frames.save(path)?;
            println!(
                "Animation ({} frames) written to {}.",
                frames.frames(),
                path.display()
            );
        }
        Ok(())
    }
}
