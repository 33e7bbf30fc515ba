mod common;

use common::{animation, marker_frame, sample_icon, single, temp_path};
use lib_nds::banner::CrcStatus;
use lib_nds::header::RomType;
use lib_nds::rom::{fix_header_crc, RomError};
use lib_nds::{Banner, BannerBuilder, Cartridge};

const BANNER_OFFSET: u32 = 0x400;

fn write_rom(name: &str, banner_offset: u32) -> std::path::PathBuf {
    let mut rom = vec![0u8; 0x400 + 0x840];
    rom[..9].copy_from_slice(b"BANNERTST");
    rom[0x0C..0x10].copy_from_slice(b"ABNE");
    rom[0x20..0x24].copy_from_slice(&0x200u32.to_le_bytes());
    rom[0x68..0x6C].copy_from_slice(&banner_offset.to_le_bytes());
    let path = temp_path(name);
    std::fs::write(&path, &rom).unwrap();
    path
}

const DSI_BANNER_OFFSET: u32 = 0x1000;

/// A cartridge whose 0x840-byte banner slot is followed by other data.
fn write_rom_with_trailer(name: &str) -> std::path::PathBuf {
    let path = write_rom(name, BANNER_OFFSET);
    let mut rom = std::fs::read(&path).unwrap();
    rom.extend_from_slice(&[0xAB; 0x100]);
    std::fs::write(&path, &rom).unwrap();
    path
}

fn write_dsi_rom(name: &str, banner_size: u32) -> std::path::PathBuf {
    let mut rom = vec![0u8; DSI_BANNER_OFFSET as usize + 0x23C0 + 0x100];
    rom[..9].copy_from_slice(b"BANNERDSI");
    rom[0x12] = 0x02;
    rom[0x68..0x6C].copy_from_slice(&DSI_BANNER_OFFSET.to_le_bytes());
    rom[0x208..0x20C].copy_from_slice(&banner_size.to_le_bytes());
    let path = temp_path(name);
    std::fs::write(&path, &rom).unwrap();
    path
}

fn animated_banner() -> Banner {
    let frames: Vec<Vec<u8>> = (0..4).map(marker_frame).collect();
    BannerBuilder::new()
        .icon(single(frames[0].clone()))
        .animation(animation(frames, 100))
        .build()
        .unwrap()
}

#[test]
fn test_write_and_read_banner() {
    let path = write_rom("write_read.nds", BANNER_OFFSET);
    let cartridge = Cartridge::open(&path).unwrap();
    assert_eq!(cartridge.header().title, "BANNERTST");

    let banner = BannerBuilder::new()
        .icon(sample_icon())
        .title(1, "Cartridge;Test")
        .build()
        .unwrap();
    cartridge.write_banner(&banner).unwrap();

    assert_eq!(cartridge.banner_version().unwrap(), 1);
    assert_eq!(cartridge.read_banner().unwrap(), banner);

    let report = cartridge.banner_report().unwrap();
    assert!(report.crc_ok());
    assert_eq!(report.titles[1].lines, vec!["Cartridge", "Test"]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_fix_banner_crc_on_cartridge() {
    let path = write_rom("fix_crc.nds", BANNER_OFFSET);
    let cartridge = Cartridge::open(&path).unwrap();
    let mut banner = BannerBuilder::new().icon(sample_icon()).build().unwrap();
    banner.crc = [0x1234; 4];
    cartridge.write_banner(&banner).unwrap();
    assert_eq!(cartridge.banner_report().unwrap().crc[0].status, CrcStatus::Invalid);

    cartridge.fix_banner_crc().unwrap();
    let report = cartridge.banner_report().unwrap();
    assert_eq!(report.crc[0].status, CrcStatus::Ok);
    assert_eq!(report.crc[1].status, CrcStatus::NotApplicable);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_header_crc_fix() {
    let path = write_rom("header_crc.nds", BANNER_OFFSET);
    let before = Cartridge::open(&path).unwrap().header_report().unwrap();
    assert_eq!(before.rom_type, RomType::Homebrew);
    assert_eq!(before.secure_area_crc.ok, None);

    fix_header_crc(&path).unwrap();
    let after = Cartridge::open(&path).unwrap().header_report().unwrap();
    assert_eq!(after.header_crc.ok, Some(true));
    assert_eq!(after.logo_crc.ok, Some(true));
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_missing_banner_offset() {
    let path = write_rom("no_banner.nds", 0);
    let cartridge = Cartridge::open(&path).unwrap();
    assert!(matches!(cartridge.read_banner(), Err(RomError::NoBanner)));
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_open_missing_file() {
    assert!(matches!(
        Cartridge::open(temp_path("does_not_exist.nds")),
        Err(RomError::Io { .. })
    ));
}

#[test]
fn test_write_rejects_banner_without_room() {
    let path = write_rom_with_trailer("no_room.nds");
    let before = std::fs::read(&path).unwrap();
    let cartridge = Cartridge::open(&path).unwrap();
    assert_eq!(cartridge.banner_room().unwrap(), Some(0x840));

    let result = cartridge.write_banner(&animated_banner());
    assert!(matches!(
        result,
        Err(RomError::BannerTooLarge {
            available: 0x840,
            needed: 0x23C0
        })
    ));
    assert_eq!(std::fs::read(&path).unwrap(), before);

    let banner = BannerBuilder::new().icon(sample_icon()).build().unwrap();
    cartridge.write_banner(&banner).unwrap();
    let after = std::fs::read(&path).unwrap();
    assert_eq!(after.len(), before.len());
    assert!(after[after.len() - 0x100..].iter().all(|&b| b == 0xAB));
    assert_eq!(cartridge.read_banner().unwrap(), banner);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_banner_at_end_of_file_may_grow() {
    let path = write_rom("grow.nds", BANNER_OFFSET);
    let cartridge = Cartridge::open(&path).unwrap();
    assert_eq!(cartridge.banner_room().unwrap(), None);

    let banner = animated_banner();
    cartridge.write_banner(&banner).unwrap();
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        (BANNER_OFFSET as usize + 0x23C0) as u64
    );
    assert_eq!(cartridge.read_banner().unwrap(), banner);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_dsi_banner_room_follows_header() {
    let path = write_dsi_rom("dsi_small.nds", 0x840);
    let cartridge = Cartridge::open(&path).unwrap();
    assert!(cartridge.header().is_dsi());
    assert!(matches!(
        cartridge.write_banner(&animated_banner()),
        Err(RomError::BannerTooLarge {
            available: 0x840,
            needed: 0x23C0
        })
    ));
    std::fs::remove_file(&path).unwrap();

    let path = write_dsi_rom("dsi_large.nds", 0x23C0);
    let cartridge = Cartridge::open(&path).unwrap();
    cartridge.write_banner(&animated_banner()).unwrap();
    let report = cartridge.banner_report().unwrap();
    assert_eq!(report.crc[3].status, CrcStatus::Ok);
    assert_eq!(report.animation_frames, 4);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_put_banner_bytes_round_trip() {
    let source = write_rom("put_source.nds", BANNER_OFFSET);
    let banner = BannerBuilder::new()
        .icon(sample_icon())
        .title(1, "Copied;Banner")
        .build()
        .unwrap();
    Cartridge::open(&source).unwrap().write_banner(&banner).unwrap();
    let extracted = Cartridge::open(&source)
        .unwrap()
        .read_banner_bytes()
        .unwrap();

    let mut stale = extracted.clone();
    stale[2..4].fill(0xEE);
    let target = write_rom_with_trailer("put_target.nds");
    let cartridge = Cartridge::open(&target).unwrap();
    cartridge.put_banner_bytes(&stale).unwrap();

    assert_eq!(cartridge.read_banner_bytes().unwrap(), extracted);
    assert!(cartridge.banner_report().unwrap().crc_ok());
    std::fs::remove_file(&source).unwrap();
    std::fs::remove_file(&target).unwrap();
}
