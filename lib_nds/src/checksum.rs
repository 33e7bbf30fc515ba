/// Initial register value used by every checksum in the cartridge format.
pub const CRC16_INIT: u16 = 0xFFFF;

const CRC16_POLY: u16 = 0xA001;

const CRC16_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC16_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continues a CRC-16 computation from `crc` over `data`.
pub fn crc16_update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        let idx = (crc ^ byte as u16) & 0xFF;
        crc = (crc >> 8) ^ CRC16_TABLE[idx as usize];
    }
    crc
}

/// CRC-16 (reflected 0x8005, init 0xFFFF) as used by the header and banner.
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(CRC16_INIT, data)
}
