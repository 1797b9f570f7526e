/// Reflected CCITT polynomial (0x1021 bit-reversed).
const POLY: u16 = 0x8408;
const INIT: u16 = 0xFFFF;

/// CRC16 as computed by the receiver: init `0xFFFF`, reflected polynomial
/// `0x8408`, bitwise, no final XOR (CRC-16/MCRF4XX parameters).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = INIT;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}
