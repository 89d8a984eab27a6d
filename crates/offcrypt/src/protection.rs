//! Legacy 16-bit sheet-protection password hash.
//!
//! This is the rotate-and-XOR hash Excel stores in `sheetProtection` and
//! `workbookProtection` attributes. It is NOT cryptographically secure and
//! shares nothing with the envelope codec; it is exposed because the same
//! callers need both.

/// Hash a protection password into the 16-bit value Excel stores, typically
/// rendered as a 4-digit uppercase hex string.
pub fn sheet_protection_hash(password: &str) -> u16 {
    let bytes = password.as_bytes();
    let mut hash: u16 = 0;
    for &byte in bytes.iter().rev() {
        hash ^= byte as u16;
        hash = ((hash >> 14) & 0x01) | ((hash << 1) & 0x7FFF);
    }
    hash ^ 0xCE4B ^ bytes.len() as u16
}
