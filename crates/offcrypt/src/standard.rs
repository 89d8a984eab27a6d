//! Standard Encryption (Office 2007): AES-ECB with SHA-1 key derivation.
//!
//! The binary EncryptionInfo layout, the 50,000-round SHA-1 key stretch, and
//! the verifier round-trip live here. The profile has no integrity check;
//! the u64 cleartext-size prefix outside the ciphertext is all that bounds
//! the zero padding.

use rand::Rng;
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::algo::{aes_ecb_decrypt, aes_ecb_encrypt, ct_eq, password_utf16le};
use crate::error::{Error, Result};

/// Fixed iteration count for the Standard key stretch.
const SPIN_COUNT: u32 = 50_000;

/// The exact provider string Office readers expect, excluding the trailing
/// NUL that is appended on the wire.
const CSP_NAME: &str = "Microsoft Enhanced RSA and AES Cryptographic Provider";

/// `fCryptoAPI | fAES`.
const FLAGS_AES: u32 = 0x24;
/// `fExternal`: an external CryptoAPI provider we never attempt to drive.
const FLAG_EXTERNAL: u32 = 0x10;

const ALG_ID_AES128: u32 = 0x0000_660E;
const ALG_ID_AES192: u32 = 0x0000_660F;
const ALG_ID_AES256: u32 = 0x0000_6610;
const ALG_ID_RC4: u32 = 0x0000_6801;
const ALG_ID_HASH_SHA1: u32 = 0x0000_8004;
const PROVIDER_TYPE_AES: u32 = 0x18;

/// Parsed header from a Standard EncryptionInfo stream.
#[derive(Debug, Clone)]
pub struct StandardHeader {
    pub flags: u32,
    /// Encryption algorithm ID (0x660E/0x660F/0x6610 for AES-128/192/256).
    pub alg_id: u32,
    /// Hash algorithm ID (0x8004 = SHA-1).
    pub alg_id_hash: u32,
    /// Key size in bits.
    pub key_bits: u32,
    pub provider_type: u32,
    pub csp_name: String,
}

/// Parsed verifier from a Standard EncryptionInfo stream.
#[derive(Debug, Clone)]
pub struct StandardVerifier {
    /// 16-byte salt used in key derivation.
    pub salt: [u8; 16],
    /// AES-ECB encrypted verifier, stored at the cleartext length.
    pub encrypted_verifier: [u8; 16],
    /// Declared hash size; writers disagree (20 vs 32) and validation does
    /// not depend on it.
    pub verifier_hash_size: u32,
    /// AES-ECB encrypted verifier hash, stored at the padded length.
    pub encrypted_verifier_hash: [u8; 32],
}

/// A complete Standard descriptor.
#[derive(Debug, Clone)]
pub struct StandardDescriptor {
    pub header: StandardHeader,
    pub verifier: StandardVerifier,
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn malformed(what: &str) -> Error {
    Error::MalformedEnvelope(what.to_string())
}

/// Parse a full Standard EncryptionInfo stream, version header included.
pub(crate) fn parse_descriptor(data: &[u8]) -> Result<StandardDescriptor> {
    if data.len() < 12 {
        return Err(malformed("Standard EncryptionInfo stream is too short"));
    }

    let flags = u32_at(data, 4);
    if flags & FLAG_EXTERNAL != 0 {
        return Err(Error::UnsupportedAlgorithm(
            "external CryptoAPI provider".to_string(),
        ));
    }

    let header_size = u32_at(data, 8) as usize;
    let header_end = 12usize
        .checked_add(header_size)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| malformed("EncryptionHeader size exceeds the stream"))?;
    let header_data = &data[12..header_end];
    if header_data.len() < 32 {
        return Err(malformed("EncryptionHeader is too short"));
    }

    let alg_id = u32_at(header_data, 8);
    let alg_id_hash = u32_at(header_data, 12);
    let key_bits = u32_at(header_data, 16);
    let provider_type = u32_at(header_data, 20);

    let expected_bits = match alg_id {
        ALG_ID_AES128 => 128,
        ALG_ID_AES192 => 192,
        ALG_ID_AES256 => 256,
        ALG_ID_RC4 => {
            return Err(Error::UnsupportedAlgorithm(
                "RC4 (legacy CryptoAPI) encryption".to_string(),
            ));
        }
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "encryption algorithm id 0x{other:04X}"
            )));
        }
    };
    if key_bits != expected_bits {
        return Err(malformed("key size does not match the algorithm id"));
    }
    if alg_id_hash != 0 && alg_id_hash != ALG_ID_HASH_SHA1 {
        return Err(Error::UnsupportedAlgorithm(format!(
            "hash algorithm id 0x{alg_id_hash:04X}"
        )));
    }

    // CSP name: UTF-16LE, NUL-terminated.
    let csp_name: String = char::decode_utf16(
        header_data[32..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0),
    )
    .collect::<std::result::Result<_, _>>()
    .map_err(|_| malformed("CSP name is not valid UTF-16"))?;

    let verifier_data = &data[header_end..];
    if verifier_data.len() < 72 {
        return Err(malformed("EncryptionVerifier is too short"));
    }
    let salt_size = u32_at(verifier_data, 0);
    if salt_size != 16 {
        return Err(malformed("unexpected verifier salt size"));
    }

    let mut salt = [0u8; 16];
    salt.copy_from_slice(&verifier_data[4..20]);
    let mut encrypted_verifier = [0u8; 16];
    encrypted_verifier.copy_from_slice(&verifier_data[20..36]);
    let verifier_hash_size = u32_at(verifier_data, 36);
    let mut encrypted_verifier_hash = [0u8; 32];
    encrypted_verifier_hash.copy_from_slice(&verifier_data[40..72]);

    Ok(StandardDescriptor {
        header: StandardHeader {
            flags,
            alg_id,
            alg_id_hash,
            key_bits,
            provider_type,
            csp_name,
        },
        verifier: StandardVerifier {
            salt,
            encrypted_verifier,
            verifier_hash_size,
            encrypted_verifier_hash,
        },
    })
}

/// Emit a full Standard EncryptionInfo stream for the given verifier fields.
fn emit_descriptor(
    key_bits: u32,
    salt: &[u8; 16],
    encrypted_verifier: &[u8; 16],
    encrypted_verifier_hash: &[u8; 32],
) -> Vec<u8> {
    let alg_id = match key_bits {
        128 => ALG_ID_AES128,
        192 => ALG_ID_AES192,
        _ => ALG_ID_AES256,
    };

    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(&4u16.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&FLAGS_AES.to_le_bytes());

    let size_field = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());

    let header_start = buf.len();
    buf.extend_from_slice(&FLAGS_AES.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&alg_id.to_le_bytes());
    buf.extend_from_slice(&ALG_ID_HASH_SHA1.to_le_bytes());
    buf.extend_from_slice(&key_bits.to_le_bytes());
    buf.extend_from_slice(&PROVIDER_TYPE_AES.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    for unit in CSP_NAME.encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
    buf.extend_from_slice(&0u16.to_le_bytes());

    let header_size = (buf.len() - header_start) as u32;
    buf[size_field..size_field + 4].copy_from_slice(&header_size.to_le_bytes());

    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(salt);
    buf.extend_from_slice(encrypted_verifier);
    buf.extend_from_slice(&0x20u32.to_le_bytes());
    buf.extend_from_slice(encrypted_verifier_hash);

    buf
}

/// Derive the AES key from a password using the Standard key stretch.
///
/// 1. `h = SHA1(salt || password_utf16le)`
/// 2. `h = SHA1(u32le(i) || h)` for i in 0..50,000
/// 3. `h' = SHA1(h || u32le(0))`
/// 4. Expand through the 0x36/0x5C fill blocks and truncate to the key size.
pub(crate) fn derive_key(password: &str, salt: &[u8; 16], key_bits: u32) -> Zeroizing<Vec<u8>> {
    let password_bytes = password_utf16le(password);

    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(password_bytes.as_slice());
    let mut hash = hasher.finalize();

    for i in 0u32..SPIN_COUNT {
        let mut hasher = Sha1::new();
        hasher.update(i.to_le_bytes());
        hasher.update(hash);
        hash = hasher.finalize();
    }

    let mut hasher = Sha1::new();
    hasher.update(hash);
    hasher.update(0u32.to_le_bytes());
    let stretched = hasher.finalize();

    let mut x1_input = [0x36u8; 64];
    for (slot, byte) in x1_input.iter_mut().zip(stretched.iter()) {
        *slot ^= byte;
    }
    let x1 = Sha1::digest(x1_input);

    let mut x2_input = [0x5Cu8; 64];
    for (slot, byte) in x2_input.iter_mut().zip(stretched.iter()) {
        *slot ^= byte;
    }
    let x2 = Sha1::digest(x2_input);

    let mut combined = Zeroizing::new(Vec::with_capacity(40));
    combined.extend_from_slice(&x1);
    combined.extend_from_slice(&x2);
    combined.truncate((key_bits / 8) as usize);
    combined
}

/// Check a password against the descriptor's verifier. Returns the derived
/// key on success.
pub(crate) fn verify_password(
    descriptor: &StandardDescriptor,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    let key = derive_key(password, &descriptor.verifier.salt, descriptor.header.key_bits);

    let verifier = aes_ecb_decrypt(&key, &descriptor.verifier.encrypted_verifier)?;
    let expected = Sha1::digest(&verifier);
    let actual = aes_ecb_decrypt(&key, &descriptor.verifier.encrypted_verifier_hash)?;

    if !ct_eq(&expected[..16], &actual[..16]) {
        return Err(Error::InvalidPassword);
    }
    Ok(key)
}

/// Encrypt a buffered package. Returns the EncryptionInfo stream and the
/// EncryptedPackage stream (`u64le size || ciphertext`).
pub(crate) fn encrypt_package(
    package: &[u8],
    password: &str,
    key_bits: u32,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; 16];
    let mut verifier = [0u8; 16];
    rng.fill(&mut salt);
    rng.fill(&mut verifier);

    let key = derive_key(password, &salt, key_bits);

    // The encrypted verifier keeps the 16-byte cleartext length while the
    // encrypted hash keeps the 32-byte padded length.
    let encrypted_verifier: [u8; 16] = aes_ecb_encrypt(&key, &verifier)?[..16]
        .try_into()
        .expect("AES-ECB of one block is one block");
    let verifier_hash = Sha1::digest(verifier);
    let mut padded_hash = [0u8; 32];
    padded_hash[..verifier_hash.len()].copy_from_slice(&verifier_hash);
    let encrypted_verifier_hash: [u8; 32] = aes_ecb_encrypt(&key, &padded_hash)?[..32]
        .try_into()
        .expect("AES-ECB of two blocks is two blocks");

    let info = emit_descriptor(key_bits, &salt, &encrypted_verifier, &encrypted_verifier_hash);

    let ciphertext = aes_ecb_encrypt(&key, package)?;
    let mut body = Vec::with_capacity(8 + ciphertext.len());
    body.extend_from_slice(&(package.len() as u64).to_le_bytes());
    body.extend_from_slice(&ciphertext);

    Ok((info, body))
}

/// Decrypt an EncryptedPackage stream, truncating the zero padding to the
/// declared cleartext size.
pub(crate) fn decrypt_package<R: std::io::Read, W: std::io::Write>(
    body: &mut R,
    key: &[u8],
    output: &mut W,
) -> Result<()> {
    let mut prefix = [0u8; 8];
    body.read_exact(&mut prefix)
        .map_err(|_| malformed("EncryptedPackage is too short for its size prefix"))?;
    let cleartext_len = u64::from_le_bytes(prefix);

    let mut ciphertext = Vec::new();
    body.read_to_end(&mut ciphertext)?;
    let plaintext = aes_ecb_decrypt(key, &ciphertext)?;
    if cleartext_len > plaintext.len() as u64 {
        return Err(malformed("declared cleartext size exceeds the ciphertext"));
    }
    output.write_all(&plaintext[..cleartext_len as usize])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Known vector from the msoffcrypto-tool reference implementation.
    const PASSWORD: &str = "Password1234_";
    const SALT: [u8; 16] = [
        0xe8, 0x82, 0x66, 0x49, 0x0c, 0x5b, 0xd1, 0xee, 0xbd, 0x2b, 0x43, 0x94, 0xe3, 0xf8, 0x30,
        0xef,
    ];
    const EXPECTED_KEY_128: [u8; 16] = [
        0x40, 0xb1, 0x3a, 0x71, 0xf9, 0x0b, 0x96, 0x6e, 0x37, 0x54, 0x08, 0xf2, 0xd1, 0x81, 0xa1,
        0xaa,
    ];
    const ENCRYPTED_VERIFIER: [u8; 16] = [
        0x51, 0x6f, 0x73, 0x2e, 0x96, 0x6f, 0xac, 0x17, 0xb1, 0xc5, 0xd7, 0xd8, 0xcc, 0x36, 0xc9,
        0x28,
    ];
    const ENCRYPTED_VERIFIER_HASH: [u8; 32] = [
        0x2b, 0x61, 0x68, 0xda, 0xbe, 0x29, 0x11, 0xad, 0x2b, 0xd3, 0x7c, 0x17, 0x46, 0x74, 0x5c,
        0x14, 0xd3, 0xcf, 0x1b, 0xb1, 0x40, 0xa4, 0x8f, 0x4e, 0x6f, 0x3d, 0x23, 0x88, 0x08, 0x72,
        0xb1, 0x6a,
    ];

    fn vector_descriptor() -> StandardDescriptor {
        StandardDescriptor {
            header: StandardHeader {
                flags: FLAGS_AES,
                alg_id: ALG_ID_AES128,
                alg_id_hash: ALG_ID_HASH_SHA1,
                key_bits: 128,
                provider_type: PROVIDER_TYPE_AES,
                csp_name: CSP_NAME.to_string(),
            },
            verifier: StandardVerifier {
                salt: SALT,
                encrypted_verifier: ENCRYPTED_VERIFIER,
                verifier_hash_size: 20,
                encrypted_verifier_hash: ENCRYPTED_VERIFIER_HASH,
            },
        }
    }

    #[test]
    fn test_derive_key_matches_reference_vector() {
        let key = derive_key(PASSWORD, &SALT, 128);
        assert_eq!(key.as_slice(), &EXPECTED_KEY_128);
    }

    #[test]
    fn test_verify_password_accepts_reference_vector() {
        let descriptor = vector_descriptor();
        let key = verify_password(&descriptor, PASSWORD).unwrap();
        assert_eq!(key.as_slice(), &EXPECTED_KEY_128);
    }

    #[test]
    fn test_verify_password_rejects_wrong_password() {
        let descriptor = vector_descriptor();
        assert!(matches!(
            verify_password(&descriptor, "password1234_"),
            Err(Error::InvalidPassword)
        ));
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let salt = [42u8; 16];
        assert_eq!(
            derive_key("test", &salt, 256).as_slice(),
            derive_key("test", &salt, 256).as_slice()
        );
        assert_ne!(
            derive_key("test", &salt, 256).as_slice(),
            derive_key("Test", &salt, 256).as_slice()
        );
    }

    #[test]
    fn test_emit_parse_roundtrip() {
        let salt = [1u8; 16];
        let ev = [2u8; 16];
        let evh = [3u8; 32];
        let info = emit_descriptor(192, &salt, &ev, &evh);
        let descriptor = parse_descriptor(&info).unwrap();

        assert_eq!(descriptor.header.alg_id, ALG_ID_AES192);
        assert_eq!(descriptor.header.key_bits, 192);
        assert_eq!(descriptor.header.provider_type, PROVIDER_TYPE_AES);
        assert_eq!(descriptor.header.csp_name, CSP_NAME);
        assert_eq!(descriptor.verifier.salt, salt);
        assert_eq!(descriptor.verifier.encrypted_verifier, ev);
        assert_eq!(descriptor.verifier.verifier_hash_size, 0x20);
        assert_eq!(descriptor.verifier.encrypted_verifier_hash, evh);
    }

    #[test]
    fn test_parse_rejects_short_stream() {
        assert!(matches!(
            parse_descriptor(&[0u8; 10]),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_parse_rejects_external_flag() {
        let info = emit_descriptor(128, &[0u8; 16], &[0u8; 16], &[0u8; 32]);
        let mut patched = info;
        patched[4] |= FLAG_EXTERNAL as u8;
        assert!(matches!(
            parse_descriptor(&patched),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_package_roundtrip_buffered() {
        let package: Vec<u8> = (0u8..32).collect();
        let (info, body) = encrypt_package(&package, "pass", 128).unwrap();
        assert_eq!(body.len(), 8 + 32);

        let descriptor = parse_descriptor(&info).unwrap();
        let key = verify_password(&descriptor, "pass").unwrap();
        let mut recovered = Vec::new();
        decrypt_package(&mut &body[..], &key, &mut recovered).unwrap();
        assert_eq!(recovered, package);
    }
}
