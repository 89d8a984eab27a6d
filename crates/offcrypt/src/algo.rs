//! Algorithm selection and shared cryptographic primitives.
//!
//! MS-OFFCRYPTO descriptors name their ciphers and hashes as strings. This
//! module resolves those names into small tagged variants and applies them
//! through the RustCrypto block-cipher and digest crates, so the rest of the
//! codec never touches a concrete cipher type.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{
    AsyncStreamCipher, BlockCipher, BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit,
    KeyIvInit,
};
use hmac::{Hmac, Mac};
use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Block key constants appended to the password base hash when deriving
/// purpose-specific keys (MS-OFFCRYPTO 2.3.4.13 and 2.3.4.14).
pub mod block_keys {
    /// Block key for deriving the secret (content) key encryption key.
    pub const KEY_VALUE: &[u8] = &[0x14, 0x6e, 0x0b, 0xe7, 0xab, 0xac, 0xd0, 0xd6];
    /// Block key for deriving the verifier hash input encryption key.
    pub const VERIFIER_HASH_INPUT: &[u8] = &[0xfe, 0xa7, 0xd2, 0x76, 0x3b, 0x4b, 0x9e, 0x79];
    /// Block key for deriving the verifier hash value encryption key.
    pub const VERIFIER_HASH_VALUE: &[u8] = &[0xd7, 0xaa, 0x0f, 0x6d, 0x30, 0x61, 0x34, 0x4e];
    /// Block key for the HMAC key IV.
    pub const HMAC_KEY: &[u8] = &[0x5f, 0xb2, 0xad, 0x01, 0x0c, 0xb9, 0xe1, 0xf6];
    /// Block key for the HMAC value IV.
    pub const HMAC_VALUE: &[u8] = &[0xa0, 0x67, 0x7f, 0x02, 0xb2, 0x2c, 0x84, 0x33];
}

/// Substituted for an empty password, as legacy Excel does.
pub(crate) const DEFAULT_PASSWORD: &str = "VelvetSweatshop";

/// Encode a password as UTF-16LE without BOM or terminator. An empty
/// password stands for the legacy default.
pub(crate) fn password_utf16le(password: &str) -> Zeroizing<Vec<u8>> {
    let effective = if password.is_empty() {
        DEFAULT_PASSWORD
    } else {
        password
    };
    Zeroizing::new(
        effective
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect(),
    )
}

/// Truncate or right-pad `bytes` to exactly `len` bytes with `fill`.
pub(crate) fn fix_size(mut bytes: Vec<u8>, len: usize, fill: u8) -> Vec<u8> {
    if bytes.len() > len {
        bytes.truncate(len);
    } else {
        bytes.resize(len, fill);
    }
    bytes
}

/// Constant-time equality. A length mismatch short-circuits; lengths are not
/// secret here, only contents are.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Fill a buffer until it is full or the reader is exhausted. Returns the
/// number of bytes read.
pub(crate) fn read_full<R: std::io::Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Feed every chunk of `reader` (until EOF) to `consume`.
pub(crate) fn for_each_chunk<R: std::io::Read>(
    reader: &mut R,
    mut consume: impl FnMut(&[u8]),
) -> std::io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf)? {
            0 => return Ok(()),
            n => consume(&buf[..n]),
        }
    }
}

/// Hash algorithms an Agile descriptor may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Ripemd160,
}

macro_rules! digest_parts {
    ($hasher:ty, $parts:expr) => {{
        let mut hasher = <$hasher>::new();
        for part in $parts {
            hasher.update(part);
        }
        hasher.finalize().to_vec()
    }};
}

impl HashAlgorithm {
    /// Resolve the `hashAlgorithm` attribute value.
    pub(crate) fn from_wire_name(name: &str) -> Result<Self> {
        match name {
            "MD5" => Ok(Self::Md5),
            "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            "SHA384" | "SHA-384" => Ok(Self::Sha384),
            "SHA512" | "SHA-512" => Ok(Self::Sha512),
            "RIPEMD-160" | "RIPEMD160" => Ok(Self::Ripemd160),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "hash algorithm {other:?}"
            ))),
        }
    }

    pub(crate) fn wire_name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Ripemd160 => "RIPEMD-160",
        }
    }

    /// Digest output length in bytes.
    pub(crate) fn size(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
            Self::Ripemd160 => 20,
        }
    }

    /// Hash the concatenation of `parts`.
    pub(crate) fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            Self::Md5 => digest_parts!(Md5, parts),
            Self::Sha1 => digest_parts!(Sha1, parts),
            Self::Sha256 => digest_parts!(Sha256, parts),
            Self::Sha384 => digest_parts!(Sha384, parts),
            Self::Sha512 => digest_parts!(Sha512, parts),
            Self::Ripemd160 => digest_parts!(Ripemd160, parts),
        }
    }
}

/// Incremental HMAC over the selected hash, for the integrity pass over the
/// encrypted package stream.
pub(crate) enum HmacWriter {
    Md5(Hmac<Md5>),
    Sha1(Hmac<Sha1>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
    Ripemd160(Hmac<Ripemd160>),
}

impl HmacWriter {
    pub(crate) fn new(algorithm: HashAlgorithm, key: &[u8]) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => {
                Self::Md5(Mac::new_from_slice(key).expect("HMAC accepts any key length"))
            }
            HashAlgorithm::Sha1 => {
                Self::Sha1(Mac::new_from_slice(key).expect("HMAC accepts any key length"))
            }
            HashAlgorithm::Sha256 => {
                Self::Sha256(Mac::new_from_slice(key).expect("HMAC accepts any key length"))
            }
            HashAlgorithm::Sha384 => {
                Self::Sha384(Mac::new_from_slice(key).expect("HMAC accepts any key length"))
            }
            HashAlgorithm::Sha512 => {
                Self::Sha512(Mac::new_from_slice(key).expect("HMAC accepts any key length"))
            }
            HashAlgorithm::Ripemd160 => {
                Self::Ripemd160(Mac::new_from_slice(key).expect("HMAC accepts any key length"))
            }
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(mac) => mac.update(data),
            Self::Sha1(mac) => mac.update(data),
            Self::Sha256(mac) => mac.update(data),
            Self::Sha384(mac) => mac.update(data),
            Self::Sha512(mac) => mac.update(data),
            Self::Ripemd160(mac) => mac.update(data),
        }
    }

    pub(crate) fn finalize(self) -> Vec<u8> {
        match self {
            Self::Md5(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha1(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha256(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha384(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha512(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Ripemd160(mac) => mac.finalize().into_bytes().to_vec(),
        }
    }
}

/// Symmetric ciphers an Agile descriptor may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Aes,
    Des,
    TripleDes,
    TripleDes112,
    Rc2,
}

impl CipherAlgorithm {
    /// Resolve the `cipherAlgorithm` attribute value.
    pub(crate) fn from_wire_name(name: &str) -> Result<Self> {
        match name {
            "AES" => Ok(Self::Aes),
            "DES" => Ok(Self::Des),
            "3DES" => Ok(Self::TripleDes),
            "3DES_112" => Ok(Self::TripleDes112),
            "RC2" => Ok(Self::Rc2),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "cipher algorithm {other:?}"
            ))),
        }
    }

    pub(crate) fn wire_name(self) -> &'static str {
        match self {
            Self::Aes => "AES",
            Self::Des => "DES",
            Self::TripleDes => "3DES",
            Self::TripleDes112 => "3DES_112",
            Self::Rc2 => "RC2",
        }
    }
}

/// Block chaining modes an Agile descriptor may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainingMode {
    /// Cipher block chaining.
    Cbc,
    /// Cipher feedback with an 8-bit window.
    Cfb,
}

impl ChainingMode {
    pub(crate) fn from_wire_name(name: &str) -> Result<Self> {
        match name {
            "ChainingModeCBC" => Ok(Self::Cbc),
            "ChainingModeCFB" => Ok(Self::Cfb),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "chaining mode {other:?}"
            ))),
        }
    }

    pub(crate) fn wire_name(self) -> &'static str {
        match self {
            Self::Cbc => "ChainingModeCBC",
            Self::Cfb => "ChainingModeCFB",
        }
    }
}

enum Direction {
    Encrypt,
    Decrypt,
}

/// A fully resolved symmetric cipher: algorithm, key width, chaining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CipherSpec {
    pub algorithm: CipherAlgorithm,
    pub key_bits: u32,
    pub chaining: ChainingMode,
}

impl CipherSpec {
    /// Reject (algorithm, key width) pairs the cipher cannot take. Called
    /// eagerly, before any key material exists.
    pub(crate) fn validate(&self) -> Result<()> {
        let ok = match self.algorithm {
            CipherAlgorithm::Aes => matches!(self.key_bits, 128 | 192 | 256),
            CipherAlgorithm::Des => self.key_bits == 64,
            CipherAlgorithm::TripleDes => self.key_bits == 192,
            CipherAlgorithm::TripleDes112 => self.key_bits == 128,
            CipherAlgorithm::Rc2 => (40..=128).contains(&self.key_bits) && self.key_bits % 8 == 0,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::UnsupportedAlgorithm(format!(
                "{} with {} key bits",
                self.algorithm.wire_name(),
                self.key_bits
            )))
        }
    }

    pub(crate) fn block_len(&self) -> usize {
        match self.algorithm {
            CipherAlgorithm::Aes => 16,
            _ => 8,
        }
    }

    pub(crate) fn key_len(&self) -> usize {
        (self.key_bits / 8) as usize
    }

    /// Encrypt `data`, zero-padding to the cipher block first. The returned
    /// ciphertext keeps the padded length.
    pub(crate) fn encrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut buf = pad_to_block(data, self.block_len());
        self.apply(key, iv, &mut buf, Direction::Encrypt)?;
        Ok(buf)
    }

    /// Decrypt `data`, zero-padding short trailing input first. The returned
    /// plaintext is truncated back to the input length.
    pub(crate) fn decrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let input_len = data.len();
        let mut buf = pad_to_block(data, self.block_len());
        self.apply(key, iv, &mut buf, Direction::Decrypt)?;
        buf.truncate(input_len);
        Ok(buf)
    }

    fn apply(&self, key: &[u8], iv: &[u8], buf: &mut [u8], direction: Direction) -> Result<()> {
        if key.len() != self.key_len() {
            return Err(Error::MalformedEnvelope(format!(
                "cipher key is {} bytes, descriptor requires {}",
                key.len(),
                self.key_len()
            )));
        }
        if iv.len() != self.block_len() {
            return Err(Error::MalformedEnvelope(format!(
                "cipher IV is {} bytes, block size is {}",
                iv.len(),
                self.block_len()
            )));
        }
        match self.chaining {
            ChainingMode::Cbc => match self.algorithm {
                CipherAlgorithm::Aes => match key.len() {
                    16 => cbc_apply::<aes::Aes128>(key, iv, buf, direction),
                    24 => cbc_apply::<aes::Aes192>(key, iv, buf, direction),
                    _ => cbc_apply::<aes::Aes256>(key, iv, buf, direction),
                },
                CipherAlgorithm::Des => cbc_apply::<des::Des>(key, iv, buf, direction),
                CipherAlgorithm::TripleDes => cbc_apply::<des::TdesEde3>(key, iv, buf, direction),
                CipherAlgorithm::TripleDes112 => {
                    cbc_apply::<des::TdesEde2>(key, iv, buf, direction)
                }
                CipherAlgorithm::Rc2 => rc2_cbc_apply(self.key_bits, key, iv, buf, direction),
            },
            ChainingMode::Cfb => match self.algorithm {
                CipherAlgorithm::Aes => match key.len() {
                    16 => cfb_apply::<aes::Aes128>(key, iv, buf, direction),
                    24 => cfb_apply::<aes::Aes192>(key, iv, buf, direction),
                    _ => cfb_apply::<aes::Aes256>(key, iv, buf, direction),
                },
                CipherAlgorithm::Des => cfb_apply::<des::Des>(key, iv, buf, direction),
                CipherAlgorithm::TripleDes => cfb_apply::<des::TdesEde3>(key, iv, buf, direction),
                CipherAlgorithm::TripleDes112 => {
                    cfb_apply::<des::TdesEde2>(key, iv, buf, direction)
                }
                CipherAlgorithm::Rc2 => rc2_cfb_apply(self.key_bits, key, iv, buf, direction),
            },
        }
    }
}

fn pad_to_block(data: &[u8], block_len: usize) -> Vec<u8> {
    let mut buf = data.to_vec();
    let rem = buf.len() % block_len;
    if rem != 0 {
        buf.resize(buf.len() + block_len - rem, 0);
    }
    buf
}

fn init_error(_: aes::cipher::InvalidLength) -> Error {
    Error::MalformedEnvelope("cipher key or IV length mismatch".to_string())
}

fn alignment_error() -> Error {
    Error::MalformedEnvelope("cipher input is not block aligned".to_string())
}

fn cbc_apply<C>(key: &[u8], iv: &[u8], buf: &mut [u8], direction: Direction) -> Result<()>
where
    C: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit,
{
    match direction {
        Direction::Encrypt => {
            let len = buf.len();
            cbc::Encryptor::<C>::new_from_slices(key, iv)
                .map_err(init_error)?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map_err(|_| alignment_error())?;
        }
        Direction::Decrypt => {
            cbc::Decryptor::<C>::new_from_slices(key, iv)
                .map_err(init_error)?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map_err(|_| alignment_error())?;
        }
    }
    Ok(())
}

fn cfb_apply<C>(key: &[u8], iv: &[u8], buf: &mut [u8], direction: Direction) -> Result<()>
where
    C: BlockCipher + BlockEncryptMut + KeyInit,
{
    match direction {
        Direction::Encrypt => cfb8::Encryptor::<C>::new_from_slices(key, iv)
            .map_err(init_error)?
            .encrypt(buf),
        Direction::Decrypt => cfb8::Decryptor::<C>::new_from_slices(key, iv)
            .map_err(init_error)?
            .decrypt(buf),
    }
    Ok(())
}

// RC2 takes a variable-length key with an effective key width, so it cannot
// go through the fixed-size `KeyInit` path the other ciphers use.
fn rc2_cbc_apply(
    key_bits: u32,
    key: &[u8],
    iv: &[u8],
    buf: &mut [u8],
    direction: Direction,
) -> Result<()> {
    let cipher = rc2::Rc2::new_with_eff_key_len(key, key_bits as usize);
    match direction {
        Direction::Encrypt => {
            let len = buf.len();
            cbc::Encryptor::inner_iv_slice_init(cipher, iv)
                .map_err(init_error)?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map_err(|_| alignment_error())?;
        }
        Direction::Decrypt => {
            cbc::Decryptor::inner_iv_slice_init(cipher, iv)
                .map_err(init_error)?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map_err(|_| alignment_error())?;
        }
    }
    Ok(())
}

fn rc2_cfb_apply(
    key_bits: u32,
    key: &[u8],
    iv: &[u8],
    buf: &mut [u8],
    direction: Direction,
) -> Result<()> {
    let cipher = rc2::Rc2::new_with_eff_key_len(key, key_bits as usize);
    match direction {
        Direction::Encrypt => cfb8::Encryptor::inner_iv_slice_init(cipher, iv)
            .map_err(init_error)?
            .encrypt(buf),
        Direction::Decrypt => cfb8::Decryptor::inner_iv_slice_init(cipher, iv)
            .map_err(init_error)?
            .decrypt(buf),
    }
    Ok(())
}

/// AES-ECB encryption for the Standard profile, zero-padded to the block.
pub(crate) fn aes_ecb_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut buf = pad_to_block(data, 16);
    let len = buf.len();
    match key.len() {
        16 => {
            ecb::Encryptor::<aes::Aes128>::new_from_slice(key)
                .map_err(init_error)?
                .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                .map_err(|_| alignment_error())?;
        }
        24 => {
            ecb::Encryptor::<aes::Aes192>::new_from_slice(key)
                .map_err(init_error)?
                .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                .map_err(|_| alignment_error())?;
        }
        32 => {
            ecb::Encryptor::<aes::Aes256>::new_from_slice(key)
                .map_err(init_error)?
                .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                .map_err(|_| alignment_error())?;
        }
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "AES key length {other}"
            )));
        }
    }
    Ok(buf)
}

/// AES-ECB decryption for the Standard profile. Short trailing input is
/// zero-padded first; conformant writers never emit it.
pub(crate) fn aes_ecb_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut buf = pad_to_block(data, 16);
    match key.len() {
        16 => {
            ecb::Decryptor::<aes::Aes128>::new_from_slice(key)
                .map_err(init_error)?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| alignment_error())?;
        }
        24 => {
            ecb::Decryptor::<aes::Aes192>::new_from_slice(key)
                .map_err(init_error)?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| alignment_error())?;
        }
        32 => {
            ecb::Decryptor::<aes::Aes256>::new_from_slice(key)
                .map_err(init_error)?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| alignment_error())?;
        }
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "AES key length {other}"
            )));
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_utf16le_plain() {
        assert_eq!(password_utf16le("ab").as_slice(), &[0x61, 0x00, 0x62, 0x00]);
    }

    #[test]
    fn test_password_utf16le_empty_uses_default() {
        let empty = password_utf16le("");
        let default = password_utf16le(DEFAULT_PASSWORD);
        assert_eq!(empty.as_slice(), default.as_slice());
    }

    #[test]
    fn test_fix_size_pads_and_truncates() {
        assert_eq!(fix_size(vec![1, 2], 4, 0x36), vec![1, 2, 0x36, 0x36]);
        assert_eq!(fix_size(vec![1, 2, 3, 4, 5], 4, 0x36), vec![1, 2, 3, 4]);
        assert_eq!(fix_size(vec![7; 4], 4, 0), vec![7; 4]);
    }

    #[test]
    fn test_ct_eq() {
        assert!(ct_eq(b"abcd", b"abcd"));
        assert!(!ct_eq(b"abcd", b"abce"));
        assert!(!ct_eq(b"abcd", b"abc"));
    }

    #[test]
    fn test_hash_wire_names_roundtrip() {
        for alg in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
            HashAlgorithm::Ripemd160,
        ] {
            assert_eq!(HashAlgorithm::from_wire_name(alg.wire_name()).unwrap(), alg);
            assert_eq!(alg.digest(&[b"x"]).len(), alg.size());
        }
        assert!(matches!(
            HashAlgorithm::from_wire_name("WHIRLPOOL"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_cipher_wire_names_roundtrip() {
        for alg in [
            CipherAlgorithm::Aes,
            CipherAlgorithm::Des,
            CipherAlgorithm::TripleDes,
            CipherAlgorithm::TripleDes112,
            CipherAlgorithm::Rc2,
        ] {
            assert_eq!(
                CipherAlgorithm::from_wire_name(alg.wire_name()).unwrap(),
                alg
            );
        }
        assert!(matches!(
            CipherAlgorithm::from_wire_name("RC4"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_chaining_wire_names() {
        assert_eq!(
            ChainingMode::from_wire_name("ChainingModeCBC").unwrap(),
            ChainingMode::Cbc
        );
        assert_eq!(
            ChainingMode::from_wire_name("ChainingModeCFB").unwrap(),
            ChainingMode::Cfb
        );
        assert!(ChainingMode::from_wire_name("ChainingModeECB").is_err());
    }

    #[test]
    fn test_cipher_spec_validate() {
        let good = CipherSpec {
            algorithm: CipherAlgorithm::Aes,
            key_bits: 256,
            chaining: ChainingMode::Cbc,
        };
        assert!(good.validate().is_ok());

        let bad = CipherSpec {
            algorithm: CipherAlgorithm::Aes,
            key_bits: 512,
            chaining: ChainingMode::Cbc,
        };
        assert!(matches!(
            bad.validate(),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    fn roundtrip(spec: CipherSpec, key: &[u8], data: &[u8]) {
        let iv = vec![0x11u8; spec.block_len()];
        let ciphertext = spec.encrypt(key, &iv, data).unwrap();
        assert_eq!(ciphertext.len() % spec.block_len(), 0);
        assert_ne!(&ciphertext[..data.len().min(ciphertext.len())], data);
        let plaintext = spec.decrypt(key, &iv, &ciphertext).unwrap();
        assert_eq!(&plaintext[..data.len()], data);
    }

    #[test]
    fn test_aes_cbc_roundtrip() {
        let spec = CipherSpec {
            algorithm: CipherAlgorithm::Aes,
            key_bits: 256,
            chaining: ChainingMode::Cbc,
        };
        roundtrip(spec, &[0x42; 32], b"a short, unaligned message");
    }

    #[test]
    fn test_aes_cfb_roundtrip() {
        let spec = CipherSpec {
            algorithm: CipherAlgorithm::Aes,
            key_bits: 128,
            chaining: ChainingMode::Cfb,
        };
        roundtrip(spec, &[0x42; 16], b"cipher feedback with an 8-bit window");
    }

    #[test]
    fn test_des_and_rc2_roundtrip() {
        roundtrip(
            CipherSpec {
                algorithm: CipherAlgorithm::Des,
                key_bits: 64,
                chaining: ChainingMode::Cbc,
            },
            &[0x42; 8],
            b"legacy cipher input",
        );
        roundtrip(
            CipherSpec {
                algorithm: CipherAlgorithm::TripleDes,
                key_bits: 192,
                chaining: ChainingMode::Cbc,
            },
            &[0x42; 24],
            b"legacy cipher input",
        );
        roundtrip(
            CipherSpec {
                algorithm: CipherAlgorithm::Rc2,
                key_bits: 128,
                chaining: ChainingMode::Cbc,
            },
            &[0x42; 16],
            b"legacy cipher input",
        );
    }

    #[test]
    fn test_aes_ecb_roundtrip() {
        let key = [0x24u8; 16];
        let data = b"exactly sixteen!";
        let ciphertext = aes_ecb_encrypt(&key, data).unwrap();
        assert_eq!(ciphertext.len(), 16);
        let plaintext = aes_ecb_decrypt(&key, &ciphertext).unwrap();
        assert_eq!(&plaintext, data);
    }

    #[test]
    fn test_hmac_writer_matches_one_shot() {
        let mut split = HmacWriter::new(HashAlgorithm::Sha512, b"key");
        split.update(b"hello ");
        split.update(b"world");
        let mut whole = HmacWriter::new(HashAlgorithm::Sha512, b"key");
        whole.update(b"hello world");
        assert_eq!(split.finalize(), whole.finalize());
    }

    #[test]
    fn test_read_full_and_chunks() {
        let data = vec![7u8; 10_000];
        let mut cursor = std::io::Cursor::new(&data);
        let mut buf = vec![0u8; 4096];
        assert_eq!(read_full(&mut cursor, &mut buf).unwrap(), 4096);
        assert_eq!(read_full(&mut cursor, &mut buf).unwrap(), 4096);
        assert_eq!(read_full(&mut cursor, &mut buf).unwrap(), 10_000 - 8192);

        let mut total = 0usize;
        let mut cursor = std::io::Cursor::new(&data);
        for_each_chunk(&mut cursor, |chunk| total += chunk.len()).unwrap();
        assert_eq!(total, data.len());
    }
}
