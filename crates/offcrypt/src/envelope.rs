//! Envelope orchestration: profile selection, EncryptionInfo dispatch, and
//! assembly of the OLE/CFB container.
//!
//! An encrypted OOXML file is a compound file whose root storage holds the
//! `EncryptionInfo` and `EncryptedPackage` streams next to the fixed
//! `\x06DataSpaces` substorage.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use log::debug;
use tempfile::SpooledTempFile;

use crate::agile::{self, AgileOptions};
use crate::algo::CipherAlgorithm;
use crate::dataspaces;
use crate::error::{Error, Result};
use crate::standard;

/// CFB magic bytes: `D0 CF 11 E0 A1 B1 1A E1`.
const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const ENCRYPTION_INFO_STREAM: &str = "/EncryptionInfo";
const ENCRYPTED_PACKAGE_STREAM: &str = "/EncryptedPackage";

/// Reserved flags word of the Agile EncryptionInfo header (`fAgile`).
const AGILE_RESERVED: u32 = 0x0000_0040;

/// Agile bodies spool to disk past this many in-memory bytes, so the
/// cleartext is never assumed to fit in memory.
const SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

/// Encryption profile selected by the caller on encrypt.
#[derive(Debug, Clone)]
pub enum EncryptionProfile {
    /// Standard Encryption (Office 2007): AES-ECB with SHA-1 derivation.
    /// Only AES with 128/192/256 key bits is representable.
    Standard {
        algorithm: CipherAlgorithm,
        key_bits: u32,
    },
    /// Agile Encryption (Office 2010+), parameterised.
    Agile(AgileOptions),
}

impl Default for EncryptionProfile {
    fn default() -> Self {
        Self::Agile(AgileOptions::default())
    }
}

/// Parsed EncryptionInfo, dispatched on the version header.
#[derive(Debug)]
pub enum EncryptionInfo {
    Standard(standard::StandardDescriptor),
    Agile(agile::AgileDescriptor),
}

/// Parse the raw EncryptionInfo stream and determine the profile.
///
/// `{4,4}` with reserved flags 0x40 introduces the Agile XML descriptor;
/// minor version 2 introduces the Standard binary descriptor. Legacy RC4
/// variants (minor 1) and extensible descriptors (4.3) are rejected before
/// any key material is touched.
pub(crate) fn parse_encryption_info(data: &[u8]) -> Result<EncryptionInfo> {
    if data.len() < 8 {
        return Err(Error::MalformedEnvelope(
            "EncryptionInfo stream is too short".to_string(),
        ));
    }
    let major = u16::from_le_bytes([data[0], data[1]]);
    let minor = u16::from_le_bytes([data[2], data[3]]);

    match (major, minor) {
        (4, 4) => {
            let reserved = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
            if reserved != AGILE_RESERVED {
                return Err(Error::MalformedEnvelope(format!(
                    "unexpected agile descriptor flags 0x{reserved:08X}"
                )));
            }
            Ok(EncryptionInfo::Agile(agile::parse_descriptor(&data[8..])?))
        }
        (2, 2) | (3, 2) | (4, 2) => Ok(EncryptionInfo::Standard(standard::parse_descriptor(
            data,
        )?)),
        (_, 1) => Err(Error::UnsupportedAlgorithm(
            "RC4 (legacy CryptoAPI) encryption".to_string(),
        )),
        (4, 3) => Err(Error::UnsupportedAlgorithm(
            "extensible encryption".to_string(),
        )),
        _ => Err(Error::MalformedEnvelope(format!(
            "unknown EncryptionInfo version {major}.{minor}"
        ))),
    }
}

/// Encrypt a cleartext package into a complete encrypted container written
/// to `output`.
///
/// The output sink must be readable and seekable because the compound file
/// is assembled in place. Unsupported algorithm choices are rejected before
/// any key material is generated.
pub fn encrypt<R, W>(package: &mut R, output: W, password: &str, profile: &EncryptionProfile) -> Result<()>
where
    R: Read,
    W: Read + Write + Seek,
{
    match profile {
        EncryptionProfile::Standard {
            algorithm,
            key_bits,
        } => {
            if *algorithm != CipherAlgorithm::Aes || !matches!(*key_bits, 128 | 192 | 256) {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "standard profile supports AES-128/192/256 only, not {} with {} key bits",
                    algorithm.wire_name(),
                    key_bits
                )));
            }
            debug!("encrypting with the standard profile, AES-{key_bits}");
            // The standard body has no segmentation; buffering it whole is
            // how conformant writers behave.
            let mut cleartext = Vec::new();
            package.read_to_end(&mut cleartext)?;
            let (info, body) = standard::encrypt_package(&cleartext, password, *key_bits)?;
            write_envelope(output, &info, &mut Cursor::new(body))
        }
        EncryptionProfile::Agile(options) => {
            options.cipher().validate()?;
            debug!(
                "encrypting with the agile profile, {}-{}/{}",
                options.cipher_algorithm.wire_name(),
                options.key_bits,
                options.hash_algorithm.wire_name()
            );
            let mut body = SpooledTempFile::new(SPOOL_THRESHOLD);
            let descriptor = agile::encrypt_package(package, &mut body, password, options)?;

            let xml = agile::serialize_descriptor(&descriptor);
            let mut info = Vec::with_capacity(8 + xml.len());
            info.extend_from_slice(&4u16.to_le_bytes());
            info.extend_from_slice(&4u16.to_le_bytes());
            info.extend_from_slice(&AGILE_RESERVED.to_le_bytes());
            info.extend_from_slice(xml.as_bytes());

            write_envelope(output, &info, &mut body)
        }
    }
}

/// Assemble the container: both streams plus the DataSpaces tree.
fn write_envelope<W, B>(output: W, info: &[u8], body: &mut B) -> Result<()>
where
    W: Read + Write + Seek,
    B: Read,
{
    let mut cfb = cfb::CompoundFile::create(output)?;
    {
        let mut stream = cfb.create_stream(ENCRYPTION_INFO_STREAM)?;
        stream.write_all(info)?;
    }
    {
        let mut stream = cfb.create_stream(ENCRYPTED_PACKAGE_STREAM)?;
        std::io::copy(body, &mut stream)?;
    }
    dataspaces::write_tree(&mut cfb)?;
    cfb.flush()?;
    Ok(())
}

/// Decrypt an encrypted container into `output`.
///
/// The input must be an OLE/CFB compound file (`NotEncryptedPackage`
/// otherwise) holding both encryption streams (`MalformedEnvelope`
/// otherwise). The password is checked against the descriptor's verifier
/// before any package data is decrypted, and Agile containers additionally
/// have their HMAC validated first.
pub fn decrypt<R, W>(mut input: R, output: &mut W, password: &str) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    input.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 8];
    if input.read_exact(&mut magic).is_err() || magic != CFB_MAGIC {
        return Err(Error::NotEncryptedPackage);
    }
    input.seek(SeekFrom::Start(0))?;

    let mut cfb = cfb::CompoundFile::open(input)
        .map_err(|e| Error::MalformedEnvelope(format!("invalid compound file: {e}")))?;
    let info_data = read_stream(&mut cfb, ENCRYPTION_INFO_STREAM)?;
    let info = parse_encryption_info(&info_data)?;

    let mut body = cfb.open_stream(ENCRYPTED_PACKAGE_STREAM).map_err(|e| {
        Error::MalformedEnvelope(format!("missing {ENCRYPTED_PACKAGE_STREAM} stream: {e}"))
    })?;

    match info {
        EncryptionInfo::Standard(descriptor) => {
            debug!("standard-profile envelope, AES-{}", descriptor.header.key_bits);
            let key = standard::verify_password(&descriptor, password)?;
            standard::decrypt_package(&mut body, &key, output)
        }
        EncryptionInfo::Agile(descriptor) => {
            debug!(
                "agile-profile envelope, {}-{}/{}",
                descriptor.key_data.cipher_algorithm.wire_name(),
                descriptor.key_data.key_bits,
                descriptor.key_data.hash_algorithm.wire_name()
            );
            let secret = agile::verify_password(&descriptor, password)?;
            agile::verify_integrity(&descriptor, &secret, &mut body)?;
            body.seek(SeekFrom::Start(0))?;
            agile::decrypt_package(&descriptor, &secret, &mut body, output)
        }
    }
}

fn read_stream<F: Read + Seek>(cfb: &mut cfb::CompoundFile<F>, path: &str) -> Result<Vec<u8>> {
    let mut stream = cfb
        .open_stream(path)
        .map_err(|e| Error::MalformedEnvelope(format!("missing {path} stream: {e}")))?;
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|e| Error::MalformedEnvelope(format!("unreadable {path} stream: {e}")))?;
    Ok(data)
}
