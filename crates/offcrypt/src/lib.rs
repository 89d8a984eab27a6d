//! offcrypt: codec for the MS-OFFCRYPTO encrypted container format.
//!
//! Modern Office documents protect their OOXML package (a ZIP archive,
//! treated here as opaque bytes) by wrapping it in an OLE/CFB compound file
//! with an `EncryptionInfo` descriptor, an `EncryptedPackage` body, and a
//! fixed `DataSpaces` transform declaration. Two profiles exist:
//!
//! - **Standard** (Office 2007): AES-ECB with a fixed 50,000-round SHA-1
//!   key stretch. No integrity check.
//! - **Agile** (Office 2010+): an XML descriptor selecting cipher, chaining
//!   mode, hash, and spin count, with a segmented CBC/CFB body and HMAC
//!   data integrity.
//!
//! Encryption always produces interoperable containers; decryption also
//! accepts the parameter space conformant third-party writers use (DES,
//! 3DES, RC2, the full hash table). Legacy RC4/CryptoAPI profiles are
//! rejected as [`Error::UnsupportedAlgorithm`].
//!
//! ```no_run
//! use offcrypt::{decrypt_bytes, encrypt_bytes, EncryptionProfile};
//!
//! # fn main() -> offcrypt::Result<()> {
//! let package = std::fs::read("workbook.zip")?;
//! let container = encrypt_bytes(&package, "secret", &EncryptionProfile::default())?;
//! let recovered = decrypt_bytes(&container, "secret")?;
//! assert_eq!(package, recovered);
//! # Ok(())
//! # }
//! ```

mod agile;
mod algo;
mod dataspaces;
mod envelope;
pub mod error;
pub mod protection;
mod standard;

use std::io::Cursor;

pub use agile::{AgileDescriptor, AgileOptions, DataIntegrity, KeyData, KeyEncryptor};
pub use algo::{ChainingMode, CipherAlgorithm, HashAlgorithm};
pub use envelope::{decrypt, encrypt, EncryptionInfo, EncryptionProfile};
pub use error::{Error, Result};
pub use standard::{StandardDescriptor, StandardHeader, StandardVerifier};

/// Encrypt a buffered package and return the encrypted container bytes.
pub fn encrypt_bytes(
    package: &[u8],
    password: &str,
    profile: &EncryptionProfile,
) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    encrypt(&mut &package[..], &mut output, password, profile)?;
    Ok(output.into_inner())
}

/// Decrypt a buffered encrypted container and return the package bytes.
pub fn decrypt_bytes(data: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    decrypt(Cursor::new(data), &mut output, password)?;
    Ok(output)
}
