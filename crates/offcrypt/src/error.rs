//! Error types for the offcrypt codec.
//!
//! The taxonomy is deliberately coarse: every internal failure funnels into
//! one of these variants, and cryptographic failures never distinguish their
//! cause beyond "invalid password" or "integrity check failed".

use thiserror::Error;

/// The top-level error type for the codec.
#[derive(Error, Debug)]
pub enum Error {
    /// The password failed verifier validation.
    #[error("invalid password")]
    InvalidPassword,

    /// The HMAC over the encrypted package does not match the descriptor
    /// (Agile profile only).
    #[error("encrypted package failed its integrity check")]
    IntegrityFailure,

    /// The descriptor names a cipher, hash, chaining mode, or encryption
    /// profile outside the supported set.
    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The input is a compound file but its encryption streams are missing,
    /// truncated, or internally inconsistent.
    #[error("malformed encryption envelope: {0}")]
    MalformedEnvelope(String),

    /// The input is not an OLE/CFB compound file at all.
    #[error("input is not an encrypted OOXML package")]
    NotEncryptedPackage,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_password() {
        assert_eq!(Error::InvalidPassword.to_string(), "invalid password");
    }

    #[test]
    fn test_error_display_unsupported_algorithm() {
        let err = Error::UnsupportedAlgorithm("RC4".to_string());
        assert_eq!(
            err.to_string(),
            "unsupported encryption algorithm: RC4"
        );
    }

    #[test]
    fn test_error_display_malformed_envelope() {
        let err = Error::MalformedEnvelope("missing EncryptionInfo".to_string());
        assert_eq!(
            err.to_string(),
            "malformed encryption envelope: missing EncryptionInfo"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
