//! End-to-end round-trip laws for both encryption profiles.

use std::io::Read;

use offcrypt::{
    decrypt_bytes, encrypt_bytes, AgileOptions, ChainingMode, CipherAlgorithm, EncryptionProfile,
    Error, HashAlgorithm,
};
use pretty_assertions::assert_eq;

fn standard(key_bits: u32) -> EncryptionProfile {
    EncryptionProfile::Standard {
        algorithm: CipherAlgorithm::Aes,
        key_bits,
    }
}

fn read_package_stream(container: &[u8]) -> Vec<u8> {
    let mut cfb = cfb::CompoundFile::open(std::io::Cursor::new(container)).unwrap();
    let mut data = Vec::new();
    cfb.open_stream("/EncryptedPackage")
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    data
}

fn read_info_stream(container: &[u8]) -> Vec<u8> {
    let mut cfb = cfb::CompoundFile::open(std::io::Cursor::new(container)).unwrap();
    let mut data = Vec::new();
    cfb.open_stream("/EncryptionInfo")
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    data
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[test]
fn standard_aes128_roundtrip_and_descriptor_fields() {
    let package: Vec<u8> = (0u8..32).collect();
    let container = encrypt_bytes(&package, "pass", &standard(128)).unwrap();

    let info = read_info_stream(&container);
    assert_eq!(u16::from_le_bytes([info[0], info[1]]), 4);
    assert_eq!(u16::from_le_bytes([info[2], info[3]]), 2);
    assert_eq!(u32_at(&info, 4), 0x24);
    // Header: algId AES-128, keySize 128.
    assert_eq!(u32_at(&info, 20), 0x660E);
    assert_eq!(u32_at(&info, 28), 128);
    // Verifier: saltSize 16, verifierHashSize 0x20.
    let verifier_offset = 12 + u32_at(&info, 8) as usize;
    assert_eq!(u32_at(&info, verifier_offset), 16);
    assert_eq!(u32_at(&info, verifier_offset + 36), 0x20);

    assert_eq!(decrypt_bytes(&container, "pass").unwrap(), package);
    assert!(matches!(
        decrypt_bytes(&container, "Pass"),
        Err(Error::InvalidPassword)
    ));
}

#[test]
fn standard_roundtrips_all_key_sizes() {
    let package = b"not quite one block".to_vec();
    for key_bits in [128, 192, 256] {
        let container = encrypt_bytes(&package, "pw", &standard(key_bits)).unwrap();
        assert_eq!(decrypt_bytes(&container, "pw").unwrap(), package);
    }
}

#[test]
fn standard_aes256_empty_password_single_byte() {
    let container = encrypt_bytes(&[0xFF], "", &standard(256)).unwrap();

    // One zero-padded AES block after the size prefix.
    let body = read_package_stream(&container);
    assert_eq!(body.len(), 8 + 16);
    assert_eq!(u64::from_le_bytes(body[..8].try_into().unwrap()), 1);

    // An empty password and the legacy default open the same artefact.
    assert_eq!(decrypt_bytes(&container, "").unwrap(), vec![0xFF]);
    assert_eq!(
        decrypt_bytes(&container, "VelvetSweatshop").unwrap(),
        vec![0xFF]
    );
}

#[test]
fn standard_cleartext_length_matches_prefix() {
    let package = vec![0x11u8; 20];
    let container = encrypt_bytes(&package, "pw", &standard(128)).unwrap();

    let body = read_package_stream(&container);
    assert_eq!(u64::from_le_bytes(body[..8].try_into().unwrap()), 20);
    assert_eq!(body.len(), 8 + 32);

    let recovered = decrypt_bytes(&container, "pw").unwrap();
    assert_eq!(recovered.len(), 20);
    assert_eq!(recovered, package);
}

#[test]
fn agile_default_profile_roundtrip_and_segment_layout() {
    let package = vec![0xABu8; 10_000];
    let container = encrypt_bytes(&package, "secret", &EncryptionProfile::default()).unwrap();

    // Segments of 4096/4096/1808, each already a multiple of the AES block.
    let body = read_package_stream(&container);
    assert_eq!(body.len(), 8 + 4096 + 4096 + 1808);
    assert_eq!(u64::from_le_bytes(body[..8].try_into().unwrap()), 10_000);

    assert_eq!(decrypt_bytes(&container, "secret").unwrap(), package);
    assert!(matches!(
        decrypt_bytes(&container, "Secret"),
        Err(Error::InvalidPassword)
    ));
}

#[test]
fn agile_empty_password_uses_legacy_default() {
    let package = b"agile default password".to_vec();
    let options = AgileOptions {
        spin_count: 1_000,
        ..AgileOptions::default()
    };
    let container =
        encrypt_bytes(&package, "", &EncryptionProfile::Agile(options)).unwrap();
    assert_eq!(decrypt_bytes(&container, "").unwrap(), package);
    assert_eq!(
        decrypt_bytes(&container, "VelvetSweatshop").unwrap(),
        package
    );
}

#[test]
fn agile_cfb_chaining_roundtrip() {
    let package = vec![0x77u8; 6000];
    let options = AgileOptions {
        cipher_algorithm: CipherAlgorithm::Aes,
        key_bits: 128,
        cipher_chaining: ChainingMode::Cfb,
        hash_algorithm: HashAlgorithm::Sha256,
        spin_count: 1_000,
    };
    let container = encrypt_bytes(&package, "pw", &EncryptionProfile::Agile(options)).unwrap();
    assert_eq!(decrypt_bytes(&container, "pw").unwrap(), package);
}

#[test]
fn agile_empty_package_roundtrip() {
    let container = encrypt_bytes(&[], "pw", &EncryptionProfile::default()).unwrap();
    let body = read_package_stream(&container);
    assert_eq!(body.len(), 8);
    assert!(decrypt_bytes(&container, "pw").unwrap().is_empty());
}

#[test]
fn random_material_differs_between_encrypt_calls() {
    let package = b"same input, fresh salts".to_vec();
    let profile = EncryptionProfile::Agile(AgileOptions {
        spin_count: 1_000,
        ..AgileOptions::default()
    });
    let first = encrypt_bytes(&package, "pw", &profile).unwrap();
    let second = encrypt_bytes(&package, "pw", &profile).unwrap();

    assert_ne!(read_info_stream(&first), read_info_stream(&second));
    assert_ne!(read_package_stream(&first), read_package_stream(&second));

    // Both still decrypt to the same cleartext.
    assert_eq!(decrypt_bytes(&first, "pw").unwrap(), package);
    assert_eq!(decrypt_bytes(&second, "pw").unwrap(), package);
}

#[test]
fn unsupported_standard_algorithms_are_rejected_eagerly() {
    for key_bits in [64, 512] {
        assert!(matches!(
            encrypt_bytes(b"x", "pw", &standard(key_bits)),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
    assert!(matches!(
        encrypt_bytes(
            b"x",
            "pw",
            &EncryptionProfile::Standard {
                algorithm: CipherAlgorithm::TripleDes,
                key_bits: 192,
            }
        ),
        Err(Error::UnsupportedAlgorithm(_))
    ));
}
