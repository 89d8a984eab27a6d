//! Agile Encryption (Office 2010+): parameterised cipher/hash/HMAC over a
//! segmented package body.
//!
//! The descriptor is an XML document carried behind the EncryptionInfo
//! version header. It is parsed once into plain records; every cryptographic
//! step afterwards consults those records, never the XML.

use std::io::{Read, Seek, SeekFrom, Write};

use base64::Engine;
use log::debug;
use rand::Rng;
use zeroize::Zeroizing;

use crate::algo::{
    block_keys, ct_eq, fix_size, for_each_chunk, password_utf16le, read_full, ChainingMode,
    CipherAlgorithm, CipherSpec, HashAlgorithm, HmacWriter,
};
use crate::error::{Error, Result};

/// Segment size for the package body.
pub(crate) const SEGMENT_SIZE: usize = 4096;

/// Salt length our writer generates. Readers take whatever the descriptor
/// declares.
const SALT_LEN: usize = 16;

/// The HMAC key is 64 bytes regardless of the hash in use.
const HMAC_KEY_LEN: usize = 64;

/// Upper bound on the declared spin count; anything past this is a hostile
/// or corrupt descriptor, not a slow one.
const MAX_SPIN_COUNT: u32 = 10_000_000;

const NS_ENCRYPTION: &str = "http://schemas.microsoft.com/office/2006/encryption";
const NS_PASSWORD: &str = "http://schemas.microsoft.com/office/2006/keyEncryptor/password";

/// Parsed Agile descriptor.
#[derive(Debug, Clone)]
pub struct AgileDescriptor {
    /// Parameters for the package body.
    pub key_data: KeyData,
    /// Encrypted HMAC key and value; third-party writers may omit them.
    pub data_integrity: Option<DataIntegrity>,
    /// Password-based key encryptors.
    pub key_encryptors: Vec<KeyEncryptor>,
}

/// Key data parameters.
#[derive(Debug, Clone)]
pub struct KeyData {
    pub salt_size: u32,
    pub block_size: u32,
    pub key_bits: u32,
    pub hash_size: u32,
    pub cipher_algorithm: CipherAlgorithm,
    pub cipher_chaining: ChainingMode,
    pub hash_algorithm: HashAlgorithm,
    pub salt_value: Vec<u8>,
}

/// Data integrity values (encrypted HMAC key and value).
#[derive(Debug, Clone)]
pub struct DataIntegrity {
    pub encrypted_hmac_key: Vec<u8>,
    pub encrypted_hmac_value: Vec<u8>,
}

/// Password-based key encryptor parameters.
#[derive(Debug, Clone)]
pub struct KeyEncryptor {
    pub spin_count: u32,
    pub salt_size: u32,
    pub block_size: u32,
    pub key_bits: u32,
    pub hash_size: u32,
    pub cipher_algorithm: CipherAlgorithm,
    pub cipher_chaining: ChainingMode,
    pub hash_algorithm: HashAlgorithm,
    pub salt_value: Vec<u8>,
    pub encrypted_verifier_hash_input: Vec<u8>,
    pub encrypted_verifier_hash_value: Vec<u8>,
    pub encrypted_key_value: Vec<u8>,
}

/// Caller-facing knobs for Agile encryption.
#[derive(Debug, Clone)]
pub struct AgileOptions {
    pub cipher_algorithm: CipherAlgorithm,
    pub key_bits: u32,
    pub cipher_chaining: ChainingMode,
    pub hash_algorithm: HashAlgorithm,
    pub spin_count: u32,
}

impl Default for AgileOptions {
    fn default() -> Self {
        Self {
            cipher_algorithm: CipherAlgorithm::Aes,
            key_bits: 256,
            cipher_chaining: ChainingMode::Cbc,
            hash_algorithm: HashAlgorithm::Sha512,
            spin_count: 100_000,
        }
    }
}

impl AgileOptions {
    pub(crate) fn cipher(&self) -> CipherSpec {
        CipherSpec {
            algorithm: self.cipher_algorithm,
            key_bits: self.key_bits,
            chaining: self.cipher_chaining,
        }
    }
}

/// The cipher/hash parameter block `keyData` and `encryptedKey` share.
pub(crate) trait CryptoParams {
    fn salt_value(&self) -> &[u8];
    fn salt_size(&self) -> u32;
    fn block_size(&self) -> u32;
    fn key_bits(&self) -> u32;
    fn hash_size(&self) -> u32;
    fn cipher_algorithm(&self) -> CipherAlgorithm;
    fn cipher_chaining(&self) -> ChainingMode;
    fn hash_algorithm(&self) -> HashAlgorithm;

    fn cipher(&self) -> CipherSpec {
        CipherSpec {
            algorithm: self.cipher_algorithm(),
            key_bits: self.key_bits(),
            chaining: self.cipher_chaining(),
        }
    }

    fn key_len(&self) -> usize {
        (self.key_bits() / 8) as usize
    }

    fn block_len(&self) -> usize {
        self.block_size() as usize
    }

    fn iv(&self, block_key: Option<&[u8]>) -> Vec<u8> {
        derive_iv(
            self.hash_algorithm(),
            self.salt_value(),
            block_key,
            self.block_len(),
        )
    }

    /// Cross-check the declared sizes against the resolved algorithms.
    fn check(&self) -> Result<()> {
        let cipher = self.cipher();
        cipher.validate()?;
        if self.salt_value().len() != self.salt_size() as usize {
            return Err(Error::MalformedEnvelope(
                "saltValue length does not match saltSize".to_string(),
            ));
        }
        if self.block_len() != cipher.block_len() {
            return Err(Error::MalformedEnvelope(format!(
                "blockSize {} does not match the {} block",
                self.block_size(),
                self.cipher_algorithm().wire_name()
            )));
        }
        if self.hash_size() as usize != self.hash_algorithm().size() {
            return Err(Error::MalformedEnvelope(format!(
                "hashSize {} does not match {}",
                self.hash_size(),
                self.hash_algorithm().wire_name()
            )));
        }
        Ok(())
    }
}

macro_rules! impl_crypto_params {
    ($ty:ty) => {
        impl CryptoParams for $ty {
            fn salt_value(&self) -> &[u8] {
                &self.salt_value
            }
            fn salt_size(&self) -> u32 {
                self.salt_size
            }
            fn block_size(&self) -> u32 {
                self.block_size
            }
            fn key_bits(&self) -> u32 {
                self.key_bits
            }
            fn hash_size(&self) -> u32 {
                self.hash_size
            }
            fn cipher_algorithm(&self) -> CipherAlgorithm {
                self.cipher_algorithm
            }
            fn cipher_chaining(&self) -> ChainingMode {
                self.cipher_chaining
            }
            fn hash_algorithm(&self) -> HashAlgorithm {
                self.hash_algorithm
            }
        }
    };
}

impl_crypto_params!(KeyData);
impl_crypto_params!(KeyEncryptor);

// -- key derivation --

/// Iterated password hash: `H(salt || password)` spun `spin_count` times
/// with a little-endian round counter prepended each round. The block-key
/// suffix is applied separately by [`derive_key`].
pub(crate) fn password_base_hash(
    hash: HashAlgorithm,
    salt: &[u8],
    password: &str,
    spin_count: u32,
) -> Zeroizing<Vec<u8>> {
    let password_bytes = password_utf16le(password);
    let mut digest = Zeroizing::new(hash.digest(&[salt, password_bytes.as_slice()]));
    for i in 0u32..spin_count {
        let counter = i.to_le_bytes();
        digest = Zeroizing::new(hash.digest(&[&counter[..], digest.as_slice()]));
    }
    digest
}

/// Finalise a base hash with an 8-byte block key, sized to the cipher key.
pub(crate) fn derive_key(
    hash: HashAlgorithm,
    base_hash: &[u8],
    block_key: &[u8],
    key_len: usize,
) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(fix_size(
        hash.digest(&[base_hash, block_key]),
        key_len,
        0x36,
    ))
}

/// IV composition: the salt itself, or `H(salt || blockKey)`, sized to the
/// cipher block with the 0x36 fill.
pub(crate) fn derive_iv(
    hash: HashAlgorithm,
    salt: &[u8],
    block_key: Option<&[u8]>,
    block_len: usize,
) -> Vec<u8> {
    let iv = match block_key {
        Some(block_key) => hash.digest(&[salt, block_key]),
        None => salt.to_vec(),
    };
    fix_size(iv, block_len, 0x36)
}

// -- password verification and key recovery --

/// Verify a password against the first key encryptor and recover the
/// content encryption key.
pub(crate) fn verify_password(
    descriptor: &AgileDescriptor,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    let encryptor = descriptor.key_encryptors.first().ok_or_else(|| {
        Error::MalformedEnvelope("descriptor has no password key encryptor".to_string())
    })?;

    let cipher = encryptor.cipher();
    let hash = encryptor.hash_algorithm;
    let base = password_base_hash(hash, &encryptor.salt_value, password, encryptor.spin_count);
    let iv = fix_size(encryptor.salt_value.clone(), cipher.block_len(), 0x36);

    let input_key = derive_key(
        hash,
        &base,
        block_keys::VERIFIER_HASH_INPUT,
        cipher.key_len(),
    );
    let mut verifier_input =
        cipher.decrypt(&input_key, &iv, &encryptor.encrypted_verifier_hash_input)?;
    verifier_input.truncate(encryptor.salt_size as usize);
    let expected = hash.digest(&[&verifier_input]);

    let value_key = derive_key(
        hash,
        &base,
        block_keys::VERIFIER_HASH_VALUE,
        cipher.key_len(),
    );
    let mut verifier_hash =
        cipher.decrypt(&value_key, &iv, &encryptor.encrypted_verifier_hash_value)?;
    verifier_hash.truncate(encryptor.hash_size as usize);

    if !ct_eq(&expected, &verifier_hash) {
        return Err(Error::InvalidPassword);
    }

    let secret_key_key = derive_key(hash, &base, block_keys::KEY_VALUE, cipher.key_len());
    let mut secret = Zeroizing::new(cipher.decrypt(
        &secret_key_key,
        &iv,
        &encryptor.encrypted_key_value,
    )?);
    let content_key_len = descriptor.key_data.key_len();
    if secret.len() < content_key_len {
        return Err(Error::MalformedEnvelope(
            "encryptedKeyValue is shorter than the content key".to_string(),
        ));
    }
    secret.truncate(content_key_len);
    Ok(secret)
}

// -- data integrity --

/// Recompute the HMAC over the full EncryptedPackage stream (size prefix
/// included) and compare it against the descriptor, constant-time.
pub(crate) fn verify_integrity<R: Read>(
    descriptor: &AgileDescriptor,
    secret_key: &[u8],
    body: &mut R,
) -> Result<()> {
    let Some(integrity) = &descriptor.data_integrity else {
        debug!("descriptor carries no dataIntegrity element, skipping HMAC check");
        return Ok(());
    };
    let key_data = &descriptor.key_data;
    let cipher = key_data.cipher();

    let iv_key = key_data.iv(Some(block_keys::HMAC_KEY));
    let hmac_key = Zeroizing::new(cipher.decrypt(
        secret_key,
        &iv_key,
        &integrity.encrypted_hmac_key,
    )?);

    let iv_value = key_data.iv(Some(block_keys::HMAC_VALUE));
    let mut expected = cipher.decrypt(secret_key, &iv_value, &integrity.encrypted_hmac_value)?;
    expected.truncate(key_data.hash_size as usize);

    let mut mac = HmacWriter::new(key_data.hash_algorithm, &hmac_key);
    for_each_chunk(body, |chunk| mac.update(chunk))?;
    let actual = mac.finalize();

    if !ct_eq(&actual, &expected) {
        return Err(Error::IntegrityFailure);
    }
    Ok(())
}

// -- package body --

/// Decrypt the EncryptedPackage stream segment by segment, truncating to
/// the declared cleartext size.
pub(crate) fn decrypt_package<R: Read, W: Write>(
    descriptor: &AgileDescriptor,
    secret_key: &[u8],
    body: &mut R,
    output: &mut W,
) -> Result<()> {
    let key_data = &descriptor.key_data;
    let cipher = key_data.cipher();

    let mut prefix = [0u8; 8];
    body.read_exact(&mut prefix).map_err(|_| {
        Error::MalformedEnvelope("EncryptedPackage is too short for its size prefix".to_string())
    })?;
    let mut remaining = u64::from_le_bytes(prefix);
    debug!("decrypting {remaining} bytes in {SEGMENT_SIZE}-byte segments");

    let mut segment = vec![0u8; SEGMENT_SIZE];
    let mut index = 0u32;
    while remaining > 0 {
        let n = read_full(body, &mut segment)?;
        if n == 0 {
            return Err(Error::MalformedEnvelope(
                "EncryptedPackage ends before its declared size".to_string(),
            ));
        }
        if n % cipher.block_len() != 0 {
            return Err(Error::MalformedEnvelope(
                "EncryptedPackage segment is not block aligned".to_string(),
            ));
        }
        let iv = key_data.iv(Some(&index.to_le_bytes()));
        let plaintext = cipher.decrypt(secret_key, &iv, &segment[..n])?;
        let take = remaining.min(plaintext.len() as u64) as usize;
        output.write_all(&plaintext[..take])?;
        remaining -= take as u64;
        index = index.wrapping_add(1);
    }
    Ok(())
}

/// Encrypt a package into `body` as a complete EncryptedPackage stream and
/// return the descriptor holding all key material. `body` is left rewound.
pub(crate) fn encrypt_package<R: Read, S: Read + Write + Seek>(
    package: &mut R,
    body: &mut S,
    password: &str,
    options: &AgileOptions,
) -> Result<AgileDescriptor> {
    let cipher = options.cipher();
    cipher.validate()?;
    let hash = options.hash_algorithm;
    let block_len = cipher.block_len();

    let mut rng = rand::thread_rng();
    let mut key_data_salt = vec![0u8; SALT_LEN];
    let mut encryptor_salt = vec![0u8; SALT_LEN];
    let mut verifier_input = [0u8; 16];
    let mut secret_key = Zeroizing::new(vec![0u8; cipher.key_len()]);
    rng.fill(&mut key_data_salt[..]);
    rng.fill(&mut encryptor_salt[..]);
    rng.fill(&mut verifier_input);
    rng.fill(&mut secret_key[..]);

    // Body first: size prefix placeholder, then segments in index order.
    body.write_all(&[0u8; 8])?;
    let mut cleartext_len = 0u64;
    let mut segment = vec![0u8; SEGMENT_SIZE];
    let mut index = 0u32;
    loop {
        let n = read_full(package, &mut segment)?;
        if n == 0 {
            break;
        }
        cleartext_len += n as u64;
        let iv = derive_iv(hash, &key_data_salt, Some(&index.to_le_bytes()), block_len);
        let ciphertext = cipher.encrypt(&secret_key, &iv, &segment[..n])?;
        body.write_all(&ciphertext)?;
        if n < SEGMENT_SIZE {
            break;
        }
        index = index.checked_add(1).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "package exceeds the segmented size limit",
            ))
        })?;
    }
    body.seek(SeekFrom::Start(0))?;
    body.write_all(&cleartext_len.to_le_bytes())?;
    debug!("encrypted {cleartext_len} bytes across {} segments", index + 1);

    // Integrity: HMAC over the whole stream, prefix included.
    let mut hmac_key = Zeroizing::new(vec![0u8; HMAC_KEY_LEN]);
    rng.fill(&mut hmac_key[..]);
    body.seek(SeekFrom::Start(0))?;
    let mut mac = HmacWriter::new(hash, &hmac_key);
    for_each_chunk(body, |chunk| mac.update(chunk))?;
    let hmac_value = mac.finalize();

    let iv_key = derive_iv(hash, &key_data_salt, Some(block_keys::HMAC_KEY), block_len);
    let encrypted_hmac_key = cipher.encrypt(&secret_key, &iv_key, &hmac_key)?;
    let iv_value = derive_iv(hash, &key_data_salt, Some(block_keys::HMAC_VALUE), block_len);
    let encrypted_hmac_value = cipher.encrypt(&secret_key, &iv_value, &hmac_value)?;

    // Password key encryptor: verifier pair plus the wrapped content key.
    let base = password_base_hash(hash, &encryptor_salt, password, options.spin_count);
    let iv = fix_size(encryptor_salt.clone(), block_len, 0x36);

    let input_key = derive_key(
        hash,
        &base,
        block_keys::VERIFIER_HASH_INPUT,
        cipher.key_len(),
    );
    let encrypted_verifier_hash_input = cipher.encrypt(&input_key, &iv, &verifier_input)?;

    let verifier_hash = hash.digest(&[&verifier_input]);
    let value_key = derive_key(
        hash,
        &base,
        block_keys::VERIFIER_HASH_VALUE,
        cipher.key_len(),
    );
    let encrypted_verifier_hash_value = cipher.encrypt(&value_key, &iv, &verifier_hash)?;

    let secret_key_key = derive_key(hash, &base, block_keys::KEY_VALUE, cipher.key_len());
    let encrypted_key_value = cipher.encrypt(&secret_key_key, &iv, &secret_key)?;

    body.seek(SeekFrom::Start(0))?;

    Ok(AgileDescriptor {
        key_data: KeyData {
            salt_size: SALT_LEN as u32,
            block_size: block_len as u32,
            key_bits: options.key_bits,
            hash_size: hash.size() as u32,
            cipher_algorithm: options.cipher_algorithm,
            cipher_chaining: options.cipher_chaining,
            hash_algorithm: hash,
            salt_value: key_data_salt,
        },
        data_integrity: Some(DataIntegrity {
            encrypted_hmac_key,
            encrypted_hmac_value,
        }),
        key_encryptors: vec![KeyEncryptor {
            spin_count: options.spin_count,
            salt_size: SALT_LEN as u32,
            block_size: block_len as u32,
            key_bits: options.key_bits,
            hash_size: hash.size() as u32,
            cipher_algorithm: options.cipher_algorithm,
            cipher_chaining: options.cipher_chaining,
            hash_algorithm: hash,
            salt_value: encryptor_salt,
            encrypted_verifier_hash_input,
            encrypted_verifier_hash_value,
            encrypted_key_value,
        }],
    })
}

// -- descriptor XML --

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

fn parse_num(name: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| {
        Error::MalformedEnvelope(format!("attribute {name} is not a number: {value:?}"))
    })
}

fn parse_b64(name: &str, value: &str) -> Result<Vec<u8>> {
    b64()
        .decode(value)
        .map_err(|e| Error::MalformedEnvelope(format!("attribute {name} is not base64: {e}")))
}

#[derive(Default)]
struct RawParams {
    salt_size: u32,
    block_size: u32,
    key_bits: u32,
    hash_size: u32,
    cipher_algorithm: String,
    cipher_chaining: String,
    hash_algorithm: String,
    salt_value: Vec<u8>,
}

impl RawParams {
    /// Consume one attribute if it belongs to the shared parameter block.
    fn absorb(&mut self, key: &[u8], value: &str) -> Result<bool> {
        match key {
            b"saltSize" => self.salt_size = parse_num("saltSize", value)?,
            b"blockSize" => self.block_size = parse_num("blockSize", value)?,
            b"keyBits" => self.key_bits = parse_num("keyBits", value)?,
            b"hashSize" => self.hash_size = parse_num("hashSize", value)?,
            b"cipherAlgorithm" => self.cipher_algorithm = value.to_string(),
            b"cipherChaining" => self.cipher_chaining = value.to_string(),
            b"hashAlgorithm" => self.hash_algorithm = value.to_string(),
            b"saltValue" => self.salt_value = parse_b64("saltValue", value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn parse_key_data(e: &quick_xml::events::BytesStart<'_>) -> Result<KeyData> {
    let mut raw = RawParams::default();
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        raw.absorb(attr.key.as_ref(), &value)?;
    }
    Ok(KeyData {
        salt_size: raw.salt_size,
        block_size: raw.block_size,
        key_bits: raw.key_bits,
        hash_size: raw.hash_size,
        cipher_algorithm: CipherAlgorithm::from_wire_name(&raw.cipher_algorithm)?,
        cipher_chaining: ChainingMode::from_wire_name(&raw.cipher_chaining)?,
        hash_algorithm: HashAlgorithm::from_wire_name(&raw.hash_algorithm)?,
        salt_value: raw.salt_value,
    })
}

fn parse_data_integrity(e: &quick_xml::events::BytesStart<'_>) -> Result<DataIntegrity> {
    let mut integrity = DataIntegrity {
        encrypted_hmac_key: Vec::new(),
        encrypted_hmac_value: Vec::new(),
    };
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"encryptedHmacKey" => {
                integrity.encrypted_hmac_key = parse_b64("encryptedHmacKey", &value)?;
            }
            b"encryptedHmacValue" => {
                integrity.encrypted_hmac_value = parse_b64("encryptedHmacValue", &value)?;
            }
            _ => {}
        }
    }
    Ok(integrity)
}

fn parse_key_encryptor(e: &quick_xml::events::BytesStart<'_>) -> Result<KeyEncryptor> {
    let mut raw = RawParams::default();
    let mut spin_count = 0u32;
    let mut encrypted_verifier_hash_input = Vec::new();
    let mut encrypted_verifier_hash_value = Vec::new();
    let mut encrypted_key_value = Vec::new();

    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        if raw.absorb(attr.key.as_ref(), &value)? {
            continue;
        }
        match attr.key.as_ref() {
            b"spinCount" => spin_count = parse_num("spinCount", &value)?,
            b"encryptedVerifierHashInput" => {
                encrypted_verifier_hash_input = parse_b64("encryptedVerifierHashInput", &value)?;
            }
            b"encryptedVerifierHashValue" => {
                encrypted_verifier_hash_value = parse_b64("encryptedVerifierHashValue", &value)?;
            }
            b"encryptedKeyValue" => {
                encrypted_key_value = parse_b64("encryptedKeyValue", &value)?;
            }
            _ => {}
        }
    }

    Ok(KeyEncryptor {
        spin_count,
        salt_size: raw.salt_size,
        block_size: raw.block_size,
        key_bits: raw.key_bits,
        hash_size: raw.hash_size,
        cipher_algorithm: CipherAlgorithm::from_wire_name(&raw.cipher_algorithm)?,
        cipher_chaining: ChainingMode::from_wire_name(&raw.cipher_chaining)?,
        hash_algorithm: HashAlgorithm::from_wire_name(&raw.hash_algorithm)?,
        salt_value: raw.salt_value,
        encrypted_verifier_hash_input,
        encrypted_verifier_hash_value,
        encrypted_key_value,
    })
}

/// Parse the Agile descriptor XML (the bytes after the version header).
/// Unknown elements and attributes are ignored; unknown algorithm names are
/// not.
pub(crate) fn parse_descriptor(xml: &[u8]) -> Result<AgileDescriptor> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut key_data: Option<KeyData> = None;
    let mut data_integrity: Option<DataIntegrity> = None;
    let mut key_encryptors: Vec<KeyEncryptor> = Vec::new();
    let mut encryptor_uri: Option<String> = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                match e.local_name().as_ref() {
                    b"keyData" => key_data = Some(parse_key_data(e)?),
                    b"dataIntegrity" => data_integrity = Some(parse_data_integrity(e)?),
                    b"keyEncryptor" => {
                        encryptor_uri = e
                            .attributes()
                            .flatten()
                            .find(|attr| attr.key.as_ref() == b"uri")
                            .map(|attr| String::from_utf8_lossy(&attr.value).to_string());
                    }
                    b"encryptedKey" => {
                        // Certificate key encryptors are out of scope; only
                        // take the password kind.
                        let is_password = encryptor_uri
                            .as_deref()
                            .is_none_or(|uri| uri == NS_PASSWORD);
                        if is_password {
                            key_encryptors.push(parse_key_encryptor(e)?);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::MalformedEnvelope(format!(
                    "EncryptionInfo XML parse error: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    let key_data = key_data.ok_or_else(|| {
        Error::MalformedEnvelope("missing keyData element in EncryptionInfo XML".to_string())
    })?;

    let descriptor = AgileDescriptor {
        key_data,
        data_integrity,
        key_encryptors,
    };
    sanity_check(&descriptor)?;
    Ok(descriptor)
}

fn sanity_check(descriptor: &AgileDescriptor) -> Result<()> {
    descriptor.key_data.check()?;
    for encryptor in &descriptor.key_encryptors {
        encryptor.check()?;
        if encryptor.spin_count > MAX_SPIN_COUNT {
            return Err(Error::MalformedEnvelope(format!(
                "spinCount {} is out of range",
                encryptor.spin_count
            )));
        }
        if encryptor.encrypted_verifier_hash_input.is_empty()
            || encryptor.encrypted_verifier_hash_value.is_empty()
            || encryptor.encrypted_key_value.is_empty()
        {
            return Err(Error::MalformedEnvelope(
                "password key encryptor is missing its verifier fields".to_string(),
            ));
        }
    }
    Ok(())
}

/// Serialize a descriptor back to XML, deterministically: fixed attribute
/// order, standard base64 alphabet.
pub(crate) fn serialize_descriptor(descriptor: &AgileDescriptor) -> String {
    let engine = b64();
    let key_data = &descriptor.key_data;

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push('\r');
    xml.push('\n');
    xml.push_str(&format!(
        r#"<encryption xmlns="{NS_ENCRYPTION}" xmlns:p="{NS_PASSWORD}">"#
    ));

    xml.push_str(&format!(
        r#"<keyData saltSize="{}" blockSize="{}" keyBits="{}" hashSize="{}" cipherAlgorithm="{}" cipherChaining="{}" hashAlgorithm="{}" saltValue="{}"/>"#,
        key_data.salt_size,
        key_data.block_size,
        key_data.key_bits,
        key_data.hash_size,
        key_data.cipher_algorithm.wire_name(),
        key_data.cipher_chaining.wire_name(),
        key_data.hash_algorithm.wire_name(),
        engine.encode(&key_data.salt_value),
    ));

    if let Some(integrity) = &descriptor.data_integrity {
        xml.push_str(&format!(
            r#"<dataIntegrity encryptedHmacKey="{}" encryptedHmacValue="{}"/>"#,
            engine.encode(&integrity.encrypted_hmac_key),
            engine.encode(&integrity.encrypted_hmac_value),
        ));
    }

    xml.push_str("<keyEncryptors>");
    for encryptor in &descriptor.key_encryptors {
        xml.push_str(&format!(r#"<keyEncryptor uri="{NS_PASSWORD}">"#));
        xml.push_str(&format!(
            r#"<p:encryptedKey spinCount="{}" saltSize="{}" blockSize="{}" keyBits="{}" hashSize="{}" cipherAlgorithm="{}" cipherChaining="{}" hashAlgorithm="{}" saltValue="{}" encryptedVerifierHashInput="{}" encryptedVerifierHashValue="{}" encryptedKeyValue="{}"/>"#,
            encryptor.spin_count,
            encryptor.salt_size,
            encryptor.block_size,
            encryptor.key_bits,
            encryptor.hash_size,
            encryptor.cipher_algorithm.wire_name(),
            encryptor.cipher_chaining.wire_name(),
            encryptor.hash_algorithm.wire_name(),
            engine.encode(&encryptor.salt_value),
            engine.encode(&encryptor.encrypted_verifier_hash_input),
            engine.encode(&encryptor.encrypted_verifier_hash_value),
            engine.encode(&encryptor.encrypted_key_value),
        ));
        xml.push_str("</keyEncryptor>");
    }
    xml.push_str("</keyEncryptors>");
    xml.push_str("</encryption>");

    xml
}
