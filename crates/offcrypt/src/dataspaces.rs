//! The fixed `\x06DataSpaces` storage tree every encrypted OOXML container
//! carries.
//!
//! The four streams are constant apart from length fields; they declare that
//! the `EncryptedPackage` stream went through the strong-encryption
//! transform. Office writes them, and some readers refuse containers
//! without them.

use std::io::{Read, Seek, Write};

use crate::error::Result;

const DATASPACES_STORAGE: &str = "\u{6}DataSpaces";

const DATA_SPACE_NAME: &str = "StrongEncryptionDataSpace";
const TRANSFORM_NAME: &str = "StrongEncryptionTransform";
const TRANSFORM_ID: &str = "{FF9A3F03-56EF-4613-BDD5-5A41C1D07246}";

/// Append a length-prefixed UTF-16LE string, padded with a trailing NUL so
/// the emitted field is a multiple of four bytes. The length field counts
/// the unpadded bytes.
fn push_unicode_lpp4(buf: &mut Vec<u8>, value: &str) {
    let start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());
    for unit in value.encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
    let len = (buf.len() - start - 4) as u32;
    buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
    if len % 4 == 2 {
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
}

/// `Version`: the DataSpaces feature identifier with reader/updater/writer
/// versions all 1.0.
fn version_stream() -> Vec<u8> {
    let mut buf = Vec::with_capacity(76);
    push_unicode_lpp4(&mut buf, "Microsoft.Container.DataSpaces");
    for _ in 0..3 {
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
    buf
}

/// `DataSpaceMap`: one entry mapping the `EncryptedPackage` stream to the
/// strong-encryption data space.
fn data_space_map_stream() -> Vec<u8> {
    let mut buf = Vec::with_capacity(112);
    buf.extend_from_slice(&8u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());

    let entry_start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    push_unicode_lpp4(&mut buf, "EncryptedPackage");
    push_unicode_lpp4(&mut buf, DATA_SPACE_NAME);
    let entry_len = (buf.len() - entry_start) as u32;
    buf[entry_start..entry_start + 4].copy_from_slice(&entry_len.to_le_bytes());

    buf
}

/// `DataSpaceInfo/StrongEncryptionDataSpace`: the single transform the data
/// space applies.
fn data_space_definition_stream() -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&8u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    push_unicode_lpp4(&mut buf, TRANSFORM_NAME);
    buf
}

/// `TransformInfo/StrongEncryptionTransform/\x06Primary`: the transform
/// identity and its fixed trailing fields.
fn transform_primary_stream() -> Vec<u8> {
    let mut buf = Vec::with_capacity(204);

    let header_start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    push_unicode_lpp4(&mut buf, TRANSFORM_ID);
    let header_len = (buf.len() - header_start) as u32;
    buf[header_start..header_start + 4].copy_from_slice(&header_len.to_le_bytes());

    push_unicode_lpp4(&mut buf, "Microsoft.Container.EncryptionTransform");

    // Reader, updater, and writer versions, all 1.
    for _ in 0..3 {
        buf.extend_from_slice(&1u32.to_le_bytes());
    }
    // Three reserved zeroes, cipher mode 0, reserved 4.
    for _ in 0..3 {
        buf.extend_from_slice(&0u32.to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&4u32.to_le_bytes());

    buf
}

/// Populate the `\x06DataSpaces` substorage of a freshly created container.
pub(crate) fn write_tree<F: Read + Write + Seek>(cfb: &mut cfb::CompoundFile<F>) -> Result<()> {
    let root = format!("/{DATASPACES_STORAGE}");
    cfb.create_storage(&root)?;
    cfb.create_stream(format!("{root}/Version"))?
        .write_all(&version_stream())?;
    cfb.create_stream(format!("{root}/DataSpaceMap"))?
        .write_all(&data_space_map_stream())?;

    cfb.create_storage(format!("{root}/DataSpaceInfo"))?;
    cfb.create_stream(format!("{root}/DataSpaceInfo/{DATA_SPACE_NAME}"))?
        .write_all(&data_space_definition_stream())?;

    cfb.create_storage(format!("{root}/TransformInfo"))?;
    cfb.create_storage(format!("{root}/TransformInfo/{TRANSFORM_NAME}"))?;
    cfb.create_stream(format!("{root}/TransformInfo/{TRANSFORM_NAME}/\u{6}Primary"))?
        .write_all(&transform_primary_stream())?;

    Ok(())
}
