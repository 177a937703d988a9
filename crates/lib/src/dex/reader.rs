//! Container parsing.
//!
//! Layout constants follow the published Dalvik executable format. Only the
//! tables needed for class and method listing are materialized; everything
//! else (fields, code, maps, annotations) is left untouched in the byte
//! stream.

use tracing::debug;

use super::types::{ClassInfo, DexError, DexFile, MethodInfo};

/// Fixed header size of every supported dex version.
const HEADER_SIZE: usize = 0x70;

/// Little-endian marker in the header.
const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// Dex versions emitted by supported toolchains.
const KNOWN_VERSIONS: [&str; 7] = ["035", "036", "037", "038", "039", "040", "041"];

/// Sentinel for "no index" fields.
const NO_INDEX: u32 = 0xffff_ffff;

// Header field offsets.
const OFF_FILE_SIZE: usize = 32;
const OFF_HEADER_SIZE: usize = 36;
const OFF_ENDIAN_TAG: usize = 40;
const OFF_STRING_IDS: usize = 56;
const OFF_TYPE_IDS: usize = 64;
const OFF_PROTO_IDS: usize = 72;
const OFF_METHOD_IDS: usize = 88;
const OFF_CLASS_DEFS: usize = 96;

struct Reader<'a> {
  data: &'a [u8],
}

impl<'a> Reader<'a> {
  fn u16_at(&self, offset: usize) -> Result<u16, DexError> {
    let bytes = self
      .data
      .get(offset..offset + 2)
      .ok_or(DexError::Truncated { offset })?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
  }

  fn u32_at(&self, offset: usize) -> Result<u32, DexError> {
    let bytes = self
      .data
      .get(offset..offset + 4)
      .ok_or(DexError::Truncated { offset })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
  }

  /// Read a uleb128 starting at `offset`; returns the value and the offset
  /// just past it.
  fn uleb128_at(&self, offset: usize) -> Result<(u32, usize), DexError> {
    let mut value: u32 = 0;
    let mut shift = 0;
    let mut pos = offset;
    loop {
      let byte = *self.data.get(pos).ok_or(DexError::Truncated { offset: pos })?;
      if shift >= 32 {
        return Err(DexError::BadUleb { offset });
      }
      value |= u32::from(byte & 0x7f) << shift;
      pos += 1;
      if byte & 0x80 == 0 {
        return Ok((value, pos));
      }
      shift += 7;
    }
  }

  /// Decode a MUTF-8 string data item at `offset` (uleb128 utf16 length,
  /// bytes, NUL terminator).
  fn string_at(&self, offset: usize) -> Result<String, DexError> {
    let (utf16_len, mut pos) = self.uleb128_at(offset)?;
    let mut units: Vec<u16> = Vec::with_capacity(utf16_len as usize);

    loop {
      let byte = *self.data.get(pos).ok_or(DexError::Truncated { offset: pos })?;
      match byte {
        0x00 => break,
        0x01..=0x7f => {
          units.push(u16::from(byte));
          pos += 1;
        }
        0xc0..=0xdf => {
          let second = *self
            .data
            .get(pos + 1)
            .ok_or(DexError::Truncated { offset: pos + 1 })?;
          if second & 0xc0 != 0x80 {
            return Err(DexError::BadString { offset });
          }
          // Covers the MUTF-8 encoding of NUL (0xc0 0x80) as well.
          let unit = (u16::from(byte & 0x1f) << 6) | u16::from(second & 0x3f);
          units.push(unit);
          pos += 2;
        }
        0xe0..=0xef => {
          let rest = self
            .data
            .get(pos + 1..pos + 3)
            .ok_or(DexError::Truncated { offset: pos + 1 })?;
          if rest[0] & 0xc0 != 0x80 || rest[1] & 0xc0 != 0x80 {
            return Err(DexError::BadString { offset });
          }
          let unit = (u16::from(byte & 0x0f) << 12)
            | (u16::from(rest[0] & 0x3f) << 6)
            | u16::from(rest[1] & 0x3f);
          units.push(unit);
          pos += 3;
        }
        _ => return Err(DexError::BadString { offset }),
      }
    }

    if units.len() != utf16_len as usize {
      return Err(DexError::BadString { offset });
    }

    // Surrogate pairs are carried as two 3-byte sequences; from_utf16
    // reassembles them.
    String::from_utf16(&units).map_err(|_| DexError::BadString { offset })
  }
}

struct RawMethodId {
  proto_idx: u16,
  name_idx: u32,
}

/// Parse a container from raw bytes.
pub fn parse(data: &[u8]) -> Result<DexFile, DexError> {
  if data.len() < HEADER_SIZE {
    return Err(DexError::Truncated { offset: data.len() });
  }
  if &data[0..4] != b"dex\n" || data[7] != 0 {
    return Err(DexError::BadMagic);
  }
  let version = std::str::from_utf8(&data[4..7]).map_err(|_| DexError::BadMagic)?;
  if !KNOWN_VERSIONS.contains(&version) {
    return Err(DexError::UnsupportedVersion {
      version: version.to_string(),
    });
  }

  let reader = Reader { data };

  let endian_tag = reader.u32_at(OFF_ENDIAN_TAG)?;
  if endian_tag != ENDIAN_CONSTANT {
    return Err(DexError::BadEndianTag { tag: endian_tag });
  }
  let header_size = reader.u32_at(OFF_HEADER_SIZE)?;
  if header_size as usize != HEADER_SIZE {
    return Err(DexError::HeaderSizeMismatch { size: header_size });
  }
  let file_size = reader.u32_at(OFF_FILE_SIZE)?;
  if file_size as usize != data.len() {
    return Err(DexError::FileSizeMismatch {
      declared: file_size,
      actual: data.len(),
    });
  }

  let string_ids_size = reader.u32_at(OFF_STRING_IDS)? as usize;
  let string_ids_off = reader.u32_at(OFF_STRING_IDS + 4)? as usize;
  let type_ids_size = reader.u32_at(OFF_TYPE_IDS)? as usize;
  let type_ids_off = reader.u32_at(OFF_TYPE_IDS + 4)? as usize;
  let proto_ids_size = reader.u32_at(OFF_PROTO_IDS)? as usize;
  let proto_ids_off = reader.u32_at(OFF_PROTO_IDS + 4)? as usize;
  let method_ids_size = reader.u32_at(OFF_METHOD_IDS)? as usize;
  let method_ids_off = reader.u32_at(OFF_METHOD_IDS + 4)? as usize;
  let class_defs_size = reader.u32_at(OFF_CLASS_DEFS)? as usize;
  let class_defs_off = reader.u32_at(OFF_CLASS_DEFS + 4)? as usize;

  // String table.
  let mut strings: Vec<String> = Vec::with_capacity(string_ids_size);
  for i in 0..string_ids_size {
    let data_off = reader.u32_at(string_ids_off + 4 * i)? as usize;
    strings.push(reader.string_at(data_off)?);
  }

  // Type table: indices into the string table.
  let mut types: Vec<String> = Vec::with_capacity(type_ids_size);
  for i in 0..type_ids_size {
    let descriptor_idx = reader.u32_at(type_ids_off + 4 * i)?;
    types.push(string_index(&strings, descriptor_idx)?.clone());
  }

  // Proto table: reassemble full method descriptors.
  let mut protos: Vec<String> = Vec::with_capacity(proto_ids_size);
  for i in 0..proto_ids_size {
    let base = proto_ids_off + 12 * i;
    // shorty_idx is validated but not needed beyond that.
    let shorty_idx = reader.u32_at(base)?;
    string_index(&strings, shorty_idx)?;
    let return_type_idx = reader.u32_at(base + 4)?;
    let parameters_off = reader.u32_at(base + 8)? as usize;

    let mut descriptor = String::from("(");
    if parameters_off != 0 {
      let param_count = reader.u32_at(parameters_off)? as usize;
      for p in 0..param_count {
        let type_idx = reader.u16_at(parameters_off + 4 + 2 * p)?;
        descriptor.push_str(type_index(&types, u32::from(type_idx))?);
      }
    }
    descriptor.push(')');
    descriptor.push_str(type_index(&types, return_type_idx)?);
    protos.push(descriptor);
  }

  // Method id table.
  let mut method_ids: Vec<RawMethodId> = Vec::with_capacity(method_ids_size);
  for i in 0..method_ids_size {
    // class_idx (first u16) is not needed for listing.
    let base = method_ids_off + 8 * i;
    method_ids.push(RawMethodId {
      proto_idx: reader.u16_at(base + 2)?,
      name_idx: reader.u32_at(base + 4)?,
    });
  }

  // Class definitions plus their class_data method lists.
  let mut classes: Vec<ClassInfo> = Vec::with_capacity(class_defs_size);
  for i in 0..class_defs_size {
    let base = class_defs_off + 32 * i;
    let class_idx = reader.u32_at(base)?;
    let access_flags = reader.u32_at(base + 4)?;
    let class_data_off = reader.u32_at(base + 24)? as usize;

    let descriptor = type_index(&types, class_idx)?.clone();
    let methods = if class_data_off == 0 {
      Vec::new()
    } else {
      parse_class_data(&reader, class_data_off, &method_ids, &strings, &protos)?
    };

    classes.push(ClassInfo {
      descriptor,
      access_flags,
      methods,
    });
  }

  debug!(
    classes = classes.len(),
    strings = strings.len(),
    version = version,
    "parsed container"
  );

  Ok(DexFile { classes })
}

fn string_index(strings: &[String], index: u32) -> Result<&String, DexError> {
  if index == NO_INDEX {
    return Err(DexError::BadIndex {
      kind: "string",
      index,
      len: strings.len(),
    });
  }
  strings.get(index as usize).ok_or(DexError::BadIndex {
    kind: "string",
    index,
    len: strings.len(),
  })
}

fn type_index(types: &[String], index: u32) -> Result<&String, DexError> {
  types.get(index as usize).ok_or(DexError::BadIndex {
    kind: "type",
    index,
    len: types.len(),
  })
}

fn parse_class_data(
  reader: &Reader<'_>,
  offset: usize,
  method_ids: &[RawMethodId],
  strings: &[String],
  protos: &[String],
) -> Result<Vec<MethodInfo>, DexError> {
  let (static_fields, pos) = reader.uleb128_at(offset)?;
  let (instance_fields, pos) = reader.uleb128_at(pos)?;
  let (direct_methods, pos) = reader.uleb128_at(pos)?;
  let (virtual_methods, mut pos) = reader.uleb128_at(pos)?;

  // Fields are encoded as (idx_diff, access_flags) pairs; skip them.
  for _ in 0..(static_fields + instance_fields) {
    let (_, next) = reader.uleb128_at(pos)?;
    let (_, next) = reader.uleb128_at(next)?;
    pos = next;
  }

  let mut methods = Vec::with_capacity((direct_methods + virtual_methods) as usize);
  for (count, is_direct) in [(direct_methods, true), (virtual_methods, false)] {
    let mut method_idx: u32 = 0;
    for j in 0..count {
      let (idx_diff, next) = reader.uleb128_at(pos)?;
      let (access_flags, next) = reader.uleb128_at(next)?;
      let (_code_off, next) = reader.uleb128_at(next)?;
      pos = next;

      method_idx = if j == 0 { idx_diff } else { method_idx + idx_diff };
      let id = method_ids.get(method_idx as usize).ok_or(DexError::BadIndex {
        kind: "method",
        index: method_idx,
        len: method_ids.len(),
      })?;

      methods.push(MethodInfo {
        name: string_index(strings, id.name_idx)?.clone(),
        descriptor: protos
          .get(id.proto_idx as usize)
          .ok_or(DexError::BadIndex {
            kind: "proto",
            index: u32::from(id.proto_idx),
            len: protos.len(),
          })?
          .clone(),
        access_flags,
        is_direct,
      });
    }
  }

  Ok(methods)
}
