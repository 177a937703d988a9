//! Test utilities for dexpipe-lib.
//!
//! Provides a small builder that assembles syntactically valid containers
//! (header, id tables, class_data) so parser, aggregator and driver tests
//! run against real container bytes instead of mocks. Checksum and
//! signature header fields are left zeroed; the reader does not verify
//! them.

use std::collections::{BTreeSet, HashMap};

use crate::dex::ACC_PUBLIC;

const HEADER_SIZE: usize = 0x70;
const ENDIAN_CONSTANT: u32 = 0x1234_5678;
const NO_INDEX: u32 = 0xffff_ffff;
const OBJECT_DESCRIPTOR: &str = "Ljava/lang/Object;";

/// One method of a class under construction.
#[derive(Debug, Clone)]
pub struct DexMethodSpec {
  pub name: String,
  pub params: Vec<String>,
  pub ret: String,
  pub access_flags: u32,
  pub direct: bool,
}

impl DexMethodSpec {
  pub fn new(name: &str, params: &[&str], ret: &str, access_flags: u32, direct: bool) -> Self {
    Self {
      name: name.to_string(),
      params: params.iter().map(|p| p.to_string()).collect(),
      ret: ret.to_string(),
      access_flags,
      direct,
    }
  }
}

/// One class under construction.
#[derive(Debug, Clone)]
pub struct DexClassSpec {
  pub descriptor: String,
  pub access_flags: u32,
  pub methods: Vec<DexMethodSpec>,
}

impl DexClassSpec {
  pub fn new(descriptor: &str) -> Self {
    Self {
      descriptor: descriptor.to_string(),
      access_flags: ACC_PUBLIC,
      methods: Vec::new(),
    }
  }

  pub fn with_method(mut self, method: DexMethodSpec) -> Self {
    self.methods.push(method);
    self
  }
}

fn push_uleb128(out: &mut Vec<u8>, mut value: u32) {
  loop {
    let byte = (value & 0x7f) as u8;
    value >>= 7;
    if value == 0 {
      out.push(byte);
      break;
    }
    out.push(byte | 0x80);
  }
}

fn push_mutf8(out: &mut Vec<u8>, text: &str) {
  for unit in text.encode_utf16() {
    match unit {
      0 => out.extend_from_slice(&[0xc0, 0x80]),
      0x01..=0x7f => out.push(unit as u8),
      0x80..=0x7ff => {
        out.push(0xc0 | (unit >> 6) as u8);
        out.push(0x80 | (unit & 0x3f) as u8);
      }
      _ => {
        out.push(0xe0 | (unit >> 12) as u8);
        out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
        out.push(0x80 | (unit & 0x3f) as u8);
      }
    }
  }
}

fn shorty_char(descriptor: &str) -> char {
  match descriptor.chars().next() {
    Some('L') | Some('[') => 'L',
    Some(c) => c,
    None => 'V',
  }
}

fn shorty(method: &DexMethodSpec) -> String {
  let mut s = String::new();
  s.push(shorty_char(&method.ret));
  for p in &method.params {
    s.push(shorty_char(p));
  }
  s
}

/// Assemble a container holding the given classes.
pub fn build_dex(classes: &[DexClassSpec]) -> Vec<u8> {
  // String pool: type descriptors, method names, shorties. BTreeSet order
  // matches the format's sorted-string-table requirement for ASCII.
  let mut string_set: BTreeSet<String> = BTreeSet::new();
  let mut type_set: BTreeSet<String> = BTreeSet::new();
  string_set.insert(OBJECT_DESCRIPTOR.to_string());
  type_set.insert(OBJECT_DESCRIPTOR.to_string());
  for class in classes {
    string_set.insert(class.descriptor.clone());
    type_set.insert(class.descriptor.clone());
    for method in &class.methods {
      string_set.insert(method.name.clone());
      string_set.insert(method.ret.clone());
      type_set.insert(method.ret.clone());
      string_set.insert(shorty(method));
      for p in &method.params {
        string_set.insert(p.clone());
        type_set.insert(p.clone());
      }
    }
  }

  let strings: Vec<String> = string_set.into_iter().collect();
  let string_idx: HashMap<&str, u32> = strings
    .iter()
    .enumerate()
    .map(|(i, s)| (s.as_str(), i as u32))
    .collect();
  let types: Vec<String> = type_set.into_iter().collect();
  let type_idx: HashMap<&str, u32> = types
    .iter()
    .enumerate()
    .map(|(i, t)| (t.as_str(), i as u32))
    .collect();

  // Proto table: unique (return, params) in first-seen order.
  let mut protos: Vec<(String, Vec<String>)> = Vec::new();
  let mut proto_idx: HashMap<String, u16> = HashMap::new();
  for class in classes {
    for method in &class.methods {
      let key = format!("{}|{}", method.ret, method.params.join(","));
      if !proto_idx.contains_key(&key) {
        proto_idx.insert(key, protos.len() as u16);
        protos.push((method.ret.clone(), method.params.clone()));
      }
    }
  }

  // Method id table, grouped by class in declaration order.
  struct RawMethod {
    class_type: u16,
    proto: u16,
    name: u32,
  }
  let mut method_ids: Vec<RawMethod> = Vec::new();
  let mut class_method_indices: Vec<Vec<u32>> = Vec::new();
  for class in classes {
    let mut indices = Vec::new();
    for method in &class.methods {
      let key = format!("{}|{}", method.ret, method.params.join(","));
      indices.push(method_ids.len() as u32);
      method_ids.push(RawMethod {
        class_type: type_idx[class.descriptor.as_str()] as u16,
        proto: proto_idx[&key],
        name: string_idx[method.name.as_str()],
      });
    }
    class_method_indices.push(indices);
  }

  let string_ids_off = HEADER_SIZE;
  let type_ids_off = string_ids_off + 4 * strings.len();
  let proto_ids_off = type_ids_off + 4 * types.len();
  let method_ids_off = proto_ids_off + 12 * protos.len();
  let class_defs_off = method_ids_off + 8 * method_ids.len();
  let data_off = class_defs_off + 32 * classes.len();

  // Data section: proto parameter type_lists (4-aligned), string data,
  // class_data items. Offsets are absolute.
  let mut data: Vec<u8> = Vec::new();
  let abs = |data: &Vec<u8>| data_off + data.len();

  let mut proto_param_offsets: Vec<u32> = vec![0; protos.len()];
  for (i, (_, params)) in protos.iter().enumerate() {
    if params.is_empty() {
      continue;
    }
    while abs(&data) % 4 != 0 {
      data.push(0);
    }
    proto_param_offsets[i] = abs(&data) as u32;
    data.extend_from_slice(&(params.len() as u32).to_le_bytes());
    for p in params {
      data.extend_from_slice(&(type_idx[p.as_str()] as u16).to_le_bytes());
    }
  }

  let mut string_data_offsets: Vec<u32> = vec![0; strings.len()];
  for (i, s) in strings.iter().enumerate() {
    string_data_offsets[i] = abs(&data) as u32;
    push_uleb128(&mut data, s.encode_utf16().count() as u32);
    push_mutf8(&mut data, s);
    data.push(0);
  }

  let mut class_data_offsets: Vec<u32> = vec![0; classes.len()];
  for (i, class) in classes.iter().enumerate() {
    if class.methods.is_empty() {
      continue;
    }
    class_data_offsets[i] = abs(&data) as u32;

    let mut direct: Vec<(u32, &DexMethodSpec)> = Vec::new();
    let mut virt: Vec<(u32, &DexMethodSpec)> = Vec::new();
    for (j, method) in class.methods.iter().enumerate() {
      let id = class_method_indices[i][j];
      if method.direct {
        direct.push((id, method));
      } else {
        virt.push((id, method));
      }
    }
    direct.sort_by_key(|(id, _)| *id);
    virt.sort_by_key(|(id, _)| *id);

    push_uleb128(&mut data, 0); // static fields
    push_uleb128(&mut data, 0); // instance fields
    push_uleb128(&mut data, direct.len() as u32);
    push_uleb128(&mut data, virt.len() as u32);
    for list in [&direct, &virt] {
      let mut previous = 0u32;
      for (k, (id, method)) in list.iter().enumerate() {
        let diff = if k == 0 { *id } else { *id - previous };
        previous = *id;
        push_uleb128(&mut data, diff);
        push_uleb128(&mut data, method.access_flags);
        push_uleb128(&mut data, 0); // code_off: no code item
      }
    }
  }

  let file_size = (data_off + data.len()) as u32;

  // Header.
  let mut out: Vec<u8> = Vec::with_capacity(file_size as usize);
  out.extend_from_slice(b"dex\n039\0");
  out.extend_from_slice(&0u32.to_le_bytes()); // checksum (unverified)
  out.extend_from_slice(&[0u8; 20]); // signature (unverified)
  out.extend_from_slice(&file_size.to_le_bytes());
  out.extend_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
  out.extend_from_slice(&ENDIAN_CONSTANT.to_le_bytes());
  out.extend_from_slice(&0u32.to_le_bytes()); // link_size
  out.extend_from_slice(&0u32.to_le_bytes()); // link_off
  out.extend_from_slice(&0u32.to_le_bytes()); // map_off
  out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
  out.extend_from_slice(&(string_ids_off as u32).to_le_bytes());
  out.extend_from_slice(&(types.len() as u32).to_le_bytes());
  out.extend_from_slice(&(type_ids_off as u32).to_le_bytes());
  out.extend_from_slice(&(protos.len() as u32).to_le_bytes());
  out.extend_from_slice(&(proto_ids_off as u32).to_le_bytes());
  out.extend_from_slice(&0u32.to_le_bytes()); // field_ids_size
  out.extend_from_slice(&0u32.to_le_bytes()); // field_ids_off
  out.extend_from_slice(&(method_ids.len() as u32).to_le_bytes());
  out.extend_from_slice(&(method_ids_off as u32).to_le_bytes());
  out.extend_from_slice(&(classes.len() as u32).to_le_bytes());
  out.extend_from_slice(&(class_defs_off as u32).to_le_bytes());
  out.extend_from_slice(&(data.len() as u32).to_le_bytes());
  out.extend_from_slice(&(data_off as u32).to_le_bytes());
  debug_assert_eq!(out.len(), HEADER_SIZE);

  // Id tables.
  for off in &string_data_offsets {
    out.extend_from_slice(&off.to_le_bytes());
  }
  for t in &types {
    out.extend_from_slice(&string_idx[t.as_str()].to_le_bytes());
  }
  for (i, (ret, _)) in protos.iter().enumerate() {
    let shorty_key: String = {
      let mut s = String::new();
      s.push(shorty_char(ret));
      for p in &protos[i].1 {
        s.push(shorty_char(p));
      }
      s
    };
    out.extend_from_slice(&string_idx[shorty_key.as_str()].to_le_bytes());
    out.extend_from_slice(&type_idx[ret.as_str()].to_le_bytes());
    out.extend_from_slice(&proto_param_offsets[i].to_le_bytes());
  }
  for id in &method_ids {
    out.extend_from_slice(&id.class_type.to_le_bytes());
    out.extend_from_slice(&id.proto.to_le_bytes());
    out.extend_from_slice(&id.name.to_le_bytes());
  }
  for (i, class) in classes.iter().enumerate() {
    out.extend_from_slice(&type_idx[class.descriptor.as_str()].to_le_bytes());
    out.extend_from_slice(&class.access_flags.to_le_bytes());
    out.extend_from_slice(&type_idx[OBJECT_DESCRIPTOR].to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // interfaces_off
    out.extend_from_slice(&NO_INDEX.to_le_bytes()); // source_file_idx
    out.extend_from_slice(&0u32.to_le_bytes()); // annotations_off
    out.extend_from_slice(&class_data_offsets[i].to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // static_values_off
  }

  out.extend_from_slice(&data);
  out
}
