//! Parsed container model and access-flag constants.

use thiserror::Error;

/// `ACC_PUBLIC` method/class flag.
pub const ACC_PUBLIC: u32 = 0x0001;
/// `ACC_PRIVATE` method flag.
pub const ACC_PRIVATE: u32 = 0x0002;
/// `ACC_PROTECTED` method flag.
pub const ACC_PROTECTED: u32 = 0x0004;
/// `ACC_STATIC` method flag.
pub const ACC_STATIC: u32 = 0x0008;
/// `ACC_CONSTRUCTOR` synthetic flag carried by `<init>`/`<clinit>`.
pub const ACC_CONSTRUCTOR: u32 = 0x1_0000;

/// Method descriptor of the entry point: one `String[]` parameter, `void`.
pub const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// Errors raised while reading a container.
#[derive(Debug, Error)]
pub enum DexError {
  #[error("container truncated at offset {offset}")]
  Truncated { offset: usize },

  #[error("not a dex container (bad magic)")]
  BadMagic,

  #[error("unsupported dex version {version}")]
  UnsupportedVersion { version: String },

  #[error("unsupported endian tag {tag:#010x}")]
  BadEndianTag { tag: u32 },

  #[error("declared header size {size:#x} does not match the dex layout")]
  HeaderSizeMismatch { size: u32 },

  #[error("declared file size {declared} does not match actual size {actual}")]
  FileSizeMismatch { declared: u32, actual: usize },

  #[error("{kind} index {index} out of range (table holds {len})")]
  BadIndex {
    kind: &'static str,
    index: u32,
    len: usize,
  },

  #[error("malformed string data at offset {offset}")]
  BadString { offset: usize },

  #[error("malformed uleb128 at offset {offset}")]
  BadUleb { offset: usize },
}

/// One method of a parsed class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
  /// Simple method name, e.g. `main` or `<init>`.
  pub name: String,

  /// Full method descriptor, e.g. `([Ljava/lang/String;)V`.
  pub descriptor: String,

  /// Raw access flags.
  pub access_flags: u32,

  /// True for direct methods (static, private, constructors), false for
  /// virtual ones.
  pub is_direct: bool,
}

impl MethodInfo {
  pub fn is_public(&self) -> bool {
    self.access_flags & ACC_PUBLIC != 0
  }

  pub fn is_static(&self) -> bool {
    self.access_flags & ACC_STATIC != 0
  }

  pub fn is_constructor(&self) -> bool {
    self.access_flags & ACC_CONSTRUCTOR != 0 || self.name == "<init>"
  }
}

/// One class defined by a container, in class_defs order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
  /// Type descriptor, e.g. `La/Main;`.
  pub descriptor: String,

  /// Raw class access flags.
  pub access_flags: u32,

  /// Methods in class_data order (direct then virtual).
  pub methods: Vec<MethodInfo>,
}

impl ClassInfo {
  /// Binary name derived from the descriptor: `La/Main;` becomes `a.Main`.
  pub fn binary_name(&self) -> String {
    descriptor_to_binary_name(&self.descriptor)
  }

  /// Find a method by simple name and full descriptor.
  pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
    self
      .methods
      .iter()
      .find(|m| m.name == name && m.descriptor == descriptor)
  }

  /// True when the class has a public no-argument constructor.
  pub fn has_public_noarg_constructor(&self) -> bool {
    self
      .methods
      .iter()
      .any(|m| m.name == "<init>" && m.descriptor == "()V" && m.is_public())
  }
}

/// A fully parsed container.
#[derive(Debug, Clone)]
pub struct DexFile {
  /// Classes in scan (class_defs) order.
  pub classes: Vec<ClassInfo>,
}

impl DexFile {
  /// Look up a class by binary name.
  pub fn find_class(&self, binary_name: &str) -> Option<&ClassInfo> {
    self.classes.iter().find(|c| c.binary_name() == binary_name)
  }
}

/// Convert a type descriptor to a binary name. Reference descriptors lose
/// the `L`/`;` wrapping and use dots; anything else is returned verbatim.
pub fn descriptor_to_binary_name(descriptor: &str) -> String {
  match descriptor.strip_prefix('L').and_then(|d| d.strip_suffix(';')) {
    Some(inner) => inner.replace('/', "."),
    None => descriptor.to_string(),
  }
}

/// Convert a binary name back to a type descriptor: `a.Main` becomes
/// `La/Main;`.
pub fn binary_name_to_descriptor(binary_name: &str) -> String {
  format!("L{};", binary_name.replace('.', "/"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn descriptor_round_trips_binary_name() {
    assert_eq!(descriptor_to_binary_name("La/b/Main;"), "a.b.Main");
    assert_eq!(binary_name_to_descriptor("a.b.Main"), "La/b/Main;");
    assert_eq!(descriptor_to_binary_name("I"), "I");
  }

  #[test]
  fn method_flag_queries() {
    let method = MethodInfo {
      name: "main".to_string(),
      descriptor: MAIN_DESCRIPTOR.to_string(),
      access_flags: ACC_PUBLIC | ACC_STATIC,
      is_direct: true,
    };
    assert!(method.is_public());
    assert!(method.is_static());
    assert!(!method.is_constructor());

    let ctor = MethodInfo {
      name: "<init>".to_string(),
      descriptor: "()V".to_string(),
      access_flags: ACC_PUBLIC,
      is_direct: true,
    };
    assert!(ctor.is_constructor());
  }

  #[test]
  fn public_noarg_constructor_detection() {
    let class = ClassInfo {
      descriptor: "La/B;".to_string(),
      access_flags: ACC_PUBLIC,
      methods: vec![MethodInfo {
        name: "<init>".to_string(),
        descriptor: "(I)V".to_string(),
        access_flags: ACC_PUBLIC,
        is_direct: true,
      }],
    };
    assert!(!class.has_public_noarg_constructor());
  }
}
