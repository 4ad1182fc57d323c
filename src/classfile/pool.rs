//! Constant pool model. Entries keep their raw payloads so that a class
//! without renamed symbols serializes back to identical bytes.

use super::bytes::{ByteReader, WriteBytes};
use crate::error::ClassFormatError;

const UTF8: u8 = 1;
const INTEGER: u8 = 3;
const FLOAT: u8 = 4;
const LONG: u8 = 5;
const DOUBLE: u8 = 6;
const CLASS: u8 = 7;
const STRING: u8 = 8;
const FIELD_REF: u8 = 9;
const METHOD_REF: u8 = 10;
const INTERFACE_METHOD_REF: u8 = 11;
const NAME_AND_TYPE: u8 = 12;
const METHOD_HANDLE: u8 = 15;
const METHOD_TYPE: u8 = 16;
const DYNAMIC: u8 = 17;
const INVOKE_DYNAMIC: u8 = 18;
const MODULE: u8 = 19;
const PACKAGE: u8 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Index 0 and the slot following a long or double.
    Unusable,
    /// Modified UTF-8 payload, undecoded.
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ClassFormatError> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut index = 1u16;
        while index < count {
            let tag = reader.u8()?;
            let constant = match tag {
                UTF8 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(reader.bytes(len)?.to_vec())
                }
                INTEGER => Constant::Integer(reader.u32()?),
                FLOAT => Constant::Float(reader.u32()?),
                LONG => Constant::Long(reader.u64()?),
                DOUBLE => Constant::Double(reader.u64()?),
                CLASS => Constant::Class { name: reader.u16()? },
                STRING => Constant::String { value: reader.u16()? },
                FIELD_REF => Constant::FieldRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                METHOD_REF => Constant::MethodRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                NAME_AND_TYPE => Constant::NameAndType {
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                },
                METHOD_HANDLE => Constant::MethodHandle {
                    kind: reader.u8()?,
                    reference: reader.u16()?,
                },
                METHOD_TYPE => Constant::MethodType {
                    descriptor: reader.u16()?,
                },
                DYNAMIC => Constant::Dynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                MODULE => Constant::Module { name: reader.u16()? },
                PACKAGE => Constant::Package { name: reader.u16()? },
                tag => return Err(ClassFormatError::UnknownConstant { tag, index }),
            };

            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(constant);
            index += 1;
            if wide {
                if index >= count {
                    return Err(ClassFormatError::BadConstant {
                        index: index - 1,
                        expected: "8-byte constant inside the pool",
                    });
                }
                entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassFormatError> {
        out.put_len16(self.entries.len(), "constant pool")?;

        for constant in &self.entries {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(bytes) => {
                    out.put_u8(UTF8);
                    out.put_len16(bytes.len(), "UTF-8 constant")?;
                    out.put_bytes(bytes);
                }
                Constant::Integer(v) => {
                    out.put_u8(INTEGER);
                    out.put_u32(*v);
                }
                Constant::Float(v) => {
                    out.put_u8(FLOAT);
                    out.put_u32(*v);
                }
                Constant::Long(v) => {
                    out.put_u8(LONG);
                    out.put_u64(*v);
                }
                Constant::Double(v) => {
                    out.put_u8(DOUBLE);
                    out.put_u64(*v);
                }
                Constant::Class { name } => {
                    out.put_u8(CLASS);
                    out.put_u16(*name);
                }
                Constant::String { value } => {
                    out.put_u8(STRING);
                    out.put_u16(*value);
                }
                Constant::FieldRef {
                    class,
                    name_and_type,
                } => write_pair(out, FIELD_REF, *class, *name_and_type),
                Constant::MethodRef {
                    class,
                    name_and_type,
                } => write_pair(out, METHOD_REF, *class, *name_and_type),
                Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => write_pair(out, INTERFACE_METHOD_REF, *class, *name_and_type),
                Constant::NameAndType { name, descriptor } => {
                    write_pair(out, NAME_AND_TYPE, *name, *descriptor)
                }
                Constant::MethodHandle { kind, reference } => {
                    out.put_u8(METHOD_HANDLE);
                    out.put_u8(*kind);
                    out.put_u16(*reference);
                }
                Constant::MethodType { descriptor } => {
                    out.put_u8(METHOD_TYPE);
                    out.put_u16(*descriptor);
                }
                Constant::Dynamic {
                    bootstrap,
                    name_and_type,
                } => write_pair(out, DYNAMIC, *bootstrap, *name_and_type),
                Constant::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => write_pair(out, INVOKE_DYNAMIC, *bootstrap, *name_and_type),
                Constant::Module { name } => {
                    out.put_u8(MODULE);
                    out.put_u16(*name);
                }
                Constant::Package { name } => {
                    out.put_u8(PACKAGE);
                    out.put_u16(*name);
                }
            }
        }

        Ok(())
    }

    /// Number of slots, including the unusable slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Constant] {
        &mut self.entries
    }

    pub fn utf8_bytes(&self, index: u16) -> Result<&[u8], ClassFormatError> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => Ok(bytes),
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "UTF-8 constant",
            }),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<String, ClassFormatError> {
        decode_modified_utf8(self.utf8_bytes(index)?).ok_or(ClassFormatError::BadConstant {
            index,
            expected: "modified UTF-8 string",
        })
    }

    /// Resolves a `CONSTANT_Class` entry to its internal name.
    pub fn class_name(&self, index: u16) -> Result<String, ClassFormatError> {
        match self.get(index) {
            Some(Constant::Class { name }) => self.utf8(*name),
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "class constant",
            }),
        }
    }

    pub(crate) fn set_utf8(&mut self, index: u16, value: &str) -> Result<(), ClassFormatError> {
        let encoded = encode_modified_utf8(value)?;
        match self.entries.get_mut(index as usize) {
            Some(Constant::Utf8(bytes)) => {
                *bytes = encoded;
                Ok(())
            }
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "UTF-8 constant",
            }),
        }
    }

    pub(crate) fn push_utf8(&mut self, value: &str) -> Result<u16, ClassFormatError> {
        let index = u16::try_from(self.entries.len())
            .ok()
            .filter(|i| *i < u16::MAX)
            .ok_or(ClassFormatError::PoolOverflow)?;
        self.entries.push(Constant::Utf8(encode_modified_utf8(value)?));
        Ok(index)
    }
}

fn write_pair(out: &mut Vec<u8>, tag: u8, first: u16, second: u16) {
    out.put_u8(tag);
    out.put_u16(first);
    out.put_u16(second);
}

/// Decodes the JVM's modified UTF-8 (`\0` as two bytes, supplementary
/// characters as surrogate pairs).
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_string());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            units.push(
                (((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return None;
        }
    }

    String::from_utf16(&units).ok()
}

pub fn encode_modified_utf8(value: &str) -> Result<Vec<u8>, ClassFormatError> {
    let mut out = Vec::with_capacity(value.len());
    let mut buf = [0u16; 2];

    for c in value.chars() {
        if c == '\0' {
            out.extend_from_slice(&[0xC0, 0x80]);
        } else if (c as u32) < 0x10000 {
            let mut utf8 = [0u8; 3];
            out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        } else {
            for unit in c.encode_utf16(&mut buf).iter() {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    if out.len() > u16::MAX as usize {
        return Err(ClassFormatError::TooLong {
            what: "UTF-8 constant",
            len: out.len(),
        });
    }
    Ok(out)
}
