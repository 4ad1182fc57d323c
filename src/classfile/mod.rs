//! JVM class file model: parse into an explicit structure, rename symbols,
//! serialize back.

pub mod attribute;
mod bytes;
pub mod pool;
pub mod rewrite;
pub mod signature;

use attribute::{parse_attributes, write_attributes, Attribute};
use bytes::{ByteReader, WriteBytes};
use pool::ConstantPool;

use crate::error::ClassFormatError;

pub use rewrite::ClassRewriter;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

/// A field or a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    pub fn parse(data: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = ByteReader::new(data);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;

        let interface_count = reader.u16()?;
        let interfaces = (0..interface_count)
            .map(|_| reader.u16())
            .collect::<Result<_, _>>()?;

        let fields = parse_members(&mut reader, &pool)?;
        let methods = parse_members(&mut reader, &pool)?;
        let attributes = parse_attributes(&mut reader, &pool)?;

        if reader.remaining() != 0 {
            return Err(ClassFormatError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassFormatError> {
        let mut out = Vec::new();
        out.put_u32(MAGIC);
        out.put_u16(self.minor_version);
        out.put_u16(self.major_version);
        self.pool.write(&mut out)?;

        out.put_u16(self.access_flags);
        out.put_u16(self.this_class);
        out.put_u16(self.super_class);

        out.put_len16(self.interfaces.len(), "interfaces")?;
        for interface in &self.interfaces {
            out.put_u16(*interface);
        }

        write_members(&mut out, &self.fields)?;
        write_members(&mut out, &self.methods)?;
        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }

    /// Internal name of this class, e.g. `org/antlr/v4/Tool`.
    pub fn name(&self) -> Result<String, ClassFormatError> {
        self.pool.class_name(self.this_class)
    }

    /// `None` for `java/lang/Object` and module descriptors.
    pub fn super_name(&self) -> Result<Option<String>, ClassFormatError> {
        match self.super_class {
            0 => Ok(None),
            index => self.pool.class_name(index).map(Some),
        }
    }

    pub fn interface_names(&self) -> Result<Vec<String>, ClassFormatError> {
        self.interfaces
            .iter()
            .map(|index| self.pool.class_name(*index))
            .collect()
    }
}

fn parse_members(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Member>, ClassFormatError> {
    let count = reader.u16()?;
    (0..count)
        .map(|_| {
            Ok(Member {
                access_flags: reader.u16()?,
                name_index: reader.u16()?,
                descriptor_index: reader.u16()?,
                attributes: parse_attributes(reader, pool)?,
            })
        })
        .collect()
}

fn write_members(out: &mut Vec<u8>, members: &[Member]) -> Result<(), ClassFormatError> {
    out.put_len16(members.len(), "members")?;
    for member in members {
        out.put_u16(member.access_flags);
        out.put_u16(member.name_index);
        out.put_u16(member.descriptor_index);
        write_attributes(out, &member.attributes)?;
    }
    Ok(())
}

/// Builds small but structurally complete class files for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::bytes::WriteBytes;

    #[derive(Default)]
    pub struct ClassBuilder {
        pool: Vec<Vec<u8>>,
        body: Vec<u8>,
    }

    impl ClassBuilder {
        pub fn utf8(&mut self, value: &str) -> u16 {
            let mut entry = vec![1];
            entry.put_u16(value.len() as u16);
            entry.put_bytes(value.as_bytes());
            self.push(entry)
        }

        pub fn class(&mut self, name: &str) -> u16 {
            let name = self.utf8(name);
            let mut entry = vec![7];
            entry.put_u16(name);
            self.push(entry)
        }

        pub fn string(&mut self, value: &str) -> u16 {
            let value = self.utf8(value);
            let mut entry = vec![8];
            entry.put_u16(value);
            self.push(entry)
        }

        pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
            let class = self.class(owner);
            let name = self.utf8(name);
            let descriptor = self.utf8(descriptor);
            let mut nat = vec![12];
            nat.put_u16(name);
            nat.put_u16(descriptor);
            let nat = self.push(nat);
            let mut entry = vec![10];
            entry.put_u16(class);
            entry.put_u16(nat);
            self.push(entry)
        }

        pub fn push(&mut self, entry: Vec<u8>) -> u16 {
            self.pool.push(entry);
            self.pool.len() as u16
        }

        /// Everything after the constant pool.
        pub fn body(&mut self) -> &mut Vec<u8> {
            &mut self.body
        }

        pub fn finish(self) -> Vec<u8> {
            let mut out = Vec::new();
            out.put_u32(0xCAFE_BABE);
            out.put_u16(0);
            out.put_u16(61);
            out.put_u16(self.pool.len() as u16 + 1);
            for entry in &self.pool {
                out.put_bytes(entry);
            }
            out.put_bytes(&self.body);
            out
        }
    }

    /// `class <name> extends <super>` with one field, one method whose code
    /// loads a string constant and calls `helper`, a class signature and a
    /// runtime-visible annotation.
    pub fn sample_class(
        name: &str,
        super_name: &str,
        helper: &str,
        field_descriptor: &str,
        text: &str,
    ) -> Vec<u8> {
        let mut b = ClassBuilder::default();
        let this_class = b.class(name);
        let super_class = b.class(super_name);
        let field_name = b.utf8("value");
        let field_desc = b.utf8(field_descriptor);
        let method_name = b.utf8("run");
        let method_desc = b.utf8(&format!("({field_descriptor})V"));
        let code_name = b.utf8("Code");
        let signature_name = b.utf8("Signature");
        let signature = b.utf8(&format!("L{super_name}<L{helper};>;"));
        let annotations_name = b.utf8("RuntimeVisibleAnnotations");
        let annotation_type = b.utf8(&format!("L{helper};"));
        let element_name = b.utf8("value");
        let text_const = b.string(text);
        let call = b.method_ref(helper, "call", "(Ljava/lang/String;)V");

        let body = b.body();
        body.put_u16(0x0021);
        body.put_u16(this_class);
        body.put_u16(super_class);
        body.put_u16(0); // interfaces

        body.put_u16(1); // fields
        body.put_u16(0x0002);
        body.put_u16(field_name);
        body.put_u16(field_desc);
        body.put_u16(0);

        let code = [0x12, text_const as u8, 0xB8, 0x00, call as u8, 0xB1];
        body.put_u16(1); // methods
        body.put_u16(0x0001);
        body.put_u16(method_name);
        body.put_u16(method_desc);
        body.put_u16(1);
        body.put_u16(code_name);
        body.put_u32(12 + code.len() as u32);
        body.put_u16(1);
        body.put_u16(2);
        body.put_u32(code.len() as u32);
        body.put_bytes(&code);
        body.put_u16(0);
        body.put_u16(0);

        body.put_u16(2); // class attributes
        body.put_u16(signature_name);
        body.put_u32(2);
        body.put_u16(signature);
        body.put_u16(annotations_name);
        body.put_u32(2 + 2 + 2 + 2 + 1 + 2);
        body.put_u16(1);
        body.put_u16(annotation_type);
        body.put_u16(1);
        body.put_u16(element_name);
        body.put_u8(b's');
        body.put_u16(text_const - 1);

        b.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::sample_class;
    use super::*;

    #[test]
    fn parse_reads_names() {
        let bytes = sample_class(
            "org/antlr/v4/Lexer",
            "org/antlr/v4/Base",
            "org/antlr/v4/Parser",
            "Lorg/antlr/v4/Token;",
            "hello",
        );
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "org/antlr/v4/Lexer");
        assert_eq!(class.super_name().unwrap().as_deref(), Some("org/antlr/v4/Base"));
        assert!(class.interface_names().unwrap().is_empty());
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.attributes.len(), 2);
    }

    #[test]
    fn serialize_reproduces_input_bytes() {
        let bytes = sample_class(
            "com/example/Main",
            "java/lang/Object",
            "com/example/Helper",
            "I",
            "text",
        );
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = ClassFile::parse(&[0, 0, 0, 0, 0, 0, 0, 61]).unwrap_err();
        assert_eq!(err, ClassFormatError::BadMagic(0));
    }

    #[test]
    fn rejects_truncated_class() {
        let bytes = sample_class("a/B", "java/lang/Object", "a/C", "I", "x");
        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 3]),
            Err(ClassFormatError::Truncated(_))
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = sample_class("a/B", "java/lang/Object", "a/C", "I", "x");
        bytes.push(0);
        assert_eq!(
            ClassFile::parse(&bytes).unwrap_err(),
            ClassFormatError::TrailingBytes(1)
        );
    }
}
