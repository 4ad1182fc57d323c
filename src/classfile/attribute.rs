//! Typed model of the attributes that can carry type names. Everything else
//! is kept as raw bytes and written back untouched.

use super::bytes::{ByteReader, WriteBytes};
use super::pool::ConstantPool;
use crate::error::ClassFormatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: u16,
    pub body: AttributeBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeBody {
    Code(Code),
    Signature(u16),
    LocalVariableTable(Vec<LocalVariable>),
    LocalVariableTypeTable(Vec<LocalVariable>),
    Annotations(Vec<Annotation>),
    ParameterAnnotations(Vec<Vec<Annotation>>),
    TypeAnnotations(Vec<TypeAnnotation>),
    AnnotationDefault(ElementValue),
    Record(Vec<RecordComponent>),
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// `exception_table` entries, 8 bytes each; they only point at class constants.
    pub exception_table: Vec<[u8; 8]>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    /// Descriptor in a `LocalVariableTable`, signature in a `LocalVariableTypeTable`.
    pub type_index: u16,
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub type_index: u16,
    pub elements: Vec<(u16, ElementValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant; `tag` is one of `BCDFIJSZs`.
    Const { tag: u8, index: u16 },
    Enum { type_index: u16, const_name_index: u16 },
    Class(u16),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation {
    /// `target_type`, `target_info` and `type_path`, verbatim.
    pub target: Vec<u8>,
    pub annotation: Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordComponent {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

pub(crate) fn parse_attributes(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Attribute>, ClassFormatError> {
    let count = reader.u16()?;
    (0..count).map(|_| parse_attribute(reader, pool)).collect()
}

fn parse_attribute(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Attribute, ClassFormatError> {
    let name_index = reader.u16()?;
    let len = reader.u32()? as usize;
    let data = reader.bytes(len)?;

    // attribute names are looked up leniently, an odd name just stays raw
    let name = pool.utf8(name_index).unwrap_or_default();
    let mut body_reader = ByteReader::new(data);
    let body = match name.as_str() {
        "Code" => AttributeBody::Code(parse_code(&mut body_reader, pool)?),
        "Signature" => AttributeBody::Signature(body_reader.u16()?),
        "LocalVariableTable" => {
            AttributeBody::LocalVariableTable(parse_local_variables(&mut body_reader)?)
        }
        "LocalVariableTypeTable" => {
            AttributeBody::LocalVariableTypeTable(parse_local_variables(&mut body_reader)?)
        }
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
            AttributeBody::Annotations(parse_annotations(&mut body_reader)?)
        }
        "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
            let parameters = body_reader.u8()?;
            let annotations = (0..parameters)
                .map(|_| parse_annotations(&mut body_reader))
                .collect::<Result<_, _>>()?;
            AttributeBody::ParameterAnnotations(annotations)
        }
        "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
            let count = body_reader.u16()?;
            let annotations = (0..count)
                .map(|_| parse_type_annotation(&mut body_reader))
                .collect::<Result<_, _>>()?;
            AttributeBody::TypeAnnotations(annotations)
        }
        "AnnotationDefault" => {
            AttributeBody::AnnotationDefault(parse_element_value(&mut body_reader)?)
        }
        "Record" => {
            let count = body_reader.u16()?;
            let components = (0..count)
                .map(|_| {
                    Ok(RecordComponent {
                        name_index: body_reader.u16()?,
                        descriptor_index: body_reader.u16()?,
                        attributes: parse_attributes(&mut body_reader, pool)?,
                    })
                })
                .collect::<Result<_, ClassFormatError>>()?;
            AttributeBody::Record(components)
        }
        _ => {
            return Ok(Attribute {
                name_index,
                body: AttributeBody::Raw(data.to_vec()),
            })
        }
    };

    if body_reader.remaining() != 0 {
        return Err(ClassFormatError::BadAttribute { name });
    }

    Ok(Attribute { name_index, body })
}

fn parse_code(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Code, ClassFormatError> {
    let max_stack = reader.u16()?;
    let max_locals = reader.u16()?;
    let code_len = reader.u32()? as usize;
    let code = reader.bytes(code_len)?.to_vec();

    let handlers = reader.u16()?;
    let mut exception_table = Vec::with_capacity(handlers as usize);
    for _ in 0..handlers {
        let mut entry = [0u8; 8];
        entry.copy_from_slice(reader.bytes(8)?);
        exception_table.push(entry);
    }

    Ok(Code {
        max_stack,
        max_locals,
        code,
        exception_table,
        attributes: parse_attributes(reader, pool)?,
    })
}

fn parse_local_variables(
    reader: &mut ByteReader<'_>,
) -> Result<Vec<LocalVariable>, ClassFormatError> {
    let count = reader.u16()?;
    (0..count)
        .map(|_| {
            Ok(LocalVariable {
                start_pc: reader.u16()?,
                length: reader.u16()?,
                name_index: reader.u16()?,
                type_index: reader.u16()?,
                index: reader.u16()?,
            })
        })
        .collect()
}

fn parse_annotations(reader: &mut ByteReader<'_>) -> Result<Vec<Annotation>, ClassFormatError> {
    let count = reader.u16()?;
    (0..count).map(|_| parse_annotation(reader)).collect()
}

fn parse_annotation(reader: &mut ByteReader<'_>) -> Result<Annotation, ClassFormatError> {
    let type_index = reader.u16()?;
    let pairs = reader.u16()?;
    let elements = (0..pairs)
        .map(|_| Ok((reader.u16()?, parse_element_value(reader)?)))
        .collect::<Result<_, ClassFormatError>>()?;
    Ok(Annotation {
        type_index,
        elements,
    })
}

fn parse_element_value(reader: &mut ByteReader<'_>) -> Result<ElementValue, ClassFormatError> {
    let at = reader.position();
    let tag = reader.u8()?;
    Ok(match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
            tag,
            index: reader.u16()?,
        },
        b'e' => ElementValue::Enum {
            type_index: reader.u16()?,
            const_name_index: reader.u16()?,
        },
        b'c' => ElementValue::Class(reader.u16()?),
        b'@' => ElementValue::Annotation(parse_annotation(reader)?),
        b'[' => {
            let count = reader.u16()?;
            ElementValue::Array(
                (0..count)
                    .map(|_| parse_element_value(reader))
                    .collect::<Result<_, _>>()?,
            )
        }
        _ => {
            return Err(ClassFormatError::BadAttribute {
                name: format!("element value tag {:?} at offset {at}", tag as char),
            })
        }
    })
}

fn parse_type_annotation(reader: &mut ByteReader<'_>) -> Result<TypeAnnotation, ClassFormatError> {
    let start = reader.position();
    let mut target = vec![reader.u8()?];

    let info_len = match target[0] {
        0x00 | 0x01 | 0x16 => 1,
        0x10 | 0x11 | 0x12 | 0x17 | 0x42 | 0x43..=0x46 => 2,
        0x47..=0x4B => 3,
        0x13..=0x15 => 0,
        0x40 | 0x41 => {
            let table = reader.u16()?;
            target.extend_from_slice(&table.to_be_bytes());
            table as usize * 6
        }
        other => {
            return Err(ClassFormatError::BadAttribute {
                name: format!("type annotation target {other:#04x} at offset {start}"),
            })
        }
    };
    target.extend_from_slice(reader.bytes(info_len)?);

    let path_len = reader.u8()?;
    target.push(path_len);
    target.extend_from_slice(reader.bytes(path_len as usize * 2)?);

    Ok(TypeAnnotation {
        target,
        annotation: parse_annotation(reader)?,
    })
}

pub(crate) fn write_attributes(
    out: &mut Vec<u8>,
    attributes: &[Attribute],
) -> Result<(), ClassFormatError> {
    out.put_len16(attributes.len(), "attributes")?;
    for attribute in attributes {
        let mut body = Vec::new();
        write_body(&mut body, &attribute.body)?;

        out.put_u16(attribute.name_index);
        let len = u32::try_from(body.len()).map_err(|_| ClassFormatError::TooLong {
            what: "attribute",
            len: body.len(),
        })?;
        out.put_u32(len);
        out.put_bytes(&body);
    }
    Ok(())
}

fn write_body(out: &mut Vec<u8>, body: &AttributeBody) -> Result<(), ClassFormatError> {
    match body {
        AttributeBody::Code(code) => {
            out.put_u16(code.max_stack);
            out.put_u16(code.max_locals);
            out.put_u32(code.code.len() as u32);
            out.put_bytes(&code.code);
            out.put_len16(code.exception_table.len(), "exception table")?;
            for entry in &code.exception_table {
                out.put_bytes(entry);
            }
            write_attributes(out, &code.attributes)?;
        }
        AttributeBody::Signature(index) => out.put_u16(*index),
        AttributeBody::LocalVariableTable(vars) | AttributeBody::LocalVariableTypeTable(vars) => {
            out.put_len16(vars.len(), "local variable table")?;
            for var in vars {
                out.put_u16(var.start_pc);
                out.put_u16(var.length);
                out.put_u16(var.name_index);
                out.put_u16(var.type_index);
                out.put_u16(var.index);
            }
        }
        AttributeBody::Annotations(annotations) => write_annotations(out, annotations)?,
        AttributeBody::ParameterAnnotations(parameters) => {
            let count = u8::try_from(parameters.len()).map_err(|_| ClassFormatError::TooLong {
                what: "parameter annotations",
                len: parameters.len(),
            })?;
            out.put_u8(count);
            for annotations in parameters {
                write_annotations(out, annotations)?;
            }
        }
        AttributeBody::TypeAnnotations(annotations) => {
            out.put_len16(annotations.len(), "type annotations")?;
            for annotation in annotations {
                out.put_bytes(&annotation.target);
                write_annotation(out, &annotation.annotation)?;
            }
        }
        AttributeBody::AnnotationDefault(value) => write_element_value(out, value)?,
        AttributeBody::Record(components) => {
            out.put_len16(components.len(), "record components")?;
            for component in components {
                out.put_u16(component.name_index);
                out.put_u16(component.descriptor_index);
                write_attributes(out, &component.attributes)?;
            }
        }
        AttributeBody::Raw(data) => out.put_bytes(data),
    }
    Ok(())
}

fn write_annotations(out: &mut Vec<u8>, annotations: &[Annotation]) -> Result<(), ClassFormatError> {
    out.put_len16(annotations.len(), "annotations")?;
    for annotation in annotations {
        write_annotation(out, annotation)?;
    }
    Ok(())
}

fn write_annotation(out: &mut Vec<u8>, annotation: &Annotation) -> Result<(), ClassFormatError> {
    out.put_u16(annotation.type_index);
    out.put_len16(annotation.elements.len(), "annotation elements")?;
    for (name_index, value) in &annotation.elements {
        out.put_u16(*name_index);
        write_element_value(out, value)?;
    }
    Ok(())
}

fn write_element_value(out: &mut Vec<u8>, value: &ElementValue) -> Result<(), ClassFormatError> {
    match value {
        ElementValue::Const { tag, index } => {
            out.put_u8(*tag);
            out.put_u16(*index);
        }
        ElementValue::Enum {
            type_index,
            const_name_index,
        } => {
            out.put_u8(b'e');
            out.put_u16(*type_index);
            out.put_u16(*const_name_index);
        }
        ElementValue::Class(index) => {
            out.put_u8(b'c');
            out.put_u16(*index);
        }
        ElementValue::Annotation(annotation) => {
            out.put_u8(b'@');
            write_annotation(out, annotation)?;
        }
        ElementValue::Array(values) => {
            out.put_u8(b'[');
            out.put_len16(values.len(), "annotation array")?;
            for value in values {
                write_element_value(out, value)?;
            }
        }
    }
    Ok(())
}
