//! The rename pass. Every constant pool slot that points at a UTF-8 constant
//! is visited together with the role it plays (class name, descriptor,
//! signature, string value, ...). New values are computed per role; a UTF-8
//! constant whose uses disagree about its new value is split, so every use
//! ends up with exactly the text it needs.
//!
//! Stack map frames refer to classes through `CONSTANT_Class` entries, which
//! are renamed here, so frame verification types follow the new names
//! without recomputing the frames.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::attribute::{Annotation, Attribute, AttributeBody, ElementValue};
use super::pool::{decode_modified_utf8, Constant, ConstantPool};
use super::signature::{remap_descriptor, remap_signature};
use super::ClassFile;
use crate::error::ClassFormatError;
use crate::relocate::SymbolRemapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Role {
    /// Member, attribute and element names; never renamed.
    Opaque,
    /// Target of a `CONSTANT_Class`: an internal name or an array descriptor.
    ClassName,
    Descriptor,
    Signature,
    StringValue,
    PackageName,
}

/// Rewrites class files so that every symbolic reference goes through a
/// [`SymbolRemapper`].
#[derive(Debug, Clone, Copy)]
pub struct ClassRewriter<'a> {
    remapper: SymbolRemapper<'a>,
}

impl<'a> ClassRewriter<'a> {
    pub fn new(remapper: SymbolRemapper<'a>) -> Self {
        Self { remapper }
    }

    pub fn rewrite(&self, data: &[u8]) -> Result<Vec<u8>, ClassFormatError> {
        let mut class = ClassFile::parse(data)?;
        self.remap(&mut class)?;
        class.to_bytes()
    }

    pub fn remap(&self, class: &mut ClassFile) -> Result<(), ClassFormatError> {
        let mut uses: Vec<(u16, Role)> = Vec::new();
        visit_class(class, &mut |slot: &mut u16, role: Role| uses.push((*slot, role)));

        let mut computed: HashMap<(u16, Role), Option<String>> = HashMap::new();
        let mut targets: Vec<Option<String>> = Vec::with_capacity(uses.len());
        for &(index, role) in &uses {
            let target = match computed.get(&(index, role)) {
                Some(target) => target.clone(),
                None => {
                    let target = self.target(&class.pool, index, role)?;
                    computed.insert((index, role), target.clone());
                    target
                }
            };
            targets.push(target);
        }

        // per constant: does some use keep the old text, and which new texts are wanted
        let mut outcomes: BTreeMap<u16, (bool, BTreeSet<&str>)> = BTreeMap::new();
        for (&(index, _), target) in uses.iter().zip(&targets) {
            let outcome = outcomes.entry(index).or_default();
            match target {
                Some(value) => {
                    outcome.1.insert(value.as_str());
                }
                None => outcome.0 = true,
            }
        }

        let mut split: BTreeSet<u16> = BTreeSet::new();
        for (index, (keeps_original, values)) in &outcomes {
            match (*keeps_original, values.len()) {
                (_, 0) => {}
                (false, 1) => {
                    if let Some(value) = values.first() {
                        class.pool.set_utf8(*index, value)?;
                    }
                }
                _ => {
                    split.insert(*index);
                }
            }
        }

        if split.is_empty() {
            return Ok(());
        }

        let mut appended: HashMap<&str, u16> = HashMap::new();
        let mut repointed: Vec<u16> = Vec::with_capacity(uses.len());
        for (&(index, _), target) in uses.iter().zip(&targets) {
            let new_index = match target {
                Some(value) if split.contains(&index) => match appended.get(value.as_str()) {
                    Some(existing) => *existing,
                    None => {
                        let added = class.pool.push_utf8(value)?;
                        appended.insert(value.as_str(), added);
                        added
                    }
                },
                _ => index,
            };
            repointed.push(new_index);
        }

        let mut repointed = repointed.into_iter();
        visit_class(class, &mut |slot: &mut u16, _: Role| {
            if let Some(index) = repointed.next() {
                *slot = index;
            }
        });
        Ok(())
    }

    /// New text for one use of a UTF-8 constant, `None` when it stays as is.
    fn target(
        &self,
        pool: &ConstantPool,
        index: u16,
        role: Role,
    ) -> Result<Option<String>, ClassFormatError> {
        if role == Role::Opaque {
            return Ok(None);
        }

        let original = match decode_modified_utf8(pool.utf8_bytes(index)?) {
            Some(text) => text,
            // unpaired surrogates are legal in string literals; such a value cannot name a class
            None if role == Role::StringValue => return Ok(None),
            None => pool.utf8(index)?,
        };
        let map_name = |name: &str| self.remapper.map_class_or_path_name(name);

        let mapped = match role {
            Role::ClassName if original.starts_with('[') => remap_descriptor(&original, map_name)?,
            Role::ClassName => map_name(&original).unwrap_or_else(|| original.clone()),
            Role::Descriptor => remap_descriptor(&original, map_name)?,
            Role::Signature => remap_signature(&original, map_name)?,
            Role::StringValue => self.remapper.map_embedded_string_value(&original),
            Role::PackageName => map_name(&format!("{original}/"))
                .and_then(|p| p.strip_suffix('/').map(str::to_string))
                .unwrap_or_else(|| original.clone()),
            Role::Opaque => original.clone(),
        };

        Ok((mapped != original).then_some(mapped))
    }
}

type Visitor<'v> = dyn FnMut(&mut u16, Role) + 'v;

/// Visits every slot referencing a UTF-8 constant, always in the same order.
fn visit_class(class: &mut ClassFile, f: &mut Visitor<'_>) {
    for constant in class.pool.entries_mut() {
        match constant {
            Constant::Class { name } => f(name, Role::ClassName),
            Constant::String { value } => f(value, Role::StringValue),
            Constant::NameAndType { name, descriptor } => {
                f(name, Role::Opaque);
                f(descriptor, Role::Descriptor);
            }
            Constant::MethodType { descriptor } => f(descriptor, Role::Descriptor),
            Constant::Module { name } => f(name, Role::Opaque),
            Constant::Package { name } => f(name, Role::PackageName),
            _ => {}
        }
    }

    for member in class.fields.iter_mut().chain(class.methods.iter_mut()) {
        f(&mut member.name_index, Role::Opaque);
        f(&mut member.descriptor_index, Role::Descriptor);
        visit_attributes(&mut member.attributes, f);
    }

    visit_attributes(&mut class.attributes, f);
}

fn visit_attributes(attributes: &mut [Attribute], f: &mut Visitor<'_>) {
    for attribute in attributes {
        f(&mut attribute.name_index, Role::Opaque);

        match &mut attribute.body {
            AttributeBody::Code(code) => visit_attributes(&mut code.attributes, f),
            AttributeBody::Signature(index) => f(index, Role::Signature),
            AttributeBody::LocalVariableTable(vars) => {
                for var in vars {
                    f(&mut var.name_index, Role::Opaque);
                    f(&mut var.type_index, Role::Descriptor);
                }
            }
            AttributeBody::LocalVariableTypeTable(vars) => {
                for var in vars {
                    f(&mut var.name_index, Role::Opaque);
                    f(&mut var.type_index, Role::Signature);
                }
            }
            AttributeBody::Annotations(annotations) => {
                for annotation in annotations {
                    visit_annotation(annotation, f);
                }
            }
            AttributeBody::ParameterAnnotations(parameters) => {
                for annotation in parameters.iter_mut().flatten() {
                    visit_annotation(annotation, f);
                }
            }
            AttributeBody::TypeAnnotations(annotations) => {
                for annotation in annotations {
                    visit_annotation(&mut annotation.annotation, f);
                }
            }
            AttributeBody::AnnotationDefault(value) => visit_element_value(value, f),
            AttributeBody::Record(components) => {
                for component in components {
                    f(&mut component.name_index, Role::Opaque);
                    f(&mut component.descriptor_index, Role::Descriptor);
                    visit_attributes(&mut component.attributes, f);
                }
            }
            AttributeBody::Raw(_) => {}
        }
    }
}

fn visit_annotation(annotation: &mut Annotation, f: &mut Visitor<'_>) {
    f(&mut annotation.type_index, Role::Descriptor);
    for (name_index, value) in &mut annotation.elements {
        f(name_index, Role::Opaque);
        visit_element_value(value, f);
    }
}

fn visit_element_value(value: &mut ElementValue, f: &mut Visitor<'_>) {
    match value {
        ElementValue::Const { tag: b's', index } => f(index, Role::StringValue),
        // numeric constants live in non-UTF-8 pool entries
        ElementValue::Const { .. } => {}
        ElementValue::Enum {
            type_index,
            const_name_index,
        } => {
            f(type_index, Role::Descriptor);
            f(const_name_index, Role::Opaque);
        }
        ElementValue::Class(index) => f(index, Role::Descriptor),
        ElementValue::Annotation(annotation) => visit_annotation(annotation, f),
        ElementValue::Array(values) => {
            for value in values {
                visit_element_value(value, f);
            }
        }
    }
}
