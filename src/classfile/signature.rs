//! Rewrites the class names inside field/method descriptors and generic
//! signatures. Descriptors are a subset of the signature grammar, so one
//! parser handles both.

use crate::error::ClassFormatError;

/// Rewrites every class name in a descriptor such as `(Lfoo/Bar;I)[Lfoo/Baz;`.
/// `map` returns `None` to leave a name untouched.
pub fn remap_descriptor<F>(descriptor: &str, map: F) -> Result<String, ClassFormatError>
where
    F: FnMut(&str) -> Option<String>,
{
    remap_signature(descriptor, map)
}

/// Rewrites every class name in a class, method or field signature,
/// including type arguments, bounds and inner class suffixes.
pub fn remap_signature<F>(signature: &str, map: F) -> Result<String, ClassFormatError>
where
    F: FnMut(&str) -> Option<String>,
{
    if signature.is_empty() {
        return Err(ClassFormatError::BadSignature(String::new()));
    }

    let mut parser = SignatureParser {
        src: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        map,
    };
    parser.parse()?;
    Ok(parser.out)
}

struct SignatureParser<'s, F> {
    src: &'s str,
    pos: usize,
    out: String,
    map: F,
}

impl<'s, F> SignatureParser<'s, F>
where
    F: FnMut(&str) -> Option<String>,
{
    fn parse(&mut self) -> Result<(), ClassFormatError> {
        if self.peek() == Some(b'<') {
            self.formal_type_parameters()?;
        }

        while let Some(b) = self.peek() {
            match b {
                b'(' | b')' | b'^' | b'V' => {
                    self.bump()?;
                }
                _ => self.type_signature()?,
            }
        }
        Ok(())
    }

    fn formal_type_parameters(&mut self) -> Result<(), ClassFormatError> {
        self.expect(b'<')?;
        loop {
            if self.peek() == Some(b'>') {
                self.bump()?;
                return Ok(());
            }

            let identifier = self.read_until(b":")?;
            self.out.push_str(identifier);
            self.expect(b':')?;
            // the class bound may be empty when only interface bounds follow
            if matches!(self.peek(), Some(b'L' | b'[' | b'T')) {
                self.type_signature()?;
            }
            while self.peek() == Some(b':') {
                self.bump()?;
                self.type_signature()?;
            }
        }
    }

    fn type_signature(&mut self) -> Result<(), ClassFormatError> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V') => {
                self.bump()?;
                Ok(())
            }
            Some(b'[') => {
                self.bump()?;
                self.type_signature()
            }
            Some(b'T') => {
                self.bump()?;
                let variable = self.read_until(b";")?;
                self.out.push_str(variable);
                self.expect(b';')
            }
            Some(b'L') => self.class_type_signature(),
            _ => Err(self.error()),
        }
    }

    fn class_type_signature(&mut self) -> Result<(), ClassFormatError> {
        self.expect(b'L')?;

        let name = self.read_until(b"<.;")?;
        let mut outer = name.to_string();
        let mapped = self.mapped(name);
        self.out.push_str(&mapped);

        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }

        while self.peek() == Some(b'.') {
            self.bump()?;
            let inner = self.read_until(b"<.;")?;
            let full = format!("{outer}${inner}");

            let outer_prefix = format!("{}$", self.mapped(&outer));
            let mapped_full = self.mapped(&full);
            let simple_name = match mapped_full.strip_prefix(&outer_prefix) {
                Some(rest) => rest,
                None => mapped_full
                    .rsplit_once('$')
                    .map_or(mapped_full.as_str(), |(_, simple)| simple),
            };

            self.out.push_str(simple_name);
            outer = full;

            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }

        self.expect(b';')
    }

    fn type_arguments(&mut self) -> Result<(), ClassFormatError> {
        self.expect(b'<')?;
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.bump()?;
                    return Ok(());
                }
                Some(b'*') => {
                    self.bump()?;
                }
                Some(b'+' | b'-') => {
                    self.bump()?;
                    self.type_signature()?;
                }
                Some(_) => self.type_signature()?,
                None => return Err(self.error()),
            }
        }
    }

    fn mapped(&mut self, name: &str) -> String {
        (self.map)(name).unwrap_or_else(|| name.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    /// Copies one ASCII structural byte to the output.
    fn bump(&mut self) -> Result<u8, ClassFormatError> {
        let b = self.peek().ok_or_else(|| self.error())?;
        self.out.push(b as char);
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, expected: u8) -> Result<(), ClassFormatError> {
        if self.peek() != Some(expected) {
            return Err(self.error());
        }
        self.bump().map(|_| ())
    }

    /// Consumes up to (not including) the next stop byte.
    fn read_until(&mut self, stops: &[u8]) -> Result<&'s str, ClassFormatError> {
        let start = self.pos;
        let len = self.src.as_bytes()[start..]
            .iter()
            .position(|b| stops.contains(b))
            .ok_or_else(|| self.error())?;
        if len == 0 {
            return Err(self.error());
        }
        self.pos += len;
        Ok(&self.src[start..start + len])
    }

    fn error(&self) -> ClassFormatError {
        ClassFormatError::BadSignature(self.src.to_string())
    }
}
