use super::{BinaryName, Error, Name};
use crate::util::Width;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Byte
            | BaseType::Char
            | BaseType::Float
            | BaseType::Int
            | BaseType::Short
            | BaseType::Boolean => 1,
            BaseType::Double | BaseType::Long => 2,
        }
    }
}

impl BaseType {
    const ALL: [BaseType; 8] = [
        BaseType::Byte,
        BaseType::Char,
        BaseType::Double,
        BaseType::Float,
        BaseType::Int,
        BaseType::Long,
        BaseType::Short,
        BaseType::Boolean,
    ];

    fn descriptor_char(self) -> u8 {
        match self {
            BaseType::Byte => b'B',
            BaseType::Char => b'C',
            BaseType::Double => b'D',
            BaseType::Float => b'F',
            BaseType::Int => b'I',
            BaseType::Long => b'J',
            BaseType::Short => b'S',
            BaseType::Boolean => b'Z',
        }
    }

    fn from_descriptor_char(c: u8) -> Option<BaseType> {
        BaseType::ALL
            .into_iter()
            .find(|typ| typ.descriptor_char() == c)
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        write_to.push(char::from(self.descriptor_char()));
    }
}

/// Reference type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType<Class> {
    Object(Class),
    ObjectArray(ArrayType<Class>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Generic array type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl<C: RenderDescriptor> RenderDescriptor for RefType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => {
                cls.render_to(write_to);
            }
            RefType::PrimitiveArray(arr) => {
                arr.render_to(write_to);
            }
            RefType::ObjectArray(arr) => {
                arr.render_to(write_to);
            }
        }
    }
}

/// Type of a class, instance, or local variable
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Ref(RefType<Class>),
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl<C> FieldType<C> {
    pub const fn object(class_name: C) -> FieldType<C> {
        FieldType::Ref(RefType::Object(class_name))
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(reference_type) => reference_type.render_to(write_to),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,
    pub return_type: Option<FieldType<Class>>, // `None` is for `void` (ie. no return)
}

impl<C> MethodDescriptor<C> {
    /// Total length of parameters (not the same as the length of the vector),
    /// which must be 255 or less for it to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let mut len = if has_this_param { 1 } else { 0 };
        for parameter in &self.parameters {
            len += parameter.width();
        }
        len
    }

    /// Number of stack slots taken by the return value
    pub fn return_length(&self) -> usize {
        self.return_type.as_ref().map_or(0, |typ| typ.width())
    }
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

/// Parse a field descriptor, such as `[Ljava/lang/String;`
pub fn parse_field_type(descriptor: &str) -> Result<FieldType<BinaryName>, Error> {
    let mut cursor = Cursor::new(descriptor);
    let typ = cursor.field_type()?;
    cursor.finish(typ)
}

/// Parse a method descriptor, such as `(Ljava/io/File;I)V`
pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor<BinaryName>, Error> {
    let mut cursor = Cursor::new(descriptor);
    cursor.expect(b'(')?;
    let mut parameters = vec![];
    while !cursor.eat(b')') {
        parameters.push(cursor.field_type()?);
    }
    let return_type = if cursor.eat(b'V') {
        None
    } else {
        Some(cursor.field_type()?)
    };
    cursor.finish(MethodDescriptor {
        parameters,
        return_type,
    })
}

/// Position in a descriptor being parsed
///
/// Only ASCII bytes are ever stepped over one at a time, so `position` always sits on a `char`
/// boundary.
struct Cursor<'a> {
    descriptor: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(descriptor: &'a str) -> Cursor<'a> {
        Cursor {
            descriptor,
            position: 0,
        }
    }

    fn error(&self) -> Error {
        Error::BadDescriptor(self.descriptor.to_owned())
    }

    fn peek(&self) -> Option<u8> {
        self.descriptor.as_bytes().get(self.position).copied()
    }

    fn eat(&mut self, expected: u8) -> bool {
        let found = self.peek() == Some(expected);
        if found {
            self.position += 1;
        }
        found
    }

    fn expect(&mut self, expected: u8) -> Result<(), Error> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn finish<T>(self, parsed: T) -> Result<T, Error> {
        if self.position == self.descriptor.len() {
            Ok(parsed)
        } else {
            Err(self.error())
        }
    }

    fn field_type(&mut self) -> Result<FieldType<BinaryName>, Error> {
        let mut dimensions = 0;
        while self.eat(b'[') {
            dimensions += 1;
        }
        if dimensions > 255 {
            return Err(self.error());
        }

        if self.peek() == Some(b'L') {
            let class = self.class_name()?;
            return Ok(match dimensions {
                0 => FieldType::object(class),
                n => FieldType::Ref(RefType::ObjectArray(ArrayType {
                    additional_dimensions: n - 1,
                    element_type: class,
                })),
            });
        }

        let base = self
            .peek()
            .and_then(BaseType::from_descriptor_char)
            .ok_or_else(|| self.error())?;
        self.position += 1;
        Ok(match dimensions {
            0 => FieldType::Base(base),
            n => FieldType::Ref(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: n - 1,
                element_type: base,
            })),
        })
    }

    /// `L<binary name>;`
    fn class_name(&mut self) -> Result<BinaryName, Error> {
        self.expect(b'L')?;
        let descriptor = self.descriptor;
        let rest = &descriptor[self.position..];
        let end = rest.find(';').ok_or_else(|| self.error())?;
        self.position += end + 1;
        BinaryName::from_string(rest[..end].to_owned()).map_err(|_| self.error())
    }
}
