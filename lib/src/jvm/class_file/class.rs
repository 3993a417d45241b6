use crate::jvm::class_file::{Attribute, ConstantsPool, Field, Method, Version};
use crate::jvm::{ClassAccessFlags, ClassConstantIndex, Deserialize, Error, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::Cow;
use std::io::Cursor;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantsPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a whole class file (trailing bytes are an error)
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut cursor = Cursor::new(bytes);
        let class = ClassFile::deserialize(&mut cursor)?;
        let leftover = bytes.len() - cursor.position() as usize;
        if leftover != 0 {
            return Err(Error::TrailingBytes(leftover));
        }
        Ok(class)
    }

    /// Serialize the class file into a fresh buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Binary name of the class
    pub fn name(&self) -> Result<Cow<'_, str>, Error> {
        self.constants.class_name(self.this_class)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if magic != ClassFile::MAGIC {
            return Err(Error::BadMagic(magic));
        }

        Ok(ClassFile {
            version: Version::deserialize(reader)?,
            constants: ConstantsPool::deserialize(reader)?,
            access_flags: ClassAccessFlags::deserialize(reader)?,
            this_class: ClassConstantIndex::deserialize(reader)?,
            super_class: ClassConstantIndex::deserialize(reader)?,
            interfaces: Vec::deserialize(reader)?,
            fields: Vec::deserialize(reader)?,
            methods: Vec::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{BinaryName, ConstantsWriter, MethodAccessFlags};

    fn tiny_class() -> ClassFile {
        let mut constants = ConstantsPool::new();
        let this_class = BinaryName::SCRIPTLOADER.constant_index(&mut constants).unwrap();
        let super_class = BinaryName::OBJECT.constant_index(&mut constants).unwrap();
        let name_index = constants.get_utf8("run").unwrap();
        let descriptor_index = constants.get_utf8("()V").unwrap();
        ClassFile {
            version: Version::JAVA8,
            constants,
            access_flags: ClassAccessFlags::PUBLIC,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![Method {
                access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
                name_index,
                descriptor_index,
                attributes: vec![],
            }],
            attributes: vec![],
        }
    }

    #[test]
    fn reparse_is_byte_identical() {
        let bytes = tiny_class().to_bytes().unwrap();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "ch/njol/skript/ScriptLoader");
        assert_eq!(class.version, Version::JAVA8);
        assert_eq!(class.methods[0].code(&class.constants).unwrap(), None);
        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn bad_inputs() {
        assert!(matches!(
            ClassFile::parse(b"PK\x03\x04rest"),
            Err(Error::BadMagic(_))
        ));

        let bytes = tiny_class().to_bytes().unwrap();
        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 1]),
            Err(Error::Truncated)
        ));

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(matches!(
            ClassFile::parse(&padded),
            Err(Error::TrailingBytes(1))
        ));
    }
}
