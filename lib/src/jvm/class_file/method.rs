use crate::jvm::class_file::{Attribute, Code, ConstantsPool};
use crate::jvm::{Deserialize, Error, MethodAccessFlags, Serialize, Utf8ConstantIndex};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug, Clone)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Method {
    /// Position of the `Code` attribute (abstract and native methods have none)
    pub fn code_attribute_index(&self, constants: &ConstantsPool) -> Result<Option<usize>, Error> {
        for (idx, attribute) in self.attributes.iter().enumerate() {
            if attribute.is::<Code>(constants)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    /// Decoded `Code` attribute of the method, if there is one
    pub fn code(&self, constants: &ConstantsPool) -> Result<Option<Code>, Error> {
        match self.code_attribute_index(constants)? {
            None => Ok(None),
            Some(idx) => self.attributes[idx].decode().map(Some),
        }
    }
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Method {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Method {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

