use crate::jvm;
use crate::jvm::class_file::Version;
use crate::jvm::ConstantPoolOverflow;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Decoding or re-encoding the class failed
    Jvm(jvm::Error),

    /// A function reference was needed, but the class predates `invokedynamic`
    InvokeDynamicUnsupported { version: Version },
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(err: ConstantPoolOverflow) -> Error {
        Error::Jvm(jvm::Error::ConstantPoolOverflow(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Jvm(err) => write!(f, "{}", err),
            Error::InvokeDynamicUnsupported { version } => write!(
                f,
                "class file version {}.{} cannot use invokedynamic",
                version.major_version, version.minor_version
            ),
        }
    }
}

impl std::error::Error for Error {}
