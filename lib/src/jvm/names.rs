use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Display for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // JDK names
    pub const APPLY: Self = Self::name("apply");
    pub const FILTER: Self = Self::name("filter");
    pub const MAP: Self = Self::name("map");
    pub const METAFACTORY: Self = Self::name("metafactory");
    pub const OFNULLABLE: Self = Self::name("ofNullable");
    pub const ORELSE: Self = Self::name("orElse");
    pub const TEST: Self = Self::name("test");

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    // Skript names
    pub const CURRENTLOOPS: Self = Self::name("currentLoops");
    pub const CURRENTSCRIPT: Self = Self::name("currentScript");
    pub const CURRENTSECTIONS: Self = Self::name("currentSections");
    pub const GETCONFIG: Self = Self::name("getConfig");
    pub const GETCURRENTLOOPS: Self = Self::name("getCurrentLoops");
    pub const GETCURRENTSCRIPT: Self = Self::name("getCurrentScript");
    pub const GETCURRENTSECTIONS: Self = Self::name("getCurrentSections");
    pub const GETFILE: Self = Self::name("getFile");
    pub const GETHASDELAYBEFORE: Self = Self::name("getHasDelayBefore");
    pub const GETSCRIPT: Self = Self::name("getScript");
    pub const HASDELAYBEFORE: Self = Self::name("hasDelayBefore");
    pub const ISACTIVE: Self = Self::name("isActive");
    pub const SETCURRENTLOOPS: Self = Self::name("setCurrentLoops");
    pub const SETCURRENTSCRIPT: Self = Self::name("setCurrentScript");
    pub const SETCURRENTSECTIONS: Self = Self::name("setCurrentSections");
    pub const SETHASDELAYBEFORE: Self = Self::name("setHasDelayBefore");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const CALLSITE: Self = Self::name("java/lang/invoke/CallSite");
    pub const FILE: Self = Self::name("java/io/File");
    pub const FUNCTION: Self = Self::name("java/util/function/Function");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LAMBDAMETAFACTORY: Self = Self::name("java/lang/invoke/LambdaMetafactory");
    pub const LIST: Self = Self::name("java/util/List");
    pub const METHODHANDLES_LOOKUP: Self = Self::name("java/lang/invoke/MethodHandles$Lookup");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const OPTIONAL: Self = Self::name("java/util/Optional");
    pub const PREDICATE: Self = Self::name("java/util/function/Predicate");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");

    // Skript names
    pub const CONFIG: Self = Self::name("ch/njol/skript/config/Config");
    pub const KLEENEAN: Self = Self::name("ch/njol/util/Kleenean");
    pub const PARSERINSTANCE: Self = Self::name("ch/njol/skript/lang/parser/ParserInstance");
    pub const SCRIPT: Self = Self::name("org/skriptlang/skript/lang/script/Script");
    pub const SCRIPTLOADER: Self = Self::name("ch/njol/skript/ScriptLoader");
    pub const SKRIPTEVENT: Self = Self::name("ch/njol/skript/lang/SkriptEvent");
    pub const TRIGGER: Self = Self::name("ch/njol/skript/lang/Trigger");
}
