//! Native Type System
//!
//! Describes what a caller expects a native library to export: primitive
//! parameter/return types, operation signatures and the interface descriptor
//! that groups them.

use std::collections::HashSet;
use std::fmt;

/// Primitive types that can cross the native boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// No value (return type only)
    Void,
    /// C `bool` / `_Bool`
    Bool,
    I8,
    I16,
    I32,
    I64,
    /// Pointer-sized signed integer (`intptr_t`, `ssize_t`)
    ISize,
    U8,
    U16,
    U32,
    U64,
    /// Pointer-sized unsigned integer (`size_t`)
    USize,
    F32,
    F64,
    /// Any data pointer, including `const char*`
    Pointer,
}

impl PrimitiveType {
    /// Size in bytes on the current target
    pub fn size(&self) -> usize {
        match self {
            PrimitiveType::Void => 0,
            PrimitiveType::Bool | PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
            PrimitiveType::ISize | PrimitiveType::USize | PrimitiveType::Pointer => {
                std::mem::size_of::<usize>()
            }
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PrimitiveType::Bool
                | PrimitiveType::I8
                | PrimitiveType::I16
                | PrimitiveType::I32
                | PrimitiveType::I64
                | PrimitiveType::ISize
                | PrimitiveType::U8
                | PrimitiveType::U16
                | PrimitiveType::U32
                | PrimitiveType::U64
                | PrimitiveType::USize
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            PrimitiveType::I8
                | PrimitiveType::I16
                | PrimitiveType::I32
                | PrimitiveType::I64
                | PrimitiveType::ISize
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, PrimitiveType::Pointer)
    }

    /// Parse a C or Rust spelling of a primitive type
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        if normalized.ends_with('*') {
            return Some(PrimitiveType::Pointer);
        }
        match normalized.as_str() {
            "void" | "()" => Some(PrimitiveType::Void),
            "bool" | "_bool" => Some(PrimitiveType::Bool),
            "i8" | "int8" | "int8_t" | "char" | "signed char" => Some(PrimitiveType::I8),
            "i16" | "int16" | "int16_t" | "short" => Some(PrimitiveType::I16),
            "i32" | "int32" | "int32_t" | "int" => Some(PrimitiveType::I32),
            "i64" | "int64" | "int64_t" | "long long" => Some(PrimitiveType::I64),
            "isize" | "intptr_t" | "ssize_t" | "long" => Some(PrimitiveType::ISize),
            "u8" | "uint8" | "uint8_t" | "byte" | "unsigned char" => Some(PrimitiveType::U8),
            "u16" | "uint16" | "uint16_t" => Some(PrimitiveType::U16),
            "u32" | "uint32" | "uint32_t" | "unsigned" | "unsigned int" => {
                Some(PrimitiveType::U32)
            }
            "u64" | "uint64" | "uint64_t" => Some(PrimitiveType::U64),
            "usize" | "size_t" | "uintptr_t" | "unsigned long" => Some(PrimitiveType::USize),
            "f32" | "float" => Some(PrimitiveType::F32),
            "f64" | "double" => Some(PrimitiveType::F64),
            "ptr" | "pointer" | "cstr" | "string" => Some(PrimitiveType::Pointer),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Bool => "bool",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::ISize => "isize",
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::USize => "usize",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Pointer => "ptr",
        };
        f.write_str(name)
    }
}

/// A value passed to or returned from a bound operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeValue {
    Void,
    Bool(bool),
    /// Any signed integer, sign-extended
    Int(i64),
    /// Any unsigned integer, zero-extended
    UInt(u64),
    /// `f32` values are widened
    Float(f64),
    Pointer(usize),
}

impl NativeValue {
    /// The widest primitive type this value naturally maps to
    pub fn natural_type(&self) -> PrimitiveType {
        match self {
            NativeValue::Void => PrimitiveType::Void,
            NativeValue::Bool(_) => PrimitiveType::Bool,
            NativeValue::Int(_) => PrimitiveType::I64,
            NativeValue::UInt(_) => PrimitiveType::U64,
            NativeValue::Float(_) => PrimitiveType::F64,
            NativeValue::Pointer(_) => PrimitiveType::Pointer,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, NativeValue::Void)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            NativeValue::Int(v) => Some(v),
            NativeValue::UInt(v) => i64::try_from(v).ok(),
            NativeValue::Bool(b) => Some(i64::from(b)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            NativeValue::UInt(v) => Some(v),
            NativeValue::Int(v) => u64::try_from(v).ok(),
            NativeValue::Bool(b) => Some(u64::from(b)),
            NativeValue::Pointer(p) => Some(p as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            NativeValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Void => write!(f, "()"),
            NativeValue::Bool(b) => write!(f, "{}", b),
            NativeValue::Int(v) => write!(f, "{}", v),
            NativeValue::UInt(v) => write!(f, "{}", v),
            NativeValue::Float(v) => write!(f, "{}", v),
            NativeValue::Pointer(p) => write!(f, "{:#x}", p),
        }
    }
}

/// Signature of one operation a library is expected to export
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationSignature {
    /// Operation name, also the exported entry point
    pub name: String,
    pub params: Vec<PrimitiveType>,
    pub return_type: PrimitiveType,
}

impl OperationSignature {
    pub fn new(
        name: impl Into<String>,
        params: Vec<PrimitiveType>,
        return_type: PrimitiveType,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
        }
    }

    /// Whether two signatures differ only by name
    pub fn same_shape(&self, other: &OperationSignature) -> bool {
        self.params == other.params && self.return_type == other.return_type
    }

    /// Parse a C-style declaration: `"return_type name(param_type, ...)"`
    ///
    /// Parameter names are optional and ignored. `void` as the sole parameter
    /// means no parameters.
    pub fn parse(declaration: &str) -> Option<Self> {
        let declaration = declaration.trim().trim_end_matches(';').trim();

        let open = declaration.find('(')?;
        let close = declaration.rfind(')')?;
        if close < open {
            return None;
        }
        let head = declaration[..open].trim();
        let inner = declaration[open + 1..close].trim();

        // Pointer stars may hug the name: "char *getenv(...)"
        let split = head.rfind(|c: char| c.is_whitespace() || c == '*')?;
        let name = head[split + 1..].trim();
        let return_spelling = head[..split + 1].trim();
        if name.is_empty() || return_spelling.is_empty() {
            return None;
        }
        let return_type = PrimitiveType::parse(return_spelling)?;

        let mut params = Vec::new();
        if !inner.is_empty() && !inner.eq_ignore_ascii_case("void") {
            for param in inner.split(',') {
                params.push(parse_param(param.trim())?);
            }
        }

        Some(Self::new(name, params, return_type))
    }
}

fn parse_param(param: &str) -> Option<PrimitiveType> {
    if let Some(ty) = PrimitiveType::parse(param) {
        return Some(ty);
    }
    if param.contains('*') {
        return Some(PrimitiveType::Pointer);
    }
    // Drop a trailing parameter name: "int a" / "const char *name"
    let (ty, _name) = param.rsplit_once(char::is_whitespace)?;
    PrimitiveType::parse(ty.trim_start_matches("const ").trim())
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

/// The ordered set of operations an adapter must provide
///
/// Names are unique; construction rejects duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    operations: Vec<OperationSignature>,
}

impl InterfaceDescriptor {
    /// Build a descriptor, returning the first duplicated name on conflict
    pub fn new(operations: Vec<OperationSignature>) -> Result<Self, String> {
        let mut seen = HashSet::new();
        for op in &operations {
            if !seen.insert(op.name.as_str()) {
                return Err(op.name.clone());
            }
        }
        Ok(Self { operations })
    }

    /// Build from names already known to be unique
    #[doc(hidden)]
    pub fn __from_declared(operations: Vec<OperationSignature>) -> Self {
        Self { operations }
    }

    /// Parse one declaration per line; blank lines and `//` comments are skipped
    pub fn parse_many(source: &str) -> Result<Self, String> {
        let mut operations = Vec::new();
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let sig = OperationSignature::parse(line)
                .ok_or_else(|| format!("invalid declaration: {}", line))?;
            operations.push(sig);
        }
        Self::new(operations).map_err(|name| format!("duplicate operation: {}", name))
    }

    pub fn operations(&self) -> &[OperationSignature] {
        &self.operations
    }

    pub fn get(&self, name: &str) -> Option<&OperationSignature> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
