//! Call Shapes
//!
//! A shape is what the calling convention actually cares about: how many
//! arguments, which register class they travel in, and how the result comes
//! back. Operations with identical shapes share one monomorphised invoker.
//!
//! Integers, booleans and pointers are widened to a machine word. Floats keep
//! their own class. Parameter lists must be homogeneous.

use std::fmt;

use crate::error::BindError;
use crate::loader::SymbolAddress;
use crate::types::{NativeValue, OperationSignature, PrimitiveType};

/// Largest supported parameter count
pub const MAX_ARITY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgClass {
    /// Integer/pointer register
    Word,
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnClass {
    Void,
    Word,
    F32,
    F64,
}

/// Calling-convention shape of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallShape {
    pub arity: usize,
    /// `None` when there are no parameters
    pub params: Option<ArgClass>,
    pub ret: ReturnClass,
}

impl CallShape {
    /// Classify a signature, or explain why it cannot be called
    pub fn of(signature: &OperationSignature) -> Result<Self, String> {
        let arity = signature.params.len();
        if arity > MAX_ARITY {
            return Err(format!(
                "{} parameters exceeds the maximum of {}",
                arity, MAX_ARITY
            ));
        }

        let mut params = None;
        for (idx, ty) in signature.params.iter().enumerate() {
            let class = arg_class(*ty).map_err(|e| format!("parameter {}: {}", idx, e))?;
            match params {
                None => params = Some(class),
                Some(existing) if existing != class => {
                    return Err("mixed integer and floating-point parameters".to_string())
                }
                Some(_) => {}
            }
        }

        let ret = return_class(signature.return_type)?;
        Ok(Self { arity, params, ret })
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.params {
            None => "-",
            Some(ArgClass::Word) => "word",
            Some(ArgClass::F32) => "f32",
            Some(ArgClass::F64) => "f64",
        };
        write!(f, "{}x{} -> {:?}", self.arity, class, self.ret)
    }
}

fn wide_integer_fits(ty: PrimitiveType) -> Result<(), String> {
    if matches!(ty, PrimitiveType::I64 | PrimitiveType::U64) && cfg!(target_pointer_width = "32")
    {
        return Err(format!("{} does not fit a 32-bit argument register", ty));
    }
    Ok(())
}

fn arg_class(ty: PrimitiveType) -> Result<ArgClass, String> {
    match ty {
        PrimitiveType::Void => Err("void is not a parameter type".to_string()),
        PrimitiveType::F32 => Ok(ArgClass::F32),
        PrimitiveType::F64 => Ok(ArgClass::F64),
        other => wide_integer_fits(other).map(|_| ArgClass::Word),
    }
}

fn return_class(ty: PrimitiveType) -> Result<ReturnClass, String> {
    match ty {
        PrimitiveType::Void => Ok(ReturnClass::Void),
        PrimitiveType::F32 => Ok(ReturnClass::F32),
        PrimitiveType::F64 => Ok(ReturnClass::F64),
        other => wide_integer_fits(other)
            .map(|_| ReturnClass::Word)
            .map_err(|e| format!("return type: {}", e)),
    }
}

/// Arguments lowered to their register class
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawArgs {
    Word(Vec<usize>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RawReturn {
    Void,
    Word(usize),
    F32(f32),
    F64(f64),
}

/// Calls `address` with the given arguments; `None` if they do not fit the shape
pub(crate) type Invoker = unsafe fn(SymbolAddress, &RawArgs) -> Option<RawReturn>;

trait RawParam: Copy {
    fn slice(args: &RawArgs) -> Option<&[Self]>;
}

impl RawParam for usize {
    fn slice(args: &RawArgs) -> Option<&[Self]> {
        match args {
            RawArgs::Word(v) => Some(v),
            _ => None,
        }
    }
}

impl RawParam for f32 {
    fn slice(args: &RawArgs) -> Option<&[Self]> {
        match args {
            RawArgs::F32(v) => Some(v),
            _ => None,
        }
    }
}

impl RawParam for f64 {
    fn slice(args: &RawArgs) -> Option<&[Self]> {
        match args {
            RawArgs::F64(v) => Some(v),
            _ => None,
        }
    }
}

trait RawResult {
    fn into_raw(self) -> RawReturn;
}

impl RawResult for () {
    fn into_raw(self) -> RawReturn {
        RawReturn::Void
    }
}

impl RawResult for usize {
    fn into_raw(self) -> RawReturn {
        RawReturn::Word(self)
    }
}

impl RawResult for f32 {
    fn into_raw(self) -> RawReturn {
        RawReturn::F32(self)
    }
}

impl RawResult for f64 {
    fn into_raw(self) -> RawReturn {
        RawReturn::F64(self)
    }
}

// One function per arity: the parameter count of an `extern "C" fn` type has
// to be known at compile time.

unsafe fn call_0<R: RawResult>(addr: SymbolAddress, _args: &RawArgs) -> Option<RawReturn> {
    let f: extern "C" fn() -> R = std::mem::transmute_copy(&addr.as_ptr());
    Some(f().into_raw())
}

unsafe fn call_1<P: RawParam, R: RawResult>(
    addr: SymbolAddress,
    args: &RawArgs,
) -> Option<RawReturn> {
    let &[a] = P::slice(args)? else {
        return None;
    };
    let f: extern "C" fn(P) -> R = std::mem::transmute_copy(&addr.as_ptr());
    Some(f(a).into_raw())
}

unsafe fn call_2<P: RawParam, R: RawResult>(
    addr: SymbolAddress,
    args: &RawArgs,
) -> Option<RawReturn> {
    let &[a, b] = P::slice(args)? else {
        return None;
    };
    let f: extern "C" fn(P, P) -> R = std::mem::transmute_copy(&addr.as_ptr());
    Some(f(a, b).into_raw())
}

unsafe fn call_3<P: RawParam, R: RawResult>(
    addr: SymbolAddress,
    args: &RawArgs,
) -> Option<RawReturn> {
    let &[a, b, c] = P::slice(args)? else {
        return None;
    };
    let f: extern "C" fn(P, P, P) -> R = std::mem::transmute_copy(&addr.as_ptr());
    Some(f(a, b, c).into_raw())
}

unsafe fn call_4<P: RawParam, R: RawResult>(
    addr: SymbolAddress,
    args: &RawArgs,
) -> Option<RawReturn> {
    let &[a, b, c, d] = P::slice(args)? else {
        return None;
    };
    let f: extern "C" fn(P, P, P, P) -> R = std::mem::transmute_copy(&addr.as_ptr());
    Some(f(a, b, c, d).into_raw())
}

unsafe fn call_5<P: RawParam, R: RawResult>(
    addr: SymbolAddress,
    args: &RawArgs,
) -> Option<RawReturn> {
    let &[a, b, c, d, e] = P::slice(args)? else {
        return None;
    };
    let f: extern "C" fn(P, P, P, P, P) -> R = std::mem::transmute_copy(&addr.as_ptr());
    Some(f(a, b, c, d, e).into_raw())
}

unsafe fn call_6<P: RawParam, R: RawResult>(
    addr: SymbolAddress,
    args: &RawArgs,
) -> Option<RawReturn> {
    let &[a, b, c, d, e, g] = P::slice(args)? else {
        return None;
    };
    let f: extern "C" fn(P, P, P, P, P, P) -> R = std::mem::transmute_copy(&addr.as_ptr());
    Some(f(a, b, c, d, e, g).into_raw())
}

unsafe fn reject(_addr: SymbolAddress, _args: &RawArgs) -> Option<RawReturn> {
    None
}

fn by_arity<P: RawParam, R: RawResult>(arity: usize) -> Invoker {
    match arity {
        0 => call_0::<R>,
        1 => call_1::<P, R>,
        2 => call_2::<P, R>,
        3 => call_3::<P, R>,
        4 => call_4::<P, R>,
        5 => call_5::<P, R>,
        6 => call_6::<P, R>,
        _ => reject,
    }
}

fn by_return<P: RawParam>(shape: CallShape) -> Invoker {
    match shape.ret {
        ReturnClass::Void => by_arity::<P, ()>(shape.arity),
        ReturnClass::Word => by_arity::<P, usize>(shape.arity),
        ReturnClass::F32 => by_arity::<P, f32>(shape.arity),
        ReturnClass::F64 => by_arity::<P, f64>(shape.arity),
    }
}

/// The invoker shared by every operation of `shape`
pub(crate) fn invoker_for(shape: CallShape) -> Invoker {
    match shape.params {
        None | Some(ArgClass::Word) => by_return::<usize>(shape),
        Some(ArgClass::F32) => by_return::<f32>(shape),
        Some(ArgClass::F64) => by_return::<f64>(shape),
    }
}

/// Lower caller values into the register class of `shape`
pub(crate) fn lower_args(
    signature: &OperationSignature,
    shape: &CallShape,
    args: &[NativeValue],
) -> Result<RawArgs, BindError> {
    if args.len() != signature.params.len() {
        return Err(BindError::ArgumentCount {
            operation: signature.name.clone(),
            expected: signature.params.len(),
            got: args.len(),
        });
    }

    let mismatch = |index: usize| BindError::ArgumentType {
        operation: signature.name.clone(),
        index,
        expected: signature.params[index],
    };

    let raw = match shape.params {
        None | Some(ArgClass::Word) => RawArgs::Word(
            args.iter()
                .enumerate()
                .map(|(i, v)| word_arg(v).ok_or_else(|| mismatch(i)))
                .collect::<Result<_, _>>()?,
        ),
        Some(ArgClass::F32) => RawArgs::F32(
            args.iter()
                .enumerate()
                .map(|(i, v)| v.as_f64().map(|f| f as f32).ok_or_else(|| mismatch(i)))
                .collect::<Result<_, _>>()?,
        ),
        Some(ArgClass::F64) => RawArgs::F64(
            args.iter()
                .enumerate()
                .map(|(i, v)| v.as_f64().ok_or_else(|| mismatch(i)))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(raw)
}

fn word_arg(value: &NativeValue) -> Option<usize> {
    match *value {
        NativeValue::Bool(b) => Some(usize::from(b)),
        // Two's complement reinterpretation keeps the sign extension the
        // callee expects for narrow signed parameters.
        NativeValue::Int(v) => Some(v as usize),
        NativeValue::UInt(v) => Some(v as usize),
        NativeValue::Pointer(p) => Some(p),
        NativeValue::Float(_) | NativeValue::Void => None,
    }
}

/// Interpret a raw result according to the declared return type.
///
/// Only the low bits of a word register are defined for narrow types, so the
/// value is truncated before it is extended.
pub(crate) fn raise_return(ty: PrimitiveType, raw: RawReturn) -> Option<NativeValue> {
    let value = match (ty, raw) {
        (PrimitiveType::Void, _) => NativeValue::Void,
        (PrimitiveType::F32, RawReturn::F32(v)) => NativeValue::Float(f64::from(v)),
        (PrimitiveType::F64, RawReturn::F64(v)) => NativeValue::Float(v),
        (ty, RawReturn::Word(w)) => match ty {
            PrimitiveType::Bool => NativeValue::Bool(w as u8 != 0),
            PrimitiveType::I8 => NativeValue::Int(i64::from(w as i8)),
            PrimitiveType::I16 => NativeValue::Int(i64::from(w as i16)),
            PrimitiveType::I32 => NativeValue::Int(i64::from(w as i32)),
            PrimitiveType::I64 | PrimitiveType::ISize => NativeValue::Int(w as i64),
            PrimitiveType::U8 => NativeValue::UInt(u64::from(w as u8)),
            PrimitiveType::U16 => NativeValue::UInt(u64::from(w as u16)),
            PrimitiveType::U32 => NativeValue::UInt(u64::from(w as u32)),
            PrimitiveType::U64 | PrimitiveType::USize => NativeValue::UInt(w as u64),
            PrimitiveType::Pointer => NativeValue::Pointer(w),
            _ => return None,
        },
        _ => return None,
    };
    Some(value)
}
