//! Typed interfaces
//!
//! [`native_interface!`](crate::native_interface) declares a struct whose
//! methods mirror a native library's exports. The struct wraps an
//! [`Adapter`] and converts arguments and results through [`NativeType`].
//!
//! ```ignore
//! autonative::native_interface! {
//!     pub struct LibC {
//!         fn getpid() -> i32;
//!         fn abs(x: i32) -> i32;
//!     }
//! }
//!
//! let libc: LibC = NativeImport::new("c").bind_interface()?;
//! let pid = libc.getpid()?;
//! ```

use crate::types::{InterfaceDescriptor, NativeValue, PrimitiveType};

use super::Adapter;

/// A Rust type with a fixed native representation
pub trait NativeType: Sized {
    const PRIMITIVE: PrimitiveType;

    fn into_native(self) -> NativeValue;

    /// `None` if `value` has the wrong kind or does not fit
    fn from_native(value: NativeValue) -> Option<Self>;
}

impl NativeType for () {
    const PRIMITIVE: PrimitiveType = PrimitiveType::Void;

    fn into_native(self) -> NativeValue {
        NativeValue::Void
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        value.is_void().then_some(())
    }
}

impl NativeType for bool {
    const PRIMITIVE: PrimitiveType = PrimitiveType::Bool;

    fn into_native(self) -> NativeValue {
        NativeValue::Bool(self)
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

macro_rules! impl_signed {
    ($($t:ty => $prim:ident),* $(,)?) => {
        $(
            impl NativeType for $t {
                const PRIMITIVE: PrimitiveType = PrimitiveType::$prim;

                fn into_native(self) -> NativeValue {
                    NativeValue::Int(self as i64)
                }

                fn from_native(value: NativeValue) -> Option<Self> {
                    match value {
                        NativeValue::Int(v) => <$t>::try_from(v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

macro_rules! impl_unsigned {
    ($($t:ty => $prim:ident),* $(,)?) => {
        $(
            impl NativeType for $t {
                const PRIMITIVE: PrimitiveType = PrimitiveType::$prim;

                fn into_native(self) -> NativeValue {
                    NativeValue::UInt(self as u64)
                }

                fn from_native(value: NativeValue) -> Option<Self> {
                    match value {
                        NativeValue::UInt(v) => <$t>::try_from(v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_signed!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => ISize);
impl_unsigned!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => USize);

impl NativeType for f32 {
    const PRIMITIVE: PrimitiveType = PrimitiveType::F32;

    fn into_native(self) -> NativeValue {
        NativeValue::Float(f64::from(self))
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl NativeType for f64 {
    const PRIMITIVE: PrimitiveType = PrimitiveType::F64;

    fn into_native(self) -> NativeValue {
        NativeValue::Float(self)
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        value.as_f64()
    }
}

impl<T> NativeType for *const T {
    const PRIMITIVE: PrimitiveType = PrimitiveType::Pointer;

    fn into_native(self) -> NativeValue {
        NativeValue::Pointer(self as usize)
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Pointer(p) => Some(p as *const T),
            _ => None,
        }
    }
}

impl<T> NativeType for *mut T {
    const PRIMITIVE: PrimitiveType = PrimitiveType::Pointer;

    fn into_native(self) -> NativeValue {
        NativeValue::Pointer(self as usize)
    }

    fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Pointer(p) => Some(p as *mut T),
            _ => None,
        }
    }
}

/// A typed wrapper around an [`Adapter`], usually generated by
/// [`native_interface!`](crate::native_interface)
pub trait NativeInterface: Sized {
    /// Operations the library must export
    fn descriptor() -> InterfaceDescriptor;

    /// Wrap an adapter bound against [`Self::descriptor`]
    fn from_adapter(adapter: Adapter) -> Self;

    fn adapter(&self) -> &Adapter;

    /// See [`Adapter::release`]
    fn release(&self) -> bool {
        self.adapter().release()
    }
}

/// Declare a typed interface to a native library.
///
/// Each `fn` becomes a method returning `Result<T, BindError>`; a missing
/// return type means `()`. Argument and return types must implement
/// [`NativeType`].
#[macro_export]
macro_rules! native_interface {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$op_meta:meta])*
                fn $op:ident ( $( $arg:ident : $ty:ty ),* $(,)? ) $( -> $ret:ty )? ;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            adapter: $crate::Adapter,
        }

        impl $crate::NativeInterface for $name {
            fn descriptor() -> $crate::InterfaceDescriptor {
                // Method names are unique or the impl below would not compile.
                $crate::InterfaceDescriptor::__from_declared(::std::vec![
                    $(
                        $crate::OperationSignature::new(
                            stringify!($op),
                            ::std::vec![ $( <$ty as $crate::NativeType>::PRIMITIVE ),* ],
                            <$crate::__native_return!($($ret)?) as $crate::NativeType>::PRIMITIVE,
                        ),
                    )*
                ])
            }

            fn from_adapter(adapter: $crate::Adapter) -> Self {
                Self { adapter }
            }

            fn adapter(&self) -> &$crate::Adapter {
                &self.adapter
            }
        }

        impl $name {
            $(
                $(#[$op_meta])*
                #[allow(clippy::too_many_arguments, clippy::unused_unit)]
                pub fn $op(
                    &self,
                    $( $arg: $ty ),*
                ) -> ::std::result::Result<$crate::__native_return!($($ret)?), $crate::BindError> {
                    let value = self.adapter.call(
                        stringify!($op),
                        &[ $( $crate::NativeType::into_native($arg) ),* ],
                    )?;
                    <$crate::__native_return!($($ret)?) as $crate::NativeType>::from_native(value)
                        .ok_or_else(|| $crate::BindError::ValueMismatch {
                            operation: stringify!($op).to_string(),
                            expected: <$crate::__native_return!($($ret)?) as $crate::NativeType>::PRIMITIVE,
                        })
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __native_return {
    () => {
        ()
    };
    ($ret:ty) => {
        $ret
    };
}
