//! Binding Generator
//!
//! Turns an [`InterfaceDescriptor`] and a [`LoadedLibrary`] into an
//! [`Adapter`]: one callable entry per declared operation, each backed by the
//! exported entry point of the same name.
//!
//! Binding is eager and all-or-nothing. Every entry point is resolved up
//! front; if any is missing the library is released and no adapter exists.
//! Operations that share a [`CallShape`] share one invoker.

pub mod interface;
pub mod shape;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::error::BindError;
use crate::lifecycle::{LibraryState, LoadedLibrary, UnloadPolicy};
use crate::loader::SymbolAddress;
use crate::types::{InterfaceDescriptor, NativeValue, OperationSignature};

pub use interface::{NativeInterface, NativeType};
pub use shape::{ArgClass, CallShape, ReturnClass, MAX_ARITY};

use shape::Invoker;

/// One operation bound to its native entry point
#[derive(Clone)]
pub struct BoundFunction {
    signature: OperationSignature,
    address: SymbolAddress,
    shape: CallShape,
    invoker: Invoker,
}

impl BoundFunction {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &OperationSignature {
        &self.signature
    }

    /// Resolved address of the entry point
    pub fn address(&self) -> SymbolAddress {
        self.address
    }

    pub fn shape(&self) -> CallShape {
        self.shape
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("signature", &self.signature)
            .field("address", &self.address)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Callable view of a loaded library
///
/// The adapter owns its library. Dropping it, or calling [`Adapter::release`],
/// ends the library's life; calls made afterwards fail with
/// [`BindError::Released`] instead of reaching the loader.
#[derive(Debug)]
pub struct Adapter {
    library: LoadedLibrary,
    functions: Vec<BoundFunction>,
    index: HashMap<String, usize>,
    shapes: usize,
}

impl Adapter {
    /// Call a bound operation.
    ///
    /// Arguments are checked against the declared signature before the call.
    /// The declared signature itself is trusted: it must match what the
    /// library actually exports.
    pub fn call(&self, name: &str, args: &[NativeValue]) -> Result<NativeValue, BindError> {
        let function = self
            .get(name)
            .ok_or_else(|| BindError::UnknownOperation(name.to_string()))?;
        let raw_args = shape::lower_args(&function.signature, &function.shape, args)?;

        // The read guard inside with_live keeps the library mapped for the
        // whole call.
        let raw = self
            .library
            .with_live(|_, _| unsafe { (function.invoker)(function.address, &raw_args) })
            .ok_or_else(|| self.released())?
            .ok_or_else(|| BindError::ArgumentCount {
                operation: function.signature.name.clone(),
                expected: function.signature.params.len(),
                got: args.len(),
            })?;

        shape::raise_return(function.signature.return_type, raw).ok_or_else(|| {
            BindError::ValueMismatch {
                operation: function.signature.name.clone(),
                expected: function.signature.return_type,
            }
        })
    }

    pub fn get(&self, name: &str) -> Option<&BoundFunction> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    /// Bound operations in declaration order
    pub fn functions(&self) -> &[BoundFunction] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Distinct call shapes among the bound operations
    pub fn shape_count(&self) -> usize {
        self.shapes
    }

    pub fn library_path(&self) -> &Path {
        self.library.path()
    }

    pub fn state(&self) -> LibraryState {
        self.library.state()
    }

    pub fn is_live(&self) -> bool {
        self.library.is_live()
    }

    pub fn policy(&self) -> UnloadPolicy {
        self.library.policy()
    }

    /// Release the library now instead of at drop.
    ///
    /// Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        self.library.release()
    }

    fn released(&self) -> BindError {
        BindError::Released(self.library.path().display().to_string())
    }
}

/// Bind every operation of `descriptor` against `library`.
///
/// Signatures are classified first so an unsupported one fails before any
/// symbol lookup. On error `library` is dropped, which releases it.
pub fn bind(
    descriptor: &InterfaceDescriptor,
    library: LoadedLibrary,
) -> Result<Adapter, BindError> {
    let library_name = library.path().display().to_string();

    let shapes = descriptor
        .operations()
        .iter()
        .map(|signature| {
            CallShape::of(signature).map_err(|reason| BindError::UnsupportedSignature {
                operation: signature.name.clone(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut invokers: HashMap<CallShape, Invoker> = HashMap::new();
    let mut functions = Vec::with_capacity(shapes.len());
    let mut index = HashMap::with_capacity(shapes.len());

    for (signature, shape) in descriptor.operations().iter().zip(shapes) {
        let address = library
            .with_live(|handle, loader| loader.resolve_symbol(handle, &signature.name))
            .ok_or_else(|| BindError::Released(library_name.clone()))?
            .map_err(|err| BindError::MissingEntryPoint {
                operation: signature.name.clone(),
                library: library_name.clone(),
                reason: err.reason,
            })?;

        let invoker = *invokers
            .entry(shape)
            .or_insert_with(|| shape::invoker_for(shape));

        debug!(
            operation = %signature.name,
            address = ?address,
            shape = %shape,
            "entry point resolved"
        );

        index.insert(signature.name.clone(), functions.len());
        functions.push(BoundFunction {
            signature: signature.clone(),
            address,
            shape,
            invoker,
        });
    }

    info!(
        library = %library_name,
        operations = functions.len(),
        shapes = invokers.len(),
        "interface bound"
    );

    Ok(Adapter {
        library,
        functions,
        index,
        shapes: invokers.len(),
    })
}
