//! Host hook binding layer.
//!
//! The guest-visible API is a closed set of functions, described exactly
//! once in the [`define_vm_hooks!`] invocation at the bottom of this file.
//! From that single description, the macro produces every artifact the
//! binding needs:
//!
//! 1. the [`VMHooks`] trait the host implements;
//! 2. [`VM_HOOK_IMPORT_NAMES`], the exact names a module imports;
//! 3. [`VMHookFunctionPointers`], the `#[repr(C)]` function-pointer table
//!    handed to the engine, in declaration order;
//! 4. the `dispatch` stubs that recover the hook object from the engine's
//!    opaque context pointer and forward each call;
//! 5. [`ei_metadata`], the runtime-inspectable description.
//!
//! Because all five come from one description, they cannot drift apart.
//! Names stay keyed only during import binding at instance startup; on the
//! hot path the engine calls straight through the pointer table.

use std::ffi::c_void;

/// Primitive types a hook signature may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EIType {
    I32,
    I64,
}

/// Marker for the Rust types allowed in hook signatures.
pub trait EIPrimitive {
    const TYPE: EIType;
}

impl EIPrimitive for i32 {
    const TYPE: EIType = EIType::I32;
}

impl EIPrimitive for i64 {
    const TYPE: EIType = EIType::I64;
}

/// One argument of a hook, by name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EIArgument {
    pub name: &'static str,
    pub arg_type: EIType,
}

/// One hook: import name, arguments, optional result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EIFunction {
    pub name: &'static str,
    pub arguments: Vec<EIArgument>,
    pub result: Option<EIType>,
}

/// The full machine-readable hook description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EIMetadata {
    pub functions: Vec<EIFunction>,
}

/// Owner of a hook implementation with a stable heap address.
///
/// The engine stores [`VMHooksContext::context_ptr`] in each instance's
/// context-data slot; dispatch stubs turn it back into the hook object.
/// The pointer is only dereferenced during a hook call, while the runtime
/// guarantees this context outlives the running instance.
pub struct VMHooksContext {
    hooks: Box<dyn VMHooks>,
}

impl VMHooksContext {
    pub fn new(hooks: Box<dyn VMHooks>) -> Box<VMHooksContext> {
        Box::new(VMHooksContext { hooks })
    }

    /// Pointer-width value to store in an instance's context-data slot.
    /// Stable for as long as the owning `Box` is alive.
    pub fn context_ptr(&self) -> usize {
        self as *const VMHooksContext as usize
    }
}

/// Recovers the hook object behind an engine context pointer.
///
/// # Safety
///
/// `context` must be a value produced by [`VMHooksContext::context_ptr`] on
/// a context that is still alive; the returned borrow must not outlive it.
pub unsafe fn hooks_from_context<'a>(context: *mut c_void) -> &'a dyn VMHooks {
    let hooks_context = &*(context as *const VMHooksContext);
    hooks_context.hooks.as_ref()
}

/// True if `name` is a host hook a module may import.
pub fn is_vm_hook(name: &str) -> bool {
    VM_HOOK_IMPORT_NAMES.contains(&name)
}

macro_rules! ei_result_type {
    () => {
        None
    };
    ($ret:ty) => {
        Some(<$ret as EIPrimitive>::TYPE)
    };
}

macro_rules! define_vm_hooks {
    (
        $(
            $import_name:literal => fn $rust_name:ident ( $( $arg:ident : $arg_ty:ty ),* ) $( -> $ret:ty )? ;
        )*
    ) => {
        /// Host functions callable by the guest.
        pub trait VMHooks: Send + 'static {
            $(
                fn $rust_name(&self $(, $arg: $arg_ty)* ) $( -> $ret )?;
            )*
        }

        /// Import names, in the same order as the pointer table fields.
        pub const VM_HOOK_IMPORT_NAMES: &[&str] = &[
            $( $import_name, )*
        ];

        /// Engine-side table: one `extern "C"` pointer per hook, in
        /// declaration order. Field ordering is ABI.
        #[repr(C)]
        #[derive(Clone, Copy)]
        pub struct VMHookFunctionPointers {
            $(
                pub $rust_name: extern "C" fn(context: *mut c_void $(, $arg: $arg_ty)* ) $( -> $ret )?,
            )*
        }

        impl std::fmt::Debug for VMHookFunctionPointers {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "VMHookFunctionPointers")
            }
        }

        /// Host-side stubs the pointer table points at.
        pub mod dispatch {
            use std::ffi::c_void;

            use super::*;

            $(
                pub extern "C" fn $rust_name(context: *mut c_void $(, $arg: $arg_ty)* ) $( -> $ret )? {
                    let hooks = unsafe { hooks_from_context(context) };
                    hooks.$rust_name($( $arg ),*)
                }
            )*
        }

        /// The pointer table, filled with the dispatch stubs.
        pub fn vm_hook_function_pointers() -> VMHookFunctionPointers {
            VMHookFunctionPointers {
                $( $rust_name: dispatch::$rust_name, )*
            }
        }

        /// The machine-readable description all other artifacts derive from.
        pub fn ei_metadata() -> EIMetadata {
            EIMetadata {
                functions: vec![
                    $(
                        EIFunction {
                            name: $import_name,
                            arguments: vec![
                                $(
                                    EIArgument {
                                        name: stringify!($arg),
                                        arg_type: <$arg_ty as EIPrimitive>::TYPE,
                                    },
                                )*
                            ],
                            result: ei_result_type!($($ret)?),
                        },
                    )*
                ],
            }
        }

        /// Implementation that only logs; every hook is a stub.
        pub struct VMHooksDefault;

        #[allow(unused)]
        impl VMHooks for VMHooksDefault {
            $(
                fn $rust_name(&self $(, $arg: $arg_ty)* ) $( -> $ret )? {
                    tracing::trace!(hook = $import_name, "default hook called");
                    $( <$ret as Default>::default() )?
                }
            )*
        }
    };
}

define_vm_hooks! {
    "getGasLeft" => fn get_gas_left() -> i64;
    "getNumArguments" => fn get_num_arguments() -> i32;
    "checkNoPayment" => fn check_no_payment();
    "signalError" => fn signal_error(message_offset: i32, message_length: i32);
    "storageStore" => fn storage_store(key_offset: i32, key_length: i32, data_offset: i32, data_length: i32) -> i32;
    "storageLoad" => fn storage_load(key_offset: i32, key_length: i32, data_offset: i32) -> i32;
    "int64storageStore" => fn int64_storage_store(key_offset: i32, key_length: i32, value: i64) -> i32;
    "int64storageLoad" => fn int64_storage_load(key_offset: i32, key_length: i32) -> i64;
    "int64finish" => fn int64_finish(value: i64);
    "finish" => fn finish(pointer: i32, length: i32);
    "transferValue" => fn transfer_value(destination_offset: i32, value_offset: i32, data_offset: i32, length: i32) -> i32;
    "executeOnSameContext" => fn execute_on_same_context(gas_limit: i64, address_offset: i32, value_offset: i32, function_offset: i32, function_length: i32, num_arguments: i32, arguments_length_offset: i32, data_offset: i32) -> i32;
    "asyncCall" => fn async_call(destination_offset: i32, value_offset: i32, data_offset: i32, length: i32);
    "mBufferSetBytes" => fn m_buffer_set_bytes(m_buffer_handle: i32, data_offset: i32, data_length: i32) -> i32;
}
