//! Host class binding.
//!
//! Each host type (`HTMLDocument`, `Element`, `XMLHttpRequest`) describes
//! itself once through [`HostClass`]: its global name, how to build the
//! native half of a new instance, and the prototype members it exposes.
//! [`register_class`] turns that description into a constructor function and
//! a prototype object on the global scope.
//!
//! This module and the argument helpers below are the only code that deals in
//! engine values. Host objects receive plain Rust values through them.

use boa_engine::object::builtins::JsFunction;
use boa_engine::object::{FunctionObjectBuilder, NativeObject, ObjectInitializer};
use boa_engine::property::{Attribute, PropertyDescriptor};
use boa_engine::{Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction};
use boa_gc::{Finalize, Trace};

use crate::bridge::SandboxHandle;

/// Signature of every native method, getter and setter.
pub(crate) type HostFn =
    fn(&JsValue, &[JsValue], &SandboxHandle, &mut Context) -> JsResult<JsValue>;

/// One prototype member.
pub(crate) enum Member {
    /// A method taking `length` declared arguments.
    Method(&'static str, usize, HostFn),
    /// An accessor property. A missing getter reads as `undefined`.
    Accessor {
        name: &'static str,
        get: Option<HostFn>,
        set: Option<HostFn>,
    },
    /// A read-only integer constant, defined on the constructor as well.
    Constant(&'static str, i32),
}

/// A script-visible class backed by native data.
pub(crate) trait HostClass: NativeObject + Sized {
    /// Global binding name.
    const NAME: &'static str;

    /// Declared constructor arity.
    const LENGTH: usize = 0;

    /// Build the native half of `new NAME(...args)`.
    fn construct(args: &[JsValue], handle: &SandboxHandle, context: &mut Context)
    -> JsResult<Self>;

    /// Prototype members.
    fn members() -> Vec<Member>;

    /// Define own properties on a freshly built instance.
    fn initialize(_instance: &JsObject, _args: &[JsValue], _context: &mut Context) -> JsResult<()> {
        Ok(())
    }
}

#[derive(Trace, Finalize)]
struct MemberCaptures {
    handle: SandboxHandle,
    #[unsafe_ignore_trace]
    body: HostFn,
}

#[derive(Trace, Finalize)]
struct ClassCaptures {
    handle: SandboxHandle,
    prototype: JsObject,
}

/// Wrap `body` in a function object that receives `handle`.
fn host_function(
    context: &mut Context,
    handle: &SandboxHandle,
    name: &str,
    length: usize,
    body: HostFn,
) -> JsFunction {
    let function = NativeFunction::from_copy_closure_with_captures(
        |this: &JsValue, args: &[JsValue], captures: &MemberCaptures, context: &mut Context| {
            (captures.body)(this, args, &captures.handle, context)
        },
        MemberCaptures {
            handle: handle.clone(),
            body,
        },
    );
    FunctionObjectBuilder::new(context.realm(), function)
        .name(JsString::from(name))
        .length(length)
        .constructor(false)
        .build()
}

fn construct<T: HostClass>(
    _new_target: &JsValue,
    args: &[JsValue],
    captures: &ClassCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let data = T::construct(args, &captures.handle, context)?;
    let instance = JsObject::from_proto_and_data(captures.prototype.clone(), data);
    T::initialize(&instance, args, context)?;
    Ok(instance.into())
}

enum Built {
    Value(&'static str, JsValue, Attribute),
    Accessor(&'static str, Option<JsFunction>, Option<JsFunction>),
}

/// Install `T` as a global constructor and return it.
///
/// STEP 1: Build one function object per method and accessor half.
/// STEP 2: Assemble the prototype from them.
/// STEP 3: Build the constructor and link it with the prototype both ways.
/// STEP 4: Copy the constants onto the constructor.
/// STEP 5: Bind the constructor on the global object under `T::NAME`.
pub(crate) fn register_class<T: HostClass>(
    context: &mut Context,
    handle: &SandboxHandle,
) -> JsResult<JsFunction> {
    // STEP 1
    let mut constants = Vec::new();
    let built: Vec<Built> = T::members()
        .into_iter()
        .map(|member| match member {
            Member::Method(name, length, body) => {
                let function = host_function(context, handle, name, length, body);
                Built::Value(
                    name,
                    function.into(),
                    Attribute::WRITABLE | Attribute::CONFIGURABLE,
                )
            }
            Member::Accessor { name, get, set } => Built::Accessor(
                name,
                get.map(|body| host_function(context, handle, name, 0, body)),
                set.map(|body| host_function(context, handle, name, 1, body)),
            ),
            Member::Constant(name, value) => {
                constants.push((name, value));
                Built::Value(name, JsValue::from(value), Attribute::ENUMERABLE)
            }
        })
        .collect();

    // STEP 2
    let mut initializer = ObjectInitializer::new(context);
    for member in built {
        match member {
            Built::Value(name, value, attribute) => {
                let _ = initializer.property(JsString::from(name), value, attribute);
            }
            Built::Accessor(name, get, set) => {
                let _ = initializer.accessor(
                    JsString::from(name),
                    get,
                    set,
                    Attribute::ENUMERABLE | Attribute::CONFIGURABLE,
                );
            }
        }
    }
    let prototype = initializer.build();

    // STEP 3
    let constructor = FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_copy_closure_with_captures(
            construct::<T>,
            ClassCaptures {
                handle: handle.clone(),
                prototype: prototype.clone(),
            },
        ),
    )
    .name(JsString::from(T::NAME))
    .length(T::LENGTH)
    .constructor(true)
    .build();

    let _ = constructor.define_property_or_throw(
        JsString::from("prototype"),
        PropertyDescriptor::builder()
            .value(prototype.clone())
            .writable(false)
            .enumerable(false)
            .configurable(false)
            .build(),
        context,
    )?;
    let _ = prototype.define_property_or_throw(
        JsString::from("constructor"),
        PropertyDescriptor::builder()
            .value(constructor.clone())
            .writable(true)
            .enumerable(false)
            .configurable(true)
            .build(),
        context,
    )?;

    // STEP 4
    for (name, value) in constants {
        let _ = constructor.define_property_or_throw(
            JsString::from(name),
            PropertyDescriptor::builder()
                .value(value)
                .writable(false)
                .enumerable(true)
                .configurable(false)
                .build(),
            context,
        )?;
    }

    // STEP 5
    context.register_global_property(
        JsString::from(T::NAME),
        constructor.clone(),
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )?;
    log::trace!("registered host class {}", T::NAME);
    Ok(constructor)
}

/// Run `f` on the native data behind `this`.
///
/// Calling a host method on a foreign object is a script error, not a bridge
/// failure, so it surfaces as a catchable `TypeError`.
pub(crate) fn with_host_data<T: NativeObject, R>(
    this: &JsValue,
    f: impl FnOnce(&T) -> R,
) -> JsResult<R> {
    let receiver_error = || {
        JsNativeError::typ().with_message(format!(
            "receiver is not a {}",
            std::any::type_name::<T>().rsplit("::").next().unwrap_or("host object")
        ))
    };
    let object = this.as_object().ok_or_else(receiver_error)?;
    let data = object.downcast_ref::<T>().ok_or_else(receiver_error)?;
    Ok(f(&data))
}

/// Argument `index` as a string, or `None` when absent, `undefined` or `null`.
pub(crate) fn string_arg(
    args: &[JsValue],
    index: usize,
    context: &mut Context,
) -> JsResult<Option<String>> {
    let value = args.get_or_undefined(index);
    if value.is_null_or_undefined() {
        return Ok(None);
    }
    Ok(Some(value.to_string(context)?.to_std_string_escaped()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    #[test]
    fn test_string_arg() {
        let mut context = Context::default();
        let args = [
            JsValue::from(JsString::from("GET")),
            JsValue::undefined(),
            JsValue::null(),
            JsValue::from(42),
        ];

        assert_eq!(string_arg(&args, 0, &mut context).unwrap().as_deref(), Some("GET"));
        assert_eq!(string_arg(&args, 1, &mut context).unwrap(), None);
        assert_eq!(string_arg(&args, 2, &mut context).unwrap(), None);
        assert_eq!(string_arg(&args, 3, &mut context).unwrap().as_deref(), Some("42"));
        assert_eq!(string_arg(&args, 9, &mut context).unwrap(), None);
    }

    #[test]
    fn test_with_host_data_rejects_plain_objects() {
        #[derive(Trace, Finalize, boa_engine::JsData)]
        struct Marker;

        let mut context = Context::default();
        let plain = context.eval(Source::from_bytes("({})")).unwrap();
        assert!(with_host_data::<Marker, ()>(&plain, |_| ()).is_err());
        assert!(with_host_data::<Marker, ()>(&JsValue::undefined(), |_| ()).is_err());

        let marked: JsValue = JsObject::from_proto_and_data(None, Marker).into();
        assert!(with_host_data::<Marker, ()>(&marked, |_| ()).is_ok());
    }
}
