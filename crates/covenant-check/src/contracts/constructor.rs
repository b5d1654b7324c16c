//! Constructor adapter for `constructs` contracts.
//!
//! Wrapping a constructor builds a second prototype object, `wrapped_methods`,
//! that holds the contracted prototype fields and falls back to the original
//! prototype. Every instance produced through the wrapper is linked to
//! `wrapped_methods`, so it is an instance of both the wrapper and the
//! original constructor. The wrapper constructs whether or not it was invoked
//! with `construct`.
//!
//! A constructor body may return another composite. Objects and functions
//! are re-linked to `wrapped_methods`; arrays have no fallback link, so an
//! array result is returned as produced and is an instance of neither
//! constructor.

use indexmap::IndexMap;

use covenant_core::error::{RuntimeError, UsageError};
use covenant_core::value::{Function, Object, Value};
use covenant_core::violation::Frame;

use crate::contracts::blame::BlameContext;
use crate::contracts::check::check_and_wrap;
use crate::contracts::function::{capture_context, FunctionContract};
use crate::contracts::{is_a, Contract};

/// Checks that `ctor` has a prototype carrying every contracted field. A
/// field holding `undefined` counts as missing.
pub(crate) fn validate_prototype(
    fields: &IndexMap<String, Contract>,
    ctor: &Function,
    thing_name: Option<&str>,
) -> Result<(), UsageError> {
    let Some(proto) = ctor.prototype() else {
        return Err(UsageError::NotAConstructor {
            got: ctor.name().unwrap_or("(anonymous)").to_string(),
        });
    };

    let missing: Vec<String> = fields
        .keys()
        .filter(|name| matches!(proto.get(name), None | Some(Value::Undefined)))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let owner = match thing_name.or(ctor.name()) {
        Some(name) => format!("{name}'s"),
        None => "the".to_string(),
    };
    Err(UsageError::MissingPrototypeFields { owner, missing })
}

/// Wraps `ctor` so that construction checks inputs and result, and
/// instances see contracted versions of the prototype fields.
pub(crate) fn wrap_constructor(
    contract: &FunctionContract,
    fields: &IndexMap<String, Contract>,
    thing_name: Option<&str>,
    ctor: Function,
    ctx: &mut BlameContext,
) -> Result<Function, RuntimeError> {
    if let Err(err) = validate_prototype(fields, &ctor, thing_name.or(ctx.thing_name())) {
        return Err(ctx.fail(contract, err.to_string()));
    }
    let Some(original_proto) = ctor.prototype().cloned() else {
        return Err(ctx.fail(contract, "expected a constructor with a prototype"));
    };

    let mut base = capture_context(ctx, &ctor);
    if let Some(name) = thing_name {
        base.set_thing_name(Some(name.to_string()));
    }
    tracing::debug!(
        name = base.thing_name().unwrap_or("(anonymous)"),
        fields = fields.len(),
        "wrapping constructor"
    );

    let wrapped_methods = Object::with_proto(Some(original_proto.clone()));
    wrapped_methods.define_hidden("constructor", Value::Function(ctor.clone()));

    for (name, field_contract) in fields {
        let field_contract = field_contract.map_function(|mc| {
            if mc.this_contract().is_any() {
                mc.this_arg(is_a(ctor.clone()))
            } else {
                mc.clone()
            }
        });
        let frame = if field_contract.as_function().is_some() {
            Frame::Method(name.clone())
        } else {
            Frame::Field(name.clone())
        };
        let current = original_proto.get(name).unwrap_or(Value::Undefined);

        let mut field_ctx = base.clone();
        field_ctx.set_thing_name(Some(name.clone()));
        let checked = field_ctx.nested(frame, false, |ctx| {
            check_and_wrap(&field_contract, current, ctx)
        })?;
        wrapped_methods.set(name.clone(), checked);
    }

    let contract = contract.clone();
    let instance_proto = wrapped_methods.clone();
    let name = ctor.name().map(str::to_string);

    Ok(Function::constructing(name, wrapped_methods, move |_, args| {
        let mut here = base.clone();
        let instance = Value::Object(Object::with_proto(Some(instance_proto.clone())));

        let (this, args) = contract.check_inputs(&instance, args, &mut here)?;
        let raw = ctor.call(&this, &args)?;
        let produced = if raw.is_composite() { raw } else { this };

        let result = contract.check_result(produced, &mut here)?;
        match &result {
            Value::Object(obj) if !obj.ptr_eq(&instance_proto) => {
                obj.set_proto(Some(instance_proto.clone()))?
            }
            Value::Function(f) => f.set_proto(Some(instance_proto.clone())),
            _ => {}
        }
        Ok(result)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use covenant_core::violation::{ArgName, Blame};

    use crate::config::ContractConfig;
    use crate::contracts::{any, fun, func, method, number, object, string, Spec};

    /// `Point(x)` storing `x`, with `norm` and `label` on its prototype.
    fn point() -> Function {
        let ctor = Function::new("Point", |this, args| {
            if let Value::Object(obj) = this {
                obj.set("x", args.first().cloned().unwrap_or(Value::Undefined));
            }
            Ok(Value::Undefined)
        });
        let proto = ctor.prototype().unwrap();
        proto.set(
            "norm",
            Value::Function(Function::new("norm", |this, _| {
                Ok(this.get("x").unwrap_or(Value::Undefined))
            })),
        );
        proto.set(
            "label",
            Value::Function(Function::new("label", |_, args| Ok(args[0].clone()))),
        );
        ctor
    }

    fn point_contract() -> FunctionContract {
        fun([Spec::named("x", number())]).unwrap().constructs([
            ("norm", Contract::from(func([]).unwrap().returns(number()))),
            (
                "label",
                Contract::from(fun([Spec::named("text", string())]).unwrap().returns(string())),
            ),
        ])
    }

    fn call_method(instance: &Value, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let m = instance.get(name).unwrap();
        m.as_function().unwrap().call(instance, args)
    }

    #[test]
    fn test_instances_belong_to_both_constructors() {
        let ctor = point();
        let wrapped = point_contract().wrap(&ctor).unwrap();
        let instance = wrapped.construct(&[Value::from(3)]).unwrap();

        assert!(instance.instance_of(&wrapped));
        assert!(instance.instance_of(&ctor));
        assert_eq!(instance.get("x"), Some(Value::from(3)));
        assert_eq!(call_method(&instance, "norm", &[]).unwrap(), Value::from(3));
    }

    #[test]
    fn test_plain_call_still_constructs() {
        let wrapped = point_contract().wrap(&point()).unwrap();
        let instance = wrapped.call(&Value::Undefined, &[Value::from(1)]).unwrap();
        assert!(instance.instance_of(&wrapped));
        assert_eq!(instance.get("x"), Some(Value::from(1)));
    }

    #[test]
    fn test_constructor_argument_blames_caller() {
        let wrapped = point_contract().wrap(&point()).unwrap();
        let err = wrapped.construct(&[Value::from("three")]).unwrap_err();
        let v = err.as_violation().unwrap();
        assert_eq!(v.blame, Blame::Caller);
        assert_eq!(v.stack, vec![Frame::Argument(ArgName::Named("x".into()))]);
        assert_eq!(v.thing_name.as_deref(), Some("Point"));
    }

    #[test]
    fn test_methods_are_checked() {
        let wrapped = point_contract().wrap(&point()).unwrap();
        let instance = wrapped.construct(&[Value::from(2)]).unwrap();

        let err = call_method(&instance, "label", &[Value::from(5)]).unwrap_err();
        let v = err.as_violation().unwrap();
        assert_eq!(v.blame, Blame::Caller);
        assert_eq!(
            v.stack,
            vec![
                Frame::Method("label".into()),
                Frame::Argument(ArgName::Named("text".into()))
            ]
        );
        assert_eq!(v.thing_name.as_deref(), Some("label"));
    }

    #[test]
    fn test_any_receiver_narrows_to_instances() {
        let wrapped = point_contract().wrap(&point()).unwrap();
        let instance = wrapped.construct(&[Value::from(2)]).unwrap();
        let norm = instance.get("norm").unwrap();

        let stranger = Value::Object(Object::new());
        let err = norm.as_function().unwrap().call(&stranger, &[]).unwrap_err();
        let v = err.as_violation().unwrap();
        assert_eq!(v.stack, vec![Frame::Method("norm".into()), Frame::Receiver]);
        assert_eq!(v.contract, "isA(Point)");
        assert_eq!(v.blame, Blame::Caller);
    }

    #[test]
    fn test_explicit_receiver_is_kept() {
        let ctor = point();
        let contract = func([]).unwrap().constructs([(
            "norm",
            Contract::from(method(any(), []).unwrap().returns(number())),
        )]);
        let wrapped = contract.wrap(&ctor).unwrap();
        let instance = wrapped.construct(&[]).unwrap();
        let norm = instance.get("norm").unwrap();
        // `method(any())` renders its receiver as Any, so it is narrowed too.
        let err = norm
            .as_function()
            .unwrap()
            .call(&Value::Object(Object::new()), &[])
            .unwrap_err();
        assert_eq!(err.as_violation().unwrap().contract, "isA(Point)");

        let contract = func([]).unwrap().constructs([(
            "norm",
            Contract::from(method(object::<&str>([]), []).unwrap()),
        )]);
        let wrapped = contract.wrap(&point()).unwrap();
        let instance = wrapped.construct(&[]).unwrap();
        let norm = instance.get("norm").unwrap();
        let out = norm
            .as_function()
            .unwrap()
            .call(&Value::Object(Object::new()), &[])
            .unwrap();
        assert!(out.is_undefined());
    }

    #[test]
    fn test_non_composite_result_is_replaced_by_instance() {
        let ctor = Function::new("Counter", |_, _| Ok(Value::from(42)));
        let contract = func([]).unwrap().returns(object::<&str>([]))
            .constructs(Vec::<(String, Contract)>::new());
        let wrapped = contract.wrap(&ctor).unwrap();
        let instance = wrapped.construct(&[]).unwrap();
        assert!(instance.as_object().is_some());
        assert!(instance.instance_of(&ctor));
    }

    #[test]
    fn test_composite_result_is_kept_and_relinked() {
        let replacement = Object::new();
        replacement.set("kind", Value::from("custom"));
        let returned = replacement.clone();
        let ctor = Function::new("Factory", move |_, _| Ok(Value::Object(returned.clone())));
        let contract = func([]).unwrap().constructs(Vec::<(String, Contract)>::new());
        let wrapped = contract.wrap(&ctor).unwrap();

        let out = wrapped.construct(&[]).unwrap();
        assert!(out.same(&Value::Object(replacement)));
        assert!(out.instance_of(&wrapped));
        assert!(out.instance_of(&ctor));
    }

    #[test]
    fn test_result_contract_blames_constructor() {
        let ctor = Function::new("Empty", |_, _| Ok(Value::Undefined));
        let contract = func([])
            .unwrap()
            .returns(object([("id", number())]))
            .constructs(Vec::<(String, Contract)>::new());
        let wrapped = contract.wrap(&ctor).unwrap();
        let err = wrapped.construct(&[]).unwrap_err();
        let v = err.as_violation().unwrap();
        assert_eq!(v.blame, Blame::Callee);
        assert_eq!(v.stack, vec![Frame::Result, Frame::Field("id".into())]);
    }

    #[test]
    fn test_wrapped_prototype_hides_constructor_link() {
        let ctor = point();
        let wrapped = point_contract().wrap(&ctor).unwrap();
        let proto = wrapped.prototype().unwrap();
        assert!(!proto.keys().contains(&"constructor".to_string()));
        let link = proto.get("constructor").unwrap();
        assert!(link.as_function().unwrap().ptr_eq(&ctor));
        assert_eq!(proto.keys(), vec!["norm".to_string(), "label".to_string()]);
    }

    #[test]
    fn test_missing_fields_is_usage_error_on_direct_wrap() {
        let ctor = Function::new("Shape", |_, _| Ok(Value::Undefined));
        let contract = func([]).unwrap().constructs([
            ("area", Contract::from(func([]).unwrap())),
            ("perimeter", Contract::from(func([]).unwrap())),
        ]);
        let err = contract.wrap(&ctor).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Usage(UsageError::MissingPrototypeFields { ref missing, .. })
                if missing == &["area".to_string(), "perimeter".to_string()]
        ));
        assert_eq!(
            err.to_string(),
            "constructs: some fields present in Shape's prototype contract are missing on the prototype: area, perimeter"
        );
    }

    #[test]
    fn test_missing_fields_is_violation_through_dispatch() {
        let ctor = Function::new("Shape", |_, _| Ok(Value::Undefined));
        let contract = Contract::from(
            func([])
                .unwrap()
                .constructs([("area", Contract::from(func([]).unwrap()))]),
        );
        let holder = object([("Shape", contract)]);
        let obj = Object::new();
        obj.set("Shape", Value::Function(ctor));
        let err = holder.check(Value::Object(obj)).unwrap_err();
        let v = err.as_violation().unwrap();
        assert_eq!(v.blame, Blame::Callee);
        assert_eq!(v.stack, vec![Frame::Field("Shape".into())]);
        assert!(v.message.contains("missing on the prototype: area"));
    }

    #[test]
    fn test_arrow_function_is_not_a_constructor() {
        let arrow = Function::arrow(|_, _| Ok(Value::Undefined));
        let err = func([])
            .unwrap()
            .constructs(Vec::<(String, Contract)>::new())
            .wrap(&arrow)
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Usage(UsageError::NotAConstructor { .. })
        ));
    }

    #[test]
    fn test_disabled_config_returns_original_constructor() {
        let ctor = point();
        let config = ContractConfig {
            enabled: false,
            ..ContractConfig::default()
        };
        let out = point_contract().wrap_with(&ctor, &config).unwrap();
        assert!(out.ptr_eq(&ctor));
    }

    #[test]
    fn test_function_result_is_relinked() {
        let inner = Function::arrow(|_, _| Ok(Value::from(7)));
        let returned = inner.clone();
        let ctor = Function::new("Thunk", move |_, _| Ok(Value::Function(returned.clone())));
        let wrapped = func([])
            .unwrap()
            .constructs(Vec::<(String, Contract)>::new())
            .wrap(&ctor)
            .unwrap();

        let out = wrapped.construct(&[]).unwrap();
        assert!(out.same(&Value::Function(inner)));
        assert!(out.instance_of(&ctor));
        assert!(out.instance_of(&wrapped));
        let called = out.as_function().unwrap().call(&Value::Undefined, &[]).unwrap();
        assert_eq!(called, Value::from(7));
    }

    #[test]
    fn test_array_result_is_returned_unlinked() {
        let items = Value::array(vec![Value::from(1)]);
        let returned = items.clone();
        let ctor = Function::new("Pair", move |_, _| Ok(returned.clone()));
        let wrapped = func([])
            .unwrap()
            .constructs(Vec::<(String, Contract)>::new())
            .wrap(&ctor)
            .unwrap();

        let out = wrapped.construct(&[]).unwrap();
        assert!(out.same(&items));
        assert!(!out.instance_of(&ctor));
        assert!(!out.instance_of(&wrapped));
    }

    #[test]
    fn test_undefined_prototype_field_counts_as_missing() {
        let ctor = Function::new("Lazy", |_, _| Ok(Value::Undefined));
        let proto = ctor.prototype().unwrap();
        proto.set("load", Value::Undefined);
        proto.set("size", Value::from(0));
        let err = func([])
            .unwrap()
            .constructs([("load", any()), ("size", number())])
            .wrap(&ctor)
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Usage(UsageError::MissingPrototypeFields { ref missing, .. })
                if missing == &["load".to_string()]
        ));
    }
}
