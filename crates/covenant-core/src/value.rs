//! Runtime value representation for the contracted host.
//!
//! [`Value`] is the dynamically-typed value universe that contracts check and
//! wrap. Scalars are plain data; [`Object`], [`Function`] and arrays are
//! *composite* values shared by reference.
//!
//! Objects and functions carry a mutable fallback-lookup link (`proto`).
//! Property reads on objects walk that chain, and instance-of queries look for
//! a constructor's `prototype` object on it. Arrays have no link and are never
//! instances of anything. The constructor wrapper relies on re-linking this chain to
//! keep instances recognizable by both the original and the wrapped
//! constructor.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{CoreError, RuntimeError};
use crate::id::{FunctionId, ObjectId};

/// Default nesting depth used when rendering values in diagnostics.
pub const DEFAULT_STRINGIFY_DEPTH: usize = 3;

/// Signature of a native function body: receiver first, then positional
/// arguments.
pub type NativeBody = dyn Fn(&Value, &[Value]) -> Result<Value, RuntimeError>;

/// A runtime value of the host.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// Immutable, shared element list.
    Array(Rc<Vec<Value>>),
    Object(Object),
    Function(Function),
}

impl Value {
    /// Builds an array value.
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }

    /// Returns a human-readable description of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Composite values are shared by reference and survive construction
    /// results unchanged.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Function(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Reads a property through the fallback chain. Non-objects have none.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    /// Returns true when `ctor.prototype` appears on this value's fallback
    /// chain. Functions without a prototype never have instances.
    pub fn instance_of(&self, ctor: &Function) -> bool {
        match (self, ctor.prototype()) {
            (Value::Object(obj), Some(proto)) => obj.inherits_from(proto),
            (Value::Function(f), Some(proto)) => f
                .proto()
                .is_some_and(|link| link.ptr_eq(proto) || link.inherits_from(proto)),
            _ => false,
        }
    }

    /// Identity for composites, value equality for scalars.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Renders the value for diagnostics, collapsing composites nested deeper
    /// than `depth`.
    pub fn stringify(&self, depth: usize) -> String {
        let mut out = String::new();
        self.render(&mut out, depth);
        out
    }

    /// Converts the value to JSON, collapsing composites nested deeper than
    /// `depth` the same way [`stringify`](Self::stringify) does. `undefined`
    /// and non-finite numbers become `null`; functions become their
    /// `[Function name]` tag.
    pub fn to_json(&self, depth: usize) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Json::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.clone()),
            Value::Function(_) => Json::String(self.stringify(0)),
            Value::Array(_) | Value::Object(_) if depth == 0 => Json::String(self.stringify(0)),
            Value::Array(items) => {
                Json::Array(items.iter().map(|item| item.to_json(depth - 1)).collect())
            }
            Value::Object(obj) => Json::Object(
                obj.entries()
                    .into_iter()
                    .map(|(key, value)| (key, value.to_json(depth - 1)))
                    .collect(),
            ),
        }
    }

    fn render(&self, out: &mut String, depth: usize) {
        match self {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&format_number(*n)),
            Value::Str(s) => out.push_str(&quote(s)),
            Value::Function(f) => {
                out.push_str("[Function ");
                out.push_str(f.name().unwrap_or("(anonymous)"));
                out.push(']');
            }
            Value::Array(_) | Value::Object(_) if depth == 0 => out.push_str(match self {
                Value::Array(_) => "[Array]",
                _ => "[Object]",
            }),
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.render(out, depth - 1);
                }
                out.push(']');
            }
            Value::Object(obj) => {
                out.push('{');
                for (i, (key, value)) in obj.entries().iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&quote(key));
                    out.push(':');
                    value.render(out, depth - 1);
                }
                out.push('}');
            }
        }
    }
}

/// Formats a number the way the host prints it: integral values carry no
/// fractional part.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify(DEFAULT_STRINGIFY_DEPTH))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

/// Plain host data from JSON: maps become prototype-less objects.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let obj = Object::new();
                for (key, value) in map {
                    obj.set(key, Value::from(value));
                }
                Value::Object(obj)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Property {
    value: Value,
    enumerable: bool,
}

struct ObjectData {
    id: ObjectId,
    properties: RefCell<IndexMap<String, Property>>,
    proto: RefCell<Option<Object>>,
}

/// A shared, mutable property bag with a fallback-lookup link.
#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

impl Object {
    /// Creates an empty object with no fallback link.
    pub fn new() -> Self {
        Self::with_proto(None)
    }

    /// Creates an empty object whose lookups fall back to `proto`.
    pub fn with_proto(proto: Option<Object>) -> Self {
        Object(Rc::new(ObjectData {
            id: ObjectId::fresh(),
            properties: RefCell::new(IndexMap::new()),
            proto: RefCell::new(proto),
        }))
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Reads an own property, ignoring the fallback chain.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.0.properties.borrow().get(key).map(|p| p.value.clone())
    }

    /// Reads a property, walking the fallback chain.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if let Some(value) = obj.get_own(key) {
                return Some(value);
            }
            current = obj.proto();
        }
        None
    }

    /// True when the property is present anywhere on the chain.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Assigns an own property. An existing property keeps its enumerability.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut props = self.0.properties.borrow_mut();
        let key = key.into();
        match props.get_mut(&key) {
            Some(prop) => prop.value = value,
            None => {
                props.insert(
                    key,
                    Property {
                        value,
                        enumerable: true,
                    },
                );
            }
        }
    }

    /// Defines a non-enumerable own property.
    pub fn define_hidden(&self, key: impl Into<String>, value: Value) {
        self.0.properties.borrow_mut().insert(
            key.into(),
            Property {
                value,
                enumerable: false,
            },
        );
    }

    /// Enumerable own property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0
            .properties
            .borrow()
            .iter()
            .filter(|(_, p)| p.enumerable)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Enumerable own properties in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .properties
            .borrow()
            .iter()
            .filter(|(_, p)| p.enumerable)
            .map(|(k, p)| (k.clone(), p.value.clone()))
            .collect()
    }

    /// Shallow copy of the own properties, sharing the same fallback link.
    pub fn shallow_copy(&self) -> Object {
        let copy = Object::with_proto(self.proto());
        *copy.0.properties.borrow_mut() = self.0.properties.borrow().clone();
        copy
    }

    pub fn proto(&self) -> Option<Object> {
        self.0.proto.borrow().clone()
    }

    /// Re-links the fallback chain, refusing links that would create a cycle.
    pub fn set_proto(&self, proto: Option<Object>) -> Result<(), CoreError> {
        if let Some(p) = &proto {
            if p.ptr_eq(self) || p.inherits_from(self) {
                return Err(CoreError::PrototypeCycle { object: self.id() });
            }
        }
        *self.0.proto.borrow_mut() = proto;
        Ok(())
    }

    /// True when `ancestor` appears on this object's fallback chain.
    pub fn inherits_from(&self, ancestor: &Object) -> bool {
        let mut current = self.proto();
        while let Some(obj) = current {
            if obj.ptr_eq(ancestor) {
                return true;
            }
            current = obj.proto();
        }
        false
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object#{}", self.id())
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

struct FunctionData {
    id: FunctionId,
    name: Option<String>,
    prototype: Option<Object>,
    /// Fallback link of the function itself, distinct from `prototype`.
    proto: RefCell<Option<Object>>,
    /// Routes both call styles into `body`, which allocates its own instance.
    constructing: bool,
    body: Box<NativeBody>,
}

/// A host callable.
#[derive(Clone)]
pub struct Function(Rc<FunctionData>);

impl Function {
    /// A named function with a fresh `prototype` object, usable with
    /// [`construct`](Self::construct).
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Self::from_parts(Some(name.into()), Some(Object::new()), false, Box::new(body))
    }

    /// An anonymous function without a prototype; it cannot be constructed.
    pub fn arrow<F>(body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Self::from_parts(None, None, false, Box::new(body))
    }

    /// A function with an explicit name and prototype.
    pub fn with_prototype<F>(name: Option<String>, prototype: Option<Object>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Self::from_parts(name, prototype, false, Box::new(body))
    }

    /// A function that always constructs, whichever way it is invoked. The
    /// body receives `undefined` as receiver and must produce the instance.
    pub fn constructing<F>(name: Option<String>, prototype: Object, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Self::from_parts(name, Some(prototype), true, Box::new(body))
    }

    fn from_parts(
        name: Option<String>,
        prototype: Option<Object>,
        constructing: bool,
        body: Box<NativeBody>,
    ) -> Self {
        Function(Rc::new(FunctionData {
            id: FunctionId::fresh(),
            name,
            prototype,
            proto: RefCell::new(None),
            constructing,
            body,
        }))
    }

    pub fn id(&self) -> FunctionId {
        self.0.id
    }

    /// The declared name, if any.
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn prototype(&self) -> Option<&Object> {
        self.0.prototype.as_ref()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn proto(&self) -> Option<Object> {
        self.0.proto.borrow().clone()
    }

    /// Re-links the function's own fallback chain. Chains consist of objects
    /// only, so a function can never close a cycle.
    pub fn set_proto(&self, proto: Option<Object>) {
        *self.0.proto.borrow_mut() = proto;
    }

    /// Invokes the function with an explicit receiver.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        if self.0.constructing {
            return self.construct(args);
        }
        (self.0.body)(this, args)
    }

    /// `new`-style invocation. The implicit instance falls back to
    /// `prototype`; a non-composite body result is discarded in favour of it.
    pub fn construct(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        if self.0.constructing {
            return (self.0.body)(&Value::Undefined, args);
        }
        let prototype = self.prototype().ok_or_else(|| {
            RuntimeError::thrown(format!(
                "{} is not a constructor",
                self.name().unwrap_or("(anonymous)")
            ))
        })?;
        let instance = Value::Object(Object::with_proto(Some(prototype.clone())));
        let raw = (self.0.body)(&instance, args)?;
        Ok(if raw.is_composite() { raw } else { instance })
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Function#{}({})", self.id(), name),
            None => write!(f, "Function#{}", self.id()),
        }
    }
}
