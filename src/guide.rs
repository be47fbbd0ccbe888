//! Guides turn raw text tokens into typed [`Value`]s.
//!
//! Every parameter of a command owns an ordered chain of guides. The token
//! enters the first guide, each guide's output feeds the next one, and an
//! empty chain passes the token through as text.

use crate::command::Signature;
use crate::error::GuideError;
use crate::literal;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Declared type of a handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// No declared type; the token is passed through.
    Untyped,
    Text,
    Bytes,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Set,
    Dict,
    /// Any literal.
    Any,
}

type GuideFn = dyn Fn(Value) -> Result<Value, GuideError> + Send + Sync;

/// A named text-to-value conversion step.
#[derive(Clone)]
pub struct Guide {
    name: Arc<str>,
    func: Arc<GuideFn>,
}

impl Guide {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, GuideError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: Value) -> Result<Value, GuideError> {
        (self.func)(value)
    }
}

impl fmt::Debug for Guide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guide").field(&self.name).finish()
    }
}

/// Guides are equal when they are the same function.
impl PartialEq for Guide {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// Parse the token with the safe literal parser.
pub fn literal() -> Guide {
    static LITERAL: OnceLock<Guide> = OnceLock::new();
    LITERAL
        .get_or_init(|| {
            Guide::new("literal", |value| match value {
                Value::Str(text) => {
                    literal::parse(&text).map_err(|_| GuideError::new(text, "literal"))
                }
                other => Err(GuideError::new(other.repr(), "literal")),
            })
        })
        .clone()
}

/// Turn the token into its UTF-8 bytes.
pub fn encode() -> Guide {
    static ENCODE: OnceLock<Guide> = OnceLock::new();
    ENCODE
        .get_or_init(|| {
            Guide::new("encode", |value| match value {
                Value::Str(text) => Ok(Value::Bytes(text.into_bytes())),
                other => Err(GuideError::new(other.repr(), "encode")),
            })
        })
        .clone()
}

/// Default chain for a declared parameter type.
pub fn resolve(declared: ParamType) -> Vec<Guide> {
    match declared {
        ParamType::Untyped | ParamType::Text => Vec::new(),
        ParamType::Bytes => vec![encode()],
        _ => vec![literal()],
    }
}

/// Default chains for every parameter of a signature.
pub fn extract(signature: &Signature) -> HashMap<String, Vec<Guide>> {
    signature
        .params()
        .iter()
        .map(|param| (param.name().to_string(), resolve(param.ty())))
        .collect()
}

/// Run `value` through `chain`, in order.
pub fn apply_chain(chain: &[Guide], value: Value) -> Result<Value, GuideError> {
    chain.iter().try_fold(value, |acc, guide| guide.apply(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Param;

    #[test]
    fn test_resolve_by_declared_type() {
        assert!(resolve(ParamType::Text).is_empty());
        assert!(resolve(ParamType::Untyped).is_empty());
        assert_eq!(resolve(ParamType::Bytes), vec![encode()]);
        for ty in [
            ParamType::Int,
            ParamType::Float,
            ParamType::Bool,
            ParamType::List,
            ParamType::Tuple,
            ParamType::Set,
            ParamType::Dict,
            ParamType::Any,
        ] {
            assert_eq!(resolve(ty), vec![literal()], "{:?}", ty);
        }
    }

    #[test]
    fn test_literal_guide() {
        assert_eq!(literal().apply("'1'".into()), Ok(Value::Str("1".into())));
        assert_eq!(literal().apply("1".into()), Ok(Value::Int(1)));
        assert_eq!(
            literal().apply("foo".into()),
            Err(GuideError::new("foo", "literal"))
        );
    }

    #[test]
    fn test_literal_applied_twice_unwraps_quoted_number() {
        let chain = vec![literal(), literal()];
        assert_eq!(apply_chain(&chain, "'1'".into()), Ok(Value::Int(1)));
    }

    #[test]
    fn test_encode_guide() {
        assert_eq!(
            encode().apply("foobar".into()),
            Ok(Value::Bytes(b"foobar".to_vec()))
        );
        assert!(encode().apply(Value::Int(1)).is_err());
    }

    #[test]
    fn test_chain_composition_order() {
        let f = Guide::new("f", |v| Ok(Value::Str(format!("f({})", v))));
        let g = Guide::new("g", |v| Ok(Value::Str(format!("g({})", v))));
        assert_eq!(
            apply_chain(&[f.clone(), g.clone()], "x".into()),
            Ok(Value::Str("g(f(x))".into()))
        );
        assert_eq!(
            apply_chain(&[g, f], "x".into()),
            Ok(Value::Str("f(g(x))".into()))
        );
        assert_eq!(apply_chain(&[], "x".into()), Ok(Value::Str("x".into())));
    }

    #[test]
    fn test_chain_stops_at_first_failure() {
        let failing = Guide::new("nope", |v| Err(GuideError::new(v.to_string(), "nope")));
        let never = Guide::new("never", |_| panic!("must not run"));
        assert_eq!(
            apply_chain(&[failing, never], "x".into()),
            Err(GuideError::new("x", "nope"))
        );
    }

    #[test]
    fn test_extract_from_signature() {
        let signature = Signature::new(vec![
            Param::new("name", ParamType::Text),
            Param::new("payload", ParamType::Bytes),
            Param::new("count", ParamType::Int),
            Param::untyped("rest").variadic(),
        ]);
        let guides = extract(&signature);
        assert_eq!(guides.len(), 4);
        assert!(guides["name"].is_empty());
        assert_eq!(guides["payload"], vec![encode()]);
        assert_eq!(guides["count"], vec![literal()]);
        assert!(guides["rest"].is_empty());
    }
}
