use crate::error::{CommandError, ConfigError, LoopError, Stop};
use crate::guide::{self, Guide, ParamType};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Function invoked when a command runs.
pub type Handler = Arc<dyn Fn(&Arguments) -> anyhow::Result<Value> + Send + Sync>;

/// Function producing completion candidates for one command.
///
/// Receives `(text, line, start_index, end_index)`.
pub type Completer = Arc<dyn Fn(&str, &str, usize, usize) -> Vec<String> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Arguments) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`Completer`].
pub fn completer<F>(f: F) -> Completer
where
    F: Fn(&str, &str, usize, usize) -> Vec<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One declared parameter of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    name: String,
    ty: ParamType,
    variadic: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            variadic: false,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Untyped)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Text)
    }

    /// Collect every remaining token into this parameter.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

/// Ordered parameter list of a handler: fixed positionals and an optional variadic tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    fn positional(&self) -> &[Param] {
        match self.params.last() {
            Some(last) if last.variadic => &self.params[..self.params.len() - 1],
            _ => &self.params,
        }
    }

    fn variadic_tail(&self) -> Option<&Param> {
        self.params.last().filter(|p| p.variadic)
    }

    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for (idx, param) in self.params.iter().enumerate() {
            if !seen.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter '{}'", param.name));
            }
            if param.variadic && idx + 1 != self.params.len() {
                return Err(format!("variadic parameter '{}' must be last", param.name));
            }
        }
        Ok(())
    }
}

impl From<Vec<Param>> for Signature {
    fn from(params: Vec<Param>) -> Self {
        Self::new(params)
    }
}

/// Raw token(s) matched to one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Single(String),
    Variadic(Vec<String>),
}

/// Tokens matched against a signature, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundArguments {
    entries: Vec<(String, Bound)>,
}

impl BoundArguments {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bound)> {
        self.entries.iter().map(|(name, bound)| (name.as_str(), bound))
    }

    pub fn get(&self, param: &str) -> Option<&Bound> {
        self.entries
            .iter()
            .find(|(name, _)| name == param)
            .map(|(_, bound)| bound)
    }
}

/// Typed values handed to a handler.
///
/// The accessors fail with a [`CommandError`] naming the command when an
/// argument is missing or holds another kind of value, so handlers can just
/// use `?`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arguments {
    command: String,
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(command: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            command: command.into(),
            values,
        }
    }

    /// Name of the command being executed.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Every value from `index` on, e.g. a variadic tail.
    pub fn rest(&self, index: usize) -> &[Value] {
        self.values.get(index..).unwrap_or(&[])
    }

    pub fn value(&self, index: usize) -> Result<&Value, CommandError> {
        self.values
            .get(index)
            .ok_or_else(|| self.mismatch(index, "a value", "nothing"))
    }

    pub fn str(&self, index: usize) -> Result<&str, CommandError> {
        let value = self.value(index)?;
        value
            .as_str()
            .ok_or_else(|| self.mismatch(index, "str", value.kind()))
    }

    pub fn int(&self, index: usize) -> Result<i64, CommandError> {
        let value = self.value(index)?;
        value
            .as_int()
            .ok_or_else(|| self.mismatch(index, "int", value.kind()))
    }

    pub fn float(&self, index: usize) -> Result<f64, CommandError> {
        let value = self.value(index)?;
        value
            .as_float()
            .ok_or_else(|| self.mismatch(index, "float", value.kind()))
    }

    pub fn bool(&self, index: usize) -> Result<bool, CommandError> {
        let value = self.value(index)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(index, "bool", value.kind()))
    }

    pub fn bytes(&self, index: usize) -> Result<&[u8], CommandError> {
        let value = self.value(index)?;
        value
            .as_bytes()
            .ok_or_else(|| self.mismatch(index, "bytes", value.kind()))
    }

    pub fn list(&self, index: usize) -> Result<&[Value], CommandError> {
        let value = self.value(index)?;
        value
            .as_list()
            .ok_or_else(|| self.mismatch(index, "list", value.kind()))
    }

    fn mismatch(&self, index: usize, expected: &str, found: &str) -> CommandError {
        CommandError::ArgumentType {
            command: self.command.clone(),
            index,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// A named handler together with its guides and optional completer.
#[derive(Clone)]
pub struct Command {
    name: String,
    description: String,
    signature: Signature,
    handler: Handler,
    completer: Option<Completer>,
    guides: HashMap<String, Vec<Guide>>,
}

impl Command {
    /// Build a command, seeding guides from the signature's declared types
    /// and overriding them per parameter with `explicit_guides`.
    pub fn new(
        name: impl Into<String>,
        handler: Handler,
        description: impl Into<String>,
        signature: Signature,
        explicit_guides: HashMap<String, Vec<Guide>>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        signature
            .validate()
            .map_err(|reason| ConfigError::InvalidSignature {
                command: name.clone(),
                reason,
            })?;

        let mut guides = guide::extract(&signature);
        for (parameter, chain) in explicit_guides {
            if !signature.contains(&parameter) {
                return Err(ConfigError::UnknownGuideParameter {
                    command: name,
                    parameter,
                });
            }
            guides.insert(parameter, chain);
        }

        Ok(Self {
            name,
            description: description.into(),
            signature,
            handler,
            completer: None,
            guides,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Effective guide chain of a parameter.
    pub fn guides(&self, param: &str) -> &[Guide] {
        self.guides.get(param).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_completer(&self) -> bool {
        self.completer.is_some()
    }

    /// Match raw tokens against the signature.
    pub fn bind_arguments<S: AsRef<str>>(&self, tokens: &[S]) -> Result<BoundArguments, CommandError> {
        let positional = self.signature.positional();
        let tail = self.signature.variadic_tail();

        if tokens.len() < positional.len() {
            let missing: Vec<&str> = positional[tokens.len()..].iter().map(Param::name).collect();
            return Err(self.arity(missing_message(&missing)));
        }
        if tail.is_none() && tokens.len() > positional.len() {
            return Err(self.arity(format!(
                "takes {} positional argument{} but {} {} given",
                positional.len(),
                plural(positional.len()),
                tokens.len(),
                if tokens.len() == 1 { "was" } else { "were" },
            )));
        }

        let mut entries: Vec<(String, Bound)> = positional
            .iter()
            .zip(tokens)
            .map(|(param, token)| (param.name.clone(), Bound::Single(token.as_ref().to_string())))
            .collect();
        if let Some(tail) = tail {
            let rest = tokens[positional.len()..]
                .iter()
                .map(|t| t.as_ref().to_string())
                .collect();
            entries.push((tail.name.clone(), Bound::Variadic(rest)));
        }
        Ok(BoundArguments { entries })
    }

    /// Run every bound token through its parameter's guides.
    ///
    /// A variadic parameter applies the same chain to each of its tokens.
    pub fn apply_guides(&self, bound: &BoundArguments) -> Result<Vec<Value>, CommandError> {
        let mut values = Vec::new();
        for (param, tokens) in bound.iter() {
            let chain = self.guides(param);
            match tokens {
                Bound::Single(token) => {
                    values.push(guide::apply_chain(chain, Value::Str(token.clone()))?);
                }
                Bound::Variadic(tokens) => {
                    for token in tokens {
                        values.push(guide::apply_chain(chain, Value::Str(token.clone()))?);
                    }
                }
            }
        }
        Ok(values)
    }

    /// Bind, guide and invoke the handler.
    ///
    /// Handler failures come back as [`CommandError`]s; a returned [`Stop`]
    /// is passed through so the loop can end.
    pub fn execute<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Value, LoopError> {
        let bound = self.bind_arguments(tokens)?;
        let values = self.apply_guides(&bound)?;
        debug!(command = %self.name, args = values.len(), "executing command");

        let args = Arguments::new(self.name.clone(), values);
        (self.handler)(&args).map_err(|err| {
            let err = match err.downcast::<Stop>() {
                Ok(stop) => return LoopError::Stop(stop),
                Err(err) => err,
            };
            match err.downcast::<CommandError>() {
                Ok(cmd_err) => LoopError::Command(cmd_err),
                Err(source) => LoopError::Command(CommandError::Handler {
                    command: self.name.clone(),
                    source,
                }),
            }
        })
    }

    /// Candidates from the attached completer, none without one.
    pub fn complete(&self, text: &str, line: &str, start_index: usize, end_index: usize) -> Vec<String> {
        match &self.completer {
            Some(completer) => completer(text, line, start_index, end_index),
            None => Vec::new(),
        }
    }

    /// Attach the completer; a command takes at most one.
    pub fn attach_completer(&mut self, completer: Completer) -> Result<(), ConfigError> {
        if self.completer.is_some() {
            return Err(ConfigError::CompleterAlreadyAttached {
                name: self.name.clone(),
            });
        }
        self.completer = Some(completer);
        Ok(())
    }

    fn arity(&self, problem: String) -> CommandError {
        CommandError::Arity {
            command: self.name.clone(),
            problem,
        }
    }
}

/// Same name, same handler.
impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.handler, &other.handler)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("signature", &self.signature)
            .field("guides", &self.guides)
            .field("has_completer", &self.completer.is_some())
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn missing_message(missing: &[&str]) -> String {
    let quoted: Vec<String> = missing.iter().map(|m| format!("'{}'", m)).collect();
    let names = match quoted.as_slice() {
        [one] => one.clone(),
        [a, b] => format!("{} and {}", a, b),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
        [] => String::new(),
    };
    format!(
        "missing {} required positional argument{}: {}",
        missing.len(),
        plural(missing.len()),
        names
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuideError;
    use std::sync::Mutex;

    fn recorder() -> (Handler, Arc<Mutex<Vec<Vec<Value>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let handler = handler(move |args| {
            sink.lock().unwrap().push(args.values().to_vec());
            Ok(Value::None)
        });
        (handler, calls)
    }

    fn command(signature: Vec<Param>) -> (Command, Arc<Mutex<Vec<Vec<Value>>>>) {
        let (handler, calls) = recorder();
        let cmd = Command::new("foo", handler, "foo description", signature.into(), HashMap::new()).unwrap();
        (cmd, calls)
    }

    #[test]
    fn test_execute_passes_guided_values() {
        let (cmd, calls) = command(vec![Param::untyped("x"), Param::untyped("y")]);
        cmd.execute(&["scoo", "bee"]).unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![vec![Value::from("scoo"), Value::from("bee")]]
        );
    }

    #[test]
    fn test_execute_returns_handler_value() {
        let handler = handler(|args| Ok(Value::Int(args.int(0)? + args.int(1)?)));
        let cmd = Command::new(
            "add",
            handler,
            "",
            vec![Param::new("a", ParamType::Int), Param::new("b", ParamType::Int)].into(),
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(cmd.execute(&["2", "40"]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_arity_mismatch_is_command_error() {
        let (cmd, calls) = command(vec![Param::untyped("x"), Param::untyped("y")]);

        let err = cmd.execute(&["a", "b", "c"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "foo() takes 2 positional arguments but 3 were given"
        );

        let err = cmd.execute(&["a"]).unwrap_err();
        assert!(matches!(err, LoopError::Command(CommandError::Arity { .. })));
        assert_eq!(
            err.to_string(),
            "foo() missing 1 required positional argument: 'y'"
        );

        let err = cmd.bind_arguments::<&str>(&[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "foo() missing 2 required positional arguments: 'x' and 'y'"
        );
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bind_variadic_tail() {
        let (cmd, _) = command(vec![Param::untyped("first"), Param::untyped("rest").variadic()]);
        let bound = cmd.bind_arguments(&["a", "b", "c"]).unwrap();
        assert_eq!(bound.get("first"), Some(&Bound::Single("a".into())));
        assert_eq!(
            bound.get("rest"),
            Some(&Bound::Variadic(vec!["b".into(), "c".into()]))
        );

        let bound = cmd.bind_arguments(&["a"]).unwrap();
        assert_eq!(bound.get("rest"), Some(&Bound::Variadic(vec![])));
    }

    #[test]
    fn test_variadic_applies_chain_to_each_token() {
        let (cmd, calls) = command(vec![
            Param::text("label"),
            Param::new("numbers", ParamType::Int).variadic(),
        ]);
        cmd.execute(&["sum", "1", "2", "3"]).unwrap();
        assert_eq!(
            calls.lock().unwrap()[0],
            vec![Value::from("sum"), Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_guide_failure_is_command_error() {
        let (cmd, calls) = command(vec![Param::new("n", ParamType::Int)]);
        let err = cmd.execute(&["foobar"]).unwrap_err();
        match err {
            LoopError::Command(CommandError::Guide(GuideError { value, guide })) => {
                assert_eq!(value, "foobar");
                assert_eq!(guide, "literal");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_explicit_guides_override_declared_type() {
        let (handler, calls) = recorder();
        let upper = Guide::new("upper", |v| Ok(Value::Str(v.to_string().to_uppercase())));
        let mut explicit = HashMap::new();
        explicit.insert("x".to_string(), vec![upper.clone()]);
        let cmd = Command::new(
            "foo",
            handler,
            "",
            vec![Param::new("x", ParamType::Int), Param::new("y", ParamType::Bytes)].into(),
            explicit,
        )
        .unwrap();

        assert_eq!(cmd.guides("x"), &[upper][..]);
        assert_eq!(cmd.guides("y"), &[guide::encode()][..]);

        cmd.execute(&["abc", "abc"]).unwrap();
        assert_eq!(
            calls.lock().unwrap()[0],
            vec![Value::from("ABC"), Value::Bytes(b"abc".to_vec())]
        );
    }

    #[test]
    fn test_guides_for_unknown_parameter_rejected() {
        let (handler, _) = recorder();
        let mut explicit = HashMap::new();
        explicit.insert("nope".to_string(), vec![guide::literal()]);
        let err = Command::new("foo", handler, "", vec![Param::untyped("x")].into(), explicit).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownGuideParameter {
                command: "foo".into(),
                parameter: "nope".into()
            }
        );
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let (handler, _) = recorder();
        let err = Command::new(
            "foo",
            handler.clone(),
            "",
            vec![Param::untyped("rest").variadic(), Param::untyped("x")].into(),
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSignature { .. }));

        let err = Command::new(
            "foo",
            handler,
            "",
            vec![Param::untyped("x"), Param::untyped("x")].into(),
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSignature { .. }));
    }

    #[test]
    fn test_accessor_mismatch_is_command_error() {
        let handler = handler(|args| Ok(Value::Int(args.int(0)?)));
        let cmd = Command::new("foo", handler, "", vec![Param::text("x")].into(), HashMap::new()).unwrap();
        let err = cmd.execute(&["1"]).unwrap_err();
        assert_eq!(err.to_string(), "foo: argument 0: expected int, got str");
    }

    #[test]
    fn test_handler_failure_and_stop() {
        let failing = handler(|_| anyhow::bail!("boom"));
        let cmd = Command::new("foo", failing, "", Signature::default(), HashMap::new()).unwrap();
        let err = cmd.execute::<&str>(&[]).unwrap_err();
        assert!(matches!(err, LoopError::Command(CommandError::Handler { .. })));
        assert_eq!(err.to_string(), "foo: boom");

        let stopping = handler(|_| Err(Stop::new("bye").into()));
        let cmd = Command::new("quit", stopping, "", Signature::default(), HashMap::new()).unwrap();
        match cmd.execute::<&str>(&[]) {
            Err(LoopError::Stop(stop)) => assert_eq!(stop.message, "bye"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_complete_without_completer_is_empty() {
        let (cmd, _) = command(vec![]);
        assert!(cmd.complete("a", "foo a", 4, 5).is_empty());
    }

    #[test]
    fn test_complete_delegates_to_completer() {
        let (mut cmd, _) = command(vec![]);
        let seen = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        cmd.attach_completer(completer(move |text, line, start, end| {
            *recorder.lock().unwrap() = Some((text.to_string(), line.to_string(), start, end));
            vec!["abba".to_string()]
        }))
        .unwrap();

        assert_eq!(cmd.complete("a", "foo a", 4, 5), vec!["abba"]);
        assert_eq!(
            *seen.lock().unwrap(),
            Some(("a".to_string(), "foo a".to_string(), 4, 5))
        );
    }

    #[test]
    fn test_completer_is_one_shot() {
        let (mut cmd, _) = command(vec![]);
        cmd.attach_completer(completer(|_, _, _, _| vec!["first".to_string()]))
            .unwrap();
        let err = cmd
            .attach_completer(completer(|_, _, _, _| vec!["second".to_string()]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::CompleterAlreadyAttached { name: "foo".into() }
        );
        assert_eq!(cmd.complete("", "foo ", 4, 4), vec!["first"]);
    }

    #[test]
    fn test_equality_is_name_and_handler() {
        let (handler, _) = recorder();
        let a = Command::new("foo", handler.clone(), "one", Signature::default(), HashMap::new()).unwrap();
        let b = Command::new("foo", handler.clone(), "two", Signature::default(), HashMap::new()).unwrap();
        let c = Command::new("bar", handler, "one", Signature::default(), HashMap::new()).unwrap();
        let (other, _) = recorder();
        let d = Command::new("foo", other, "one", Signature::default(), HashMap::new()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
