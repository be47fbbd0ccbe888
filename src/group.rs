use crate::command::{Arguments, Command, Completer, Handler, Param};
use crate::error::{CommandError, ConfigError};
use crate::guide::Guide;
use crate::value::Value;
use std::collections::HashMap;
use std::ops::DerefMut;
use std::sync::Arc;
use tracing::debug;

/// Insertion-ordered registry of commands with unique names.
///
/// A group can be filled on its own (e.g. by a module of the host program)
/// and later merged into the shell's registry with [`Group::merge`].
#[derive(Debug, Clone, Default)]
pub struct Group {
    commands: Vec<Command>,
    index: HashMap<String, usize>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start describing a command called `name`.
    ///
    /// ```
    /// use retort::{Group, Param, ParamType, Value};
    ///
    /// let mut group = Group::new();
    /// group
    ///     .command("add")
    ///     .description("add two numbers")
    ///     .param(Param::new("a", ParamType::Int))
    ///     .param(Param::new("b", ParamType::Int))
    ///     .register(|args| Ok(Value::Int(args.int(0)? + args.int(1)?)))
    ///     .unwrap();
    /// assert_eq!(group.resolve("add").unwrap().execute(&["1", "2"]).unwrap(), Value::Int(3));
    /// ```
    pub fn command(&mut self, name: impl Into<String>) -> CommandBuilder<&mut Group> {
        CommandBuilder::new(self, name.into())
    }

    /// Add a fully built command. Fails if the name is taken.
    pub fn insert(&mut self, command: Command) -> Result<(), ConfigError> {
        if self.index.contains_key(command.name()) {
            return Err(ConfigError::DuplicateCommand {
                name: command.name().to_string(),
            });
        }
        debug!(command = %command.name(), "registered command");
        self.index.insert(command.name().to_string(), self.commands.len());
        self.commands.push(command);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Command, CommandError> {
        self.index
            .get(name)
            .map(|&idx| &self.commands[idx])
            .ok_or_else(|| CommandError::Unknown {
                name: name.to_string(),
            })
    }

    /// Attach a completer to a registered command and hand the completer back.
    pub fn complete<F>(&mut self, name: &str, f: F) -> Result<Completer, ConfigError>
    where
        F: Fn(&str, &str, usize, usize) -> Vec<String> + Send + Sync + 'static,
    {
        let completer: Completer = Arc::new(f);
        self.attach_completer(name, completer.clone())?;
        Ok(completer)
    }

    pub fn attach_completer(&mut self, name: &str, completer: Completer) -> Result<(), ConfigError> {
        let idx = *self.index.get(name).ok_or_else(|| ConfigError::UnknownCommand {
            name: name.to_string(),
        })?;
        self.commands[idx].attach_completer(completer)
    }

    /// Move every command of `other` into this group.
    ///
    /// Nothing is inserted when any name already exists here.
    pub fn merge(&mut self, other: Group) -> Result<(), ConfigError> {
        let conflicts: Vec<String> = other
            .names()
            .filter(|name| self.index.contains_key(*name))
            .map(str::to_string)
            .collect();
        if !conflicts.is_empty() {
            return Err(ConfigError::MergeConflict { names: conflicts });
        }
        debug!(count = other.len(), "merging command group");
        for command in other.commands {
            self.insert(command)?;
        }
        Ok(())
    }

    /// Command names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(Command::name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Collects the description, parameters and guides of a command before its
/// handler is registered.
///
/// `G` is whatever gives mutable access to the target [`Group`]: a plain
/// `&mut Group`, or a lock guard for the shell's shared registry.
pub struct CommandBuilder<G> {
    group: G,
    name: String,
    description: String,
    params: Vec<Param>,
    guides: HashMap<String, Vec<Guide>>,
}

impl<G: DerefMut<Target = Group>> CommandBuilder<G> {
    pub(crate) fn new(group: G, name: String) -> Self {
        Self {
            group,
            name,
            description: String::new(),
            params: Vec::new(),
            guides: HashMap::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    /// Replace the default guides of parameter `param`.
    pub fn guide(mut self, param: impl Into<String>, guides: impl IntoIterator<Item = Guide>) -> Self {
        self.guides.insert(param.into(), guides.into_iter().collect());
        self
    }

    /// Register `f` as the handler and return it.
    pub fn register<F>(self, f: F) -> Result<Handler, ConfigError>
    where
        F: Fn(&Arguments) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register_handler(Arc::new(f))
    }

    /// Register an already shared handler and return it unchanged.
    pub fn register_handler(self, handler: Handler) -> Result<Handler, ConfigError> {
        let CommandBuilder {
            mut group,
            name,
            description,
            params,
            guides,
        } = self;
        if group.contains(&name) {
            return Err(ConfigError::DuplicateCommand { name });
        }
        let command = Command::new(name, handler.clone(), description, params.into(), guides)?;
        group.insert(command)?;
        Ok(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::{self, ParamType};

    fn noop(_: &Arguments) -> anyhow::Result<Value> {
        Ok(Value::None)
    }

    #[test]
    fn test_register_keeps_insertion_order() {
        let mut group = Group::new();
        group.command("foo").description("scoobeedoo").register(noop).unwrap();
        group.command("bar").register(noop).unwrap();
        group.command("baz").register(noop).unwrap();

        assert_eq!(group.names().collect::<Vec<_>>(), vec!["foo", "bar", "baz"]);
        assert_eq!(group.resolve("foo").unwrap().description(), "scoobeedoo");
        assert_eq!(group.resolve("bar").unwrap().description(), "");
    }

    #[test]
    fn test_register_returns_same_handler() {
        let mut group = Group::new();
        let handler: Handler = Arc::new(noop);
        let returned = group.command("foo").register_handler(handler.clone()).unwrap();
        assert!(Arc::ptr_eq(&handler, &returned));
        assert!(Arc::ptr_eq(group.resolve("foo").unwrap().handler(), &handler));
    }

    #[test]
    fn test_duplicate_name_rejected_and_first_kept() {
        let mut group = Group::new();
        let first = group.command("foo").description("first").register(noop).unwrap();
        let err = group.command("foo").description("second").register(noop).err().unwrap();

        assert_eq!(err, ConfigError::DuplicateCommand { name: "foo".into() });
        let cmd = group.resolve("foo").unwrap();
        assert_eq!(cmd.description(), "first");
        assert!(Arc::ptr_eq(cmd.handler(), &first));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let group = Group::new();
        let err = group.resolve("bar").unwrap_err();
        assert_eq!(err.to_string(), "Unknown command: bar");
    }

    #[test]
    fn test_builder_guides_and_params() {
        let mut group = Group::new();
        group
            .command("foo")
            .params([Param::new("x", ParamType::Int), Param::text("y")])
            .guide("y", [guide::encode()])
            .register(noop)
            .unwrap();
        let cmd = group.resolve("foo").unwrap();
        assert_eq!(cmd.guides("x"), &[guide::literal()][..]);
        assert_eq!(cmd.guides("y"), &[guide::encode()][..]);
    }

    #[test]
    fn test_complete_attaches_once() {
        let mut group = Group::new();
        group.command("foo").register(noop).unwrap();

        group
            .complete("foo", |text, _, _, _| vec![format!("{}1", text)])
            .unwrap();
        let err = group
            .complete("foo", |_, _, _, _| vec!["other".to_string()])
            .err().unwrap();
        assert_eq!(err, ConfigError::CompleterAlreadyAttached { name: "foo".into() });
        assert_eq!(group.resolve("foo").unwrap().complete("a", "foo a", 4, 5), vec!["a1"]);
    }

    #[test]
    fn test_complete_unknown_command() {
        let mut group = Group::new();
        let err = group.complete("foo", |_, _, _, _| Vec::new()).err().unwrap();
        assert_eq!(err, ConfigError::UnknownCommand { name: "foo".into() });
    }

    #[test]
    fn test_merge_appends_commands() {
        let mut main = Group::new();
        main.command("foo").register(noop).unwrap();

        let mut sub = Group::new();
        sub.command("bar").register(noop).unwrap();
        sub.command("baz").register(noop).unwrap();

        main.merge(sub).unwrap();
        assert_eq!(main.names().collect::<Vec<_>>(), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_merge_conflict_is_atomic() {
        let mut main = Group::new();
        main.command("foo").register(noop).unwrap();
        main.command("baz").register(noop).unwrap();

        let mut sub = Group::new();
        sub.command("bar").register(noop).unwrap();
        sub.command("baz").register(noop).unwrap();

        let err = main.merge(sub).unwrap_err();
        assert_eq!(err, ConfigError::MergeConflict { names: vec!["baz".into()] });
        assert_eq!(main.names().collect::<Vec<_>>(), vec!["foo", "baz"]);
        assert!(!main.contains("bar"));
    }
}
