#![forbid(unsafe_code)]

//! The state node: fields, handlers, commands, and local observers.
//!
//! A [`SubscribableState`] holds everything a node owns. It does not know its
//! position in a tree; the [`StateTree`](crate::tree::StateTree) owns nodes
//! and runs the propagation protocol when one of their fields changes.
//!
//! # Invariants
//!
//! 1. Field names and kinds come from the node's schema and never change.
//! 2. At most one handler is registered per field; a second registration
//!    fails and leaves the first in place.
//! 3. Handlers can only be registered for declared fields.
//!
//! # Cloning
//!
//! `Clone` is shallow and driven by the schema: each field follows its
//! [`ClonePolicy`](statecast_core::ClonePolicy), handler and command tables
//! share their callbacks with the original, the loading flag is copied like
//! any other field, and local observers are not carried over. A clone has no
//! tree position until it is inserted.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use statecast_core::{
    Field, FieldName, FieldRegistry, FieldTable, FieldType, NodeSchema, StateError, StateResult,
    Value,
};

use crate::command::{Command, CommandTable, RelayCommand};
use crate::error::CallbackResult;
use crate::observer::{ObserverList, Subscription};
use crate::tree::{NodeId, StateTree};

/// A committed field change, as seen by observers and handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Node whose field changed.
    pub node: NodeId,
    pub field: FieldName,
    pub previous: Value,
    pub value: Value,
}

/// Per-field handler. Receives the tree so it can write re-entrantly.
pub type Handler = Rc<dyn Fn(&mut StateTree, &FieldChange) -> CallbackResult>;

/// A node in a propagation tree.
pub struct SubscribableState {
    fields: FieldTable,
    handlers: HashMap<FieldName, Handler>,
    commands: CommandTable,
    observers: ObserverList,
}

impl SubscribableState {
    /// A node with default field values and no handlers.
    #[must_use]
    pub fn new(schema: Arc<NodeSchema>) -> Self {
        Self {
            fields: FieldTable::new(schema),
            handlers: HashMap::new(),
            commands: CommandTable::new(),
            observers: ObserverList::new(),
        }
    }

    /// Start building a node of the given schema.
    #[must_use]
    pub fn builder(schema: Arc<NodeSchema>) -> StateBuilder {
        StateBuilder::new(schema)
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<NodeSchema> {
        self.fields.schema()
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.fields.schema().type_name()
    }

    pub fn get(&self, name: &str) -> StateResult<&Value> {
        self.fields.get(name)
    }

    pub fn get_as<T: FieldType>(&self, key: Field<T>) -> StateResult<T> {
        self.fields.get_typed(key)
    }

    #[must_use]
    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.fields.is_loading()
    }

    /// Field names this node accepts pushed values for.
    #[must_use]
    pub fn registry(&self) -> FieldRegistry<'_> {
        self.fields.registry()
    }

    /// Accept a value pushed from the parent. Plain assignment: no observers,
    /// no handler, no further propagation.
    pub fn receive(&mut self, name: &str, value: Value) -> StateResult<bool> {
        self.fields.receive(name, value)
    }

    /// Register the handler invoked after `name` changes (unless loading).
    pub fn add_handler(
        &mut self,
        name: &str,
        handler: impl Fn(&mut StateTree, &FieldChange) -> CallbackResult + 'static,
    ) -> StateResult<()> {
        self.insert_handler(name, Rc::new(handler))
    }

    fn insert_handler(&mut self, name: &str, handler: Handler) -> StateResult<()> {
        let descriptor = self
            .fields
            .schema()
            .get(name)
            .ok_or_else(|| StateError::UnknownField(name.into()))?;
        let key = descriptor.name().clone();
        if self.handlers.contains_key(&key) {
            return Err(StateError::DuplicateHandler(key));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub(crate) fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// Register a zero-argument action as a named command.
    pub fn add_command(&mut self, name: impl Into<String>, action: impl Fn() + 'static) -> StateResult<()> {
        self.commands.insert(name, Rc::new(RelayCommand::new(action)))
    }

    /// Register an existing command object.
    pub fn add_command_object(
        &mut self,
        name: impl Into<String>,
        command: Rc<dyn Command>,
    ) -> StateResult<()> {
        self.commands.insert(name, command)
    }

    #[must_use]
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Observe every committed change on this node, including changes made
    /// while loading.
    pub fn subscribe(&mut self, observer: impl Fn(&FieldChange) + 'static) -> Subscription {
        self.observers.subscribe(observer)
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn check(&self, name: &str, value: &Value) -> StateResult<()> {
        self.fields.check(name, value)
    }

    pub(crate) fn write(&mut self, name: &str, value: Value) -> StateResult<Option<Value>> {
        self.fields.write(name, value)
    }

    pub(crate) fn observers_mut(&mut self) -> &mut ObserverList {
        &mut self.observers
    }
}

impl Clone for SubscribableState {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone_with_policy(),
            handlers: self.handlers.clone(),
            commands: self.commands.clone(),
            observers: ObserverList::new(),
        }
    }
}

impl fmt::Debug for SubscribableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().map(FieldName::as_str).collect();
        handlers.sort_unstable();
        f.debug_struct("SubscribableState")
            .field("type", &self.type_name())
            .field("fields", &self.fields)
            .field("handlers", &handlers)
            .field("commands", &self.commands)
            .field("observers", &self.observers)
            .finish()
    }
}

/// Builder collecting initial values, handlers, and commands for a node.
///
/// Errors are reported by [`build`](Self::build), so a node type can declare
/// its whole subscription set in one expression.
pub struct StateBuilder {
    schema: Arc<NodeSchema>,
    values: Vec<(String, Value)>,
    handlers: Vec<(String, Handler)>,
    commands: Vec<(String, Rc<dyn Command>)>,
}

impl StateBuilder {
    #[must_use]
    pub fn new(schema: Arc<NodeSchema>) -> Self {
        Self {
            schema,
            values: Vec::new(),
            handlers: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Initial value for a field (overrides the schema default).
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Initial value through a typed key.
    #[must_use]
    pub fn typed<T: FieldType>(self, key: Field<T>, value: T) -> Self {
        self.value(key.name(), value.into_value())
    }

    /// Start in (or out of) the loading state.
    #[must_use]
    pub fn loading(self, loading: bool) -> Self {
        self.typed(statecast_core::LOADING, loading)
    }

    #[must_use]
    pub fn handler(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&mut StateTree, &FieldChange) -> CallbackResult + 'static,
    ) -> Self {
        self.handlers.push((name.into(), Rc::new(handler)));
        self
    }

    #[must_use]
    pub fn command(mut self, name: impl Into<String>, action: impl Fn() + 'static) -> Self {
        self.commands
            .push((name.into(), Rc::new(RelayCommand::new(action))));
        self
    }

    /// Validate every declaration and produce the node.
    pub fn build(self) -> StateResult<SubscribableState> {
        let mut state = SubscribableState::new(self.schema);
        for (name, value) in self.values {
            state.fields.assign(&name, value)?;
        }
        for (name, handler) in self.handlers {
            state.insert_handler(&name, handler)?;
        }
        for (name, command) in self.commands {
            state.commands.insert(name, command)?;
        }
        Ok(state)
    }
}

impl fmt::Debug for StateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBuilder")
            .field("type", &self.schema.type_name())
            .field("values", &self.values)
            .field("handlers", &self.handlers.len())
            .field("commands", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecast_core::{ClonePolicy, FieldDescriptor, LOADING};

    const GATE: Field<String> = Field::new("gate");

    fn schema() -> Arc<NodeSchema> {
        NodeSchema::builder("Flight")
            .synced("gate", "A1")
            .private("delay", 0)
            .field(FieldDescriptor::new("draft", "").with_clone_policy(ClonePolicy::Reset))
            .build_shared()
            .unwrap()
    }

    #[test]
    fn builder_applies_initial_values() {
        let state = SubscribableState::builder(schema())
            .typed(GATE, "B7".to_string())
            .value("delay", 15)
            .loading(true)
            .build()
            .unwrap();
        assert_eq!(state.get_as(GATE).unwrap(), "B7");
        assert_eq!(state.get("delay").unwrap(), &Value::Int(15));
        assert!(state.is_loading());
        assert!(state.get_as(LOADING).unwrap());
    }

    #[test]
    fn builder_rejects_unknown_field() {
        let err = SubscribableState::builder(schema())
            .value("nope", 1)
            .build()
            .unwrap_err();
        assert_eq!(err, StateError::UnknownField("nope".into()));
    }

    #[test]
    fn builder_rejects_duplicate_handlers() {
        let err = SubscribableState::builder(schema())
            .handler("gate", |_, _| Ok(()))
            .handler("gate", |_, _| Ok(()))
            .build()
            .unwrap_err();
        assert_eq!(err, StateError::DuplicateHandler("gate".into()));
    }

    #[test]
    fn add_handler_keeps_the_first_on_duplicate() {
        let mut state = SubscribableState::new(schema());
        state.add_handler("gate", |_, _| Ok(())).unwrap();
        let first = state.handler("gate").unwrap();
        let err = state.add_handler("gate", |_, _| Err("second".into())).unwrap_err();
        assert_eq!(err, StateError::DuplicateHandler("gate".into()));
        assert!(Rc::ptr_eq(&first, &state.handler("gate").unwrap()));
    }

    #[test]
    fn handler_requires_declared_field() {
        let mut state = SubscribableState::new(schema());
        assert_eq!(
            state.add_handler("missing", |_, _| Ok(())),
            Err(StateError::UnknownField("missing".into()))
        );
    }

    #[test]
    fn duplicate_command_rejected() {
        let mut state = SubscribableState::new(schema());
        state.add_command("refresh", || {}).unwrap();
        assert_eq!(
            state.add_command("refresh", || {}),
            Err(StateError::DuplicateCommand("refresh".into()))
        );
    }

    #[test]
    fn receive_is_silent() {
        let mut state = SubscribableState::new(schema());
        let hits = Rc::new(std::cell::Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = state.subscribe(move |_| h.set(h.get() + 1));
        assert!(state.receive("gate", Value::from("C3")).unwrap());
        assert_eq!(hits.get(), 0);
        assert_eq!(state.get("gate").unwrap(), &Value::from("C3"));
    }

    #[test]
    fn clone_follows_policies_and_shares_handlers() {
        let mut state = SubscribableState::builder(schema())
            .value("draft", "notes")
            .value("delay", 5)
            .loading(true)
            .handler("gate", |_, _| Ok(()))
            .command("refresh", || {})
            .build()
            .unwrap();
        let _sub = state.subscribe(|_| {});

        let copy = state.clone();
        assert_eq!(copy.get("delay").unwrap(), &Value::Int(5));
        assert_eq!(copy.get("draft").unwrap(), &Value::from(""));
        assert!(copy.is_loading());
        assert!(Rc::ptr_eq(
            &state.handler("gate").unwrap(),
            &copy.handler("gate").unwrap()
        ));
        assert_eq!(copy.commands().len(), 1);
        assert_eq!(copy.observer_count(), 0);
    }
}
