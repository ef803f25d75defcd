#![forbid(unsafe_code)]

//! Named commands exposed by a node for UI bindings.
//!
//! Commands are not part of the propagation protocol: a node keeps them in a
//! table separate from its field handlers, and binding layers look them up by
//! name and invoke them through the [`Command`] capability interface.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use statecast_core::{StateError, StateResult};

/// An invocable action with an availability check.
pub trait Command {
    /// Whether [`execute`](Command::execute) may currently run.
    fn can_execute(&self) -> bool {
        true
    }

    fn execute(&self);
}

/// A [`Command`] wrapping a zero-argument closure.
pub struct RelayCommand {
    action: Box<dyn Fn()>,
    can_execute: Option<Box<dyn Fn() -> bool>>,
}

impl RelayCommand {
    #[must_use]
    pub fn new(action: impl Fn() + 'static) -> Self {
        Self {
            action: Box::new(action),
            can_execute: None,
        }
    }

    /// Builder: gate execution on a predicate.
    #[must_use]
    pub fn with_can_execute(mut self, predicate: impl Fn() -> bool + 'static) -> Self {
        self.can_execute = Some(Box::new(predicate));
        self
    }
}

impl Command for RelayCommand {
    fn can_execute(&self) -> bool {
        self.can_execute.as_ref().is_none_or(|p| p())
    }

    fn execute(&self) {
        if self.can_execute() {
            (self.action)();
        }
    }
}

impl fmt::Debug for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayCommand")
            .field("gated", &self.can_execute.is_some())
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered command table. Cloning shares the command objects.
#[derive(Clone, Default)]
pub struct CommandTable {
    commands: IndexMap<String, Rc<dyn Command>>,
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.commands.keys()).finish()
    }
}

impl CommandTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Names are unique per table.
    pub fn insert(&mut self, name: impl Into<String>, command: Rc<dyn Command>) -> StateResult<()> {
        let name = name.into();
        if self.commands.contains_key(&name) {
            return Err(StateError::DuplicateCommand(name));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rc<dyn Command>> {
        self.commands.get(name)
    }

    /// Execute a command by name. Returns `false` when the name is unknown or
    /// the command is currently disabled.
    pub fn execute(&self, name: &str) -> bool {
        match self.commands.get(name) {
            Some(cmd) if cmd.can_execute() => {
                cmd.execute();
                true
            }
            _ => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn relay_runs_action() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let cmd = RelayCommand::new(move || h.set(h.get() + 1));
        assert!(cmd.can_execute());
        cmd.execute();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn gated_relay_skips_when_disabled() {
        let enabled = Rc::new(Cell::new(false));
        let hits = Rc::new(Cell::new(0));
        let (e, h) = (Rc::clone(&enabled), Rc::clone(&hits));
        let cmd = RelayCommand::new(move || h.set(h.get() + 1)).with_can_execute(move || e.get());

        cmd.execute();
        assert_eq!(hits.get(), 0);
        enabled.set(true);
        cmd.execute();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut table = CommandTable::new();
        table.insert("save", Rc::new(RelayCommand::new(|| {}))).unwrap();
        let err = table
            .insert("save", Rc::new(RelayCommand::new(|| {})))
            .unwrap_err();
        assert_eq!(err, StateError::DuplicateCommand("save".into()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn execute_by_name() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let mut table = CommandTable::new();
        table
            .insert("go", Rc::new(RelayCommand::new(move || h.set(h.get() + 1))))
            .unwrap();
        assert!(table.execute("go"));
        assert!(!table.execute("missing"));
        assert_eq!(hits.get(), 1);
        assert_eq!(table.names().collect::<Vec<_>>(), ["go"]);
    }
}
