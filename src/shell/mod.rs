//! Session handlers
//!
//! A [`Shell`] drives one connection from start to finish. Shells are
//! created by name from a [`ShellRegistry`] filled in at startup.

pub mod echo;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::io::TerminalIoResult;
use crate::net::Connection;

pub use echo::EchoShell;

/// Handler running on a connection's own thread
pub trait Shell: Send {
    /// Serve the connection; the connection is closed once this returns
    fn run(&mut self, connection: &Arc<Connection>) -> TerminalIoResult<()>;
}

type ShellFactory = Box<dyn Fn() -> Box<dyn Shell> + Send + Sync>;

/// Factories for shells, keyed by identifier
#[derive(Default)]
pub struct ShellRegistry {
    factories: HashMap<String, ShellFactory>,
}

impl ShellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in shells
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(EchoShell::ID, EchoShell::create);
        registry
    }

    /// Register a factory, replacing any previous one of the same name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Shell> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Create a new shell instance
    pub fn create(&self, name: &str) -> Option<Box<dyn Shell>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ShellRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellRegistry")
            .field("shells", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Shell for Noop {
        fn run(&mut self, _connection: &Arc<Connection>) -> TerminalIoResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = ShellRegistry::new();
        assert!(registry.create("noop").is_none());
        registry.register("noop", || Box::new(Noop));
        assert!(registry.contains("noop"));
        assert!(registry.create("noop").is_some());
    }

    #[test]
    fn test_builtin() {
        let registry = ShellRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["echo".to_string()]);
    }
}
