//! Terminal lookup by name

use std::collections::HashMap;
use std::sync::Arc;

use super::{BasicTerminal, Terminal, TerminalProfile};

/// Terminal used when a negotiated name is not known
pub const DEFAULT_TERMINAL: &str = "vt100";

/// Registry of terminal descriptors, keyed by lowercase name
#[derive(Debug, Clone)]
pub struct TerminalRegistry {
    terminals: HashMap<String, Arc<dyn Terminal>>,
    default_name: String,
}

impl Default for TerminalRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TerminalRegistry {
    /// Create a registry holding only a plain vt100 fallback
    pub fn new() -> Self {
        let mut registry = Self {
            terminals: HashMap::new(),
            default_name: DEFAULT_TERMINAL.to_string(),
        };
        registry.register_profile(TerminalProfile::new(DEFAULT_TERMINAL, false, true));
        registry
    }

    /// Create a registry with the built-in terminal types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (names, sgr, scrolling) in [
            (&["vt102", "vt220"][..], false, true),
            (&["ansi"][..], true, false),
            (
                &["xterm", "xterm-color", "xterm-256color", "screen", "linux"][..],
                true,
                true,
            ),
            (&["dumb"][..], false, false),
        ] {
            for name in names {
                registry.register_profile(TerminalProfile::new(*name, sgr, scrolling));
            }
        }
        registry
    }

    /// Register a descriptor under its own name, replacing any previous one
    pub fn register(&mut self, terminal: Arc<dyn Terminal>) {
        self.terminals
            .insert(terminal.name().to_ascii_lowercase(), terminal);
    }

    /// Register a [`BasicTerminal`] for the given profile
    pub fn register_profile(&mut self, profile: TerminalProfile) {
        self.register(Arc::new(BasicTerminal::new(profile)));
    }

    /// Choose which registered terminal unknown names fall back to
    ///
    /// Returns false and keeps the current default if `name` is unknown.
    pub fn set_default(&mut self, name: &str) -> bool {
        let key = name.to_ascii_lowercase();
        if self.terminals.contains_key(&key) {
            self.default_name = key;
            true
        } else {
            false
        }
    }

    /// Look up a terminal, case-insensitively
    pub fn find(&self, name: &str) -> Option<Arc<dyn Terminal>> {
        self.terminals.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Look up a terminal, falling back to the default for unknown names
    pub fn get(&self, name: &str) -> Arc<dyn Terminal> {
        match self.find(name) {
            Some(terminal) => terminal,
            None => self.default_terminal(),
        }
    }

    pub fn default_terminal(&self) -> Arc<dyn Terminal> {
        match self.terminals.get(&self.default_name) {
            Some(terminal) => Arc::clone(terminal),
            // The default entry is registered on construction and never removed
            None => Arc::new(BasicTerminal::new(TerminalProfile::new(
                DEFAULT_TERMINAL,
                false,
                true,
            ))),
        }
    }

    /// Names of all registered terminals, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.terminals.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = TerminalRegistry::with_defaults();
        let term = registry.get("XTERM-256color");
        assert_eq!(term.name(), "xterm-256color");
        assert!(term.supports_sgr());
        assert!(term.supports_scrolling());
    }

    #[test]
    fn test_unknown_falls_back_to_vt100() {
        let registry = TerminalRegistry::with_defaults();
        let term = registry.get("default");
        assert_eq!(term.name(), "vt100");
        assert!(!term.supports_sgr());
        assert!(registry.find("default").is_none());
    }

    #[test]
    fn test_builtin_capabilities() {
        let registry = TerminalRegistry::with_defaults();
        let ansi = registry.get("ansi");
        assert!(ansi.supports_sgr());
        assert!(!ansi.supports_scrolling());
        let dumb = registry.get("dumb");
        assert!(!dumb.supports_sgr());
        assert!(!dumb.supports_scrolling());
    }

    #[test]
    fn test_register_and_set_default() {
        let mut registry = TerminalRegistry::new();
        registry.register_profile(TerminalProfile::new("Custom", true, false));
        assert!(registry.set_default("custom"));
        assert!(!registry.set_default("missing"));
        assert_eq!(registry.get("nothing").name(), "Custom");
        assert_eq!(registry.names(), vec!["custom".to_string(), "vt100".to_string()]);
    }
}
