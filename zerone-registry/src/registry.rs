//! Class/method registration and lookup (spec.md §4.3), grounded on
//! `original_source/rpc/server.go`'s `Server.Register`/`register` — same
//! "reject duplicate name" rule, same "a class with no methods is an error"
//! rule, minus the `reflect`-driven method discovery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use zerone_core::header::split_class_method;

use crate::descriptor::MethodDescriptor;
use crate::error::RegistryError;

/// A named group of methods collected by [`ClassBuilder`], analogous to one
/// registered receiver in the source (`s.serviceMap[name]`).
pub struct Class {
    name: String,
    methods: HashMap<String, Arc<MethodDescriptor>>,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Collects `(method_name, MethodDescriptor)` pairs for one class, the
/// explicit stand-in for the source's reflective method walk over a
/// receiver value.
pub struct ClassBuilder {
    name: String,
    methods: HashMap<String, Arc<MethodDescriptor>>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn method(mut self, name: impl Into<String>, descriptor: MethodDescriptor) -> Self {
        self.methods.insert(name.into(), Arc::new(descriptor));
        self
    }

    pub fn build(self) -> Class {
        Class {
            name: self.name,
            methods: self.methods,
        }
    }
}

/// Process-wide (or per-server) table of registered classes. Mirrors
/// `rpc.Server`'s `serviceMap` but keyed/guarded with a plain
/// `std::sync::Mutex`, same as the rest of the pack's non-lock-free maps.
#[derive(Default)]
pub struct Registry {
    classes: Mutex<HashMap<String, Class>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class built with [`ClassBuilder`]. Fails if the class
    /// name is already registered or has no methods — both match
    /// `register`'s own checks in the source.
    pub fn register(&self, class: Class) -> Result<(), RegistryError> {
        if class.methods.is_empty() {
            return Err(RegistryError::EmptyClass(class.name));
        }
        let mut classes = self.classes.lock().expect("registry mutex poisoned");
        if classes.contains_key(&class.name) {
            return Err(RegistryError::DuplicateClass(class.name));
        }
        classes.insert(class.name.clone(), class);
        Ok(())
    }

    /// Resolve `"Class.Method"` (split on the last `.`, spec.md §4.3) to a
    /// method descriptor.
    pub fn lookup(&self, class_method: &str) -> Option<Arc<MethodDescriptor>> {
        let (class_name, method_name) = split_class_method(class_method);
        let classes = self.classes.lock().expect("registry mutex poisoned");
        classes.get(class_name)?.methods.get(method_name).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::descriptor::MethodDescriptor;
    use serde::{Deserialize, Serialize};
    use zerone_core::error::StructuredError;

    #[derive(Deserialize, Default)]
    struct Args {
        text: String,
    }

    #[derive(Serialize, Default)]
    struct Reply {
        text: String,
    }

    async fn echo(_ctx: zerone_core::Context, args: Args) -> Result<Reply, StructuredError> {
        Ok(Reply { text: args.text })
    }

    #[test]
    fn lookup_splits_on_last_dot() {
        let registry = Registry::new();
        let class = ClassBuilder::new("Echo").method("Echo", MethodDescriptor::new(echo)).build();
        registry.register(class).unwrap();
        assert!(registry.lookup("Echo.Echo").is_some());
        assert!(registry.lookup("Echo.Missing").is_none());
        assert!(registry.lookup("Missing.Echo").is_none());
    }

    #[test]
    fn duplicate_class_rejected() {
        let registry = Registry::new();
        let build = || ClassBuilder::new("Echo").method("Echo", MethodDescriptor::new(echo)).build();
        registry.register(build()).unwrap();
        let err = registry.register(build()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateClass(name) if name == "Echo"));
    }

    #[test]
    fn empty_class_rejected() {
        let registry = Registry::new();
        let err = registry.register(ClassBuilder::new("Empty").build()).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyClass(name) if name == "Empty"));
    }
}
