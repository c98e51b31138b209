use std::fmt;

/// Failure registering a class or method (spec.md §4.3: "double registration
/// of a class name fails").
#[derive(Debug)]
pub enum RegistryError {
    DuplicateClass(String),
    EmptyClass(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateClass(name) => write!(f, "class already registered: {name}"),
            Self::EmptyClass(name) => write!(f, "class {name} has no registered methods"),
        }
    }
}

impl std::error::Error for RegistryError {}
