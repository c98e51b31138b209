//! Open, registerable namespace of error codes (spec.md §4.2).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// Well known error codes. The namespace is open: callers may register
/// additional codes with [`register`].
pub const OK: i32 = 0;
pub const UNKNOWN: i32 = -1;
pub const INTERNAL: i32 = -2;
pub const INVALID_HEADER: i32 = -101;
pub const INVALID_REQUEST: i32 = -102;
pub const INVALID_RESPONSE: i32 = -103;

fn registry() -> &'static Mutex<HashMap<i32, &'static str>> {
    static REGISTRY: OnceLock<Mutex<HashMap<i32, &'static str>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert(OK, "ok");
        m.insert(UNKNOWN, "unknown");
        m.insert(INTERNAL, "internal");
        m.insert(INVALID_HEADER, "invalid header");
        m.insert(INVALID_REQUEST, "invalid request");
        m.insert(INVALID_RESPONSE, "invalid response");
        Mutex::new(m)
    })
}

/// Register a human description for `code`.
///
/// # Panics
/// Panics if `code` is already registered, mirroring the source registry's
/// refusal to silently shadow a description.
pub fn register(code: i32, description: &'static str) {
    let mut map = registry().lock().unwrap();
    if let Some(existing) = map.insert(code, description) {
        panic!("code {code} is already registered with description {existing:?}");
    }
}

/// Look up the description for `code`, falling back to `code(<n>)`.
pub fn describe(code: i32) -> String {
    match registry().lock().unwrap().get(&code) {
        Some(desc) => desc.to_string(),
        None => format!("code({code})"),
    }
}

/// Newtype wrapper that renders via [`describe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code(pub i32);

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(self.0))
    }
}

impl From<i32> for Code {
    fn from(v: i32) -> Self {
        Code(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_codes_describe() {
        assert_eq!(describe(OK), "ok");
        assert_eq!(describe(INVALID_HEADER), "invalid header");
        assert_eq!(describe(12345), "code(12345)");
    }

    #[test]
    #[should_panic]
    fn duplicate_register_panics() {
        register(OK, "duplicate");
    }
}
