use std::fmt;

/// Where a low-level value came from: a JSON pointer into the source document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Origin {
    pub pointer: String,
}

impl Origin {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self { pointer: pointer.into() }
    }

    pub fn root() -> Self { Self::default() }

    /// Pointer to `token` below this origin (RFC 6901 escaping applied).
    pub fn child(&self, token: &str) -> Self {
        let escaped = token.replace('~', "~0").replace('/', "~1");
        Self { pointer: format!("{}/{}", self.pointer, escaped) }
    }

    pub fn index(&self, i: usize) -> Self {
        Self { pointer: format!("{}/{}", self.pointer, i) }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.pointer)
    }
}

/// A parsed value paired with its origin and a presence flag.
///
/// Presence separates "field absent" from "field present with its zero value":
/// an absent node still carries `T::default()` so readers never have to branch
/// just to get a usable value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeReference<T> {
    value: T,
    origin: Option<Origin>,
    present: bool,
}

impl<T> NodeReference<T> {
    pub fn present(value: T, origin: Origin) -> Self {
        Self { value, origin: Some(origin), present: true }
    }

    pub fn is_present(&self) -> bool { self.present }

    pub fn is_empty(&self) -> bool { !self.present }

    /// The wrapped value; the type's default when the node is absent.
    pub fn value(&self) -> &T { &self.value }

    pub fn origin(&self) -> Option<&Origin> { self.origin.as_ref() }
}

impl<T: Default> NodeReference<T> {
    pub fn absent() -> Self {
        Self { value: T::default(), origin: None, present: false }
    }

    /// Absent, but the slot it would occupy is known (e.g. `properties/x: true`).
    pub fn absent_at(origin: Origin) -> Self {
        Self { value: T::default(), origin: Some(origin), present: false }
    }
}
