use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Address book for a structure whose base moves between runs.
///
/// Fields are registered with the address they had in a reference build, next
/// to the structure base of that same build. Once the live base is known,
/// every field resolves by the same relocation delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRegistry {
    reference_base: u64,
    discovered_base: u64,
    fields: BTreeMap<String, u64>,
}

impl PointerRegistry {
    pub fn new(reference_base: u64, discovered_base: u64) -> Self {
        Self {
            reference_base,
            discovered_base,
            fields: BTreeMap::new(),
        }
    }

    /// Register a field by its address in the reference build.
    ///
    /// Registering the same name twice replaces the earlier address.
    pub fn register(&mut self, name: impl Into<String>, reference_address: u64) {
        self.fields.insert(name.into(), reference_address);
    }

    pub fn with_field(mut self, name: impl Into<String>, reference_address: u64) -> Self {
        self.register(name, reference_address);
        self
    }

    /// Live address of a registered field, `None` for unknown names.
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.fields.get(name).map(|&reference| {
            reference
                .wrapping_sub(self.reference_base)
                .wrapping_add(self.discovered_base)
        })
    }

    /// Like [`resolve`](Self::resolve) but unknown names are an error.
    pub fn address(&self, name: &str) -> Result<u64> {
        self.resolve(name)
            .ok_or_else(|| Error::UnknownPointer(name.to_string()))
    }

    /// `reference_base - discovered_base`
    pub fn offset(&self) -> i128 {
        self.reference_base as i128 - self.discovered_base as i128
    }

    pub fn reference_base(&self) -> u64 {
        self.reference_base
    }

    pub fn discovered_base(&self) -> u64 {
        self.discovered_base
    }

    /// Registered field names in sorted order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Resolved `(name, address)` pairs in sorted name order
    pub fn resolved(&self) -> Vec<(String, u64)> {
        self.field_names()
            .filter_map(|name| self.resolve(name).map(|addr| (name.to_string(), addr)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relocates_by_base_delta() {
        let registry = PointerRegistry::new(0x0D3A2064, 0x2_0000_0064)
            .with_field("position", 0x0D3A2178)
            .with_field("length", 0x0D3A2188);

        assert_eq!(registry.resolve("position"), Some(0x2_0000_0178));
        assert_eq!(registry.resolve("length"), Some(0x2_0000_0188));
    }

    #[test]
    fn test_resolve_with_lower_discovered_base() {
        let registry = PointerRegistry::new(0x0D3A2064, 0x1000).with_field("parity_3", 0x0D3A216E);

        assert_eq!(registry.resolve("parity_3"), Some(0x1000 + 0x10A));
        assert_eq!(registry.offset(), 0x0D3A2064 - 0x1000);
    }

    #[test]
    fn test_field_below_reference_base() {
        let registry = PointerRegistry::new(0x5000, 0x9000).with_field("header", 0x4FF0);
        assert_eq!(registry.resolve("header"), Some(0x8FF0));
    }

    #[test]
    fn test_unknown_field() {
        let registry = PointerRegistry::new(0x100, 0x200);
        assert_eq!(registry.resolve("missing"), None);
        assert!(matches!(
            registry.address("missing"),
            Err(Error::UnknownPointer(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let a = PointerRegistry::new(0x100, 0x9100)
            .with_field("a", 0x110)
            .with_field("b", 0x120);
        let b = PointerRegistry::new(0x100, 0x9100)
            .with_field("b", 0x120)
            .with_field("a", 0x110);

        assert_eq!(a, b);
        assert_eq!(a.resolved(), b.resolved());
    }

    #[test]
    fn test_reregister_replaces() {
        let registry = PointerRegistry::new(0, 0x100)
            .with_field("x", 0x10)
            .with_field("x", 0x20);
        assert_eq!(registry.resolve("x"), Some(0x120));
    }
}
