//! Identifier generation for new entity and attribute rows.

use uuid::Uuid;

/// Produces a fresh, unique, URL-safe identifier per call.
pub trait IdGenerator {
    fn generate(&self) -> String;
}

/// Random v4 UUID rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for &G {
    fn generate(&self) -> String {
        (**self).generate()
    }
}
