//! Transport-agnostic core: access policy, cascade deletion, referential
//! integrity auditing and the audit trail. HTTP handlers are thin adapters
//! over these components.

pub mod access;
pub mod audit;
pub mod cascade;
pub mod integrity;
