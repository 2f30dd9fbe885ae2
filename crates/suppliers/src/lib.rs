//! Supplier directory domain module (event-sourced).
//!
//! Suppliers are the vendor identities items and purchase orders reference.
//! Referential integrity (no deletion while referenced) is enforced by the
//! application layer, which can see the item read model.

pub mod supplier;

pub use supplier::{
    ContactInfo, DeleteSupplier, RegisterSupplier, SetSupplierStatus, Supplier, SupplierCommand,
    SupplierDeleted, SupplierEvent, SupplierId, SupplierRegistered, SupplierStatus,
    SupplierStatusChanged, SupplierUpdated, UpdateSupplier,
};
