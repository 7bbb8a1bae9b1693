pub mod categories;
pub mod cross_reference;
pub mod extract;
pub mod reconcile;
pub mod validate;
