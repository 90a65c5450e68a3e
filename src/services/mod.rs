pub mod reconciler;

pub use reconciler::{Reconciler, Reconciliation};
