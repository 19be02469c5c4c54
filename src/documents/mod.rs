//! Commercial documents: contacts, invoices, bills and the payments applied to them

pub mod contact;
pub mod lifecycle;
pub mod model;
pub mod payment;

pub use contact::*;
pub use lifecycle::*;
pub use model::*;
pub use payment::*;
