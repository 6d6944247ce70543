pub mod reconciler;
pub mod signature;

pub use reconciler::PaymentReconciler;
pub use signature::{SignatureHeader, SignatureVerifier};
