//! End-to-end behavior through the call gate: deep recursion, threads
//! sharing shapes, closures, the per-thread registry, and tracing setup.

mod logging;
pub(crate) mod support;
