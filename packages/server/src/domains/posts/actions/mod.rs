//! Post actions - entry points called by the HTTP routes.

pub mod core;

pub use self::core::*;
