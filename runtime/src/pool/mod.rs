//! Browser resource management.
//!
//! A single shared browser serves every dynamic render; tabs are opened
//! per render and isolated from each other.

pub mod manager;
