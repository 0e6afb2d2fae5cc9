//! Cheap, browser-free acquisition.
//!
//! The static fetch and the shell detector decide whether a page can be
//! read from its server response or needs the dynamic renderer.

pub mod http_client;
pub mod shell_detector;
