// Copyright 2026 Pitchkit Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pitchkit runtime library: turn a product URL into bounded, model-ready text.
//!
//! The entry point is [`pipeline::Pipeline::extract_and_preprocess_url`]. It
//! fetches the page statically, renders it in a shared headless browser when
//! the static HTML looks like an unhydrated app shell, runs three
//! independent extractors concurrently and merges their output into at most
//! 4000 retained characters.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod events;
pub mod extraction;
pub mod failure;
pub mod pipeline;
pub mod pool;
pub mod renderer;
pub mod rest;

pub use config::ExtractorConfig;
pub use pipeline::{DocumentSource, ExtractError, ExtractionReport, Pipeline};
