//! Core build logic for docbuild.
//!
//! Ties together tool detection, source validation, diagram rendering, the
//! TOC injector, and pandoc into the end-to-end `build` workflow.

pub mod check;
pub mod diagrams;
pub mod pandoc;
pub mod pipeline;
pub mod sources;
pub mod toc;
pub mod tools;
