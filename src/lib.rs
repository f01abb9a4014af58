//! # nebuild - reproducible C/C++ build gate
//!
//! nebuild provisions a pinned toolchain (LLVM, Doxygen, CMake) into the
//! project's own temp directory, then runs static analysis, documentation,
//! the CMake build and the test binaries, and turns everything they report
//! into one pass/fail verdict.
//!
//! ## Quick Start
//!
//! ```bash
//! # clean, provision, build
//! nebuild
//!
//! # everything, with a JSON report
//! nebuild all --report report.json
//! ```
//!
//! ## Module Organization
//!
//! - [`toolchain`] - Tool descriptors, download, extraction, provisioning
//! - [`checker`] - clang-tidy / clang-format analysis
//! - [`build`] - CMake build, log classification, test runs
//! - [`pipeline`] - Step ordering and the verdict

/// Build, test and clean stages.
pub mod build;

/// Static analysis and format checks (clang-tidy, clang-format).
pub mod checker;

/// Configuration file parsing (`nebuild.toml`).
pub mod config;

/// Diagnostics, stages and the pass/fail verdict.
pub mod diagnostic;

/// Documentation generation (Doxygen).
pub mod doc;

/// On-disk layout of transient state.
pub mod layout;

/// Step sets and the pipeline executor.
pub mod pipeline;

/// External process launching with retries.
pub mod process;

/// Pinned toolchain provisioning.
pub mod toolchain;

/// Terminal UI utilities (tables, progress, logging).
pub mod ui;
