// src/tests/mod.rs

//! all in-crate tests for _edslib_

pub mod metadata_tests;
pub mod producer_tests;
