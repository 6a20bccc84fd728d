// src/debug/mod.rs

//! Debug and error printing helpers for _edslib_.

pub mod printers;
