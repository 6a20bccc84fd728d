// src/printer/mod.rs

//! Printing for _edslib_: emitted sample references on stdout, the
//! interrupt-safe Reporter's side files, and the final summary on stderr.

pub mod printers;
pub mod summary;
