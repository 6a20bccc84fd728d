// src/readers/mod.rs

//! "Readers" for _edslib_.
//!
//! ## Overview of readers
//!
//! * A [`DumpReader`] splits the raw database-dump stream into individual
//!   [`RawRecord`s].
//! * A [`SampleEngine`] drives decode, classification, interning,
//!   aggregate statistics, and the power-of-two sampling selector, one
//!   `RawRecord` at a time.
//!
//! The _eds_ binary program uses one `DumpReader` and one `SampleEngine`
//! to drive processing for a dump stream.
//!
//! _These are not rust "Readers"; these structs do not implement the trait
//! [`Read`]. These are "readers" in an informal sense._
//!
//! [`Read`]: std::io::Read
//! [`RawRecord`s]: crate::data::metadata::RawRecord
//! [`DumpReader`]: crate::readers::dumpreader::DumpReader
//! [`SampleEngine`]: crate::readers::sampler::SampleEngine

pub mod dumpreader;
pub mod sampler;
