// src/data/mod.rs

//! Definitions of data for _edslib_.
//!
//! * A [`RawRecord`] is one source-dump entry: a filename and an
//!   un-decoded metadata blob.
//! * A [`DecodedMetadata`] is the structured field mapping decoded from a
//!   `RawRecord`'s blob.
//! * A [`ProducerKey`] is the classification bucket a record is assigned to.
//!
//! [`RawRecord`]: crate::data::metadata::RawRecord
//! [`DecodedMetadata`]: crate::data::metadata::DecodedMetadata
//! [`ProducerKey`]: crate::data::producer::ProducerKey

pub mod metadata;
pub mod producer;
