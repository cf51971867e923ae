//! Loading and saving of multi-fragment Capella models.
//!
//! [`load_model`] reads a root model file together with every fragment file
//! found below its directory into a [`fraglink_core::Model`].
//! [`save_model`] writes the fragments that changed back through a
//! [`FileSink`].
//!
//! Serialization is conservative: start tags, attribute values and text
//! that were not modified are written back exactly as they were read, so a
//! load/save cycle without changes reproduces the input byte for byte.

mod error;
mod reader;
mod writer;

pub use error::{LoadError, SaveError};
pub use reader::{load_model, parse_fragment};
pub use writer::{FileSink, WorktreeSink, save_model, write_fragment};
