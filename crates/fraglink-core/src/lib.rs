//! Fraglink Core Types and Definitions
//!
//! This crate provides the foundational types shared by the fraglink crates:
//!
//! - **Model**: An arena-backed tree of fragments and elements ([`model`] module)
//! - **Lookup**: The capability trait used to locate fragments and follow
//!   reference ids ([`lookup`] module)

pub mod lookup;
pub mod model;

pub use lookup::{ID_ATTRIBUTES, ModelIndex, ModelLookup};
pub use model::{
    Attribute, Element, ElementId, FRAGMENT_SUFFIXES, Fragment, FragmentId, FragmentKind, Model,
    Node, TextNode,
};
