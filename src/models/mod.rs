//! Models module for the SDK
//!
//! Defines the division entities persisted by the import pipeline and the
//! transient manifest rows it consumes.

pub mod division;
pub mod manifest;

pub use division::{
    BoundingBox, BoxRelation, DivisionNode, DivisionRecord, LocalizedName, UpsertOperation,
    UpsertOutcome,
};
pub use manifest::ManifestRow;
