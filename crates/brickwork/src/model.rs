//! Content model definitions: collections, bricks and their fields.
//!
//! These are authored by users (usually as JSON) and compiled into a
//! [`CollectionSchema`](brickwork_schema::CollectionSchema) by
//! [`compile`](crate::compile).

use serde::{Deserialize, Serialize};

use crate::fields::FieldConfig;

/// Whether a collection holds one document or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionMode {
    Single,
    #[default]
    Multiple,
}

/// A user-defined content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub key: String,
    #[serde(default)]
    pub mode: CollectionMode,
    /// Keep a versions table so documents can have drafts and revisions
    #[serde(default)]
    pub use_revisions: bool,
    /// Collection-level fields, stored in the document-fields table
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    /// Bricks present on every document
    #[serde(default)]
    pub fixed_bricks: Vec<BrickConfig>,
    /// Bricks editors can add to a document
    #[serde(default)]
    pub builder_bricks: Vec<BrickConfig>,
}

impl CollectionConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            mode: CollectionMode::default(),
            use_revisions: false,
            fields: Vec::new(),
            fixed_bricks: Vec::new(),
            builder_bricks: Vec::new(),
        }
    }

    pub fn mode(mut self, mode: CollectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn use_revisions(mut self, use_revisions: bool) -> Self {
        self.use_revisions = use_revisions;
        self
    }

    pub fn field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fixed_brick(mut self, brick: BrickConfig) -> Self {
        self.fixed_bricks.push(brick);
        self
    }

    pub fn builder_brick(mut self, brick: BrickConfig) -> Self {
        self.builder_bricks.push(brick);
        self
    }

    /// Fixed then builder bricks, with their kind.
    pub fn bricks(&self) -> impl Iterator<Item = (BrickKind, &BrickConfig)> {
        self.fixed_bricks
            .iter()
            .map(|b| (BrickKind::Fixed, b))
            .chain(self.builder_bricks.iter().map(|b| (BrickKind::Builder, b)))
    }
}

/// How a brick is attached to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrickKind {
    Fixed,
    Builder,
}

/// A named, reusable group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrickConfig {
    pub key: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl BrickConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }
}
