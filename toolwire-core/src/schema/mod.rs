//! Tool input schemas
//!
//! Parameter descriptors (`ParamSpec`) are declared by action sources at
//! registration time. The `SchemaGenerator` turns them into the JSON-schema
//! shape published by `tools/list`, together with the `ParamLayout` the
//! executor uses to map incoming arguments back onto handler parameters.

mod generator;
mod params;
mod types;

pub use generator::{
    BoundParam, GeneratedSchema, INSTRUCTIONS_PROPERTY, ParamLayout, SchemaError, SchemaGenerator,
};
pub use params::{ParamKind, ParamMeta, ParamSpec};
pub use types::{PropertyType, ToolInputSchema, ToolPropertySchema};
