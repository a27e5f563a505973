extern crate chrono;
extern crate codespan_reporting;
extern crate indexmap;
extern crate itertools;
extern crate moniker;
extern crate pretty;
extern crate regex;
extern crate serde_json;
extern crate thiserror;
extern crate toml;
extern crate tracing;
extern crate uuid;
#[macro_use]
extern crate lazy_static;

pub mod common;
pub mod error;
pub mod eval;
pub mod expr;
pub mod mapper;
pub mod mapping;
pub mod query;
pub mod rewrite;
pub mod types;

pub use crate::error::MappingError;
pub use crate::mapper::{ConfiguredMapper, ValueMapper};
pub use crate::mapping::MapperConfiguration;
pub use crate::rewrite::{ExpressionMapper, RewriteOptions, TypeMappings};
pub use crate::types::{TypeId, TypePair, TypeRegistry};
