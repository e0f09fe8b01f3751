#![forbid(unsafe_code)]

pub mod context;
pub mod expr;
pub mod query;
pub mod schema;
pub mod sequence;
pub mod value;

/// The simple name of a fully qualified type name: the segment after the last `.`.
pub fn simple_type_name(full_name: &str) -> &str {
    full_name.rsplit('.').next().unwrap_or(full_name)
}
