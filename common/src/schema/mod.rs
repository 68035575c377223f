pub mod inspector;

pub use inspector::{
    introspect, render, schema_context, ColumnSchema, TableSchema, NO_TABLES_SENTINEL,
    SCHEMA_UNAVAILABLE_SENTINEL,
};
