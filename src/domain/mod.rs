pub mod aggregation;
pub mod app_config;
pub mod column;
pub mod duplicates;
pub mod error;
pub mod field_schema;
pub mod mapping;
pub mod order;
pub mod status;
