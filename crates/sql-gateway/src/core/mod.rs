pub mod cache;
pub mod executor;
pub mod materialize;
pub mod policy;
pub mod schema;
pub mod service;
pub mod types;
