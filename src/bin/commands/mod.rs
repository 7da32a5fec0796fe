pub mod exec;
pub mod schema;
pub mod status;
