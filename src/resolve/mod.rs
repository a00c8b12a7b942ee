pub mod cascade;
pub mod ingest;
pub mod model;
pub mod sign;
