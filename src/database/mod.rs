pub mod meta;
pub mod models;
pub mod pool;
