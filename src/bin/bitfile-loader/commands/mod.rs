pub mod configure;
pub mod delete;
pub mod list;
pub mod read;
pub mod store;
