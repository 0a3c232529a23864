pub mod conflict;
pub mod engine;
pub mod importer;
pub mod lookups;
pub mod mapper;
pub mod merger;
pub mod parse;
pub mod session;
pub mod tokenizer;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::*;
pub use crate::domain::ports::{ConfigProvider, InventoryApi, Storage};
pub use crate::utils::error::Result;
