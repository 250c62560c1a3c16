mod common;
mod document;
mod part;

pub use common::*;
pub use document::*;
pub use part::*;
