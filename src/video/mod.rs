pub mod decoder;
pub mod error;
pub mod extractor;
pub mod probe;

#[cfg(test)]
pub mod test_support;

pub use decoder::*;
pub use error::ExtractError;
pub use extractor::*;
