pub mod parser;
pub mod mode;
pub mod text;
pub(crate) mod reqwest;
