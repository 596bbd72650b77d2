pub mod syntax;
pub mod url;
