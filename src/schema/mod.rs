pub mod alignment;
pub mod beat;
pub mod document;
