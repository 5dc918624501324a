pub mod lifecycle;
pub mod output;
