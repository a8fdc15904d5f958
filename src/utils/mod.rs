pub mod json;

pub use json::{flatten_numbers, flatten_numbers_f32};
