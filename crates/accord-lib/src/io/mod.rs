pub mod recipe;
pub mod table;
pub mod text;

#[cfg(feature = "polars")]
pub mod frame;
