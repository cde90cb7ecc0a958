pub mod summary;
pub mod tags;

#[cfg(feature = "http-api")]
pub mod http;
