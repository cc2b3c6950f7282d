pub mod config;
pub mod coverage;
pub mod error;
pub mod geo;
pub mod io;
pub mod physics;
pub mod terrain;

#[cfg(test)]
mod tests;
