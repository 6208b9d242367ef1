//! Integration test crate for CamFX.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on multiple camfx crates to verify they work together.

#[cfg(test)]
mod compositor;

#[cfg(test)]
mod grading;

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod segmentation;
