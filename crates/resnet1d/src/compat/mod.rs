//! # Compat
//!
//! Wrappers over ``burn::nn`` layers: selectable norm and activation enums,
//! and a grouped conv which runs on every backend.
pub mod activation_wrapper;
pub mod grouped_conv1d;
pub mod normalization_wrapper;
