//! Complete model families.
pub mod resnet;
