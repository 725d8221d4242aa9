#![cfg(test)]

pub mod common;
pub mod compatibility_tests;
pub mod lifecycle_tests;
pub mod messaging_tests;
