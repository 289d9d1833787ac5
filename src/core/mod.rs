//! Core模块 - 包含所有核心业务逻辑

pub mod error;
pub mod extractor;
pub mod models;
pub mod normalizer;
pub mod rule_engine;

#[cfg(test)]
mod proptest;
#[cfg(test)]
mod sim_integration_tests;
