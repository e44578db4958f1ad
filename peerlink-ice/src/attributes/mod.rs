#[cfg(test)]
mod attributes_test;

pub mod control;
pub mod priority;
pub mod use_candidate;
