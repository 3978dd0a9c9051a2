#![cfg(test)]

pub mod common;
pub mod course_tests;
pub mod page_tests;
pub mod persistence_tests;
