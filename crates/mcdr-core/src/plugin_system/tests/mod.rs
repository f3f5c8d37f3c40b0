pub mod common;

pub mod operation_tests;
pub mod unit_tests;
