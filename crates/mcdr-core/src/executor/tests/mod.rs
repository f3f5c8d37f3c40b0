pub mod pool_tests;
pub mod task_tests;
