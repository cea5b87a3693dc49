mod common;
mod ordering_tests;
mod run_tests;
