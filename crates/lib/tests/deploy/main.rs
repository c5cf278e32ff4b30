//! End-to-end deployment tests against small on-disk monorepos.

mod closure_tests;
mod common;
mod links_tests;
