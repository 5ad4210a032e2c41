//! Shared fixtures for tests that need a fake upstream gateway

#[allow(dead_code)]
pub mod mock_server;
