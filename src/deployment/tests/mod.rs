//! Unit tests for the deployment manager.
