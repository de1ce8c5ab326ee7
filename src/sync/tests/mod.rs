//! Unit tests for the sync module.
