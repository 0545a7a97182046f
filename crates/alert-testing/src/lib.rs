//! Test doubles and reusable contract-test suites for the alert proxy's external
//! collaborator traits. Used as a dev-dependency by every other crate in the
//! workspace.

pub mod contract_tests;
pub mod fixtures;
pub mod mocks;

pub use mocks::{
    MockClassifierClient, MockHistorySink, MockSecretStore, MockSilenceStore, MockTargetPublisher,
};
