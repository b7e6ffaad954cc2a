pub mod actions;
pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use actions::TestClient;
#[allow(unused_imports)]
pub use mocks::{mock_socket, FailingMessageRepository, MockPeer, MockSocket};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
