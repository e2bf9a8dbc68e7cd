// Security layer: instruction policy, workspace sandbox and the executor tying them together
pub mod policy;
pub mod sandbox;
pub mod secure_executor;

pub use sandbox::Sandbox;
pub use secure_executor::SecureExecutor;
