pub mod bridge;
pub mod providers;
pub mod signer;
pub mod tools;
