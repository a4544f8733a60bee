pub mod bridge_http;
pub mod openai;
pub mod signer_rpc;
