pub mod client;
pub mod frame;
