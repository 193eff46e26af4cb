pub mod codec;
pub mod frame;
pub mod message;
pub mod reader;
pub mod visitor;
pub mod writer;

pub use frame::Frame;
pub use message::Message;
