pub mod dance_visitor;
pub mod visitor;

pub use dance_visitor::DanceVisitor;
pub use visitor::FrameVisitor;
