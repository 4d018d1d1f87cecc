pub mod appender;
pub mod tailer;

pub use appender::LineAppender;
pub use tailer::{TailEvent, TailHandle};
