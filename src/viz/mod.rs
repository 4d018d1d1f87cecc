pub mod renderer;
pub mod tracer;
