pub mod aggregator;
pub mod parser;

pub use aggregator::GroupAggregator;
pub use parser::parse;
