pub mod gateway;
pub mod prometheus;
pub mod response;

pub use gateway::QueryGateway;
pub use prometheus::PromClient;
pub use response::{ApiRule, InstantSample, Metric, QueryResult, RuleGroup, SamplePair, SampleStream};
