pub mod config;
pub mod error;
pub mod fixture;
pub mod rules;

pub use config::{RuleFilter, Settings};
pub use error::{Result, RulesmithError};
pub use fixture::{
    ExpectedSample, ExprTestCase, InputSeries, PromDuration, TestFile, TestGroup,
};
pub use rules::{RuleDefinition, RuleKind};
