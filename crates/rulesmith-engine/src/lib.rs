pub mod catalog;
pub mod generator;
pub mod inspector;
pub mod walker;

pub use catalog::RuleCatalog;
pub use generator::generate;
pub use inspector::{analyze, render_report, RuleInfo, RuleQuery};
pub use walker::{extract_selectors, DependencySet};
