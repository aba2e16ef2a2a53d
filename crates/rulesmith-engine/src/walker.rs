use std::collections::BTreeMap;

use std::time::UNIX_EPOCH;

use promql_parser::label::{MatchOp, Matcher, METRIC_NAME};
use promql_parser::parser::{self, AtModifier, Expr, Offset, VectorSelector};

use rulesmith_core::{PromDuration, Result, RulesmithError};

/// Metric name -> every selector text in the expression that references it.
/// Keys are deduplicated by name; distinct selector strings are preserved.
pub type DependencySet = BTreeMap<String, Vec<String>>;

/// Collects the concrete series selectors an expression reads.
///
/// `keep` decides per metric name whether a selector is recorded; the
/// generator uses it to fence off metrics that are themselves produced by
/// recording rules. Selectors without a metric name (`{job="x"}`) are
/// skipped. Pure function: no I/O, and a parse failure yields no partial
/// result.
pub fn extract_selectors<F>(expr: &str, keep: F) -> Result<DependencySet>
where
    F: Fn(&str) -> bool,
{
    let ast = parser::parse(expr).map_err(RulesmithError::Parse)?;
    let mut set = DependencySet::new();
    collect(&ast, &keep, &mut set);
    Ok(set)
}

/// Depth-first traversal over every expression node. Order does not matter;
/// only the resulting (name -> selectors) set does.
fn collect<F>(expr: &Expr, keep: &F, out: &mut DependencySet)
where
    F: Fn(&str) -> bool,
{
    match expr {
        Expr::VectorSelector(vs) => record(vs, keep, out),
        Expr::MatrixSelector(ms) => record(&ms.vs, keep, out),
        Expr::Subquery(sq) => collect(&sq.expr, keep, out),
        Expr::Aggregate(agg) => {
            collect(&agg.expr, keep, out);
            if let Some(param) = &agg.param {
                collect(param, keep, out);
            }
        }
        Expr::Binary(binary) => {
            collect(&binary.lhs, keep, out);
            collect(&binary.rhs, keep, out);
        }
        Expr::Paren(paren) => collect(&paren.expr, keep, out),
        Expr::Unary(unary) => collect(&unary.expr, keep, out),
        Expr::Call(call) => {
            for arg in &call.args.args {
                collect(arg, keep, out);
            }
        }
        Expr::NumberLiteral(_) | Expr::StringLiteral(_) | Expr::Extension(_) => {}
    }
}

fn record<F>(vs: &VectorSelector, keep: &F, out: &mut DependencySet)
where
    F: Fn(&str) -> bool,
{
    let Some(name) = vs.name.as_deref() else {
        // Selectors matching purely on labels carry no metric name and are
        // not counted as dependencies.
        return;
    };
    if name.is_empty() || !keep(name) {
        return;
    }
    out.entry(name.to_string())
        .or_default()
        .push(selector_text(vs));
}

/// Canonical `name{matcher,...}` text of a selector, without any range
/// suffix.
fn selector_text(vs: &VectorSelector) -> String {
    let mut text = vs.name.clone().unwrap_or_default();
    let matchers: Vec<String> = vs
        .matchers
        .matchers
        .iter()
        .filter(|m| m.name != METRIC_NAME)
        .map(matcher_text)
        .collect();
    if !matchers.is_empty() {
        text.push('{');
        text.push_str(&matchers.join(","));
        text.push('}');
    }
    match &vs.at {
        Some(AtModifier::At(time)) => {
            let secs = time
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64();
            text.push_str(&format!(" @ {secs:.3}"));
        }
        Some(AtModifier::Start) => text.push_str(" @ start()"),
        Some(AtModifier::End) => text.push_str(" @ end()"),
        None => {}
    }
    match &vs.offset {
        Some(Offset::Pos(d)) => {
            text.push_str(&format!(" offset {}", PromDuration::from(*d)));
        }
        Some(Offset::Neg(d)) => {
            text.push_str(&format!(" offset -{}", PromDuration::from(*d)));
        }
        None => {}
    }
    text
}

fn matcher_text(m: &Matcher) -> String {
    let op = match m.op {
        MatchOp::Equal => "=",
        MatchOp::NotEqual => "!=",
        MatchOp::Re(_) => "=~",
        MatchOp::NotRe(_) => "!~",
    };
    format!("{}{}{}", m.name, op, quote_label_value(&m.value))
}

/// PromQL string quoting: backslash escapes for the quote, backslash and
/// common whitespace, everything else (UTF-8 included) written literally.
fn quote_label_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
