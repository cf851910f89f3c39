//! A where-clause: a required-column set paired with a compiled
//! predicate, built either from an explicit predicate or from a parsed
//! JSONLogic value.

use crate::error::CoreResult;
use crate::graph::series_name::SeriesName;
use crate::predicate::{self, CompiledPredicate, Rule};

pub struct WhereClause {
    pub required: Vec<SeriesName>,
    pub predicate: CompiledPredicate,
}

impl WhereClause {
    /// No filter at all: every candidate row matches.
    pub fn always_true() -> Self {
        let rule = Rule::Const(serde_json::Value::Bool(true));
        Self {
            required: Vec::new(),
            predicate: predicate::compile(&rule),
        }
    }

    /// Build from a parsed JSONLogic rule. Every `var` name the rule
    /// references must itself be a qualified `node.*`/`edge.*` series
    /// name — that's what tells the iteration layer which store and
    /// column to resolve per row.
    pub fn from_jsonlogic(rule: &serde_json::Value) -> CoreResult<Self> {
        let parsed = Rule::parse(rule)?;
        let compiled = predicate::compile(&parsed);
        let required = compiled
            .vars
            .iter()
            .map(|v| SeriesName::parse(v))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            required,
            predicate: compiled,
        })
    }

    /// Build from an already-compiled predicate and its required
    /// columns, for callers constructing a predicate programmatically
    /// instead of from JSON.
    pub fn from_predicate(required: Vec<SeriesName>, predicate: CompiledPredicate) -> Self {
        Self { required, predicate }
    }
}
