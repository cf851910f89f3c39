//! Series names in the graph overlay: `node.*` / `edge.*` qualified
//! identifiers that route an operation to the node or edge record store.

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    Node,
    Edge,
}

impl Prefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Prefix::Node => "node",
            Prefix::Edge => "edge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesName {
    pub prefix: Prefix,
    pub local: String,
}

impl SeriesName {
    /// Parse `"node.foo"` / `"edge.bar"`. Rejects names with no `.`
    /// (`UnqualifiedName`) and names whose prefix is neither `node` nor
    /// `edge` (`UnknownPrefix`).
    pub fn parse(qualified: &str) -> CoreResult<SeriesName> {
        let (prefix, local) = qualified
            .split_once('.')
            .ok_or_else(|| CoreError::UnqualifiedName(qualified.to_string()))?;
        let prefix = match prefix {
            "node" => Prefix::Node,
            "edge" => Prefix::Edge,
            other => return Err(CoreError::UnknownPrefix(other.to_string())),
        };
        if local.is_empty() {
            return Err(CoreError::UnqualifiedName(qualified.to_string()));
        }
        Ok(SeriesName {
            prefix,
            local: local.to_string(),
        })
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.prefix.as_str(), self.local)
    }

    pub fn unqualified(&self) -> &str {
        &self.local
    }
}
