//! Operator classes and the index relation a scan is opened on.

use crate::hnsw::distance::{Collation, DistanceMetric, DistanceOracle};
use crate::hnsw::graph::GraphStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operator class the index was built with. Fixes the distance operator a
/// scan must order by, and whether values are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorClass {
    /// `vector_l2_ops`, operator `<->`.
    #[serde(rename = "vector_l2_ops")]
    L2,
    /// `vector_ip_ops`, operator `<#>`.
    #[serde(rename = "vector_ip_ops")]
    InnerProduct,
    /// `vector_cosine_ops`, operator `<=>`.
    #[serde(rename = "vector_cosine_ops")]
    Cosine,
    /// `vector_l1_ops`, operator `<+>`.
    #[serde(rename = "vector_l1_ops")]
    L1,
}

impl OperatorClass {
    pub const ALL: [OperatorClass; 4] = [
        OperatorClass::L2,
        OperatorClass::InnerProduct,
        OperatorClass::Cosine,
        OperatorClass::L1,
    ];

    /// Distance support function of this class.
    pub fn metric(&self) -> DistanceMetric {
        match self {
            OperatorClass::L2 => DistanceMetric::L2,
            OperatorClass::InnerProduct => DistanceMetric::InnerProduct,
            OperatorClass::Cosine => DistanceMetric::Cosine,
            OperatorClass::L1 => DistanceMetric::L1,
        }
    }

    /// Whether the class has a normalization support function.
    pub fn normalizes(&self) -> bool {
        matches!(self, OperatorClass::Cosine)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperatorClass::L2 => "vector_l2_ops",
            OperatorClass::InnerProduct => "vector_ip_ops",
            OperatorClass::Cosine => "vector_cosine_ops",
            OperatorClass::L1 => "vector_l1_ops",
        }
    }

    /// SQL operator of the class.
    pub fn operator(&self) -> &'static str {
        match self {
            OperatorClass::L2 => "<->",
            OperatorClass::InnerProduct => "<#>",
            OperatorClass::Cosine => "<=>",
            OperatorClass::L1 => "<+>",
        }
    }
}

impl fmt::Display for OperatorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatorClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "euclidean" | "vector_l2_ops" | "<->" => Ok(OperatorClass::L2),
            "ip" | "inner_product" | "vector_ip_ops" | "<#>" => Ok(OperatorClass::InnerProduct),
            "cosine" | "vector_cosine_ops" | "<=>" => Ok(OperatorClass::Cosine),
            "l1" | "taxicab" | "vector_l1_ops" | "<+>" => Ok(OperatorClass::L1),
            other => Err(format!("unknown operator class '{other}'")),
        }
    }
}

/// An HNSW index as seen by its scans: the graph plus the support functions
/// and collation from its operator class.
pub struct IndexRelation<G> {
    graph: G,
    opclass: Option<OperatorClass>,
    oracle: Box<dyn DistanceOracle>,
    collation: Collation,
}

impl<G: GraphStore> IndexRelation<G> {
    /// Index over `graph` using the built-in support functions of `opclass`.
    pub fn new(graph: G, opclass: OperatorClass) -> Self {
        Self {
            graph,
            opclass: Some(opclass),
            oracle: Box::new(opclass.metric()),
            collation: Collation::NONE,
        }
    }

    /// Index over `graph` with caller-supplied support functions.
    pub fn with_oracle(graph: G, oracle: Box<dyn DistanceOracle>) -> Self {
        Self {
            graph,
            opclass: None,
            oracle,
            collation: Collation::NONE,
        }
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Mutable access for maintenance between scans.
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Operator class, `None` when the support functions were injected.
    pub fn opclass(&self) -> Option<OperatorClass> {
        self.opclass
    }

    pub fn oracle(&self) -> &dyn DistanceOracle {
        self.oracle.as_ref()
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operator_class() {
        assert_eq!("l2".parse::<OperatorClass>().unwrap(), OperatorClass::L2);
        assert_eq!("<#>".parse::<OperatorClass>().unwrap(), OperatorClass::InnerProduct);
        assert_eq!("Cosine".parse::<OperatorClass>().unwrap(), OperatorClass::Cosine);
        assert_eq!("vector_l1_ops".parse::<OperatorClass>().unwrap(), OperatorClass::L1);
        assert!("hamming".parse::<OperatorClass>().is_err());
    }

    #[test]
    fn test_only_cosine_normalizes() {
        for opclass in OperatorClass::ALL {
            assert_eq!(opclass.normalizes(), opclass == OperatorClass::Cosine);
            assert_eq!(opclass.normalizes(), opclass.metric().normalizes());
        }
    }

    #[test]
    fn test_display_uses_class_name() {
        assert_eq!(OperatorClass::InnerProduct.to_string(), "vector_ip_ops");
        assert_eq!(OperatorClass::L1.operator(), "<+>");
    }
}
