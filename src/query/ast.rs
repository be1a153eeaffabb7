//! Abstract syntax of pattern queries

use crate::graph::{Direction, PropertyValue};

/// A parsed `MATCH ... WHERE ... RETURN ...` query
#[derive(Debug, Clone, PartialEq)]
pub struct PatternQuery {
    pub patterns: Vec<PathPattern>,
    pub conditions: Vec<Condition>,
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
    pub limit: Option<usize>,
}

impl PatternQuery {
    /// Every variable a pattern introduces, in first-appearance order
    pub fn declared_variables<'a>(&'a self) -> Vec<&'a str> {
        let mut declared: Vec<&'a str> = Vec::new();
        let mut declare = |name: &'a Option<String>| {
            if let Some(name) = name {
                if !declared.contains(&name.as_str()) {
                    declared.push(name.as_str());
                }
            }
        };
        for pattern in &self.patterns {
            declare(&pattern.start.variable);
            for segment in &pattern.segments {
                declare(&segment.relationship.variable);
                declare(&segment.node.variable);
            }
            declare(&pattern.variable);
        }
        declared
    }
}

/// `p = (a)-[r]->(b)...`
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub variable: Option<String>,
    pub start: NodePattern,
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub relationship: RelationshipPattern,
    pub node: NodePattern,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expression)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<String>,
    /// Alternatives; empty matches any type
    pub types: Vec<String>,
    pub direction: Direction,
    pub length: Option<LengthPattern>,
}

/// `*min..max` on a relationship
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthPattern {
    pub min: usize,
    pub max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Variable(String),
    Property(String, String),
    Id(String),
    Parameter(String),
    Literal(PropertyValue),
}

impl Expression {
    /// Variable the expression reads, if any
    pub fn variable(&self) -> Option<&str> {
        match self {
            Expression::Variable(v) | Expression::Property(v, _) | Expression::Id(v) => Some(v),
            Expression::Parameter(_) | Expression::Literal(_) => None,
        }
    }
}

/// `left = right`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Expression,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnItem {
    /// `*`: every named variable
    All,
    Expression { expression: Expression, alias: String },
}
