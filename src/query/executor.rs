//! Backtracking pattern matcher
//!
//! Patterns are matched left to right, each path segment by segment. A
//! relationship is used at most once per match. Anchors come from bound
//! variables, `id(v) = ...` conditions and `{iri: ...}` properties before
//! falling back to label scans.

use super::ast::*;
use super::value::{GraphPath, Params, Row, RowSink, Value};
use super::{QueryError, QueryResult};
use crate::graph::{keys, Edge, EdgeId, GraphSource, NodeId, PropertyValue};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

type Bindings = IndexMap<String, Value>;

/// Matches one parsed query, handing each row to the sink as soon as it is
/// produced. Only DISTINCT keys are kept in memory, never the rows.
pub struct QueryExecutor<'a, 's> {
    graph: &'a dyn GraphSource,
    query: &'a PatternQuery,
    params: &'a Params,
    sink: &'s mut RowSink<'s>,
    seeds: HashMap<String, NodeId>,
    emitted: usize,
    stopped: bool,
    seen: HashSet<Vec<u8>>,
}

impl<'a, 's> QueryExecutor<'a, 's> {
    pub fn new(graph: &'a dyn GraphSource, query: &'a PatternQuery, params: &'a Params, sink: &'s mut RowSink<'s>) -> Self {
        Self {
            graph,
            query,
            params,
            sink,
            seeds: HashMap::new(),
            emitted: 0,
            stopped: false,
            seen: HashSet::new(),
        }
    }

    /// Run to completion, or until the sink breaks; returns the rows emitted
    pub fn execute(mut self) -> QueryResult<usize> {
        self.validate()?;
        self.seeds = self.collect_seeds()?;

        let mut bindings = Bindings::new();
        let mut used = Vec::new();
        self.match_from(0, &mut bindings, &mut used)?;
        Ok(self.emitted)
    }

    fn validate(&self) -> QueryResult<()> {
        let declared = self.query.declared_variables();
        let referenced = self
            .query
            .conditions
            .iter()
            .flat_map(|c| [&c.left, &c.right])
            .chain(self.query.items.iter().filter_map(|item| match item {
                ReturnItem::Expression { expression, .. } => Some(expression),
                ReturnItem::All => None,
            }));

        for expression in referenced {
            if let Some(variable) = expression.variable() {
                if !declared.contains(&variable) {
                    return Err(QueryError::UnknownVariable(variable.to_string()));
                }
            }
            if let Expression::Parameter(name) = expression {
                self.parameter(name)?;
            }
        }
        Ok(())
    }

    /// `id(v) = $p` style conditions pin a variable to one node
    fn collect_seeds(&self) -> QueryResult<HashMap<String, NodeId>> {
        let mut seeds = HashMap::new();
        for condition in &self.query.conditions {
            let (variable, other) = match (&condition.left, &condition.right) {
                (Expression::Id(v), other) | (other, Expression::Id(v)) => (v, other),
                _ => continue,
            };
            let target = match other {
                Expression::Parameter(name) => self.parameter(name)?.clone(),
                Expression::Literal(value) => Value::Property(value.clone()),
                _ => continue,
            };
            let node = match target {
                Value::Node(id) => Some(id),
                Value::Property(PropertyValue::Integer(i)) if i >= 0 => Some(NodeId::new(i as u64)),
                _ => None,
            };
            if let Some(node) = node {
                seeds.insert(variable.clone(), node);
            }
        }
        Ok(seeds)
    }

    fn done(&self) -> bool {
        self.stopped || self.query.limit.is_some_and(|limit| self.emitted >= limit)
    }

    fn match_from(&mut self, index: usize, bindings: &mut Bindings, used: &mut Vec<EdgeId>) -> QueryResult<()> {
        if self.done() {
            return Ok(());
        }
        let query = self.query;
        let Some(pattern) = query.patterns.get(index) else {
            return self.emit(bindings);
        };

        for start in self.start_candidates(&pattern.start, bindings)? {
            let bound = bind_node(bindings, &pattern.start.variable, start);
            let mut path = GraphPath::start(start);
            self.match_segment(index, 0, start, &mut path, bindings, used)?;
            if bound {
                bindings.pop();
            }
            if self.done() {
                break;
            }
        }
        Ok(())
    }

    fn match_segment(
        &mut self,
        index: usize,
        segment_index: usize,
        current: NodeId,
        path: &mut GraphPath,
        bindings: &mut Bindings,
        used: &mut Vec<EdgeId>,
    ) -> QueryResult<()> {
        let query = self.query;
        let pattern = &query.patterns[index];

        let Some(segment) = pattern.segments.get(segment_index) else {
            let bound = match &pattern.variable {
                Some(name) if !bindings.contains_key(name) => {
                    bindings.insert(name.clone(), Value::Path(path.clone()));
                    true
                }
                _ => false,
            };
            self.match_from(index + 1, bindings, used)?;
            if bound {
                bindings.pop();
            }
            return Ok(());
        };

        match segment.relationship.length {
            None => {
                for edge in self.candidate_edges(current, &segment.relationship, used) {
                    let next = edge.other_end(current);
                    if !self.node_matches(next, &segment.node, bindings)? {
                        continue;
                    }
                    let edge_bound = match &segment.relationship.variable {
                        Some(name) => match bindings.get(name) {
                            Some(Value::Edge(existing)) if *existing != edge.id => continue,
                            Some(_) => false,
                            None => {
                                bindings.insert(name.clone(), Value::Edge(edge.id));
                                true
                            }
                        },
                        None => false,
                    };
                    let node_bound = bind_node(bindings, &segment.node.variable, next);

                    used.push(edge.id);
                    path.push(edge.id, next);
                    self.match_segment(index, segment_index + 1, next, path, bindings, used)?;
                    path.pop();
                    used.pop();

                    if node_bound {
                        bindings.pop();
                    }
                    if edge_bound {
                        bindings.pop();
                    }
                    if self.done() {
                        break;
                    }
                }
            }
            Some(length) => {
                self.expand_variable_length(index, segment_index, current, 0, length, path, bindings, used)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_variable_length(
        &mut self,
        index: usize,
        segment_index: usize,
        current: NodeId,
        depth: usize,
        length: LengthPattern,
        path: &mut GraphPath,
        bindings: &mut Bindings,
        used: &mut Vec<EdgeId>,
    ) -> QueryResult<()> {
        let query = self.query;
        let segment = &query.patterns[index].segments[segment_index];

        if depth >= length.min && self.node_matches(current, &segment.node, bindings)? {
            let bound = bind_node(bindings, &segment.node.variable, current);
            self.match_segment(index, segment_index + 1, current, path, bindings, used)?;
            if bound {
                bindings.pop();
            }
        }

        if length.max.is_some_and(|max| depth >= max) || self.done() {
            return Ok(());
        }

        for edge in self.candidate_edges(current, &segment.relationship, used) {
            let next = edge.other_end(current);
            used.push(edge.id);
            path.push(edge.id, next);
            self.expand_variable_length(index, segment_index, next, depth + 1, length, path, bindings, used)?;
            path.pop();
            used.pop();
            if self.done() {
                break;
            }
        }
        Ok(())
    }

    fn candidate_edges(&self, current: NodeId, pattern: &RelationshipPattern, used: &[EdgeId]) -> Vec<&'a Edge> {
        let graph = self.graph;
        graph
            .relationships(current, pattern.direction)
            .into_iter()
            .filter(|edge| !used.contains(&edge.id))
            .filter(|edge| pattern.types.is_empty() || pattern.types.iter().any(|t| edge.is_type(t)))
            .collect()
    }

    fn start_candidates(&self, pattern: &NodePattern, bindings: &Bindings) -> QueryResult<Vec<NodeId>> {
        let candidates = if let Some(node) = pattern
            .variable
            .as_ref()
            .and_then(|v| bindings.get(v).and_then(Value::as_node).or_else(|| self.seeds.get(v).copied()))
        {
            vec![node]
        } else if let Some(iri) = self.iri_property(pattern)? {
            self.graph.node_by_iri(&iri).into_iter().collect()
        } else if let Some(label) = pattern.labels.first() {
            self.graph.nodes_with_label(label)
        } else {
            self.graph.node_ids()
        };

        let mut matching = Vec::with_capacity(candidates.len());
        for node in candidates {
            if self.node_matches(node, pattern, bindings)? {
                matching.push(node);
            }
        }
        Ok(matching)
    }

    fn iri_property(&self, pattern: &NodePattern) -> QueryResult<Option<String>> {
        for (key, expression) in &pattern.properties {
            if key != keys::IRI {
                continue;
            }
            let value = match expression {
                Expression::Literal(value) => Value::Property(value.clone()),
                Expression::Parameter(name) => self.parameter(name)?.clone(),
                _ => continue,
            };
            if let Value::Property(PropertyValue::String(iri)) = value {
                return Ok(Some(iri));
            }
        }
        Ok(None)
    }

    fn node_matches(&self, id: NodeId, pattern: &NodePattern, bindings: &Bindings) -> QueryResult<bool> {
        if let Some(variable) = &pattern.variable {
            match bindings.get(variable) {
                Some(Value::Node(existing)) if *existing != id => return Ok(false),
                Some(Value::Node(_)) | None => {}
                Some(_) => return Ok(false),
            }
            if let Some(seed) = self.seeds.get(variable) {
                if *seed != id {
                    return Ok(false);
                }
            }
        }

        let Some(node) = self.graph.node(id) else {
            return Ok(false);
        };
        if !pattern.labels.iter().all(|label| node.has_label(label)) {
            return Ok(false);
        }
        for (key, expression) in &pattern.properties {
            let expected = self.evaluate(expression, bindings)?;
            let actual = node
                .get_property(key)
                .map(|v| Value::Property(v.clone()))
                .unwrap_or(Value::Null);
            if !actual.matches(&expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn emit(&mut self, bindings: &Bindings) -> QueryResult<()> {
        for condition in &self.query.conditions {
            let left = self.evaluate(&condition.left, bindings)?;
            let right = self.evaluate(&condition.right, bindings)?;
            if !left.matches(&right) {
                return Ok(());
            }
        }

        let mut row = Row::new();
        for item in &self.query.items {
            match item {
                ReturnItem::All => {
                    for (name, value) in bindings {
                        row.insert(name.clone(), value.clone());
                    }
                }
                ReturnItem::Expression { expression, alias } => {
                    row.insert(alias.clone(), self.evaluate(expression, bindings)?);
                }
            }
        }

        if self.query.distinct {
            let values: Vec<&Value> = row.values().collect();
            let key = bincode::serialize(&values).map_err(|e| QueryError::Execution(e.to_string()))?;
            if !self.seen.insert(key) {
                return Ok(());
            }
        }
        self.emitted += 1;
        if let ControlFlow::Break(()) = (self.sink)(row) {
            self.stopped = true;
        }
        Ok(())
    }

    fn evaluate(&self, expression: &Expression, bindings: &Bindings) -> QueryResult<Value> {
        match expression {
            Expression::Literal(value) => Ok(Value::Property(value.clone())),
            Expression::Parameter(name) => self.parameter(name).cloned(),
            Expression::Variable(name) => Ok(bindings.get(name).cloned().unwrap_or(Value::Null)),
            Expression::Id(name) => Ok(match bindings.get(name) {
                Some(Value::Node(id)) => Value::Property(PropertyValue::Integer(id.as_u64() as i64)),
                Some(Value::Edge(id)) => Value::Property(PropertyValue::Integer(id.as_u64() as i64)),
                _ => Value::Null,
            }),
            Expression::Property(name, key) => {
                let property = match bindings.get(name) {
                    Some(Value::Node(id)) => self.graph.node(*id).and_then(|n| n.get_property(key)),
                    Some(Value::Edge(id)) => self.graph.edge(*id).and_then(|e| e.get_property(key)),
                    _ => None,
                };
                Ok(property.map(|p| Value::Property(p.clone())).unwrap_or(Value::Null))
            }
        }
    }

    fn parameter(&self, name: &str) -> QueryResult<&'a Value> {
        self.params
            .get(name)
            .ok_or_else(|| QueryError::MissingParameter(name.to_string()))
    }
}

/// Bind `variable` to `node` unless already bound; returns whether it pushed
fn bind_node(bindings: &mut Bindings, variable: &Option<String>, node: NodeId) -> bool {
    match variable {
        Some(name) if !bindings.contains_key(name) => {
            bindings.insert(name.clone(), Value::Node(node));
            true
        }
        _ => false,
    }
}
