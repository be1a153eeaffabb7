//! Pattern query parser using Pest

use crate::graph::{Direction, PropertyValue};
use crate::query::ast::*;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "query/pattern.pest"]
struct PatternParser;

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error: {0}")]
    PestError(#[from] Box<pest::error::Error<Rule>>),

    #[error("Semantic error: {0}")]
    SemanticError(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a query string into a [`PatternQuery`]
pub fn parse_query(input: &str) -> ParseResult<PatternQuery> {
    let mut pairs = PatternParser::parse(Rule::query, input).map_err(Box::new)?;
    let root = pairs
        .next()
        .ok_or_else(|| ParseError::SemanticError("empty query".to_string()))?;

    let mut query = PatternQuery {
        patterns: Vec::new(),
        conditions: Vec::new(),
        distinct: false,
        items: Vec::new(),
        limit: None,
    };

    for inner in root.into_inner() {
        match inner.as_rule() {
            Rule::match_clause => {
                for pattern in inner.into_inner() {
                    if pattern.as_rule() == Rule::path_pattern {
                        query.patterns.push(parse_path(pattern)?);
                    }
                }
            }
            Rule::where_clause => {
                for condition in inner.into_inner() {
                    if condition.as_rule() == Rule::condition {
                        query.conditions.push(parse_condition(condition)?);
                    }
                }
            }
            Rule::return_clause => parse_return(inner, &mut query)?,
            _ => {}
        }
    }

    Ok(query)
}

fn parse_path(pair: Pair<Rule>) -> ParseResult<PathPattern> {
    let mut variable = None;
    let mut nodes = Vec::new();
    let mut relationships = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::path_variable => variable = Some(parse_name_holder(inner)?),
            Rule::node_pattern => nodes.push(parse_node(inner)?),
            Rule::rel_pattern => relationships.push(parse_relationship(inner)?),
            _ => {}
        }
    }

    if nodes.is_empty() {
        return Err(ParseError::SemanticError("Path must have at least one node".to_string()));
    }

    let start = nodes.remove(0);
    let segments = relationships
        .into_iter()
        .zip(nodes)
        .map(|(relationship, node)| PathSegment { relationship, node })
        .collect();

    Ok(PathPattern {
        variable,
        start,
        segments,
    })
}

fn parse_node(pair: Pair<Rule>) -> ParseResult<NodePattern> {
    let mut variable = None;
    let mut labels = Vec::new();
    let mut properties = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::variable => variable = Some(parse_name_holder(inner)?),
            Rule::label => labels.push(parse_name_holder(inner)?),
            Rule::properties => properties = parse_properties(inner)?,
            _ => {}
        }
    }

    Ok(NodePattern {
        variable,
        labels,
        properties,
    })
}

fn parse_relationship(pair: Pair<Rule>) -> ParseResult<RelationshipPattern> {
    let mut incoming = false;
    let mut outgoing = false;
    let mut variable = None;
    let mut types = Vec::new();
    let mut length = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::incoming => incoming = true,
            Rule::outgoing => outgoing = true,
            Rule::rel_detail => {
                for detail in inner.into_inner() {
                    match detail.as_rule() {
                        Rule::variable => variable = Some(parse_name_holder(detail)?),
                        Rule::rel_types => {
                            for name in detail.into_inner() {
                                types.push(parse_name(name)?);
                            }
                        }
                        Rule::range => length = Some(parse_range(detail)?),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let direction = match (incoming, outgoing) {
        (true, false) => Direction::Incoming,
        (false, true) => Direction::Outgoing,
        (false, false) => Direction::Both,
        (true, true) => {
            return Err(ParseError::SemanticError(
                "relationship cannot point both ways".to_string(),
            ))
        }
    };

    if length.is_some() && variable.is_some() {
        return Err(ParseError::UnsupportedFeature(
            "variables on variable-length relationships".to_string(),
        ));
    }

    Ok(RelationshipPattern {
        variable,
        types,
        direction,
        length,
    })
}

fn parse_range(pair: Pair<Rule>) -> ParseResult<LengthPattern> {
    let mut min = None;
    let mut max = None;
    let mut dots = false;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::range_min => min = Some(parse_count(inner)?),
            Rule::range_max => max = Some(parse_count(inner)?),
            Rule::range_dots => dots = true,
            _ => {}
        }
    }

    // `*n` is an exact length, `*` alone is one or more
    let length = match (min, dots, max) {
        (Some(exact), false, _) => LengthPattern {
            min: exact,
            max: Some(exact),
        },
        (min, _, max) => LengthPattern {
            min: min.unwrap_or(1),
            max,
        },
    };

    if let Some(max) = length.max {
        if max < length.min {
            return Err(ParseError::SemanticError(format!(
                "empty relationship range *{}..{}",
                length.min, max
            )));
        }
    }
    Ok(length)
}

fn parse_count(pair: Pair<Rule>) -> ParseResult<usize> {
    pair.as_str()
        .trim()
        .parse()
        .map_err(|_| ParseError::SemanticError(format!("invalid range bound: {}", pair.as_str())))
}

fn parse_properties(pair: Pair<Rule>) -> ParseResult<Vec<(String, Expression)>> {
    let mut properties = Vec::new();
    for property in pair.into_inner() {
        let mut key = None;
        let mut value = None;
        for part in property.into_inner() {
            match part.as_rule() {
                Rule::name => key = Some(parse_name(part)?),
                Rule::literal => value = Some(Expression::Literal(parse_literal(part)?)),
                Rule::parameter => value = Some(parse_parameter(part)),
                _ => {}
            }
        }
        match (key, value) {
            (Some(key), Some(value)) => properties.push((key, value)),
            _ => return Err(ParseError::SemanticError("malformed property map".to_string())),
        }
    }
    Ok(properties)
}

fn parse_condition(pair: Pair<Rule>) -> ParseResult<Condition> {
    let mut operands = pair.into_inner();
    match (operands.next(), operands.next()) {
        (Some(left), Some(right)) => Ok(Condition {
            left: parse_operand(left)?,
            right: parse_operand(right)?,
        }),
        _ => Err(ParseError::SemanticError("condition needs two operands".to_string())),
    }
}

fn parse_operand(pair: Pair<Rule>) -> ParseResult<Expression> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::SemanticError("empty operand".to_string()))?;

    match inner.as_rule() {
        Rule::variable => Ok(Expression::Variable(parse_name_holder(inner)?)),
        Rule::parameter => Ok(parse_parameter(inner)),
        Rule::literal => Ok(Expression::Literal(parse_literal(inner)?)),
        Rule::id_call => {
            let variable = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::variable)
                .ok_or_else(|| ParseError::SemanticError("id() needs a variable".to_string()))?;
            Ok(Expression::Id(parse_name_holder(variable)?))
        }
        Rule::property_access => {
            let mut parts = inner.into_inner();
            match (parts.next(), parts.next()) {
                (Some(variable), Some(key)) => Ok(Expression::Property(
                    parse_name_holder(variable)?,
                    parse_name(key)?,
                )),
                _ => Err(ParseError::SemanticError("malformed property access".to_string())),
            }
        }
        other => Err(ParseError::SemanticError(format!("unexpected operand {:?}", other))),
    }
}

fn parse_parameter(pair: Pair<Rule>) -> Expression {
    Expression::Parameter(pair.as_str().trim_start_matches('$').to_string())
}

fn parse_return(pair: Pair<Rule>, query: &mut PatternQuery) -> ParseResult<()> {
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::distinct => query.distinct = true,
            Rule::limit => {
                let count = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::integer)
                    .ok_or_else(|| ParseError::SemanticError("LIMIT needs a count".to_string()))?;
                query.limit = Some(parse_count(count)?);
            }
            Rule::return_item => query.items.push(parse_return_item(inner)?),
            _ => {}
        }
    }
    Ok(())
}

fn parse_return_item(pair: Pair<Rule>) -> ParseResult<ReturnItem> {
    let mut expression = None;
    let mut text = String::new();
    let mut alias = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::star => return Ok(ReturnItem::All),
            Rule::operand => {
                text = inner.as_str().trim().to_string();
                expression = Some(parse_operand(inner)?);
            }
            Rule::alias => alias = Some(parse_name_holder(inner)?),
            _ => {}
        }
    }

    let expression =
        expression.ok_or_else(|| ParseError::SemanticError("empty return item".to_string()))?;
    let alias = match (alias, &expression) {
        (Some(alias), _) => alias,
        (None, Expression::Variable(name)) => name.clone(),
        (None, _) => text,
    };
    Ok(ReturnItem::Expression { expression, alias })
}

fn parse_literal(pair: Pair<Rule>) -> ParseResult<PropertyValue> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::SemanticError("empty literal".to_string()))?;

    match inner.as_rule() {
        Rule::string => {
            let content = inner.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(PropertyValue::String(content.to_string()))
        }
        Rule::integer => inner
            .as_str()
            .parse()
            .map(PropertyValue::Integer)
            .map_err(|_| ParseError::SemanticError(format!("invalid integer: {}", inner.as_str()))),
        Rule::float => inner
            .as_str()
            .parse()
            .map(PropertyValue::Float)
            .map_err(|_| ParseError::SemanticError(format!("invalid float: {}", inner.as_str()))),
        Rule::boolean => Ok(PropertyValue::Boolean(inner.as_str().eq_ignore_ascii_case("true"))),
        Rule::null => Ok(PropertyValue::Null),
        other => Err(ParseError::SemanticError(format!("unexpected literal {:?}", other))),
    }
}

/// Name from a rule wrapping exactly one `name` (variable, label, alias)
fn parse_name_holder(pair: Pair<Rule>) -> ParseResult<String> {
    let name = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::name)
        .ok_or_else(|| ParseError::SemanticError("missing name".to_string()))?;
    parse_name(name)
}

fn parse_name(pair: Pair<Rule>) -> ParseResult<String> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::SemanticError("empty name".to_string()))?;
    match inner.as_rule() {
        Rule::backticked => Ok(inner
            .into_inner()
            .next()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default()),
        _ => Ok(inner.as_str().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_match() {
        let query = parse_query("MATCH (n:gene) RETURN n AS subject, n AS object").unwrap();
        assert_eq!(query.patterns.len(), 1);
        assert_eq!(query.patterns[0].start.variable.as_deref(), Some("n"));
        assert_eq!(query.patterns[0].start.labels, vec!["gene".to_string()]);
        assert_eq!(query.items.len(), 2);
        assert_eq!(
            query.items[0],
            ReturnItem::Expression {
                expression: Expression::Variable("n".to_string()),
                alias: "subject".to_string()
            }
        );
    }

    #[test]
    fn test_parse_relationship_details() {
        let query = parse_query(
            "MATCH p = (a)<-[r:`http://x.org/p`|:q]-(b)-[:s*1..3]->(c) RETURN *",
        )
        .unwrap();
        let pattern = &query.patterns[0];
        assert_eq!(pattern.variable.as_deref(), Some("p"));
        assert_eq!(pattern.segments.len(), 2);

        let first = &pattern.segments[0].relationship;
        assert_eq!(first.direction, Direction::Incoming);
        assert_eq!(first.variable.as_deref(), Some("r"));
        assert_eq!(first.types, vec!["http://x.org/p".to_string(), "q".to_string()]);
        assert!(first.length.is_none());

        let second = &pattern.segments[1].relationship;
        assert_eq!(second.direction, Direction::Outgoing);
        assert_eq!(second.length, Some(LengthPattern { min: 1, max: Some(3) }));
        assert_eq!(query.items, vec![ReturnItem::All]);
    }

    #[test]
    fn test_parse_range_forms() {
        let len = |q: &str| parse_query(q).unwrap().patterns[0].segments[0].relationship.length;
        assert_eq!(len("MATCH (a)-[*]->(b) RETURN a"), Some(LengthPattern { min: 1, max: None }));
        assert_eq!(len("MATCH (a)-[*2]->(b) RETURN a"), Some(LengthPattern { min: 2, max: Some(2) }));
        assert_eq!(len("MATCH (a)-[*0..]->(b) RETURN a"), Some(LengthPattern { min: 0, max: None }));
        assert_eq!(len("MATCH (a)-[*..4]->(b) RETURN a"), Some(LengthPattern { min: 1, max: Some(4) }));
        assert!(parse_query("MATCH (a)-[*3..1]->(b) RETURN a").is_err());
    }

    #[test]
    fn test_parse_where_and_literals() {
        let query = parse_query(
            "MATCH (n {iri: 'http://x.org/a_a'}) WHERE id(n) = $id AND n.label = \"A\" \
             RETURN DISTINCT n.label, 42 AS answer, true AS flag LIMIT 5",
        )
        .unwrap();
        assert_eq!(
            query.patterns[0].start.properties,
            vec![(
                "iri".to_string(),
                Expression::Literal(PropertyValue::String("http://x.org/a_a".to_string()))
            )]
        );
        assert_eq!(query.conditions.len(), 2);
        assert_eq!(query.conditions[0].left, Expression::Id("n".to_string()));
        assert_eq!(query.conditions[0].right, Expression::Parameter("id".to_string()));
        assert!(query.distinct);
        assert_eq!(query.limit, Some(5));
        assert_eq!(
            query.items[0],
            ReturnItem::Expression {
                expression: Expression::Property("n".to_string(), "label".to_string()),
                alias: "n.label".to_string()
            }
        );
        assert_eq!(
            query.items[2],
            ReturnItem::Expression {
                expression: Expression::Literal(PropertyValue::Boolean(true)),
                alias: "flag".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_garbage_and_var_length_variables() {
        assert!(parse_query("MATCH (n RETURN n").is_err());
        assert!(matches!(
            parse_query("MATCH (a)-[r*1..2]->(b) RETURN a"),
            Err(ParseError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_declared_variables_order() {
        let query = parse_query("MATCH p = (a)-[r]->(b), (b)--(c) RETURN *").unwrap();
        assert_eq!(query.declared_variables(), vec!["a", "r", "b", "p", "c"]);
    }
}
