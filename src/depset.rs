//! Conditional provides expressions
//!
//! A package declares the virtuals it provides as a flat token list where
//! groups can be gated on build options:
//!
//! ```text
//! virtual/editor gtk? ( virtual/gui-editor ) !minimal? ( virtual/pager )
//! ```
//!
//! Evaluating against the enabled option set flattens the expression to the
//! atoms whose conditions hold.

use crate::atom::{Atom, AtomError};
use std::collections::BTreeSet;
use thiserror::Error;

/// Provides expression parse failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("unbalanced parentheses in '{0}'")]
    Unbalanced(String),

    #[error("conditional '{0}' must be followed by '('")]
    DanglingConditional(String),

    #[error(transparent)]
    Atom(#[from] AtomError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Atom(Atom),
    Conditional {
        flag: String,
        negated: bool,
        children: Vec<Node>,
    },
}

/// Parsed provides declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvidesExpr {
    nodes: Vec<Node>,
}

impl ProvidesExpr {
    /// Parse a whitespace-separated provides string
    pub fn parse(text: &str) -> Result<Self, ExprError> {
        let mut tokens = text.split_whitespace();
        let nodes = parse_group(text, &mut tokens, false)?;
        Ok(Self { nodes })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flatten to the atoms active under `enabled`
    pub fn evaluate(&self, enabled: &BTreeSet<String>) -> Vec<Atom> {
        let mut out = Vec::new();
        flatten(&self.nodes, enabled, &mut out);
        out
    }
}

fn parse_group<'a>(
    text: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
    nested: bool,
) -> Result<Vec<Node>, ExprError> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            ")" if nested => return Ok(nodes),
            "(" | ")" => return Err(ExprError::Unbalanced(text.to_string())),
            _ => {
                if let Some(cond) = token.strip_suffix('?') {
                    if tokens.next() != Some("(") {
                        return Err(ExprError::DanglingConditional(token.to_string()));
                    }
                    let (negated, flag) = match cond.strip_prefix('!') {
                        Some(flag) => (true, flag),
                        None => (false, cond),
                    };
                    let children = parse_group(text, tokens, true)?;
                    nodes.push(Node::Conditional {
                        flag: flag.to_string(),
                        negated,
                        children,
                    });
                } else {
                    nodes.push(Node::Atom(Atom::parse(token)?));
                }
            }
        }
    }

    if nested {
        return Err(ExprError::Unbalanced(text.to_string()));
    }
    Ok(nodes)
}

fn flatten(nodes: &[Node], enabled: &BTreeSet<String>, out: &mut Vec<Atom>) {
    for node in nodes {
        match node {
            Node::Atom(atom) => out.push(atom.clone()),
            Node::Conditional {
                flag,
                negated,
                children,
            } => {
                if enabled.contains(flag) != *negated {
                    flatten(children, enabled, out);
                }
            }
        }
    }
}
