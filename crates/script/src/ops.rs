//! Parsed operation records.

use std::collections::HashMap;

use pengate_core::{CanvasError, ImageKind, Props};
use serde::Serialize;

/// Operation letters, in the order they are documented to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpTag {
    I,
    C,
    U,
    R,
    M,
    D,
    G,
}

impl OpTag {
    pub const ALL: [OpTag; 7] = [
        OpTag::I,
        OpTag::C,
        OpTag::U,
        OpTag::R,
        OpTag::M,
        OpTag::D,
        OpTag::G,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.letter() == s)
    }

    pub fn letter(&self) -> &'static str {
        match self {
            OpTag::I => "I",
            OpTag::C => "C",
            OpTag::U => "U",
            OpTag::R => "R",
            OpTag::M => "M",
            OpTag::D => "D",
            OpTag::G => "G",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpTag::I => "insert",
            OpTag::C => "copy",
            OpTag::U => "update",
            OpTag::R => "replace",
            OpTag::M => "move",
            OpTag::D => "delete",
            OpTag::G => "generate image",
        }
    }

    /// Insert, copy and replace create a node and must bind it.
    pub fn binds(&self) -> bool {
        matches!(self, OpTag::I | OpTag::C | OpTag::R)
    }
}

impl std::fmt::Display for OpTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.letter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Binding(String),
    Literal(String),
}

/// A `+` chain of bindings and string literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub parts: Vec<PathPart>,
}

impl PathExpr {
    pub fn literal(s: impl Into<String>) -> Self {
        Self {
            parts: vec![PathPart::Literal(s.into())],
        }
    }

    /// The text of a single string literal, if that is all this is.
    pub fn as_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [PathPart::Literal(s)] => Some(s),
            _ => None,
        }
    }

    pub fn evaluate(&self, bindings: &Bindings) -> Result<String, CanvasError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                PathPart::Literal(s) => out.push_str(s),
                PathPart::Binding(name) => out.push_str(bindings.get(name)?),
            }
        }
        Ok(out.trim().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert {
        binding: String,
        parent: PathExpr,
        payload: Props,
    },
    Copy {
        binding: String,
        source: PathExpr,
        parent: PathExpr,
        overrides: Props,
    },
    Update {
        target: PathExpr,
        patch: Props,
    },
    Replace {
        binding: String,
        target: PathExpr,
        payload: Props,
    },
    Move {
        node: PathExpr,
        parent: Option<PathExpr>,
        index: Option<usize>,
    },
    Delete {
        target: PathExpr,
    },
    GenerateImage {
        target: PathExpr,
        kind: ImageKind,
        prompt: String,
    },
}

impl Operation {
    pub fn tag(&self) -> OpTag {
        match self {
            Operation::Insert { .. } => OpTag::I,
            Operation::Copy { .. } => OpTag::C,
            Operation::Update { .. } => OpTag::U,
            Operation::Replace { .. } => OpTag::R,
            Operation::Move { .. } => OpTag::M,
            Operation::Delete { .. } => OpTag::D,
            Operation::GenerateImage { .. } => OpTag::G,
        }
    }

    pub fn binding(&self) -> Option<&str> {
        match self {
            Operation::Insert { binding, .. }
            | Operation::Copy { binding, .. }
            | Operation::Replace { binding, .. } => Some(binding),
            _ => None,
        }
    }
}

/// One operation with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub op: Operation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub statements: Vec<Statement>,
}

impl Script {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Name of the predefined binding for the document root.
pub const ROOT_BINDING: &str = "document";

/// Script-local name table. Created per execution and dropped with it.
#[derive(Debug, Clone)]
pub struct Bindings {
    names: HashMap<String, String>,
}

impl Bindings {
    pub fn new(root_id: &str) -> Self {
        Self {
            names: HashMap::from([(ROOT_BINDING.to_string(), root_id.to_string())]),
        }
    }

    pub fn bind(&mut self, name: &str, id: &str) {
        self.names.insert(name.to_string(), id.to_string());
    }

    pub fn get(&self, name: &str) -> Result<&str, CanvasError> {
        self.names
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CanvasError::not_found(format!("binding '{name}'")))
    }

    /// Bindings the script created, sorted by name.
    pub fn created(&self) -> std::collections::BTreeMap<String, String> {
        self.names
            .iter()
            .filter(|(k, _)| k.as_str() != ROOT_BINDING)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
