//! Mini-script parser.
//!
//! ```text
//! script     = (statement [";"])*
//! statement  = [IDENT "="] TAG "(" [arg ("," arg)* [","]] ")"
//! arg        = path | value | "undefined"
//! path       = operand ("+" operand)*
//! operand    = STRING | IDENT            (identifiers are bindings)
//! value      = object | array | NUMBER | "true" | "false" | "null"
//! object     = "{" [key ":" value ("," key ":" value)* [","]] "}"
//! key        = IDENT | STRING | NUMBER
//! ```
//!
//! Strings in value position are paths of one literal; each operation
//! decides whether it wants a path or text.

use std::collections::HashSet;

use pengate_core::{ImageKind, Props};
use serde_json::{Map, Value};

use crate::error::ScriptError;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::ops::{OpTag, Operation, PathExpr, PathPart, ROOT_BINDING, Script, Statement};

/// Hard cap on operations per script.
pub const MAX_OPERATIONS: usize = 25;

/// Deepest nesting of objects and arrays inside one value.
pub const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Path(PathExpr),
    Value(Value),
    Undefined,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Bindings assigned on earlier lines.
    defined: HashSet<String>,
    /// Open `{` / `[` in the value being parsed.
    depth: usize,
}

/// Parse and validate a script. Nothing is executed.
pub fn parse_script(input: &str) -> Result<Script, ScriptError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        defined: HashSet::from([ROOT_BINDING.to_string()]),
        depth: 0,
    };

    let mut statements = Vec::new();
    while let Some(token) = parser.peek() {
        if token.kind == TokenKind::Semicolon {
            parser.pos += 1;
            continue;
        }
        statements.push(parser.statement()?);
    }

    if statements.is_empty() {
        return Err(ScriptError::validation(1, "script contains no operations"));
    }
    if statements.len() > MAX_OPERATIONS {
        return Err(ScriptError::validation(
            statements[MAX_OPERATIONS].line,
            format!(
                "script has {} operations; at most {MAX_OPERATIONS} are allowed per call",
                statements.len()
            ),
        ));
    }
    Ok(Script { statements })
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn next(&mut self) -> Result<Token, ScriptError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ScriptError::validation(self.line(), "unexpected end of script"))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ScriptError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(ScriptError::validation(
                token.line,
                format!("expected {}, found {}", kind.describe(), token.kind.describe()),
            ))
        }
    }

    fn ident(&mut self) -> Result<(String, usize), ScriptError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.line)),
            other => Err(ScriptError::validation(
                token.line,
                format!("expected an operation, found {}", other.describe()),
            )),
        }
    }

    fn statement(&mut self) -> Result<Statement, ScriptError> {
        let (first, line) = self.ident()?;
        let (binding, tag_name) = if self.eat(&TokenKind::Assign) {
            (Some(first), self.ident()?.0)
        } else {
            (None, first)
        };

        let tag = OpTag::parse(&tag_name).ok_or_else(|| {
            ScriptError::validation(
                line,
                format!("unknown operation '{tag_name}'; expected one of I, C, U, R, M, D, G"),
            )
        })?;
        match (&binding, tag.binds()) {
            (None, true) => {
                return Err(ScriptError::validation(
                    line,
                    format!("{tag} creates a node and needs a binding, e.g. x={tag}(...)"),
                ));
            }
            (Some(name), false) => {
                return Err(ScriptError::validation(
                    line,
                    format!("{tag} does not create a node; remove '{name}='"),
                ));
            }
            (Some(name), true) if name == ROOT_BINDING => {
                return Err(ScriptError::validation(
                    line,
                    format!("'{ROOT_BINDING}' is reserved for the document root"),
                ));
            }
            _ => {}
        }

        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.eat(&TokenKind::RParen) {
            args.push(self.arg()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RParen)?;
                break;
            }
        }

        let op = build(tag, binding.clone(), args, line)?;
        if let Some(name) = binding {
            self.defined.insert(name);
        }
        Ok(Statement { line, op })
    }

    fn arg(&mut self) -> Result<Arg, ScriptError> {
        let Some(kind) = self.peek().map(|t| t.kind.clone()) else {
            return Err(ScriptError::validation(self.line(), "unexpected end of script"));
        };
        match &kind {
            TokenKind::Ident(word) if word == "undefined" => {
                self.pos += 1;
                Ok(Arg::Undefined)
            }
            TokenKind::Ident(word) if matches!(word.as_str(), "true" | "false" | "null") => {
                Ok(Arg::Value(self.value()?))
            }
            TokenKind::Ident(_) | TokenKind::Str(_) => Ok(Arg::Path(self.path()?)),
            _ => Ok(Arg::Value(self.value()?)),
        }
    }

    fn path(&mut self) -> Result<PathExpr, ScriptError> {
        let mut parts = vec![self.operand()?];
        while self.eat(&TokenKind::Plus) {
            parts.push(self.operand()?);
        }
        Ok(PathExpr { parts })
    }

    fn operand(&mut self) -> Result<PathPart, ScriptError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Str(s) => Ok(PathPart::Literal(s)),
            TokenKind::Ident(name) if self.defined.contains(&name) => Ok(PathPart::Binding(name)),
            TokenKind::Ident(name) => Err(ScriptError::validation(
                token.line,
                format!(
                    "unknown binding '{name}'; bindings must be assigned on an earlier line of the same script"
                ),
            )),
            other => Err(ScriptError::validation(
                token.line,
                format!("expected a path, found {}", other.describe()),
            )),
        }
    }

    fn descend(&mut self, line: usize) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ScriptError::validation(
                line,
                format!("value nests deeper than {MAX_NESTING} levels"),
            ));
        }
        Ok(())
    }

    fn value(&mut self) -> Result<Value, ScriptError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::LBrace => {
                self.descend(token.line)?;
                let mut map = Map::new();
                while !self.eat(&TokenKind::RBrace) {
                    let key_token = self.next()?;
                    let key = match key_token.kind {
                        TokenKind::Ident(k) | TokenKind::Str(k) => k,
                        TokenKind::Num(n) => n.to_string(),
                        other => {
                            return Err(ScriptError::validation(
                                key_token.line,
                                format!("expected an object key, found {}", other.describe()),
                            ));
                        }
                    };
                    self.expect(TokenKind::Colon)?;
                    let value = self.value()?;
                    map.insert(key, value);
                    if !self.eat(&TokenKind::Comma) {
                        self.expect(TokenKind::RBrace)?;
                        break;
                    }
                }
                self.depth -= 1;
                Ok(Value::Object(map))
            }
            TokenKind::LBracket => {
                self.descend(token.line)?;
                let mut items = Vec::new();
                while !self.eat(&TokenKind::RBracket) {
                    items.push(self.value()?);
                    if !self.eat(&TokenKind::Comma) {
                        self.expect(TokenKind::RBracket)?;
                        break;
                    }
                }
                self.depth -= 1;
                Ok(Value::Array(items))
            }
            TokenKind::Str(s) => Ok(Value::String(s)),
            TokenKind::Num(n) => Ok(Value::Number(n)),
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ => Err(ScriptError::validation(
                    token.line,
                    format!("unexpected identifier '{word}' in a value; quote string values"),
                )),
            },
            other => Err(ScriptError::validation(
                token.line,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }
}

fn build(
    tag: OpTag,
    binding: Option<String>,
    args: Vec<Arg>,
    line: usize,
) -> Result<Operation, ScriptError> {
    let fail = |message: String| ScriptError::validation(line, message);
    let count = args.len();
    let arity = |range: std::ops::RangeInclusive<usize>, usage: &str| {
        if range.contains(&count) {
            Ok(())
        } else {
            Err(fail(format!("{tag} takes {usage}, got {count} argument(s)")))
        }
    };
    let binding = binding.unwrap_or_default();
    let mut args = args.into_iter();
    let mut next = || args.next().unwrap_or(Arg::Undefined);

    let op = match tag {
        OpTag::I => {
            arity(2..=2, "(parent, nodeData)")?;
            Operation::Insert {
                binding,
                parent: path_arg(next(), "parent", line)?,
                payload: object_arg(next(), "node data", line)?,
            }
        }
        OpTag::C => {
            arity(2..=3, "(source, parent[, overrides])")?;
            Operation::Copy {
                binding,
                source: path_arg(next(), "source", line)?,
                parent: path_arg(next(), "parent", line)?,
                overrides: match next() {
                    Arg::Undefined => Props::new(),
                    other => object_arg(other, "overrides", line)?,
                },
            }
        }
        OpTag::U => {
            arity(2..=2, "(path, properties)")?;
            Operation::Update {
                target: path_arg(next(), "path", line)?,
                patch: object_arg(next(), "properties", line)?,
            }
        }
        OpTag::R => {
            arity(2..=2, "(path, nodeData)")?;
            Operation::Replace {
                binding,
                target: path_arg(next(), "path", line)?,
                payload: object_arg(next(), "node data", line)?,
            }
        }
        OpTag::M => {
            arity(1..=3, "(node[, parent][, index])")?;
            let node = path_arg(next(), "node", line)?;
            let (parent, index) = match (next(), next()) {
                (Arg::Value(Value::Number(n)), Arg::Undefined) => (None, Some(index_arg(&n, line)?)),
                (parent, index) => {
                    let parent = match parent {
                        Arg::Undefined | Arg::Value(Value::Null) => None,
                        other => Some(path_arg(other, "parent", line)?),
                    };
                    let index = match index {
                        Arg::Undefined | Arg::Value(Value::Null) => None,
                        Arg::Value(Value::Number(n)) => Some(index_arg(&n, line)?),
                        _ => return Err(fail("M index must be a number".into())),
                    };
                    (parent, index)
                }
            };
            Operation::Move {
                node,
                parent,
                index,
            }
        }
        OpTag::D => {
            arity(1..=1, "(path)")?;
            Operation::Delete {
                target: path_arg(next(), "path", line)?,
            }
        }
        OpTag::G => {
            arity(3..=3, "(path, \"ai\" | \"stock\", prompt)")?;
            let target = path_arg(next(), "path", line)?;
            let mode = text_arg(next(), "image mode", line)?;
            let kind = ImageKind::parse(&mode)
                .ok_or_else(|| fail(format!("G mode must be \"ai\" or \"stock\", got \"{mode}\"")))?;
            let prompt = text_arg(next(), "prompt", line)?;
            if prompt.trim().is_empty() {
                return Err(fail("G needs a non-empty prompt".into()));
            }
            Operation::GenerateImage {
                target,
                kind,
                prompt,
            }
        }
    };
    Ok(op)
}

fn path_arg(arg: Arg, what: &str, line: usize) -> Result<PathExpr, ScriptError> {
    match arg {
        Arg::Path(path) => Ok(path),
        _ => Err(ScriptError::validation(
            line,
            format!("{what} must be a binding or a quoted node id/path"),
        )),
    }
}

fn object_arg(arg: Arg, what: &str, line: usize) -> Result<Props, ScriptError> {
    match arg {
        Arg::Value(Value::Object(map)) => Ok(map),
        _ => Err(ScriptError::validation(line, format!("{what} must be an object"))),
    }
}

fn text_arg(arg: Arg, what: &str, line: usize) -> Result<String, ScriptError> {
    match &arg {
        Arg::Path(path) => path.as_literal().map(str::to_string),
        _ => None,
    }
    .ok_or_else(|| ScriptError::validation(line, format!("{what} must be a quoted string")))
}

fn index_arg(n: &serde_json::Number, line: usize) -> Result<usize, ScriptError> {
    n.as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| ScriptError::validation(line, "index must be a non-negative integer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validation_message(src: &str) -> String {
        match parse_script(src) {
            Err(ScriptError::Validation { message, .. }) => message,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn parses_insert_then_update() {
        let script = parse_script("a=I(document,{type:\"frame\"})\nU(a,{width:100})").unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.statements[1].line, 2);
        match &script.statements[0].op {
            Operation::Insert {
                binding,
                parent,
                payload,
            } => {
                assert_eq!(binding, "a");
                assert_eq!(parent.parts, vec![PathPart::Binding("document".into())]);
                assert_eq!(Value::Object(payload.clone()), json!({"type": "frame"}));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn relaxed_json_payloads() {
        let script = parse_script(
            "x=I('root', {type: 'text', 'content': \"Hi\", padding: [8, 16,], enabled: true,})",
        )
        .unwrap();
        let Operation::Insert { payload, .. } = &script.statements[0].op else {
            panic!("expected insert");
        };
        assert_eq!(
            Value::Object(payload.clone()),
            json!({"type": "text", "content": "Hi", "padding": [8, 16], "enabled": true})
        );
    }

    #[test]
    fn plus_builds_descendant_paths() {
        let script = parse_script("card=C(\"Card\", document)\nU(card+\"/title\", {content: \"x\"})")
            .unwrap();
        let Operation::Update { target, .. } = &script.statements[1].op else {
            panic!("expected update");
        };
        assert_eq!(
            target.parts,
            vec![
                PathPart::Binding("card".into()),
                PathPart::Literal("/title".into())
            ]
        );
    }

    #[test]
    fn twenty_six_operations_are_rejected() {
        let src: String = (0..26)
            .map(|i| format!("n{i}=I(document, {{type: \"frame\"}})\n"))
            .collect();
        assert!(validation_message(&src).contains("at most 25"));

        let ok: String = (0..25)
            .map(|i| format!("n{i}=I(document, {{type: \"frame\"}})\n"))
            .collect();
        assert_eq!(parse_script(&ok).unwrap().len(), 25);
    }

    #[test]
    fn binding_must_be_defined_earlier() {
        assert!(validation_message("U(a, {width: 1})\na=I(document, {type: \"frame\"})")
            .contains("unknown binding 'a'"));
        // Not visible in its own line either.
        assert!(validation_message("a=I(a, {type: \"frame\"})").contains("unknown binding"));
    }

    #[test]
    fn binding_rules_per_tag() {
        assert!(validation_message("I(document, {type: \"frame\"})").contains("needs a binding"));
        assert!(validation_message("x=D(\"n1\")").contains("does not create"));
        assert!(validation_message("document=I(document, {type: \"frame\"})").contains("reserved"));
        assert!(validation_message("x=Z(document)").contains("unknown operation 'Z'"));
    }

    #[test]
    fn arity_and_argument_shapes() {
        assert!(validation_message("U(\"n1\")").contains("takes (path, properties)"));
        assert!(validation_message("U(\"n1\", 3)").contains("must be an object"));
        assert!(validation_message("G(\"n1\", \"photo\", \"sky\")").contains("\"ai\" or \"stock\""));
        assert!(validation_message("G(\"n1\", \"ai\", \"\")").contains("non-empty prompt"));
    }

    #[test]
    fn move_argument_forms() {
        let script = parse_script(
            "M(\"a\")\nM(\"a\", 2)\nM(\"a\", \"b\")\nM(\"a\", undefined, 0)\nM(\"a\", \"b\", 1)",
        )
        .unwrap();
        let moves: Vec<(Option<String>, Option<usize>)> = script
            .statements
            .iter()
            .map(|s| match &s.op {
                Operation::Move { parent, index, .. } => (
                    parent.as_ref().and_then(|p| p.as_literal().map(str::to_string)),
                    *index,
                ),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            moves,
            vec![
                (None, None),
                (None, Some(2)),
                (Some("b".into()), None),
                (None, Some(0)),
                (Some("b".into()), Some(1)),
            ]
        );
        assert!(validation_message("M(\"a\", -1)").contains("non-negative"));
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(validation_message("  // nothing\n").contains("no operations"));
    }

    #[test]
    fn deep_nesting_is_a_validation_failure() {
        let depth = 200_000;
        let src = format!(
            "U(\"n1\", {{a: {}1{}}})",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        let message = validation_message(&src);
        assert!(message.contains("128"), "{message}");
    }

    #[test]
    fn nesting_at_the_limit_parses() {
        let inner = MAX_NESTING - 1;
        let src = format!(
            "U(\"n1\", {{a: {}1{}}})",
            "[".repeat(inner),
            "]".repeat(inner)
        );
        assert_eq!(parse_script(&src).unwrap().len(), 1);
    }
}
