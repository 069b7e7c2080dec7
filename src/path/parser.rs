//! Path expression parser
//!
//! Parses controlled structure text into a `PathExpr`. Only the small family
//! of expressions this crate writes is accepted.
//!
//! Grammar:
//! ```text
//! expr      = global | relative | relative "/descendant-or-self::node()" "|" same "/@*"
//! global    = "//node() | //@*" | "//node()"
//! relative  = (".." "/")* (step "/")* selector
//! step      = qname ["[" number "]"]
//! selector  = "self::node()" | "descendant-or-self::node()" | "@" qname | "text()"
//! ```

use super::types::*;
use thiserror::Error;

/// Path parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathParseError {
    #[error("Empty path expression")]
    Empty,

    #[error("Absolute paths are not supported")]
    AbsolutePath,

    #[error("Expected a step at position {0}")]
    ExpectedStep(usize),

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed predicate at position {0}")]
    UnclosedPredicate(usize),

    #[error("Path has no terminal selector")]
    MissingSelector,

    #[error("Unsupported axis '{0}' at position {1}")]
    UnsupportedAxis(String, usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Union halves do not select the same subtree")]
    UnionMismatch,

    #[error("Only a two-way union is supported")]
    TooManyUnions,
}

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Consume the longest run of characters accepted by `accept`
    fn eat_while(&mut self, accept: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let rest = &self.input[start..];
        self.pos += rest.find(|c: char| !accept(c)).unwrap_or(rest.len());
        &self.input[start..self.pos]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn unexpected(&self) -> PathParseError {
        PathParseError::UnexpectedChar(self.peek().unwrap_or('\0'), self.pos)
    }

    fn parse_number(&mut self) -> Result<usize, PathParseError> {
        let start = self.pos;
        self.eat_while(|c| c.is_ascii_digit())
            .parse()
            .map_err(|_| PathParseError::ExpectedNumber(start))
    }

    /// Parse a qualified name (`prefix:local` or `local`)
    fn parse_qname(&mut self) -> Result<String, PathParseError> {
        let start = self.pos;
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            _ => return Err(PathParseError::ExpectedStep(start)),
        }

        let name = self.eat_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
        if let Some((axis, _)) = name.split_once("::") {
            return Err(PathParseError::UnsupportedAxis(axis.to_string(), start));
        }
        Ok(name.to_string())
    }

    /// Parse a child step with its optional `[k]` predicate
    fn parse_step(&mut self) -> Result<PathStep, PathParseError> {
        let name = self.parse_qname()?;

        let position = if self.skip_if('[') {
            let open = self.pos - 1;
            let k = self.parse_number()?;
            if !self.skip_if(']') {
                return Err(PathParseError::UnclosedPredicate(open));
            }
            if k == 0 {
                return Err(PathParseError::ExpectedNumber(open + 1));
            }
            Some(k)
        } else {
            None
        };

        Ok(PathStep { name, position })
    }

    /// Parse a terminal selector, or `None` if the next segment is a step
    fn parse_selector(&mut self) -> Result<Option<Selector>, PathParseError> {
        if self.skip_str(SELF_NODE) {
            return Ok(Some(Selector::SelfNode));
        }
        if self.skip_str(DESCENDANT_OR_SELF) {
            return Ok(Some(Selector::DescendantOrSelf));
        }
        if self.skip_str(TEXT_NODE) {
            return Ok(Some(Selector::Text));
        }
        if self.skip_if('@') {
            if self.peek() == Some('*') {
                return Err(self.unexpected());
            }
            return Ok(Some(Selector::Attribute(self.parse_qname()?)));
        }
        Ok(None)
    }

    fn parse_relative(&mut self) -> Result<RelativePath, PathParseError> {
        if self.peek() == Some('/') {
            return Err(PathParseError::AbsolutePath);
        }

        let mut up = 0;
        let mut steps = Vec::new();

        loop {
            if self.at_end() {
                return Err(PathParseError::MissingSelector);
            }

            if steps.is_empty() && self.skip_str("..") {
                up += 1;
            } else if let Some(selector) = self.parse_selector()? {
                if !self.at_end() {
                    return Err(self.unexpected());
                }
                return Ok(RelativePath {
                    up,
                    steps,
                    selector,
                });
            } else {
                steps.push(self.parse_step()?);
            }

            if !self.skip_if('/') {
                if self.at_end() {
                    return Err(PathParseError::MissingSelector);
                }
                return Err(self.unexpected());
            }
        }
    }
}

/// Parse a controlled structure
pub fn parse(input: &str) -> Result<PathExpr, PathParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PathParseError::Empty);
    }

    let parts: Vec<&str> = input.split('|').map(str::trim).collect();
    match parts.as_slice() {
        ["//node()", "//@*"] => Ok(PathExpr::Global { legacy: false }),
        ["//node()"] => Ok(PathExpr::Global { legacy: true }),
        [single] => Ok(PathExpr::Relative(Parser::new(single).parse_relative()?)),
        [nodes, attributes] => {
            let path = Parser::new(nodes).parse_relative()?;
            let expected = format!("{}/{}", nodes, ALL_ATTRIBUTES);
            if !path.applies_to_descendants() || *attributes != expected {
                return Err(PathParseError::UnionMismatch);
            }
            Ok(PathExpr::Relative(path))
        }
        _ => Err(PathParseError::TooManyUnions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative(input: &str) -> RelativePath {
        match parse(input).unwrap() {
            PathExpr::Relative(path) => path,
            other => panic!("expected relative path, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_global() {
        assert_eq!(parse("//node() | //@*").unwrap(), PathExpr::Global { legacy: false });
        assert_eq!(parse("//node()").unwrap(), PathExpr::Global { legacy: true });
    }

    #[test]
    fn test_parse_host_descendants() {
        let path =
            relative("../../../descendant-or-self::node() | ../../../descendant-or-self::node()/@*");
        assert_eq!(path.up, 3);
        assert!(path.steps.is_empty());
        assert!(path.applies_to_descendants());
    }

    #[test]
    fn test_parse_positional_steps() {
        let path = relative("../../../indicator:Observable[1]/cybox:Object[2]/self::node()");
        assert_eq!(path.up, 3);
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].name, "indicator:Observable");
        assert_eq!(path.steps[1].position, Some(2));
        assert_eq!(path.selector, Selector::SelfNode);

        let path = relative("../../../stix:Observables[1]/cybox:Observable[12]/@id");
        assert_eq!(path.steps[1].position, Some(12));
        assert_eq!(path.selector, Selector::Attribute("id".to_string()));
    }

    #[test]
    fn test_parse_leaf_selectors() {
        assert_eq!(
            relative("../../../../@timestamp").selector,
            Selector::Attribute("timestamp".to_string())
        );
        assert_eq!(relative("../../../indicator:Title[1]/text()").selector, Selector::Text);
    }

    #[test]
    fn test_single_descendant_half_accepted() {
        let path = relative("../../../indicator:Title/descendant-or-self::node()");
        assert!(path.applies_to_descendants());
        assert_eq!(path.steps[0].position, None);
    }

    #[test]
    fn test_roundtrip() {
        let original = "../../../../stix:Observables[1]/cybox:Observable[3]/descendant-or-self::node() | ../../../../stix:Observables[1]/cybox:Observable[3]/descendant-or-self::node()/@*";
        assert_eq!(parse(original).unwrap().to_string(), original);
    }

    #[test]
    fn test_error_absolute() {
        assert_eq!(
            parse("//stix:Indicator[@id='example:indicator1']/indicator:Title/descendant-or-self::node()"),
            Err(PathParseError::AbsolutePath)
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(matches!(
            parse("../../../stix:Indicator[@id='x']/self::node()"),
            Err(PathParseError::ExpectedNumber(_))
        ));
        assert!(matches!(
            parse("../../../stix:Indicator[1/self::node()"),
            Err(PathParseError::UnclosedPredicate(_))
        ));
    }

    #[test]
    fn test_error_shapes() {
        assert_eq!(parse("  "), Err(PathParseError::Empty));
        assert_eq!(parse("../../.."), Err(PathParseError::MissingSelector));
        assert!(matches!(
            parse("../../../child::node()"),
            Err(PathParseError::UnsupportedAxis(axis, _)) if axis == "child"
        ));
        assert!(matches!(
            parse("../@*"),
            Err(PathParseError::UnexpectedChar('*', _))
        ));
        assert_eq!(
            parse("../self::node() | ../self::node()/@*"),
            Err(PathParseError::UnionMismatch)
        );
        assert_eq!(parse("a | b | c"), Err(PathParseError::TooManyUnions));
        assert!(parse("../text()/x").is_err());
        assert!(matches!(
            parse("../stix:Indicator[1]/../self::node()"),
            Err(PathParseError::ExpectedStep(_))
        ));
    }
}
