//! Reads annotation text (`list[dict[str, int | None]]`) into a [`TypeDescriptor`].
//!
//! Names the parser does not know are handed to a caller-supplied resolver; names the
//! resolver does not know either stay [`TypeDescriptor::Unresolved`] and compile to `Any`.
use super::error::ParseError;
use crate::store::{Builtin, TypeDescriptor, Value};

/// Parses annotation text without a class resolver.
pub fn parse(text: &str) -> Result<TypeDescriptor, ParseError> {
    parse_with(text, |_| None)
}

/// Parses annotation text, resolving unknown names through `resolve`.
pub fn parse_with<R>(text: &str, resolve: R) -> Result<TypeDescriptor, ParseError>
where
    R: Fn(&str) -> Option<TypeDescriptor>,
{
    let mut parser = Parser { text, pos: 0, resolve: &resolve };
    let descriptor = parser.union()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(descriptor),
        Some(c) => Err(parser.unexpected(c)),
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    resolve: &'a dyn Fn(&str) -> Option<TypeDescriptor>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error_here())
        }
    }

    fn unexpected(&self, found: char) -> ParseError {
        ParseError::Unexpected { found, offset: self.pos, text: self.text.to_string() }
    }

    fn error_here(&self) -> ParseError {
        match self.peek() {
            Some(c) => self.unexpected(c),
            None => ParseError::UnexpectedEnd(self.text.to_string()),
        }
    }

    /// `primary ('|' primary)*`
    fn union(&mut self) -> Result<TypeDescriptor, ParseError> {
        let mut members = vec![self.primary()?];
        while self.eat('|') {
            members.push(self.primary()?);
        }
        if members.len() == 1 {
            Ok(members.remove(0))
        } else {
            Ok(TypeDescriptor::Union(members))
        }
    }

    /// `union (',' union)*`
    fn args(&mut self) -> Result<Vec<TypeDescriptor>, ParseError> {
        let mut args = vec![self.union()?];
        while self.eat(',') {
            args.push(self.union()?);
        }
        Ok(args)
    }

    fn name(&mut self) -> Result<&'a str, ParseError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '.') {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error_here());
        }
        Ok(&self.text[start..self.pos])
    }

    fn primary(&mut self) -> Result<TypeDescriptor, ParseError> {
        self.skip_ws();
        if self.text[self.pos..].starts_with("...") {
            self.pos += 3;
            return Ok(TypeDescriptor::Ellipsis);
        }

        let start = self.pos;
        let full_name = self.name()?;
        let name = full_name.strip_prefix("typing.").unwrap_or(full_name);

        if !self.eat('[') {
            return Ok(match name {
                "Any" => TypeDescriptor::Any,
                _ => match Builtin::from_name(name) {
                    Some(b) => TypeDescriptor::Builtin(b),
                    None => (self.resolve)(name)
                        .unwrap_or_else(|| TypeDescriptor::Unresolved(name.to_string())),
                },
            });
        }

        let descriptor = match name {
            "Optional" => TypeDescriptor::optional(self.union()?),
            "Union" => TypeDescriptor::Union(self.args()?),
            "Literal" => TypeDescriptor::Literal(self.literals()?),
            "Annotated" => {
                let inner = self.union()?;
                let mut metadata = Vec::new();
                while self.eat(',') {
                    metadata.push(self.raw_item()?);
                }
                TypeDescriptor::annotated(inner, metadata)
            }
            _ => match Builtin::from_name(name) {
                Some(b) => TypeDescriptor::Generic(b, self.args()?),
                None => {
                    self.skip_balanced()?;
                    while self.eat(',') {
                        self.skip_balanced()?;
                    }
                    self.expect(']')?;
                    return Ok(TypeDescriptor::Unresolved(self.text[start..self.pos].to_string()));
                }
            },
        };
        self.expect(']')?;
        Ok(descriptor)
    }

    fn literals(&mut self) -> Result<Vec<Value>, ParseError> {
        let mut values = vec![self.literal()?];
        while self.eat(',') {
            values.push(self.literal()?);
        }
        Ok(values)
    }

    fn literal(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        None => return Err(ParseError::UnexpectedEnd(self.text.to_string())),
                        Some(c) if c == quote => break,
                        Some('\\') => match self.bump() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(c) => s.push(c),
                            None => return Err(ParseError::UnexpectedEnd(self.text.to_string())),
                        },
                        Some(c) => s.push(c),
                    }
                }
                Ok(Value::Str(s))
            }
            Some(_) => {
                let start = self.pos;
                let in_token = |c: char| c.is_alphanumeric() || matches!(c, '-' | '+' | '.' | '_');
                while self.peek().is_some_and(in_token) {
                    self.bump();
                }
                let token = &self.text[start..self.pos];
                match token {
                    "" => Err(self.error_here()),
                    "True" => Ok(Value::Bool(true)),
                    "False" => Ok(Value::Bool(false)),
                    "None" => Ok(Value::None),
                    _ => {
                        let digits = token.replace('_', "");
                        if let Ok(i) = digits.parse::<i64>() {
                            Ok(Value::Int(i))
                        } else if let Ok(f) = digits.parse::<f64>() {
                            Ok(Value::Float(f))
                        } else {
                            Err(ParseError::InvalidLiteral(token.to_string()))
                        }
                    }
                }
            }
            None => Err(ParseError::UnexpectedEnd(self.text.to_string())),
        }
    }

    /// Raw text of one argument, up to the next top-level `,` or `]`.
    fn raw_item(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        let start = self.pos;
        self.skip_balanced()?;
        Ok(self.text[start..self.pos].trim().to_string())
    }

    /// Consumes input until a `,` or `]` at bracket depth zero, without consuming it.
    fn skip_balanced(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(ParseError::UnexpectedEnd(self.text.to_string())),
                Some(',') | Some(']') if depth == 0 => return Ok(()),
                Some('[') | Some('(') => depth += 1,
                Some(']') | Some(')') => depth = depth.saturating_sub(1),
                Some(_) => {}
            }
            self.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ClassId, ClassRef};
    use rstest::rstest;

    #[rstest]
    #[case("int", TypeDescriptor::int())]
    #[case("typing.Any", TypeDescriptor::Any)]
    #[case("Optional[str]", TypeDescriptor::optional(TypeDescriptor::str()))]
    #[case(
        "str | None",
        TypeDescriptor::union(vec![TypeDescriptor::str(), TypeDescriptor::none()])
    )]
    #[case("List[int]", TypeDescriptor::list_of(TypeDescriptor::int()))]
    #[case("tuple[int, ...]", TypeDescriptor::tuple_variadic(TypeDescriptor::int()))]
    #[case(
        "Literal[1, 'a', True]",
        TypeDescriptor::literal([Value::Int(1), Value::from("a"), Value::Bool(true)])
    )]
    #[case(
        "Annotated[int, Gt(0)]",
        TypeDescriptor::annotated(TypeDescriptor::int(), vec!["Gt(0)".into()])
    )]
    #[case(
        "Union[int, float]",
        TypeDescriptor::union(vec![TypeDescriptor::int(), TypeDescriptor::float()])
    )]
    fn test_parse(#[case] text: &str, #[case] expected: TypeDescriptor) {
        assert_eq!(parse(text).unwrap(), expected);
    }

    #[test]
    fn test_nested_round_trips_through_label() {
        let text = "list[dict[str, int | float]]";
        assert_eq!(parse(text).unwrap().to_string(), text);
    }

    #[test]
    fn test_unknown_names_are_unresolved() {
        assert_eq!(parse("Decimal").unwrap(), TypeDescriptor::Unresolved("Decimal".into()));
        assert_eq!(
            parse("Callable[[int], str]").unwrap(),
            TypeDescriptor::Unresolved("Callable[[int], str]".into())
        );
    }

    #[test]
    fn test_resolver_supplies_classes() {
        let cat = ClassRef { id: ClassId(7), name: "Cat".into() };
        let resolved = parse_with("list[Cat]", |name| {
            (name == "Cat").then(|| TypeDescriptor::Class(cat.clone()))
        })
        .unwrap();
        assert_eq!(resolved, TypeDescriptor::list_of(TypeDescriptor::Class(cat)));
    }

    #[rstest]
    #[case("list[int")]
    #[case("list[int]]")]
    #[case("")]
    #[case("Literal[@]")]
    fn test_malformed_text_is_rejected(#[case] text: &str) {
        assert!(parse(text).is_err());
    }
}
