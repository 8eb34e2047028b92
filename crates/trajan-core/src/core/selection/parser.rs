use super::ast::{NamePattern, Selection};
use std::ops::RangeInclusive;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Selection expression is empty")]
    Empty,
    #[error("Unexpected end of selection expression")]
    UnexpectedEnd,
    #[error("Unexpected '{found}' at position {position}")]
    UnexpectedToken { position: usize, found: String },
    #[error("Unknown selection keyword '{word}' at position {position}")]
    UnknownKeyword { position: usize, word: String },
    #[error("Invalid number '{text}' at position {position}")]
    InvalidNumber { position: usize, text: String },
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

impl Token {
    fn text(&self) -> String {
        match &self.kind {
            TokenKind::LParen => "(".into(),
            TokenKind::RParen => ")".into(),
            TokenKind::Comma => ",".into(),
            TokenKind::And => "and".into(),
            TokenKind::Or => "or".into(),
            TokenKind::Not => "not".into(),
            TokenKind::Word(w) => w.clone(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | ',' | '!' | '&' | '|')
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '!' => TokenKind::Not,
            '&' | '|' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, next)| next == c) {
                    chars.next();
                }
                let kind = if c == '&' { TokenKind::And } else { TokenKind::Or };
                tokens.push(Token { kind, position });
                continue;
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let kind = match word.to_ascii_lowercase().as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    _ => TokenKind::Word(word),
                };
                tokens.push(Token { kind, position });
                continue;
            }
        };
        chars.next();
        tokens.push(Token { kind, position });
    }
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Result<Token, SelectionError> {
        let token = self
            .tokens
            .get(self.cursor)
            .cloned()
            .ok_or(SelectionError::UnexpectedEnd)?;
        self.cursor += 1;
        Ok(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), SelectionError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(unexpected(&token))
        }
    }

    fn or_expr(&mut self) -> Result<Selection, SelectionError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.and_expr()?;
            lhs = Selection::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Selection, SelectionError> {
        let mut lhs = self.unary()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.unary()?;
            lhs = Selection::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Selection, SelectionError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Selection::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Selection, SelectionError> {
        let token = self.next()?;
        let word = match &token.kind {
            TokenKind::LParen => {
                let inner = self.or_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Word(w) => w.to_ascii_lowercase(),
            _ => return Err(unexpected(&token)),
        };

        let selection = match word.as_str() {
            "all" | "everything" => Selection::All,
            "none" | "nothing" => Selection::None,
            "backbone" => Selection::Backbone,
            "protein" => Selection::Protein,
            "dna" | "nucleic" => Selection::Dna,
            "water" | "solvent" => Selection::Water,
            "sidechain" => Selection::Sidechain,
            "atom" | "name" => Selection::Atom(self.list(|t| Ok(NamePattern::new(t.0)))?),
            "atomno" => Selection::AtomNo(self.list(parse_range)?),
            "residue" | "resname" => Selection::Residue(self.list(|t| Ok(NamePattern::new(t.0)))?),
            "resno" | "residueno" => Selection::ResidueNo(self.list(parse_range)?),
            "chain" => Selection::Chain(self.list(parse_chain)?),
            "element" => Selection::Element(self.list(|t| Ok(NamePattern::new(t.0)))?),
            "within" => {
                let (radius, inner) = self.spatial_args()?;
                Selection::Within { radius, inner }
            }
            "notwithin" => {
                let (radius, inner) = self.spatial_args()?;
                Selection::NotWithin { radius, inner }
            }
            _ => {
                return Err(SelectionError::UnknownKeyword {
                    position: token.position,
                    word: token.text(),
                });
            }
        };
        Ok(selection)
    }

    /// `value (, value)*` where every value is a single word.
    fn list<T>(
        &mut self,
        mut convert: impl FnMut((&str, usize)) -> Result<T, SelectionError>,
    ) -> Result<Vec<T>, SelectionError> {
        let mut items = Vec::new();
        loop {
            let token = self.next()?;
            match &token.kind {
                TokenKind::Word(w) => items.push(convert((w.as_str(), token.position))?),
                _ => return Err(unexpected(&token)),
            }
            if !self.eat(&TokenKind::Comma) {
                return Ok(items);
            }
        }
    }

    /// `( radius , expr )`
    fn spatial_args(&mut self) -> Result<(f64, Box<Selection>), SelectionError> {
        self.expect(TokenKind::LParen)?;
        let token = self.next()?;
        let radius = match &token.kind {
            TokenKind::Word(w) => w
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite() && *r >= 0.0)
                .ok_or_else(|| SelectionError::InvalidNumber {
                    position: token.position,
                    text: w.clone(),
                })?,
            _ => return Err(unexpected(&token)),
        };
        self.expect(TokenKind::Comma)?;
        let inner = self.or_expr()?;
        self.expect(TokenKind::RParen)?;
        Ok((radius, Box::new(inner)))
    }
}

fn unexpected(token: &Token) -> SelectionError {
    SelectionError::UnexpectedToken {
        position: token.position,
        found: token.text(),
    }
}

fn parse_int((text, position): (&str, usize)) -> Result<i64, SelectionError> {
    text.parse::<i64>().map_err(|_| SelectionError::InvalidNumber {
        position,
        text: text.to_string(),
    })
}

/// `n` or `a-b`; a leading minus belongs to the first bound.
fn parse_range((text, position): (&str, usize)) -> Result<RangeInclusive<i64>, SelectionError> {
    let split = text
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '-')
        .map(|(i, _)| i);
    match split {
        Some(i) => {
            let start = parse_int((&text[..i], position))?;
            let end = parse_int((&text[i + 1..], position + i + 1))?;
            Ok(start.min(end)..=start.max(end))
        }
        None => {
            let n = parse_int((text, position))?;
            Ok(n..=n)
        }
    }
}

fn parse_chain((text, position): (&str, usize)) -> Result<char, SelectionError> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(SelectionError::UnexpectedToken {
            position,
            found: text.to_string(),
        }),
    }
}

/// Parses a selection expression.
///
/// ```text
/// expr    := and ( ("or" | "|" | "||") and )*
/// and     := unary ( ("and" | "&" | "&&") unary )*
/// unary   := ("not" | "!") unary | primary
/// primary := "(" expr ")" | keyword | keyword value ("," value)*
///          | ("within" | "notwithin") "(" radius "," expr ")"
/// ```
pub fn parse(input: &str) -> Result<Selection, SelectionError> {
    let tokens = tokenize(input);
    if tokens.is_empty() {
        return Err(SelectionError::Empty);
    }
    let mut parser = Parser { tokens, cursor: 0 };
    let selection = parser.or_expr()?;
    match parser.peek() {
        Some(token) => Err(unexpected(token)),
        None => Ok(selection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_keywords() {
        assert_eq!(parse("all").unwrap(), Selection::All);
        assert_eq!(parse("  BACKBONE ").unwrap(), Selection::Backbone);
        assert_eq!(parse("nucleic").unwrap(), Selection::Dna);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let sel = parse("water or protein and backbone").unwrap();
        assert_eq!(
            sel,
            Selection::Or(
                Box::new(Selection::Water),
                Box::new(Selection::And(Box::new(Selection::Protein), Box::new(Selection::Backbone))),
            )
        );
    }

    #[test]
    fn symbolic_operators_are_accepted() {
        assert_eq!(parse("!water && protein").unwrap(), parse("not water and protein").unwrap());
        assert_eq!(parse("water | dna").unwrap(), parse("water || dna").unwrap());
    }

    #[test]
    fn parses_value_lists_and_ranges() {
        let sel = parse("resno 1-5, 9, -3--1").unwrap();
        assert_eq!(sel, Selection::ResidueNo(vec![1..=5, 9..=9, -3..=-1]));

        let sel = parse("chain A, B").unwrap();
        assert_eq!(sel, Selection::Chain(vec!['A', 'B']));
    }

    #[test]
    fn parses_within_with_nested_expression() {
        let sel = parse("within(4.5, residue LIG) and not water").unwrap();
        match sel {
            Selection::And(lhs, _) => match *lhs {
                Selection::Within { radius, ref inner } => {
                    assert_eq!(radius, 4.5);
                    assert_eq!(**inner, Selection::Residue(vec![NamePattern::new("LIG")]));
                }
                other => panic!("unexpected lhs {:?}", other),
            },
            other => panic!("unexpected selection {:?}", other),
        }
    }

    #[test]
    fn display_output_parses_back_to_the_same_tree() {
        let source = "(protein and not sidechain) or notwithin(3, element FE, ZN)";
        let sel = parse(source).unwrap();
        assert_eq!(parse(&sel.to_string()).unwrap(), sel);
    }

    #[test]
    fn reports_errors_with_positions() {
        assert_eq!(parse("   "), Err(SelectionError::Empty));
        assert_eq!(parse("protein and"), Err(SelectionError::UnexpectedEnd));
        assert_eq!(
            parse("protien"),
            Err(SelectionError::UnknownKeyword {
                position: 0,
                word: "protien".into()
            })
        );
        assert_eq!(
            parse("atomno 1-x"),
            Err(SelectionError::InvalidNumber {
                position: 9,
                text: "x".into()
            })
        );
        assert_eq!(
            parse("(water"),
            Err(SelectionError::UnexpectedEnd)
        );
        assert_eq!(
            parse("water protein"),
            Err(SelectionError::UnexpectedToken {
                position: 6,
                found: "protein".into()
            })
        );
        assert!(matches!(parse("within(-1, water)"), Err(SelectionError::InvalidNumber { .. })));
    }
}
