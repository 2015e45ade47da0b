//! Expression parser
//!
//! A recursive descent parser for the expression sub-language with
//! JavaScript operator precedence. Node spans are byte offsets into the
//! original text, so callers can rewrite the source in place.

use crate::ast::{BinaryOperator, Expr, LogicalOperator, Property, Span, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvalLimits;
use rowcalc_core::format_number;

/// Words that can never be identifiers. None of the constructs they
/// introduce are part of the sub-language.
const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "finally", "for", "function", "if", "in",
    "instanceof", "let", "new", "return", "super", "switch", "this", "throw", "try", "var",
    "void", "while", "with", "yield",
];

/// Names the lexer reads as literals rather than references
const LITERAL_NAMES: &[&str] = &["true", "false", "null", "typeof", "undefined", "NaN", "Infinity"];

/// Check if `name` would be read back as a reference to itself
///
/// ```rust
/// use rowcalc_formula::is_identifier;
///
/// assert!(is_identifier("$total_2"));
/// assert!(!is_identifier("total price"));
/// assert!(!is_identifier("undefined"));
/// ```
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().map_or(false, is_ident_start)
        && chars.all(is_ident_char)
        && !LITERAL_NAMES.contains(&name)
        && !RESERVED_WORDS.contains(&name)
}

/// Parse expression text into an AST
///
/// Empty or whitespace-only text parses to [`Expr::Empty`].
///
/// # Example
/// ```rust
/// use rowcalc_formula::parse;
///
/// let ast = parse("1 + 2").unwrap();
/// let ast = parse("Math.max($a, b * 2)").unwrap();
/// let ast = parse("x > 0 ? 'yes' : 'no'").unwrap();
/// ```
pub fn parse(text: &str) -> FormulaResult<Expr> {
    parse_with_max_depth(text, EvalLimits::default().max_depth)
}

/// Parse with an explicit bound on nesting depth
pub fn parse_with_max_depth(text: &str, max_depth: usize) -> FormulaResult<Expr> {
    if text.trim().is_empty() {
        return Ok(Expr::Empty);
    }

    let mut parser = ExprParser::new(text, max_depth)?;
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if parser.current != Token::Eof {
        return Err(parser.unexpected());
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),

    Identifier(String),
    Keyword(&'static str),
    True,
    False,
    Null,
    Typeof,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    EqualEqual,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    AndAnd,
    OrOr,
    QuestionQuestion,
    Question,
    Colon,
    Comma,
    Dot,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // End of input
    Eof,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Expression parser
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    current: Token,
    token_start: usize,
    token_end: usize,
    prev_end: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str, max_depth: usize) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            current: Token::Eof,
            token_start: 0,
            token_end: 0,
            prev_end: 0,
            depth: 0,
            max_depth,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.prev_end = self.token_end;
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current = self.scan_token()?;
        self.token_end = self.pos;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        // Single-character tokens
        let single = match c {
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Multi-character operators
        match c {
            '*' => {
                self.advance();
                if self.eat('*') {
                    return Ok(Token::StarStar);
                }
                return Ok(Token::Star);
            }
            '!' => {
                self.advance();
                if self.eat('=') {
                    if self.eat('=') {
                        return Ok(Token::StrictNotEqual);
                    }
                    return Ok(Token::NotEqual);
                }
                return Ok(Token::Bang);
            }
            '=' => {
                self.advance();
                if self.eat('=') {
                    if self.eat('=') {
                        return Ok(Token::StrictEqual);
                    }
                    return Ok(Token::EqualEqual);
                }
                return Err(FormulaError::syntax(
                    "Assignment is not supported",
                    self.token_start,
                ));
            }
            '<' => {
                self.advance();
                if self.eat('=') {
                    return Ok(Token::LessEqual);
                }
                return Ok(Token::LessThan);
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    return Ok(Token::GreaterEqual);
                }
                return Ok(Token::GreaterThan);
            }
            '&' if self.peek_char_at(1) == Some('&') => {
                self.advance();
                self.advance();
                return Ok(Token::AndAnd);
            }
            '|' if self.peek_char_at(1) == Some('|') => {
                self.advance();
                self.advance();
                return Ok(Token::OrOr);
            }
            '?' => {
                self.advance();
                if self.eat('?') {
                    return Ok(Token::QuestionQuestion);
                }
                return Ok(Token::Question);
            }
            _ => {}
        }

        // String literal
        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '.' {
            self.advance();
            return Ok(Token::Dot);
        }

        if is_ident_start(c) {
            return Ok(self.scan_word());
        }

        Err(FormulaError::syntax(
            format!("Unexpected character '{}'", c),
            self.pos,
        ))
    }

    fn scan_string(&mut self, quote: char) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let unterminated = || FormulaError::syntax("Unterminated string constant", start);
        let mut s = String::new();
        loop {
            let c = self.peek_char().ok_or_else(unterminated)?;
            self.advance();
            match c {
                c if c == quote => return Ok(Token::String(s)),
                '\n' | '\r' => return Err(unterminated()),
                '\\' => {
                    let escaped = self.peek_char().ok_or_else(unterminated)?;
                    self.advance();
                    match escaped {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        'b' => s.push('\u{8}'),
                        'f' => s.push('\u{c}'),
                        'v' => s.push('\u{b}'),
                        '0' => s.push('\0'),
                        'x' => {
                            let code = self.read_hex(2).ok_or_else(|| {
                                FormulaError::syntax("Invalid hexadecimal escape sequence", self.pos)
                            })?;
                            s.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                        }
                        'u' => s.push(self.scan_unicode_escape()?),
                        // Line continuation
                        '\n' => {}
                        other => s.push(other),
                    }
                }
                c => s.push(c),
            }
        }
    }

    fn scan_unicode_escape(&mut self) -> FormulaResult<char> {
        let invalid = |pos| FormulaError::syntax("Invalid Unicode escape sequence", pos);

        if self.eat('{') {
            let start = self.pos;
            while self.peek_char().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let code = u32::from_str_radix(&self.input[start..self.pos], 16)
                .map_err(|_| invalid(start))?;
            if !self.eat('}') {
                return Err(invalid(self.pos));
            }
            return char::from_u32(code).ok_or_else(|| invalid(start));
        }

        let code = self.read_hex(4).ok_or_else(|| invalid(self.pos))?;
        if (0xD800..0xDC00).contains(&code) && self.input[self.pos..].starts_with("\\u") {
            let save = self.pos;
            self.advance();
            self.advance();
            match self.read_hex(4) {
                Some(low) if (0xDC00..0xE000).contains(&low) => {
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                _ => self.pos = save,
            }
        }
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn read_hex(&mut self, count: usize) -> Option<u32> {
        let digits = self.input.get(self.pos..self.pos + count)?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let code = u32::from_str_radix(digits, 16).ok()?;
        self.pos += count;
        Some(code)
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        // Radix prefixes
        if self.peek_char() == Some('0') {
            let radix = match self.peek_char_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let digits_start = self.pos;
                while self.peek_char().map_or(false, |c| c.is_digit(radix)) {
                    self.advance();
                }
                let value = u64::from_str_radix(&self.input[digits_start..self.pos], radix)
                    .map_err(|_| FormulaError::syntax("Invalid number", start))?;
                return self.finish_number(value as f64);
            }
        }

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when digits follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let digits_at = match self.peek_char_at(1) {
                Some('+' | '-') => 2,
                _ => 1,
            };
            if self.peek_char_at(digits_at).map_or(false, |c| c.is_ascii_digit()) {
                for _ in 0..digits_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let value: f64 = self.input[start..self.pos]
            .parse()
            .map_err(|_| FormulaError::syntax("Invalid number", start))?;
        self.finish_number(value)
    }

    fn finish_number(&self, value: f64) -> FormulaResult<Token> {
        if self.peek_char().map_or(false, is_ident_char) {
            return Err(FormulaError::syntax(
                "Identifier directly after number",
                self.pos,
            ));
        }
        Ok(Token::Number(value))
    }

    fn scan_word(&mut self) -> Token {
        let start = self.pos;
        while self.peek_char().map_or(false, is_ident_char) {
            self.advance();
        }

        let word = &self.input[start..self.pos];
        match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "typeof" => Token::Typeof,
            _ => match RESERVED_WORDS.iter().copied().find(|w| *w == word) {
                Some(keyword) => Token::Keyword(keyword),
                None => Token::Identifier(word.to_string()),
            },
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current == *expected {
            self.consume()?;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> FormulaError {
        match &self.current {
            Token::Eof => FormulaError::syntax("Unexpected end of input", self.token_start),
            Token::Keyword(keyword) => FormulaError::syntax(
                format!("Unexpected keyword '{}'", keyword),
                self.token_start,
            ),
            _ => FormulaError::syntax(
                format!(
                    "Unexpected token '{}'",
                    &self.input[self.token_start..self.token_end]
                ),
                self.token_start,
            ),
        }
    }

    /// The current token read as a property name, if it can be one
    fn property_name(&self) -> Option<String> {
        match &self.current {
            Token::Identifier(name) => Some(name.clone()),
            Token::Keyword(keyword) => Some(keyword.to_string()),
            Token::True => Some("true".into()),
            Token::False => Some("false".into()),
            Token::Null => Some("null".into()),
            Token::Typeof => Some("typeof".into()),
            _ => None,
        }
    }

    /// Run a nested production, enforcing the depth limit
    fn descend(&mut self, production: fn(&mut Self) -> FormulaResult<Expr>) -> FormulaResult<Expr> {
        self.enter()?;
        let result = production(self);
        self.depth -= 1;
        result
    }

    /// Count one more level of nesting
    fn enter(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormulaError::syntax(
                format!("Expression nested too deeply (limit {})", self.max_depth),
                self.token_start,
            ));
        }
        Ok(())
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Conditional: ?:
    // 2. Nullish coalescing: ??
    // 3. Logical OR: ||
    // 4. Logical AND: &&
    // 5. Equality: == != === !==
    // 6. Relational: < <= > >=
    // 7. Additive: + -
    // 8. Multiplicative: * / %
    // 9. Exponentiation: ** (right associative)
    // 10. Unary: - + ! typeof
    // 11. Postfix: member, index, call
    // 12. Primary: literals, names, groups, array/object literals

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.descend(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> FormulaResult<Expr> {
        let test = self.parse_nullish()?;

        if self.current == Token::Question {
            self.consume()?;
            let consequent = self.descend(Self::parse_conditional)?;
            self.expect(&Token::Colon)?;
            let alternate = self.descend(Self::parse_conditional)?;
            return Ok(Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }

        Ok(test)
    }

    fn parse_nullish(&mut self) -> FormulaResult<Expr> {
        self.parse_logical(Token::QuestionQuestion, LogicalOperator::Nullish, Self::parse_or)
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        self.parse_logical(Token::OrOr, LogicalOperator::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        self.parse_logical(Token::AndAnd, LogicalOperator::And, Self::parse_equality)
    }

    fn parse_equality(&mut self) -> FormulaResult<Expr> {
        self.parse_binary(
            |token| match token {
                Token::EqualEqual => Some(BinaryOperator::Equal),
                Token::NotEqual => Some(BinaryOperator::NotEqual),
                Token::StrictEqual => Some(BinaryOperator::StrictEqual),
                Token::StrictNotEqual => Some(BinaryOperator::StrictNotEqual),
                _ => None,
            },
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> FormulaResult<Expr> {
        self.parse_binary(
            |token| match token {
                Token::LessThan => Some(BinaryOperator::LessThan),
                Token::LessEqual => Some(BinaryOperator::LessEqual),
                Token::GreaterThan => Some(BinaryOperator::GreaterThan),
                Token::GreaterEqual => Some(BinaryOperator::GreaterEqual),
                _ => None,
            },
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        self.parse_binary(
            |token| match token {
                Token::Plus => Some(BinaryOperator::Add),
                Token::Minus => Some(BinaryOperator::Subtract),
                _ => None,
            },
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        self.parse_binary(
            |token| match token {
                Token::Star => Some(BinaryOperator::Multiply),
                Token::Slash => Some(BinaryOperator::Divide),
                Token::Percent => Some(BinaryOperator::Remainder),
                _ => None,
            },
            Self::parse_exponent,
        )
    }

    /// One precedence level of `&&`, `||` or `??`, collected flat
    fn parse_logical(
        &mut self,
        token: Token,
        op: LogicalOperator,
        operand: fn(&mut Self) -> FormulaResult<Expr>,
    ) -> FormulaResult<Expr> {
        let first = operand(self)?;
        if self.current != token {
            return Ok(first);
        }

        let mut operands = vec![first];
        while self.current == token {
            self.consume()?;
            operands.push(operand(self)?);
        }
        Ok(Expr::Logical { op, operands })
    }

    /// One left-associative precedence level, collected flat so a long
    /// chain does not deepen the tree
    fn parse_binary(
        &mut self,
        operator: fn(&Token) -> Option<BinaryOperator>,
        operand: fn(&mut Self) -> FormulaResult<Expr>,
    ) -> FormulaResult<Expr> {
        let first = operand(self)?;
        let mut rest = Vec::new();
        while let Some(op) = operator(&self.current) {
            self.consume()?;
            rest.push((op, operand(self)?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Binary {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_exponent(&mut self) -> FormulaResult<Expr> {
        let starts_with_unary = matches!(
            self.current,
            Token::Minus | Token::Plus | Token::Bang | Token::Typeof
        );
        let left = self.parse_unary()?;

        if self.current == Token::StarStar {
            // -2 ** 2 is ambiguous and rejected; (-2) ** 2 is fine
            if starts_with_unary {
                return Err(FormulaError::syntax(
                    "Unary operator used immediately before exponentiation expression",
                    self.token_start,
                ));
            }
            self.consume()?;
            let right = self.descend(Self::parse_exponent)?; // Right associative
            return Ok(Expr::Binary {
                first: Box::new(left),
                rest: vec![(BinaryOperator::Power, right)],
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.current {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            Token::Bang => UnaryOperator::Not,
            Token::Typeof => UnaryOperator::TypeOf,
            _ => return self.parse_postfix(),
        };

        self.consume()?;
        let operand = self.descend(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> FormulaResult<Expr> {
        let start = self.token_start;
        let mut expr = self.parse_primary()?;

        // Each link wraps the chain so far one level deeper
        let depth = self.depth;
        loop {
            if matches!(
                self.current,
                Token::Dot | Token::LeftBracket | Token::LeftParen
            ) {
                self.enter()?;
            }
            match self.current {
                Token::Dot => {
                    self.consume()?;
                    let property = self.property_name().ok_or_else(|| self.unexpected())?;
                    self.consume()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        span: Span::new(start, self.prev_end),
                    };
                }
                Token::LeftBracket => {
                    self.consume()?;
                    let index = self.parse_expression()?;
                    self.expect(&Token::RightBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::LeftParen => {
                    self.consume()?;
                    let args = self.parse_list(&Token::RightParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }
        self.depth = depth;

        Ok(expr)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.current.clone() {
            Token::Number(n) => {
                self.consume()?;
                Ok(Expr::Number(n))
            }

            Token::String(s) => {
                self.consume()?;
                Ok(Expr::Text(s))
            }

            Token::True => {
                self.consume()?;
                Ok(Expr::Boolean(true))
            }

            Token::False => {
                self.consume()?;
                Ok(Expr::Boolean(false))
            }

            Token::Null => {
                self.consume()?;
                Ok(Expr::Null)
            }

            Token::Identifier(name) => {
                let span = Span::new(self.token_start, self.token_end);
                self.consume()?;
                Ok(match name.as_str() {
                    "undefined" => Expr::Undefined,
                    "NaN" => Expr::Number(f64::NAN),
                    "Infinity" => Expr::Number(f64::INFINITY),
                    _ => Expr::Ident { name, span },
                })
            }

            Token::LeftParen => {
                self.consume()?;
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBracket => {
                self.consume()?;
                let items = self.parse_list(&Token::RightBracket)?;
                Ok(Expr::Array(items))
            }

            Token::LeftBrace => self.parse_object(),

            _ => Err(self.unexpected()),
        }
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed
    fn parse_list(&mut self, close: &Token) -> FormulaResult<Vec<Expr>> {
        let mut items = Vec::new();

        while self.current != *close {
            items.push(self.parse_expression()?);
            if self.current == Token::Comma {
                self.consume()?;
            } else {
                break;
            }
        }

        self.expect(close)?;
        Ok(items)
    }

    fn parse_object(&mut self) -> FormulaResult<Expr> {
        self.expect(&Token::LeftBrace)?;

        let mut props = Vec::new();
        while self.current != Token::RightBrace {
            let key = match &self.current {
                Token::String(s) => s.clone(),
                Token::Number(n) => format_number(*n),
                _ => self.property_name().ok_or_else(|| self.unexpected())?,
            };
            let key_span = Span::new(self.token_start, self.token_end);
            let key_token = self.consume()?;

            if self.current == Token::Colon {
                self.consume()?;
                let value = self.parse_expression()?;
                props.push(Property {
                    key,
                    value,
                    shorthand: false,
                });
            } else if let Token::Identifier(name) = key_token {
                props.push(Property {
                    key,
                    value: Expr::Ident {
                        name,
                        span: key_span,
                    },
                    shorthand: true,
                });
            } else {
                return Err(self.unexpected());
            }

            if self.current == Token::Comma {
                self.consume()?;
            } else {
                break;
            }
        }

        self.expect(&Token::RightBrace)?;
        Ok(Expr::Object(props))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str, start: usize) -> Expr {
        Expr::ident(name, Span::new(start, start + name.len()))
    }

    fn syntax_position(text: &str) -> usize {
        match parse(text) {
            Err(FormulaError::Syntax { position, .. }) => position,
            other => panic!("Expected syntax error for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse("").unwrap(), Expr::Empty);
        assert_eq!(parse("   \n").unwrap(), Expr::Empty);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("3.14").unwrap(), Expr::Number(3.14));
        assert_eq!(parse(".5").unwrap(), Expr::Number(0.5));
        assert_eq!(parse("1e3").unwrap(), Expr::Number(1000.0));
        assert_eq!(parse("2.5E-1").unwrap(), Expr::Number(0.25));
        assert_eq!(parse("0xff").unwrap(), Expr::Number(255.0));
        assert!(parse("3abc").is_err());
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(parse("'Hello'").unwrap(), Expr::Text("Hello".into()));
        assert_eq!(
            parse(r#""say \"hi\"\n""#).unwrap(),
            Expr::Text("say \"hi\"\n".into())
        );
        assert_eq!(parse(r"'A\u{1F600}'").unwrap(), Expr::Text("A\u{1F600}".into()));
        assert_eq!(syntax_position("1 + 'open"), 4);
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("true").unwrap(), Expr::Boolean(true));
        assert_eq!(parse("null").unwrap(), Expr::Null);
        assert_eq!(parse("undefined").unwrap(), Expr::Undefined);
        assert!(matches!(parse("NaN").unwrap(), Expr::Number(n) if n.is_nan()));
    }

    #[test]
    fn test_parse_identifier_spans() {
        assert_eq!(parse("$price").unwrap(), ident("$price", 0));
        assert_eq!(parse("  qty").unwrap(), ident("qty", 2));
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let ast = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            ast,
            Expr::Binary {
                first: Box::new(Expr::Number(1.0)),
                rest: vec![(
                    BinaryOperator::Add,
                    Expr::Binary {
                        first: Box::new(Expr::Number(2.0)),
                        rest: vec![(BinaryOperator::Multiply, Expr::Number(3.0))],
                    }
                )],
            }
        );
    }

    #[test]
    fn test_parse_flat_chains() {
        let ast = parse("1 - 2 + 3").unwrap();
        assert_eq!(
            ast,
            Expr::Binary {
                first: Box::new(Expr::Number(1.0)),
                rest: vec![
                    (BinaryOperator::Subtract, Expr::Number(2.0)),
                    (BinaryOperator::Add, Expr::Number(3.0)),
                ],
            }
        );

        let ast = parse("a && b && c").unwrap();
        assert!(matches!(
            ast,
            Expr::Logical { op: LogicalOperator::And, ref operands } if operands.len() == 3
        ));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("a"));
        assert!(is_identifier("_x1"));
        assert!(is_identifier("$price"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("é"));
        assert!(!is_identifier("NaN"));
        assert!(!is_identifier("typeof"));
        assert!(!is_identifier("new"));
    }

    #[test]
    fn test_parse_long_chain_is_shallow() {
        let text = vec!["1"; 10_000].join(" + ");
        match parse_with_max_depth(&text, 8).unwrap() {
            Expr::Binary { rest, .. } => assert_eq!(rest.len(), 9_999),
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_postfix_chain_depth() {
        let members = format!("a{}", ".b".repeat(10_000));
        let err = parse(&members).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));

        let calls = format!("f{}", "()".repeat(10_000));
        assert!(parse(&calls).is_err());
        assert!(parse_with_max_depth("a[0][1].b(2)", 8).is_ok());
        assert!(parse_with_max_depth("a[0][1].b(2)", 4).is_err());
    }

    #[test]
    fn test_parse_power_is_right_associative() {
        let ast = parse("2 ** 3 ** 2").unwrap();
        assert_eq!(
            ast,
            Expr::Binary {
                first: Box::new(Expr::Number(2.0)),
                rest: vec![(
                    BinaryOperator::Power,
                    Expr::Binary {
                        first: Box::new(Expr::Number(3.0)),
                        rest: vec![(BinaryOperator::Power, Expr::Number(2.0))],
                    }
                )],
            }
        );

        assert!(parse("-2 ** 2").is_err());
        assert!(parse("(-2) ** 2").is_ok());
    }

    #[test]
    fn test_parse_logical_and_conditional() {
        let ast = parse("a || b && c").unwrap();
        assert!(matches!(
            ast,
            Expr::Logical {
                op: LogicalOperator::Or,
                ..
            }
        ));

        let ast = parse("a ? b : c ? d : e").unwrap();
        if let Expr::Conditional { alternate, .. } = ast {
            assert!(matches!(*alternate, Expr::Conditional { .. }));
        } else {
            panic!("Expected Conditional");
        }

        assert!(matches!(
            parse("a ?? 0").unwrap(),
            Expr::Logical {
                op: LogicalOperator::Nullish,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_member_call_chain() {
        let ast = parse("Math.max(1, 2,)").unwrap();
        assert_eq!(
            ast,
            Expr::Call {
                callee: Box::new(Expr::Member {
                    object: Box::new(ident("Math", 0)),
                    property: "max".into(),
                    span: Span::new(0, 8),
                }),
                args: vec![Expr::Number(1.0), Expr::Number(2.0)],
            }
        );

        let ast = parse("a[0].b").unwrap();
        assert!(matches!(ast, Expr::Member { ref property, .. } if property == "b"));
    }

    #[test]
    fn test_parse_array_and_object() {
        assert_eq!(
            parse("[1, 'a',]").unwrap(),
            Expr::Array(vec![Expr::Number(1.0), Expr::Text("a".into())])
        );

        let ast = parse("{ k: 1, 'k2': 2, k3 }").unwrap();
        assert_eq!(
            ast,
            Expr::Object(vec![
                Property {
                    key: "k".into(),
                    value: Expr::Number(1.0),
                    shorthand: false
                },
                Property {
                    key: "k2".into(),
                    value: Expr::Number(2.0),
                    shorthand: false
                },
                Property {
                    key: "k3".into(),
                    value: ident("k3", 17),
                    shorthand: true
                },
            ])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(syntax_position("1 +"), 3);
        assert_eq!(syntax_position("(1"), 2);
        assert_eq!(syntax_position("1 2"), 2);
        assert_eq!(syntax_position("a = 1"), 2);
        assert_eq!(syntax_position("new Date()"), 0);
        assert_eq!(syntax_position("a # b"), 2);
    }

    #[test]
    fn test_parse_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert!(parse_with_max_depth(&deep, 100).is_ok());
        let err = parse_with_max_depth(&deep, 10).unwrap_err();
        assert!(matches!(err, FormulaError::Syntax { .. }));
        assert!(err.to_string().contains("nested too deeply"));
    }
}
