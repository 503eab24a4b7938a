//! Recursive-descent parser for the shape and geometry literals that
//! challenge authors type: `(4, 4)`, `(8,)`, `[(4, 4), (4, 4)]`, `(1, 1, 1)`.
//!
//! Grammar (whitespace allowed between tokens):
//! ```text
//! list  := '[' ( tuple ( ',' tuple )* ','? )? ']'
//! tuple := '(' ( int ( ',' int )* ','? )? ')'
//! int   := [0-9]+
//! ```
//! A single-element tuple needs its trailing comma, as in Python: `(8)` is a
//! parenthesised integer, not a shape, and is rejected.

use crate::{CoreError, LaunchGeometry, Result, Shape};

/// Parse one shape literal such as `(4, 4)`.
pub fn parse_shape(input: &str) -> Result<Shape> {
    let mut p = Parser::new(input);
    let dims = p.tuple()?;
    p.finish()?;
    shape_from_dims(dims, 0)
}

/// Parse a list of shapes such as `[(4, 4), (4, 4)]`.
pub fn parse_shape_list(input: &str) -> Result<Vec<Shape>> {
    let mut p = Parser::new(input);
    let tuples = p.list()?;
    p.finish()?;
    tuples
        .into_iter()
        .map(|(pos, dims)| shape_from_dims(dims, pos))
        .collect()
}

/// Parse a 3-tuple of positive extents such as `(256, 1, 1)`.
pub fn parse_extent(input: &str) -> Result<[u32; 3]> {
    let mut p = Parser::new(input);
    let start = p.pos;
    let dims = p.tuple()?;
    p.finish()?;
    if dims.len() != 3 {
        return Err(CoreError::Parse {
            pos: start,
            msg: format!("expected tuple[int, int, int], got {} element(s)", dims.len()),
        });
    }
    let mut out = [0u32; 3];
    for (slot, &d) in out.iter_mut().zip(dims.iter()) {
        if d == 0 {
            return Err(CoreError::Parse {
                pos: start,
                msg: "launch extents must be positive".to_string(),
            });
        }
        *slot = u32::try_from(d).map_err(|_| CoreError::Parse {
            pos: start,
            msg: format!("extent {d} does not fit in 32 bits"),
        })?;
    }
    Ok(out)
}

/// Parse a global/local pair of extent literals into a launch geometry.
pub fn parse_geometry(global: &str, local: &str) -> Result<LaunchGeometry> {
    LaunchGeometry::new(parse_extent(global)?, parse_extent(local)?)
}

fn shape_from_dims(dims: Vec<usize>, pos: usize) -> Result<Shape> {
    if dims.iter().any(|&d| d == 0) {
        return Err(CoreError::Parse {
            pos,
            msg: "shape dimensions must be positive".to_string(),
        });
    }
    Ok(Shape::from(dims))
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { src: input.as_bytes(), pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn error<T>(&self, msg: impl Into<String>) -> Result<T> {
        Err(CoreError::Parse { pos: self.pos, msg: msg.into() })
    }

    fn expect(&mut self, ch: u8) -> Result<()> {
        match self.peek() {
            Some(c) if c == ch => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => self.error(format!("expected '{}', found '{}'", ch as char, c as char)),
            None => self.error(format!("expected '{}', found end of input", ch as char)),
        }
    }

    fn finish(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(c) => self.error(format!("unexpected trailing '{}'", c as char)),
        }
    }

    fn list(&mut self) -> Result<Vec<(usize, Vec<usize>)>> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(b'(') => {
                    let start = self.pos;
                    items.push((start, self.tuple()?));
                }
                Some(c) => return self.error(format!("expected '(' or ']', found '{}'", c as char)),
                None => return self.error("unterminated list"),
            }
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                Some(c) => return self.error(format!("expected ',' or ']', found '{}'", c as char)),
                None => return self.error("unterminated list"),
            }
        }
    }

    fn tuple(&mut self) -> Result<Vec<usize>> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(c) if c.is_ascii_digit() => items.push(self.int()?),
                Some(c) => return self.error(format!("expected integer or ')', found '{}'", c as char)),
                None => return self.error("unterminated tuple"),
            }
            trailing_comma = false;
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    trailing_comma = true;
                }
                Some(b')') => {}
                Some(c) => return self.error(format!("expected ',' or ')', found '{}'", c as char)),
                None => return self.error("unterminated tuple"),
            }
        }
        if items.len() == 1 && !trailing_comma {
            return self.error("single-element tuple needs a trailing comma, e.g. (8,)");
        }
        Ok(items)
    }

    fn int(&mut self) -> Result<usize> {
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        // Only ASCII digits were consumed.
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        text.parse::<usize>().map_err(|_| CoreError::Parse {
            pos: start,
            msg: format!("integer '{text}' out of range"),
        })
    }
}
