use crate::parser::Parser;
use crate::Cursor;

pub fn lit(lit: &'static str) -> Lit {
    Lit { lit }
}

pub struct Lit {
    lit: &'static str,
}

impl<'a> Parser<'a> for Lit {
    type Attribute = ();
    type Error = ();

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        if !cur.has_next_str(self.lit) {
            Err(())
        } else {
            Ok(((), cur.advance(self.lit.len())))
        }
    }
}

pub fn char_<P: Fn(char) -> bool>(predicate: P) -> Char<P> {
    Char { predicate }
}

/// A single character matching `predicate` (alias of [`char_`] under the
/// name the tokenizer grammar comments use, for use inside `kleene`/`plus`).
pub fn chars<P: Fn(char) -> bool>(predicate: P) -> Char<P> {
    char_(predicate)
}

pub struct Char<P: Fn(char) -> bool> {
    predicate: P,
}

impl<'a, P: Fn(char) -> bool> Parser<'a> for Char<P> {
    type Attribute = ();
    type Error = ();

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        if let Some(c) = cur.next_char() {
            if (self.predicate)(c) {
                return Ok(((), cur.advance(1)));
            }
        }
        Err(())
    }
}

/// A run of one or more characters matching `predicate`, returned as the
/// consumed slice.
pub fn bytes<P: Fn(char) -> bool>(predicate: P) -> Bytes<P> {
    Bytes { predicate }
}

pub struct Bytes<P: Fn(char) -> bool> {
    predicate: P,
}

impl<'a, P: Fn(char) -> bool> Parser<'a> for Bytes<P> {
    type Attribute = &'a str;
    type Error = ();

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let end = cur
            .rest()
            .char_indices()
            .find(|&(_, c)| !(self.predicate)(c))
            .map(|(i, _)| i)
            .unwrap_or_else(|| cur.rest().len());
        if end == 0 {
            Err(())
        } else {
            Ok(cur.advance2(end))
        }
    }
}
