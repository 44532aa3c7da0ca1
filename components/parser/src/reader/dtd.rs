use crate::parser::core::optional;
use crate::parser::Parser;
use crate::reader::{xml_lit, NameToken, RawAttValueToken, SToken};
use crate::{Cursor, XmlError};

// 2.8 Prolog and Document Type Declaration
// Document Type Declaration

/// `SYSTEM SystemLiteral` or `PUBLIC PubidLiteral SystemLiteral`.
#[derive(Clone, Debug, PartialEq)]
pub enum ExternalId<'a> {
    System { system_id: &'a str },
    Public {
        public_id: &'a str,
        system_id: &'a str,
    },
}

/// The `doctypedecl` production, captured for handoff to a DTD grammar
/// parser: the document element name, an optional external identifier, and
/// the verbatim text of the internal subset (if any), still unexpanded.
#[derive(Clone, Debug, PartialEq)]
pub struct DocTypeDecl<'a> {
    pub name: &'a str,
    pub external_id: Option<ExternalId<'a>>,
    pub internal_subset: Option<&'a str>,
}

/// doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? ('[' intSubset ']' S?)? '>'
pub struct DocTypeDeclToken;

impl<'a> Parser<'a> for DocTypeDeclToken {
    type Attribute = DocTypeDecl<'a>;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (_, cursor) = xml_lit("<!DOCTYPE").parse(cursor)?;
        let (_, cursor) = SToken.parse(cursor)?;
        let (name, cursor) = NameToken.parse(cursor)?;

        let (external_id, cursor) = optional((SToken, ExternalIdToken))
            .parse(cursor)
            .map(|(eid, cursor)| (eid.map(|(_, eid)| eid), cursor))?;

        let (_, cursor) = optional(SToken).parse(cursor)?;

        let (internal_subset, cursor) = if cursor.next_byte(0) == Some(b'[') {
            let (subset, cursor) = take_internal_subset(cursor.advance(1))?;
            let (_, cursor) = optional(SToken).parse(cursor)?;
            (Some(subset), cursor)
        } else {
            (None, cursor)
        };

        let cursor = if cursor.next_byte(0) == Some(b'>') {
            cursor.advance(1)
        } else {
            return Err(XmlError::ExpectToken(">"));
        };

        Ok((
            DocTypeDecl {
                name,
                external_id,
                internal_subset,
            },
            cursor,
        ))
    }
}

/// ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral
struct ExternalIdToken;

impl<'a> Parser<'a> for ExternalIdToken {
    type Attribute = ExternalId<'a>;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        if let Ok((_, cursor)) = xml_lit("SYSTEM").parse(cursor) {
            let (_, cursor) = SToken.parse(cursor)?;
            let (system_id, cursor) = RawAttValueToken.parse(cursor)?;
            return Ok((ExternalId::System { system_id }, cursor));
        }

        let (_, cursor) = xml_lit("PUBLIC").parse(cursor)?;
        let (_, cursor) = SToken.parse(cursor)?;
        let (public_id, cursor) = RawAttValueToken.parse(cursor)?;
        let (_, cursor) = SToken.parse(cursor)?;
        let (system_id, cursor) = RawAttValueToken.parse(cursor)?;

        Ok((
            ExternalId::Public {
                public_id,
                system_id,
            },
            cursor,
        ))
    }
}

/// Scans to the `]` that closes the internal subset, skipping quoted string
/// literals (which may themselves contain `]`) and the `]]>` CDATA-section
/// terminator shape does not apply here, only bare `]`.
fn take_internal_subset<'a>(cursor: Cursor<'a>) -> Result<(&'a str, Cursor<'a>), XmlError> {
    let mut quote: Option<u8> = None;
    for (i, &b) in cursor.rest_bytes().iter().enumerate() {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b']' => return Ok(cursor.advance2(i)),
                _ => {}
            },
        }
    }
    Err(XmlError::UnexpectedEof)
}
