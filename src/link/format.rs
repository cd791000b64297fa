//! Line grammar of call graph fragments.
//!
//! ```text
//! F <file>                                  following nodes belong to <file>
//! I <file>                                  link <file> after this one
//! ---                                       end of fragment
//! <id> (<line>) [@static] [@decl] [@var] <name> [-> <canon>] <token>*
//! ```
//!
//! A token is a callee id, `*` (legacy pointer-call marker) or
//! `^<id>[:<n>]` (parent link). Text after `#` is a comment.

use thiserror::Error;

/// One parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    File(String),
    Include(String),
    FragmentEnd,
    Node(NodeLine),
}

/// A node line, still in fragment-local ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLine {
    pub id: u64,
    pub line: u32,
    pub is_static: bool,
    pub is_decl: bool,
    pub is_var: bool,
    pub name: String,
    /// Canonical name after `->`.
    pub alias: Option<String>,
    /// `@` flags this grammar does not know; the linker reports them.
    pub unknown_flags: Vec<String>,
    pub tokens: Vec<NodeToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeToken {
    Callee(u64),
    PointerCall,
    Parent { id: u64, arg: Option<u32> },
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedLine {
    #[error("`{0}` line without a file name")]
    MissingFile(&'static str),
    #[error("invalid symbol id `{0}`")]
    BadId(String),
    #[error("missing or invalid `(line)` field")]
    BadLineNumber,
    #[error("missing symbol name")]
    MissingName,
    #[error("`->` without a canonical name")]
    MissingAlias,
    #[error("invalid token `{0}`")]
    BadToken(String),
}

/// Parse one line. Blank and comment-only lines yield `Ok(None)`.
pub fn parse_line(raw: &str) -> Result<Option<Record>, MalformedLine> {
    let text = match raw.find('#') {
        Some(pos) => &raw[..pos],
        None => raw,
    }
    .trim();
    if text.is_empty() {
        return Ok(None);
    }
    if text == "---" {
        return Ok(Some(Record::FragmentEnd));
    }
    if let Some(rest) = directive(text, "F") {
        return non_empty(rest, "F").map(|f| Some(Record::File(f)));
    }
    if let Some(rest) = directive(text, "I") {
        return non_empty(rest, "I").map(|f| Some(Record::Include(f)));
    }
    parse_node(text).map(|n| Some(Record::Node(n)))
}

fn directive<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(tag)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn non_empty(rest: &str, tag: &'static str) -> Result<String, MalformedLine> {
    if rest.is_empty() {
        Err(MalformedLine::MissingFile(tag))
    } else {
        Ok(rest.to_string())
    }
}

fn parse_node(text: &str) -> Result<NodeLine, MalformedLine> {
    let mut words = text.split_whitespace().peekable();

    let id_word = words.next().unwrap_or_default();
    let id = id_word
        .parse::<u64>()
        .map_err(|_| MalformedLine::BadId(id_word.to_string()))?;

    let line = words
        .next()
        .and_then(|w| w.strip_prefix('('))
        .and_then(|w| w.strip_suffix(')'))
        .and_then(|w| w.parse::<u32>().ok())
        .ok_or(MalformedLine::BadLineNumber)?;

    let mut node = NodeLine {
        id,
        line,
        is_static: false,
        is_decl: false,
        is_var: false,
        name: String::new(),
        alias: None,
        unknown_flags: Vec::new(),
        tokens: Vec::new(),
    };

    while let Some(flag) = words.next_if(|w| w.starts_with('@')) {
        match flag {
            "@static" => node.is_static = true,
            "@decl" => node.is_decl = true,
            "@var" => node.is_var = true,
            other => node.unknown_flags.push(other.to_string()),
        }
    }

    node.name = words.next().ok_or(MalformedLine::MissingName)?.to_string();

    if words.next_if_eq(&"->").is_some() {
        node.alias = Some(words.next().ok_or(MalformedLine::MissingAlias)?.to_string());
    }

    for word in words {
        node.tokens.push(parse_token(word)?);
    }
    Ok(node)
}

fn parse_token(word: &str) -> Result<NodeToken, MalformedLine> {
    let bad = || MalformedLine::BadToken(word.to_string());
    if word == "*" {
        return Ok(NodeToken::PointerCall);
    }
    if let Some(parent) = word.strip_prefix('^') {
        let (id, arg) = match parent.split_once(':') {
            Some((id, n)) => (id, Some(n.parse::<u32>().map_err(|_| bad())?)),
            None => (parent, None),
        };
        let id = id.parse::<u64>().map_err(|_| bad())?;
        return Ok(NodeToken::Parent { id, arg });
    }
    word.parse::<u64>().map(NodeToken::Callee).map_err(|_| bad())
}
