//! Hand-rolled tokenizer for the minimal frontend (§6a). Not the subject of
//! this compiler's engineering effort — just enough to drive the pipeline.

use crate::diagnostics::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    Ident(String),
    Kw(&'static str),
    Punct(&'static str),
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

const KEYWORDS: &[&str] = &[
    "void", "bool", "int", "float", "string", "const", "if", "else", "while", "do", "for",
    "break", "continue", "return", "print", "read", "true", "false",
];

const PUNCTS: &[&str] = &[
    "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "<", ">", "=", "!", "&", "(", ")",
    "{", "}", "[", "]", ";", ",", "?", ":",
];

pub fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut out = Vec::new();
    let bytes: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut line = 1usize;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if bytes.get(i + 1) == Some(&'/') => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '"' => {
                let start_line = line;
                i += 1;
                let mut s = String::new();
                while i < bytes.len() && bytes[i] != '"' {
                    if bytes[i] == '\\' && i + 1 < bytes.len() {
                        let esc = match bytes[i + 1] {
                            'n' => '\n',
                            'r' => '\r',
                            't' => '\t',
                            'a' => '\x07',
                            '"' => '"',
                            '\\' => '\\',
                            other => other,
                        };
                        s.push(esc);
                        i += 2;
                    } else {
                        s.push(bytes[i]);
                        i += 1;
                    }
                }
                if i >= bytes.len() {
                    return Err(ParseError { line: start_line, message: "unterminated string literal".into() });
                }
                i += 1;
                out.push(Token { tok: Tok::StrLit(s), line: start_line });
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let mut is_float = false;
                if i < bytes.len() && bytes[i] == '.' {
                    is_float = true;
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = bytes[start..i].iter().collect();
                if is_float {
                    out.push(Token { tok: Tok::FloatLit(text.parse().unwrap()), line });
                } else {
                    out.push(Token { tok: Tok::IntLit(text.parse().unwrap()), line });
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_alphanumeric() || bytes[i] == '_') {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                if let Some(&kw) = KEYWORDS.iter().find(|&&k| k == text) {
                    out.push(Token { tok: Tok::Kw(kw), line });
                } else {
                    out.push(Token { tok: Tok::Ident(text), line });
                }
            }
            _ => {
                let mut matched = None;
                for &p in PUNCTS {
                    let plen = p.len();
                    if i + plen <= bytes.len() && bytes[i..i + plen].iter().collect::<String>() == p {
                        matched = Some(p);
                        break;
                    }
                }
                match matched {
                    Some(p) => {
                        out.push(Token { tok: Tok::Punct(p), line });
                        i += p.len();
                    }
                    None => return Err(ParseError { line, message: format!("unexpected character '{c}'") }),
                }
            }
        }
    }
    out.push(Token { tok: Tok::Eof, line });
    Ok(out)
}
