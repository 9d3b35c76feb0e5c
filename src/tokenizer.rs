use log::debug;

use crate::error::{lexer_error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Comma,
    Colon,

    Plus,
    Minus,
    Star,
    Slash,
    Caret,

    Assign,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    NotEqual,
    Equal,

    Mod,
    Div,
    And,
    Or,
    Not,

    Identifier,
    Integer,
    Real,
    String,
    True,
    False,

    Program,
    Constants,
    Variables,
    Integers,
    Reals,
    Strings,
    Booleans,
    Start,
    EndOfProgram,

    Print,
    Read,

    If,
    Then,
    ElseIf,
    Else,
    EndIf,

    While,
    Repeat,
    EndLoop,
    StartLoop,
    RepeatUntil,

    For,
    From,
    Until,
    Step,

    Function,
    EndFunction,
    ReturnType,
    Procedure,
    EndProcedure,
    Call,

    EndOfLine,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
    /// Raw content of a trailing `[...]` suffix. Not tokenized here; the
    /// parser re-enters its own pipeline to interpret it.
    pub subscript: Option<String>,
}

impl Token {
    fn simple(text: &str, kind: TokenKind, line: u32, column: u32) -> Token {
        Token {
            text: text.to_string(),
            kind,
            line,
            column,
            subscript: None,
        }
    }
}

pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line: u32 = 1;
    let mut column: u32 = 1;

    while i < n {
        let c = chars[i];
        let start_line = line;
        let start_column = column;

        match c {
            ' ' | '\t' | '\r' => {
                i += 1;
                column += 1;
            }
            '\n' => {
                tokens.push(Token::simple("\n", TokenKind::EndOfLine, start_line, start_column));
                i += 1;
                line += 1;
                column = 1;
            }
            '!' => {
                // line comment
                while i < n && chars[i] != '\n' {
                    i += 1;
                    column += 1;
                }
            }
            '(' | ')' | ',' | ':' | '+' | '-' | '*' | '/' | '^' | '=' => {
                let kind = match c {
                    '(' => TokenKind::LeftParen,
                    ')' => TokenKind::RightParen,
                    ',' => TokenKind::Comma,
                    ':' => TokenKind::Colon,
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '^' => TokenKind::Caret,
                    _ => TokenKind::Equal,
                };
                tokens.push(Token::simple(&c.to_string(), kind, start_line, start_column));
                i += 1;
                column += 1;
            }
            '<' => {
                let (text, kind, width) = match chars.get(i + 1) {
                    Some('-') => ("<-", TokenKind::Assign, 2),
                    Some('>') => ("<>", TokenKind::NotEqual, 2),
                    Some('=') => ("<=", TokenKind::LessEqual, 2),
                    _ => ("<", TokenKind::Less, 1),
                };
                tokens.push(Token::simple(text, kind, start_line, start_column));
                i += width;
                column += width as u32;
            }
            '>' => {
                let (text, kind, width) = match chars.get(i + 1) {
                    Some('=') => (">=", TokenKind::GreaterEqual, 2),
                    _ => (">", TokenKind::Greater, 1),
                };
                tokens.push(Token::simple(text, kind, start_line, start_column));
                i += width;
                column += width as u32;
            }
            '\'' => {
                i += 1;
                column += 1;
                let mut literal = String::new();
                while i < n && chars[i] != '\'' && chars[i] != '\n' {
                    literal.push(chars[i]);
                    i += 1;
                    column += 1;
                }
                if i >= n || chars[i] != '\'' {
                    return lexer_error(format!(
                        "Λάθος στην γραμμή {line}, στήλη {column}, δεν έχει κλείσει το απόστροφο"
                    ));
                }
                i += 1;
                column += 1;
                tokens.push(Token {
                    text: literal,
                    kind: TokenKind::String,
                    line: start_line,
                    column: start_column,
                    subscript: None,
                });
            }
            '"' => {
                return lexer_error(format!(
                    "Στην γραμμή {start_line}, στήλη {start_column}, χρησιμοποίησε απόστροφο αντί για εισαγωγικά"
                ));
            }
            c if is_lexeme_char(c) => {
                let mut lexeme = String::new();
                let mut cell = String::new();
                let mut has_cell = false;
                while i < n {
                    let ch = chars[i];
                    if ch == '[' {
                        has_cell = true;
                        i += 1;
                        column += 1;
                        // capture bracket content verbatim, minus whitespace
                        while i < n && chars[i] != ']' && chars[i] != '\n' {
                            if chars[i] != ' ' && chars[i] != '\t' {
                                cell.push(chars[i]);
                            }
                            i += 1;
                            column += 1;
                        }
                        if i < n && chars[i] == ']' {
                            i += 1;
                            column += 1;
                        }
                    } else if is_lexeme_char(ch) {
                        lexeme.push(ch);
                        i += 1;
                        column += 1;
                    } else {
                        break;
                    }
                }
                let subscript = if has_cell { Some(cell) } else { None };
                tokens.push(classify_lexeme(lexeme, subscript, c, start_line, start_column)?);
            }
            _ => {
                return lexer_error(format!(
                    "Άγνωστος χαρακτήρας: '{c}' στην γραμμή {start_line}, στήλη {start_column}"
                ));
            }
        }
    }

    // blank lines carry no meaning beyond acting as a single separator
    tokens.dedup_by(|a, b| {
        a.kind == TokenKind::EndOfLine && b.kind == TokenKind::EndOfLine
    });
    tokens.push(Token::simple("EOF", TokenKind::Eof, line, column));

    debug!("produced {} tokens", tokens.len());
    Ok(tokens)
}

fn is_lexeme_char(c: char) -> bool {
    c.is_alphabetic() || c.is_ascii_digit() || c == '.' || c == '_'
}

fn classify_lexeme(
    lexeme: String,
    subscript: Option<String>,
    first: char,
    line: u32,
    column: u32,
) -> Result<Token> {
    if let Some((kind, canonical)) = keyword(&lexeme) {
        return Ok(Token {
            text: canonical,
            kind,
            line,
            column,
            subscript: None,
        });
    }
    if first.is_ascii_digit() || first == '.' {
        let kind = if lexeme.contains('.') {
            if lexeme.parse::<f64>().is_err() {
                return lexer_error(format!(
                    "Μη έγκυρος αριθμός '{lexeme}' στην γραμμή {line}, στήλη {column}"
                ));
            }
            TokenKind::Real
        } else {
            if lexeme.parse::<i64>().is_err() {
                return lexer_error(format!(
                    "Μη έγκυρος αριθμός '{lexeme}' στην γραμμή {line}, στήλη {column}"
                ));
            }
            TokenKind::Integer
        };
        return Ok(Token {
            text: lexeme,
            kind,
            line,
            column,
            subscript: None,
        });
    }
    if first.is_alphabetic() {
        return Ok(Token {
            text: lexeme,
            kind: TokenKind::Identifier,
            line,
            column,
            subscript,
        });
    }
    lexer_error(format!(
        "Άγνωστος χαρακτήρας: '{first}' στην γραμμή {line}, στήλη {column}"
    ))
}

/// Case-insensitive keyword lookup. Lexemes are upper-cased and stripped of
/// tonos first; the returned text is the canonical spelling.
fn keyword(lexeme: &str) -> Option<(TokenKind, String)> {
    // the disjunction keyword keeps its tonos so that a bare eta
    // identifier is not mistaken for it
    if lexeme == "Ή" || lexeme == "ή" {
        return Some((TokenKind::Or, "Ή".to_string()));
    }
    let normalized: String = lexeme
        .chars()
        .flat_map(char::to_uppercase)
        .map(strip_tonos)
        .collect();
    let kind = match normalized.as_str() {
        "ΠΡΟΓΡΑΜΜΑ" => TokenKind::Program,
        "ΣΤΑΘΕΡΕΣ" => TokenKind::Constants,
        "ΜΕΤΑΒΛΗΤΕΣ" => TokenKind::Variables,
        "ΑΚΕΡΑΙΕΣ" => TokenKind::Integers,
        "ΠΡΑΓΜΑΤΙΚΕΣ" => TokenKind::Reals,
        "ΧΑΡΑΚΤΗΡΕΣ" => TokenKind::Strings,
        "ΛΟΓΙΚΕΣ" => TokenKind::Booleans,
        "ΑΡΧΗ" => TokenKind::Start,
        "ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ" => TokenKind::EndOfProgram,
        "ΓΡΑΨΕ" => TokenKind::Print,
        "ΔΙΑΒΑΣΕ" => TokenKind::Read,
        "ΑΝ" => TokenKind::If,
        "ΤΟΤΕ" => TokenKind::Then,
        "ΑΛΛΙΩΣ_ΑΝ" => TokenKind::ElseIf,
        "ΑΛΛΙΩΣ" => TokenKind::Else,
        "ΤΕΛΟΣ_ΑΝ" => TokenKind::EndIf,
        "ΟΣΟ" => TokenKind::While,
        "ΕΠΑΝΑΛΑΒΕ" => TokenKind::Repeat,
        "ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ" => TokenKind::EndLoop,
        "ΑΡΧΗ_ΕΠΑΝΑΛΗΨΗΣ" => TokenKind::StartLoop,
        "ΜΕΧΡΙΣ_ΟΤΟΥ" => TokenKind::RepeatUntil,
        "ΓΙΑ" => TokenKind::For,
        "ΑΠΟ" => TokenKind::From,
        "ΜΕΧΡΙ" => TokenKind::Until,
        "ΜΕ_ΒΗΜΑ" => TokenKind::Step,
        "ΣΥΝΑΡΤΗΣΗ" => TokenKind::Function,
        "ΤΕΛΟΣ_ΣΥΝΑΡΤΗΣΗΣ" => TokenKind::EndFunction,
        "ΑΚΕΡΑΙΑ" | "ΠΡΑΓΜΑΤΙΚΗ" | "ΑΛΦΑΡΙΘΜΗΤΙΚΗ" | "ΛΟΓΙΚΗ" => TokenKind::ReturnType,
        "ΔΙΑΔΙΚΑΣΙΑ" => TokenKind::Procedure,
        "ΤΕΛΟΣ_ΔΙΑΔΙΚΑΣΙΑΣ" => TokenKind::EndProcedure,
        "ΚΑΛΕΣΕ" => TokenKind::Call,
        "ΚΑΙ" => TokenKind::And,
        "ΟΧΙ" => TokenKind::Not,
        "ΑΛΗΘΗΣ" => TokenKind::True,
        "ΨΕΥΔΗΣ" => TokenKind::False,
        "MOD" => TokenKind::Mod,
        "DIV" => TokenKind::Div,
        _ => return None,
    };
    Some((kind, normalized))
}

fn strip_tonos(c: char) -> char {
    match c {
        'Ά' => 'Α',
        'Έ' => 'Ε',
        'Ή' => 'Η',
        'Ί' => 'Ι',
        'Ό' => 'Ο',
        'Ύ' => 'Υ',
        'Ώ' => 'Ω',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn kinds(input: &str) -> Result<Vec<TokenKind>> {
        Ok(tokenize(input)?.iter().map(|t| t.kind).collect())
    }

    #[test]
    fn test_operators_extend_greedily() -> Result<()> {
        use TokenKind::*;
        assert_eq!(
            kinds("x <- 1 <= 2 <> 3 < 4 >= 5 > 6 = 7")?,
            vec![
                Identifier, Assign, Integer, LessEqual, Integer, NotEqual, Integer, Less,
                Integer, GreaterEqual, Integer, Greater, Integer, Equal, Integer, Eof
            ]
        );
        Ok(())
    }

    #[test]
    fn test_keywords_are_case_insensitive() -> Result<()> {
        use TokenKind::*;
        assert_eq!(kinds("γραψε x")?, vec![Print, Identifier, Eof]);
        assert_eq!(kinds("τέλος_αν")?, vec![EndIf, Eof]);
        assert_eq!(kinds("μέχρις_ότου ΨΕΥΔΗΣ")?, vec![RepeatUntil, False, Eof]);

        // keyword tokens carry the canonical spelling
        let tokens = tokenize("γραψε")?;
        assert_eq!(tokens[0].text, "ΓΡΑΨΕ");
        Ok(())
    }

    #[test]
    fn test_word_operators() -> Result<()> {
        use TokenKind::*;
        assert_eq!(
            kinds("α ΚΑΙ β Ή ΟΧΙ γ")?,
            vec![Identifier, And, Identifier, Or, Not, Identifier, Eof]
        );
        // a bare eta is an identifier, not the disjunction keyword
        assert_eq!(kinds("η")?, vec![Identifier, Eof]);
        assert_eq!(kinds("ή")?, vec![Or, Eof]);
        assert_eq!(kinds("5 MOD 2 DIV 1")?, vec![Integer, Mod, Integer, Div, Integer, Eof]);
        Ok(())
    }

    #[test]
    fn test_subscript_capture() -> Result<()> {
        let tokens = tokenize("Α[ 3 ]")?;
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "Α");
        assert_eq!(tokens[0].subscript.as_deref(), Some("3"));

        // whitespace inside the brackets is dropped, content is verbatim
        let tokens = tokenize("Π[δ + 1]")?;
        assert_eq!(tokens[0].subscript.as_deref(), Some("δ+1"));

        let tokens = tokenize("x")?;
        assert_eq!(tokens[0].subscript, None);
        Ok(())
    }

    #[test]
    fn test_numbers() -> Result<()> {
        let tokens = tokenize("42 3.14")?;
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[0].text, "42");
        assert_eq!(tokens[1].kind, TokenKind::Real);
        assert_eq!(tokens[1].text, "3.14");

        assert!(tokenize("1.2.3").is_err());
        Ok(())
    }

    #[test]
    fn test_string_literals() -> Result<()> {
        let tokens = tokenize("ΓΡΑΨΕ 'ένα δύο'")?;
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].text, "ένα δύο");

        assert!(matches!(
            tokenize("'ανοιχτό"),
            Err(Error::Lexer { message }) if message.contains("απόστροφο")
        ));
        Ok(())
    }

    #[test]
    fn test_double_quote_hint() {
        assert!(matches!(
            tokenize("ΓΡΑΨΕ \"λάθος\""),
            Err(Error::Lexer { message }) if message.contains("χρησιμοποίησε απόστροφο")
        ));
    }

    #[test]
    fn test_unknown_character() {
        assert!(matches!(
            tokenize("x <- 1 # 2"),
            Err(Error::Lexer { message }) if message.contains("Άγνωστος χαρακτήρας")
        ));
    }

    #[test]
    fn test_comments_run_to_end_of_line() -> Result<()> {
        use TokenKind::*;
        assert_eq!(
            kinds("x ! αυτό αγνοείται\ny")?,
            vec![Identifier, EndOfLine, Identifier, Eof]
        );
        Ok(())
    }

    #[test]
    fn test_blank_lines_collapse() -> Result<()> {
        use TokenKind::*;
        assert_eq!(
            kinds("x\n\n\n\ny")?,
            vec![Identifier, EndOfLine, Identifier, Eof]
        );
        Ok(())
    }

    #[test]
    fn test_line_and_column_tracking() -> Result<()> {
        let tokens = tokenize("x\n  ψ")?;
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!(tokens[2].text, "ψ");
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
        Ok(())
    }

    #[test]
    fn test_terminates_with_eof() -> Result<()> {
        let tokens = tokenize("")?;
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        Ok(())
    }
}
