use std::collections::HashMap;

use log::debug;

use crate::ast::{
    BinaryOp, ConstantDef, Declarator, DoWhileStatement, ElseBranch, Expression, ForStatement,
    FunctionDecl, Identifier, IfStatement, NumberLiteral, ProcedureDecl, Program, Statement,
    UnaryOp, VarType, WhileStatement,
};
use crate::error::{syntax_error, Result};
use crate::tokenizer::{tokenize, Token, TokenKind};

/// Tokenizes and parses a whole source program.
pub fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;
    debug!(
        "parsed program {} with {} top-level statements",
        program.name,
        program.body.len()
    );
    Ok(program)
}

/// Lexes and parses a captured text fragment as one expression. Used for
/// subscript indices and declared array lengths, which the tokenizer hands
/// over verbatim.
pub fn parse_standalone_expression(text: &str) -> Result<Expression> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let expression = parser.parse_expression()?;
    parser.skip_newlines();
    if parser.at().kind != TokenKind::Eof {
        return parser.unexpected_token();
    }
    Ok(expression)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Parser {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn at(&self) -> &Token {
        self.peek(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token> {
        let token = self.advance();
        if token.kind != kind {
            return syntax_error(format!(
                "{message} near line {} column {}",
                token.line, token.column
            ));
        }
        Ok(token)
    }

    /// End-of-line terminates every statement; the last line of a file may
    /// end at EOF instead.
    fn expect_end_of_line(&mut self) -> Result<()> {
        match self.at().kind {
            TokenKind::EndOfLine => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => {
                let token = self.at();
                syntax_error(format!(
                    "Expected end of line near line {} column {}",
                    token.line, token.column
                ))
            }
        }
    }

    fn skip_newlines(&mut self) {
        while self.at().kind == TokenKind::EndOfLine {
            self.advance();
        }
    }

    fn unexpected_token<T>(&self) -> Result<T> {
        let token = self.at();
        syntax_error(format!(
            "Unexpected token {} at line {} column {}",
            token.text, token.line, token.column
        ))
    }

    fn parse_program(&mut self) -> Result<Program> {
        self.skip_newlines();
        self.expect(TokenKind::Program, "Αναμενόταν η λέξη \"ΠΡΟΓΡΑΜΜΑ\"")?;
        let name = self
            .expect(TokenKind::Identifier, "Το πρόγραμμα πρέπει να έχει όνομα")?
            .text;
        self.expect_end_of_line()?;

        let body = self.parse_block(&[TokenKind::EndOfProgram], "ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ")?;
        self.expect(TokenKind::EndOfProgram, "Expected ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ")?;
        self.expect_end_of_line()?;

        let mut functions: HashMap<String, FunctionDecl> = HashMap::new();
        let mut procedures: HashMap<String, ProcedureDecl> = HashMap::new();
        loop {
            self.skip_newlines();
            match self.at().kind {
                TokenKind::Eof => break,
                TokenKind::Function => {
                    let decl = self.parse_function_declaration()?;
                    if functions.contains_key(&decl.name) || procedures.contains_key(&decl.name) {
                        return syntax_error(format!("Η συνάρτηση {} έχει ήδη οριστεί", decl.name));
                    }
                    functions.insert(decl.name.clone(), decl);
                }
                TokenKind::Procedure => {
                    let decl = self.parse_procedure_declaration()?;
                    if functions.contains_key(&decl.name) || procedures.contains_key(&decl.name) {
                        return syntax_error(format!("Η διαδικασία {} έχει ήδη οριστεί", decl.name));
                    }
                    procedures.insert(decl.name.clone(), decl);
                }
                _ => return self.unexpected_token(),
            }
        }

        Ok(Program {
            name,
            body,
            functions,
            procedures,
        })
    }

    /// Parses statements until one of `terminators` is the current token,
    /// which is left unconsumed. Hitting EOF first is an error naming the
    /// missing closer.
    fn parse_block(&mut self, terminators: &[TokenKind], closer: &str) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            if self.at().kind == TokenKind::EndOfLine {
                self.advance();
                continue;
            }
            if terminators.contains(&self.at().kind) {
                return Ok(statements);
            }
            if self.at().kind == TokenKind::Eof {
                return syntax_error(format!("Expected {closer} before end of file"));
            }
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
        }
    }

    /// `None` means the tokens formed a section marker that produces no
    /// statement of its own.
    fn parse_statement(&mut self) -> Result<Option<Statement>> {
        match self.at().kind {
            TokenKind::If => Ok(Some(Statement::If(self.parse_if()?))),
            TokenKind::Constants => self.parse_constants().map(Some),
            TokenKind::Variables => {
                self.advance();
                self.expect_end_of_line()?;
                Ok(None)
            }
            TokenKind::Integers | TokenKind::Reals | TokenKind::Strings | TokenKind::Booleans => {
                self.parse_declaration().map(Some)
            }
            TokenKind::Print => self.parse_print().map(Some),
            TokenKind::Read => self.parse_read().map(Some),
            TokenKind::For => self.parse_for().map(Some),
            TokenKind::While => self.parse_while().map(Some),
            TokenKind::StartLoop => self.parse_do_while().map(Some),
            TokenKind::Call => self.parse_procedure_call().map(Some),
            TokenKind::Start => {
                self.advance();
                self.expect_end_of_line()?;
                Ok(Some(Statement::Start))
            }
            TokenKind::Identifier if self.peek(1).kind == TokenKind::Assign => {
                self.parse_assignment().map(Some)
            }
            _ => {
                let expression = self.parse_expression()?;
                self.expect_end_of_line()?;
                Ok(Some(Statement::Expression(expression)))
            }
        }
    }

    fn parse_constants(&mut self) -> Result<Statement> {
        self.advance();
        self.expect_end_of_line()?;
        let mut constants = Vec::new();
        loop {
            self.skip_newlines();
            if self.at().kind != TokenKind::Identifier {
                break;
            }
            let name = self.advance().text;
            self.expect(TokenKind::Equal, "Expected '='")?;
            let value = self.parse_expression()?;
            self.expect_end_of_line()?;
            constants.push(ConstantDef { name, value });
        }
        Ok(Statement::Constants(constants))
    }

    fn parse_declaration(&mut self) -> Result<Statement> {
        let section = self.advance();
        let var_type = match section.kind {
            TokenKind::Integers => VarType::Integer,
            TokenKind::Reals => VarType::Real,
            TokenKind::Strings => VarType::String,
            TokenKind::Booleans => VarType::Boolean,
            _ => unreachable!("declaration dispatch"),
        };
        self.expect(TokenKind::Colon, "Expected colon")?;

        let mut names = Vec::new();
        loop {
            let token = self.expect(TokenKind::Identifier, "Expected identifier")?;
            let length = match &token.subscript {
                Some(text) => Some(parse_array_length(text, &token)?),
                None => None,
            };
            names.push(Declarator {
                name: token.text,
                length,
            });
            if self.at().kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        self.expect_end_of_line()?;
        Ok(Statement::Declaration { var_type, names })
    }

    fn parse_assignment(&mut self) -> Result<Statement> {
        let target = identifier_from_token(self.advance())?;
        self.expect(TokenKind::Assign, "Expected '<-'")?;
        let value = self.parse_expression()?;
        self.expect_end_of_line()?;
        Ok(Statement::Assignment { target, value })
    }

    fn parse_if(&mut self) -> Result<IfStatement> {
        // the opening token is ΑΝ, or ΑΛΛΙΩΣ_ΑΝ on a recursive call
        self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "Expected ΤΟΤΕ")?;
        self.expect_end_of_line()?;

        let consequent = self.parse_block(
            &[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf],
            "ΤΕΛΟΣ_ΑΝ",
        )?;

        let alternate = match self.at().kind {
            // the recursive call consumes the single shared ΤΕΛΟΣ_ΑΝ
            TokenKind::ElseIf => Some(ElseBranch::ElseIf(Box::new(self.parse_if()?))),
            TokenKind::Else => {
                self.advance();
                self.expect_end_of_line()?;
                let statements = self.parse_block(&[TokenKind::EndIf], "ΤΕΛΟΣ_ΑΝ")?;
                self.expect(TokenKind::EndIf, "Expected ΤΕΛΟΣ_ΑΝ")?;
                self.expect_end_of_line()?;
                Some(ElseBranch::Else(statements))
            }
            _ => {
                self.expect(TokenKind::EndIf, "Expected ΤΕΛΟΣ_ΑΝ")?;
                self.expect_end_of_line()?;
                None
            }
        };

        Ok(IfStatement {
            condition,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Statement> {
        self.advance();
        let variable = self.expect(TokenKind::Identifier, "Expected identifier")?.text;
        self.expect(TokenKind::From, "Expected ΑΠΟ")?;
        let start = self.parse_expression()?;
        self.expect(TokenKind::Until, "Expected ΜΕΧΡΙ")?;
        let end = self.parse_expression()?;
        let step = if self.at().kind == TokenKind::Step {
            self.advance();
            self.parse_expression()?
        } else {
            Expression::Number(NumberLiteral::Integer(1))
        };
        self.expect_end_of_line()?;

        let body = self.parse_block(&[TokenKind::EndLoop], "ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ")?;
        self.expect(TokenKind::EndLoop, "Expected ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ")?;
        self.expect_end_of_line()?;

        Ok(Statement::For(ForStatement {
            variable,
            start,
            end,
            step,
            body,
        }))
    }

    fn parse_while(&mut self) -> Result<Statement> {
        self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Repeat, "Expected ΕΠΑΝΑΛΑΒΕ")?;
        self.expect_end_of_line()?;
        let body = self.parse_block(&[TokenKind::EndLoop], "ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ")?;
        self.expect(TokenKind::EndLoop, "Expected ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ")?;
        self.expect_end_of_line()?;
        Ok(Statement::While(WhileStatement { condition, body }))
    }

    fn parse_do_while(&mut self) -> Result<Statement> {
        self.advance();
        self.expect_end_of_line()?;
        let body = self.parse_block(&[TokenKind::RepeatUntil], "ΜΕΧΡΙΣ_ΟΤΟΥ")?;
        self.expect(TokenKind::RepeatUntil, "Expected ΜΕΧΡΙΣ_ΟΤΟΥ")?;
        let condition = self.parse_expression()?;
        self.expect_end_of_line()?;
        Ok(Statement::DoWhile(DoWhileStatement { condition, body }))
    }

    fn parse_print(&mut self) -> Result<Statement> {
        self.advance();
        let mut items = Vec::new();
        while !matches!(self.at().kind, TokenKind::EndOfLine | TokenKind::Eof) {
            items.push(self.parse_expression()?);
            if matches!(self.at().kind, TokenKind::EndOfLine | TokenKind::Eof) {
                break;
            }
            self.expect(TokenKind::Comma, "Expected comma")?;
        }
        self.expect_end_of_line()?;
        Ok(Statement::Print(items))
    }

    fn parse_read(&mut self) -> Result<Statement> {
        self.advance();
        let mut targets = Vec::new();
        let token = self.expect(TokenKind::Identifier, "Expected identifier")?;
        targets.push(identifier_from_token(token)?);
        while self.at().kind == TokenKind::Comma {
            self.advance();
            let token = self.expect(TokenKind::Identifier, "Expected identifier")?;
            targets.push(identifier_from_token(token)?);
        }
        self.expect_end_of_line()?;
        Ok(Statement::Read(targets))
    }

    fn parse_procedure_call(&mut self) -> Result<Statement> {
        self.advance();
        let name = self
            .expect(TokenKind::Identifier, "Expected procedure name")?
            .text;
        self.expect(TokenKind::LeftParen, "Expected '('")?;
        let arguments = self.parse_argument_list()?;
        self.expect_end_of_line()?;
        Ok(Statement::ProcedureCall { name, arguments })
    }

    fn parse_function_declaration(&mut self) -> Result<FunctionDecl> {
        self.advance();
        let name = self
            .expect(TokenKind::Identifier, "Expected function name")?
            .text;
        self.expect(TokenKind::LeftParen, "Expected '('")?;
        let params = self.parse_parameter_list()?;
        self.expect(TokenKind::Colon, "Expected ':'")?;
        let return_type = match self
            .expect(TokenKind::ReturnType, "Expected return type")?
            .text
            .as_str()
        {
            "ΑΚΕΡΑΙΑ" => VarType::Integer,
            "ΠΡΑΓΜΑΤΙΚΗ" => VarType::Real,
            "ΑΛΦΑΡΙΘΜΗΤΙΚΗ" => VarType::String,
            _ => VarType::Boolean,
        };
        self.expect_end_of_line()?;
        let body = self.parse_block(&[TokenKind::EndFunction], "ΤΕΛΟΣ_ΣΥΝΑΡΤΗΣΗΣ")?;
        self.expect(TokenKind::EndFunction, "Expected ΤΕΛΟΣ_ΣΥΝΑΡΤΗΣΗΣ")?;
        self.expect_end_of_line()?;
        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_procedure_declaration(&mut self) -> Result<ProcedureDecl> {
        self.advance();
        let name = self
            .expect(TokenKind::Identifier, "Expected procedure name")?
            .text;
        self.expect(TokenKind::LeftParen, "Expected '('")?;
        let params = self.parse_parameter_list()?;
        self.expect_end_of_line()?;
        let body = self.parse_block(&[TokenKind::EndProcedure], "ΤΕΛΟΣ_ΔΙΑΔΙΚΑΣΙΑΣ")?;
        self.expect(TokenKind::EndProcedure, "Expected ΤΕΛΟΣ_ΔΙΑΔΙΚΑΣΙΑΣ")?;
        self.expect_end_of_line()?;
        Ok(ProcedureDecl { name, params, body })
    }

    fn parse_parameter_list(&mut self) -> Result<Vec<String>> {
        let mut params = Vec::new();
        while self.at().kind != TokenKind::RightParen {
            params.push(
                self.expect(TokenKind::Identifier, "Expected parameter name")?
                    .text,
            );
            if self.at().kind == TokenKind::RightParen {
                break;
            }
            self.expect(TokenKind::Comma, "Expected comma")?;
        }
        self.expect(TokenKind::RightParen, "Expected ')'")?;
        Ok(params)
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expression>> {
        let mut arguments = Vec::new();
        while self.at().kind != TokenKind::RightParen {
            arguments.push(self.parse_expression()?);
            if self.at().kind == TokenKind::RightParen {
                break;
            }
            self.expect(TokenKind::Comma, "Expected comma")?;
        }
        self.expect(TokenKind::RightParen, "Expected ')'")?;
        Ok(arguments)
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_and()?;
        while self.at().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_not()?;
        while self.at().kind == TokenKind::And {
            self.advance();
            let right = self.parse_not()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression> {
        if self.at().kind == TokenKind::Not {
            self.advance();
            let operand = self.parse_comparison()?;
            return Ok(Expression::Unary {
                operator: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let mut left = self.parse_additive()?;
        loop {
            let operator = match self.at().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                TokenKind::Equal => BinaryOp::Equal,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = match self.at().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_power()?;
        loop {
            let operator = match self.at().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Mod => BinaryOp::Mod,
                TokenKind::Div => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expression> {
        let mut left = self.parse_primary()?;
        while self.at().kind == TokenKind::Caret {
            self.advance();
            let right = self.parse_primary()?;
            left = binary(BinaryOp::Power, left, right);
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        match self.at().kind {
            TokenKind::Plus | TokenKind::Minus => {
                let operator = if self.advance().kind == TokenKind::Minus {
                    UnaryOp::Negate
                } else {
                    UnaryOp::Plus
                };
                let operand = self.parse_primary()?;
                Ok(Expression::Unary {
                    operator,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Not => self.parse_not(),
            TokenKind::Integer => {
                let token = self.advance();
                Ok(Expression::Number(NumberLiteral::Integer(token.text.parse()?)))
            }
            TokenKind::Real => {
                let token = self.advance();
                Ok(Expression::Number(NumberLiteral::Real(token.text.parse()?)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::BooleanLiteral(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::BooleanLiteral(false))
            }
            TokenKind::String => Ok(Expression::StringLiteral(self.advance().text)),
            TokenKind::Identifier if self.peek(1).kind == TokenKind::LeftParen => {
                let name = self.advance().text;
                self.advance();
                let arguments = self.parse_argument_list()?;
                Ok(Expression::Call { name, arguments })
            }
            TokenKind::Identifier => identifier_from_token(self.advance()).map(Expression::Identifier),
            TokenKind::LeftParen => {
                self.advance();
                let expression = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "Expected ')'")?;
                Ok(expression)
            }
            _ => self.unexpected_token(),
        }
    }
}

fn binary(operator: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Resolves the token's captured subscript, if any, by re-parsing it as an
/// independent expression fragment.
fn identifier_from_token(token: Token) -> Result<Identifier> {
    let Token {
        text, subscript, ..
    } = token;
    let index = match subscript {
        Some(captured) => Some(Box::new(parse_standalone_expression(&captured)?)),
        None => None,
    };
    Ok(Identifier { name: text, index })
}

fn parse_array_length(text: &str, token: &Token) -> Result<usize> {
    let expression = parse_standalone_expression(text)?;
    match expression {
        Expression::Number(NumberLiteral::Integer(n)) if n >= 1 => Ok(n as usize),
        _ => syntax_error(format!(
            "Μη έγκυρο μέγεθος πίνακα για το {} στην γραμμή {}, στήλη {}",
            token.text, token.line, token.column
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(input: &str) -> Result<Program> {
        parse(input)
    }

    #[test]
    fn test_minimal_program() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Τεστ
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: x
               ΑΡΧΗ
               x <- 2 + 3 * 4
               ΓΡΑΨΕ x
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#,
        )?;

        assert_eq!(program.name, "Τεστ");
        assert_eq!(program.body.len(), 4);
        assert!(matches!(program.body[0], Statement::Declaration { .. }));
        assert!(matches!(program.body[1], Statement::Start));
        assert!(matches!(program.body[2], Statement::Assignment { .. }));
        assert!(matches!(program.body[3], Statement::Print(_)));

        // precedence: the assignment value is 2 + (3 * 4)
        if let Statement::Assignment { value, .. } = &program.body[2] {
            let Expression::Binary {
                operator, right, ..
            } = value
            else {
                panic!("Expected binary expression");
            };
            assert_eq!(*operator, BinaryOp::Add);
            assert!(matches!(**right, Expression::Binary {
                operator: BinaryOp::Multiply,
                ..
            }));
        }
        Ok(())
    }

    #[test]
    fn test_declarations_with_arrays() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Πίνακες
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: Α[10], x
               ΠΡΑΓΜΑΤΙΚΕΣ: Β[5]
               ΑΡΧΗ
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#,
        )?;

        let Statement::Declaration { var_type, names } = &program.body[0] else {
            panic!("Expected declaration");
        };
        assert_eq!(*var_type, VarType::Integer);
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].name, "Α");
        assert_eq!(names[0].length, Some(10));
        assert_eq!(names[1].length, None);

        let Statement::Declaration { var_type, .. } = &program.body[1] else {
            panic!("Expected declaration");
        };
        assert_eq!(*var_type, VarType::Real);
        Ok(())
    }

    #[test]
    fn test_constants_section() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Σταθερές
               ΣΤΑΘΕΡΕΣ
               π = 3.14
               ν = 10
               ΜΕΤΑΒΛΗΤΕΣ
               ΠΡΑΓΜΑΤΙΚΕΣ: x
               ΑΡΧΗ
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#,
        )?;

        let Statement::Constants(defs) = &program.body[0] else {
            panic!("Expected constants section");
        };
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "π");
        assert_eq!(defs[1].name, "ν");
        Ok(())
    }

    #[test]
    fn test_if_chain_shape() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Διακλάδωση
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: x
               ΑΡΧΗ
               ΑΝ x = 1 ΤΟΤΕ
               x <- 10
               ΑΛΛΙΩΣ_ΑΝ x = 2 ΤΟΤΕ
               x <- 20
               ΑΛΛΙΩΣ
               x <- 30
               ΤΕΛΟΣ_ΑΝ
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#,
        )?;

        let Statement::If(outer) = &program.body[2] else {
            panic!("Expected if statement");
        };
        assert_eq!(outer.consequent.len(), 1);
        let Some(ElseBranch::ElseIf(inner)) = &outer.alternate else {
            panic!("Expected ΑΛΛΙΩΣ_ΑΝ branch");
        };
        assert_eq!(inner.consequent.len(), 1);
        assert!(matches!(inner.alternate, Some(ElseBranch::Else(ref s)) if s.len() == 1));
        Ok(())
    }

    #[test]
    fn test_loops() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Βρόχοι
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: i, x
               ΑΡΧΗ
               ΓΙΑ i ΑΠΟ 1 ΜΕΧΡΙ 10 ΜΕ_ΒΗΜΑ 2
               x <- i
               ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ
               ΟΣΟ x > 0 ΕΠΑΝΑΛΑΒΕ
               x <- x - 1
               ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ
               ΑΡΧΗ_ΕΠΑΝΑΛΗΨΗΣ
               x <- x + 1
               ΜΕΧΡΙΣ_ΟΤΟΥ x = 5
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#,
        )?;

        let Statement::For(for_loop) = &program.body[2] else {
            panic!("Expected for loop");
        };
        assert_eq!(for_loop.variable, "i");
        assert!(matches!(for_loop.step, Expression::Number(NumberLiteral::Integer(2))));
        assert!(matches!(program.body[3], Statement::While(_)));
        assert!(matches!(program.body[4], Statement::DoWhile(_)));
        Ok(())
    }

    #[test]
    fn test_for_step_defaults_to_one() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Βήμα
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: i
               ΑΡΧΗ
               ΓΙΑ i ΑΠΟ 1 ΜΕΧΡΙ 3
               ΓΡΑΨΕ i
               ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#,
        )?;
        let Statement::For(for_loop) = &program.body[2] else {
            panic!("Expected for loop");
        };
        assert!(matches!(for_loop.step, Expression::Number(NumberLiteral::Integer(1))));
        Ok(())
    }

    #[test]
    fn test_subscript_index_is_reparsed_expression() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Δείκτες
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: Α[10], i
               ΑΡΧΗ
               Α[i + 1] <- Α[i] * 2
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#,
        )?;

        let Statement::Assignment { target, value } = &program.body[2] else {
            panic!("Expected assignment");
        };
        let Some(index) = &target.index else {
            panic!("Expected index expression");
        };
        assert!(matches!(**index, Expression::Binary {
            operator: BinaryOp::Add,
            ..
        }));
        let Expression::Binary { left, .. } = value else {
            panic!("Expected binary value");
        };
        let Expression::Identifier(source) = &**left else {
            panic!("Expected identifier");
        };
        assert!(source.index.is_some());
        Ok(())
    }

    #[test]
    fn test_trailing_function_and_procedure() -> Result<()> {
        let program = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Κλήσεις
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: x
               ΑΡΧΗ
               x <- Διπλάσιο(4)
               ΚΑΛΕΣΕ Μηδένισε(x)
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ

               ΣΥΝΑΡΤΗΣΗ Διπλάσιο(ν): ΑΚΕΡΑΙΑ
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: ν
               ΑΡΧΗ
               Διπλάσιο <- ν * 2
               ΤΕΛΟΣ_ΣΥΝΑΡΤΗΣΗΣ

               ΔΙΑΔΙΚΑΣΙΑ Μηδένισε(ν)
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: ν
               ΑΡΧΗ
               ν <- 0
               ΤΕΛΟΣ_ΔΙΑΔΙΚΑΣΙΑΣ"#,
        )?;

        let function = &program.functions["Διπλάσιο"];
        assert_eq!(function.params, vec!["ν"]);
        assert_eq!(function.return_type, VarType::Integer);
        assert!(matches!(function.body[1], Statement::Start));

        let procedure = &program.procedures["Μηδένισε"];
        assert_eq!(procedure.params, vec!["ν"]);

        // the call site parsed as a function-call expression
        assert!(matches!(
            &program.body[2],
            Statement::Assignment { value: Expression::Call { .. }, .. }
        ));
        assert!(matches!(program.body[3], Statement::ProcedureCall { .. }));
        Ok(())
    }

    #[test]
    fn test_redefinition_is_rejected() {
        let result = parse_str(
            r#"ΠΡΟΓΡΑΜΜΑ Διπλός
               ΑΡΧΗ
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ
               ΔΙΑΔΙΚΑΣΙΑ Δ(x)
               ΑΡΧΗ
               ΤΕΛΟΣ_ΔΙΑΔΙΚΑΣΙΑΣ
               ΔΙΑΔΙΚΑΣΙΑ Δ(x)
               ΑΡΧΗ
               ΤΕΛΟΣ_ΔΙΑΔΙΚΑΣΙΑΣ"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_standalone_expression() -> Result<()> {
        let expression = parse_standalone_expression("i + 1")?;
        assert!(matches!(expression, Expression::Binary {
            operator: BinaryOp::Add,
            ..
        }));
        assert!(parse_standalone_expression("").is_err());
        assert!(parse_standalone_expression("1 2").is_err());
        Ok(())
    }

    #[test]
    fn test_error_cases() {
        // no program header
        assert!(parse_str("ΑΡΧΗ\nΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ").is_err());
        // nameless program
        assert!(parse_str("ΠΡΟΓΡΑΜΜΑ\nΑΡΧΗ\nΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ").is_err());
        // missing end-of-program marker
        assert!(parse_str("ΠΡΟΓΡΑΜΜΑ Τεστ\nΑΡΧΗ\n").is_err());
        // unterminated if
        assert!(parse_str(
            "ΠΡΟΓΡΑΜΜΑ Τεστ\nΑΡΧΗ\nΑΝ 1 < 2 ΤΟΤΕ\nΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"
        )
        .is_err());
        // garbage after the end marker
        assert!(parse_str("ΠΡΟΓΡΑΜΜΑ Τεστ\nΑΡΧΗ\nΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ\nx <- 1").is_err());
        // invalid array length
        assert!(parse_str(
            "ΠΡΟΓΡΑΜΜΑ Τεστ\nΜΕΤΑΒΛΗΤΕΣ\nΑΚΕΡΑΙΕΣ: Α[0]\nΑΡΧΗ\nΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"
        )
        .is_err());
        // missing operand
        assert!(parse_str("ΠΡΟΓΡΑΜΜΑ Τεστ\nΑΡΧΗ\nΓΡΑΨΕ 1 +\nΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ").is_err());
    }

    #[test]
    fn test_parse_is_deterministic() -> Result<()> {
        let source = r#"ΠΡΟΓΡΑΜΜΑ Τεστ
               ΜΕΤΑΒΛΗΤΕΣ
               ΑΚΕΡΑΙΕΣ: Α[10], i
               ΑΡΧΗ
               ΓΙΑ i ΑΠΟ 1 ΜΕΧΡΙ 10
               Α[i] <- i * i
               ΤΕΛΟΣ_ΕΠΑΝΑΛΗΨΗΣ
               ΤΕΛΟΣ_ΠΡΟΓΡΑΜΜΑΤΟΣ"#;
        let first = parse_str(source)?;
        let second = parse_str(source)?;
        assert_eq!(first, second);
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
        Ok(())
    }
}
