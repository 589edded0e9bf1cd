//! Recursive-descent parser: one function per grammar rule.
//!
//! ```text
//! program   := funcdecl* maindecl
//! funcdecl  := type IDENT '(' paramlist ')' block
//! maindecl  := ('int')? 'main' '(' ')' block
//! paramlist := /* empty */ | 'void' | param (',' param)*
//! param     := type IDENT
//! block     := '{' stmt* '}'
//! body      := block | stmt
//! stmt      := vardecl ';' | expr ';' | ifstmt | whilestmt | returnstmt ';'
//! vardecl   := type IDENT ('=' expr)? (',' IDENT ('=' expr)?)*
//! ifstmt    := 'if' '(' expr ')' body ('else' body)?
//! whilestmt := 'while' '(' expr ')' body
//! returnstmt:= 'return' expr?
//! ```
//! Expression precedence, low to high: assignment, `|`, `^`, `&`, `==`/`!=`,
//! relational, additive, multiplicative, unary, primary.

use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::{tokenize, Token, TokenKind};

pub fn parse(source: &str) -> Result<Program, CompileError> {
    let tokens = tokenize(source)?;
    Parser { tokens, pos: 0 }.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<Token, CompileError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(CompileError::Parse {
                message: format!("expected {kind:?}, found {:?}", self.peek()),
                line: self.line(),
            })
        }
    }

    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::Parse {
            message: message.into(),
            line: self.line(),
        }
    }

    fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut program = Program::new();
        loop {
            match self.peek() {
                TokenKind::Eof => {
                    return Err(self.err("expected a 'main' function"));
                }
                _ => {
                    if self.is_main_header() {
                        program.main = Some(self.parse_main()?);
                        break;
                    }
                    program.functions.push(self.parse_function()?);
                }
            }
        }
        Ok(program)
    }

    fn is_main_header(&self) -> bool {
        match self.peek() {
            TokenKind::Ident(name) if name == "main" => true,
            TokenKind::Int => matches!(self.peek_at(1), TokenKind::Ident(n) if n == "main"),
            _ => false,
        }
    }

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        match self.peek().clone() {
            TokenKind::Int => {
                self.advance();
                Ok(Type::Int)
            }
            TokenKind::Char => {
                self.advance();
                Ok(Type::Char)
            }
            TokenKind::Void => {
                self.advance();
                Ok(Type::Void)
            }
            other => Err(self.err(format!("expected a type, found {other:?}"))),
        }
    }

    fn parse_ident(&mut self) -> Result<String, CompileError> {
        match self.advance().kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(CompileError::Parse {
                message: format!("expected an identifier, found {other:?}"),
                line: self.line(),
            }),
        }
    }

    fn parse_main(&mut self) -> Result<MainDef, CompileError> {
        let line = self.line();
        let explicit_return_type = if self.check(&TokenKind::Int) {
            self.advance();
            true
        } else {
            false
        };
        let name = self.parse_ident()?;
        if name != "main" {
            return Err(self.err("expected 'main'"));
        }
        self.eat(&TokenKind::LParen)?;
        self.eat(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(MainDef {
            explicit_return_type,
            body,
            line,
        })
    }

    fn parse_function(&mut self) -> Result<FunctionDef, CompileError> {
        let line = self.line();
        let return_type = self.parse_type()?;
        let name = self.parse_ident()?;
        self.eat(&TokenKind::LParen)?;
        let (params, arity) = self.parse_param_list()?;
        self.eat(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(FunctionDef {
            name,
            return_type,
            params,
            arity,
            body,
            line,
        })
    }

    fn parse_param_list(&mut self) -> Result<(Vec<Param>, Arity), CompileError> {
        if self.check(&TokenKind::RParen) {
            return Ok((Vec::new(), Arity::Any));
        }
        if self.check(&TokenKind::Void) && matches!(self.peek_at(1), TokenKind::RParen) {
            self.advance();
            return Ok((Vec::new(), Arity::Exact(0)));
        }
        let mut params = Vec::new();
        loop {
            let line = self.line();
            let ty = self.parse_type()?;
            let name = self.parse_ident()?;
            params.push(Param { name, ty, line });
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        let arity = Arity::Exact(params.len());
        Ok((params, arity))
    }

    fn parse_block(&mut self) -> Result<Block, CompileError> {
        self.eat(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.eat(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    /// An `if`/`while` body: a braced block, or a single bare statement —
    /// both are legal, same as the language this parser targets.
    fn parse_body(&mut self) -> Result<Block, CompileError> {
        if self.check(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        match self.peek() {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Int | TokenKind::Char => self.parse_var_decl(),
            _ => {
                let expr = self.parse_expr()?;
                self.eat(&TokenKind::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        let ty = self.parse_type()?;
        let mut names = Vec::new();
        loop {
            let name = self.parse_ident()?;
            let init = if self.check(&TokenKind::Assign) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            names.push((name, init));
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.eat(&TokenKind::Semicolon)?;
        Ok(Stmt::VarDecl { ty, names, line })
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        self.advance();
        self.eat(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.eat(&TokenKind::RParen)?;
        let then_branch = self.parse_body()?;
        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            Some(self.parse_body()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            line,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        self.advance();
        self.eat(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.eat(&TokenKind::RParen)?;
        let body = self.parse_body()?;
        Ok(Stmt::While { cond, body, line })
    }

    fn parse_return(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        self.advance();
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.eat(&TokenKind::Semicolon)?;
        Ok(Stmt::Return { value, line })
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, CompileError> {
        if let TokenKind::Ident(name) = self.peek().clone() {
            let op = match self.peek_at(1) {
                TokenKind::Assign => Some(None),
                TokenKind::PlusEq => Some(Some(CompoundOp::AddAssign)),
                TokenKind::MinusEq => Some(Some(CompoundOp::SubAssign)),
                TokenKind::StarEq => Some(Some(CompoundOp::MulAssign)),
                TokenKind::SlashEq => Some(Some(CompoundOp::DivAssign)),
                _ => None,
            };
            if let Some(op) = op {
                let line = self.line();
                self.advance(); // identifier
                self.advance(); // operator
                let value = Box::new(self.parse_assignment()?);
                return Ok(match op {
                    None => Expr::Assign { name, value, line },
                    Some(op) => Expr::CompoundAssign {
                        op,
                        name,
                        value,
                        line,
                    },
                });
            }
        }
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_xor()?;
        while self.check(&TokenKind::Pipe) {
            let line = self.line();
            self.advance();
            let rhs = self.parse_xor()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::Caret) {
            let line = self.line();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Xor,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::Amp) {
            let line = self.line();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Neq => BinOp::Neq,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.line();
            self.advance();
            let expr = Box::new(self.parse_unary()?);
            return Ok(Expr::Unary { op, expr, line });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.peek().clone() {
            TokenKind::IntLit(text) => {
                self.advance();
                Ok(Expr::IntLit { text, line })
            }
            TokenKind::CharLit(value, multi) => {
                self.advance();
                Ok(Expr::CharLit { value, multi, line })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.eat(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(&TokenKind::Comma) {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    self.eat(&TokenKind::RParen)?;
                    Ok(Expr::Call { name, args, line })
                } else {
                    Ok(Expr::Var { name, line })
                }
            }
            other => Err(CompileError::Parse {
                message: format!("unexpected token {other:?} in expression"),
                line,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_main_with_return() {
        let program = parse("main() { return 0; }").unwrap();
        let main = program.main.unwrap();
        assert!(!main.explicit_return_type);
        assert_eq!(main.body.len(), 1);
    }

    #[test]
    fn parses_function_with_void_parameter_list() {
        let program = parse("int f(void) { return 1; } int main() { return f(); }").unwrap();
        let f = program.find_function("f").unwrap();
        assert_eq!(f.arity, Arity::Exact(0));
    }

    #[test]
    fn parses_function_with_any_arity_marker() {
        let program = parse("int f() { return 1; } int main() { return 0; }").unwrap();
        let f = program.find_function("f").unwrap();
        assert_eq!(f.arity, Arity::Any);
    }

    #[test]
    fn assignment_is_right_associative_through_recursion() {
        let program = parse("int main() { int a, b; a = b = 3; return 0; }").unwrap();
        let main = program.main.unwrap();
        match &main.body[1] {
            Stmt::Expr(Expr::Assign { name, value, .. }) => {
                assert_eq!(name, "a");
                assert!(matches!(**value, Expr::Assign { .. }));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn relational_binds_tighter_than_equality() {
        let program = parse("int main() { return 1 < 2 == 0; }").unwrap();
        let main = program.main.unwrap();
        match &main.body[0] {
            Stmt::Return {
                value: Some(Expr::Binary { op, lhs, .. }),
                ..
            } => {
                assert_eq!(*op, BinOp::Eq);
                assert!(matches!(**lhs, Expr::Binary { op: BinOp::Lt, .. }));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn call_with_no_arguments_is_distinct_from_variable() {
        let program = parse("int g() { return 0; } int main() { return g(); }").unwrap();
        let main = program.main.unwrap();
        match &main.body[0] {
            Stmt::Return {
                value: Some(Expr::Call { name, args, .. }),
                ..
            } => {
                assert_eq!(name, "g");
                assert!(args.is_empty());
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn unterminated_block_is_a_parse_error() {
        assert!(parse("int main() { return 0;").is_err());
    }

    #[test]
    fn if_else_accepts_bare_statements_without_braces() {
        let program = parse("int main() { if (1==2) return 1; else return 2; }").unwrap();
        let main = program.main.unwrap();
        match &main.body[0] {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.as_ref().unwrap().len(), 1);
            }
            other => panic!("expected if statement, got {other:?}"),
        }
    }

    #[test]
    fn while_accepts_a_bare_statement_body() {
        let program = parse("int main() { int i=0; while (i<10) i+=1; return i; }").unwrap();
        let main = program.main.unwrap();
        match &main.body[1] {
            Stmt::While { body, .. } => assert_eq!(body.len(), 1),
            other => panic!("expected while statement, got {other:?}"),
        }
    }
}
