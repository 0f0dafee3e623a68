//! Recursive-descent parser: tokens -> `ast::Model`.
//!
//! Follows the teacher's `Parser{tokens,pos}` shape and
//! `Result<_, Diagnostic>` convention; dispatches at the top level by
//! keyword exactly like the teacher's `include`/`union` dispatch loop.

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::lexer::Token;
use rumur_core::SourceLocation;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: u32,
}

type PResult<T> = Result<T, Diagnostic>;

impl Parser {
    pub fn new(tokens: Vec<Token>, file: u32) -> Self {
        Parser { tokens, pos: 0, file }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_text(&self) -> Option<&str> {
        self.peek().map(|t| t.text.as_str())
    }

    fn is(&self, text: &str) -> bool {
        self.peek().map(|t| t == &text).unwrap_or(false)
    }

    fn loc_here(&self) -> SourceLocation {
        match self.peek() {
            Some(t) => SourceLocation::point(self.file, t.line, t.col),
            None => {
                let last = self.tokens.last();
                match last {
                    Some(t) => SourceLocation::point(self.file, t.line, t.col + t.text.len() as u32),
                    None => SourceLocation::point(self.file, 1, 1),
                }
            }
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, text: &str) -> PResult<Token> {
        if self.is(text) {
            Ok(self.advance().unwrap())
        } else {
            let loc = self.loc_here();
            let found = self.peek_text().unwrap_or("<eof>").to_string();
            Err(Diagnostic::parse(
                format!("expected '{text}', found '{found}'"),
                loc,
            ))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        let loc = self.loc_here();
        match self.advance() {
            Some(t) if t.text.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false) => {
                Ok(t.text)
            }
            Some(t) => Err(Diagnostic::parse(format!("expected an identifier, found '{}'", t.text), loc)),
            None => Err(Diagnostic::parse("expected an identifier, found end of input", loc)),
        }
    }

    fn eat_optional_semi(&mut self) {
        if self.is(";") {
            self.advance();
        }
    }

    pub fn parse_model(&mut self) -> PResult<Model> {
        let mut model = Model::default();
        loop {
            match self.peek_text().map(|s| s.to_ascii_lowercase()) {
                None => break,
                Some(kw) => match kw.as_str() {
                    "const" => {
                        self.advance();
                        loop {
                            model.consts.push(self.parse_const_decl()?);
                            if !self.peek_is_ident_decl_start() {
                                break;
                            }
                        }
                    }
                    "type" => {
                        self.advance();
                        loop {
                            model.types.push(self.parse_type_decl()?);
                            if !self.peek_is_ident_decl_start() {
                                break;
                            }
                        }
                    }
                    "var" => {
                        self.advance();
                        loop {
                            model.vars.extend(self.parse_var_decl_group()?);
                            if !self.peek_is_ident_decl_start() {
                                break;
                            }
                        }
                    }
                    "procedure" | "function" => {
                        model.callables.push(self.parse_callable()?);
                    }
                    "ruleset" | "rule" | "startstate" | "invariant" | "liveness" | "cover" | "alias" => {
                        model.rules.push(self.parse_rule()?);
                    }
                    other => {
                        let loc = self.loc_here();
                        return Err(Diagnostic::parse(format!("unexpected top-level token '{other}'"), loc));
                    }
                },
            }
        }
        Ok(model)
    }

    fn peek_is_ident_decl_start(&self) -> bool {
        match self.peek_text() {
            None => false,
            Some(t) => {
                let lower = t.to_ascii_lowercase();
                ![
                    "const", "type", "var", "procedure", "function", "ruleset", "rule",
                    "startstate", "invariant", "liveness", "cover", "alias",
                ]
                .contains(&lower.as_str())
                    && t.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false)
            }
        }
    }

    fn parse_const_decl(&mut self) -> PResult<ConstDecl> {
        let loc = self.loc_here();
        let name = self.expect_ident()?;
        self.expect(":")?;
        let value = self.parse_expr()?;
        self.eat_optional_semi();
        Ok(ConstDecl { name, value, loc })
    }

    fn parse_type_decl(&mut self) -> PResult<TypeDecl> {
        let loc = self.loc_here();
        let name = self.expect_ident()?;
        self.expect(":")?;
        let ty = self.parse_type()?;
        self.eat_optional_semi();
        Ok(TypeDecl { name, ty, loc })
    }

    fn parse_var_decl_group(&mut self) -> PResult<Vec<VarDecl>> {
        let loc = self.loc_here();
        let mut names = vec![self.expect_ident()?];
        while self.is(",") {
            self.advance();
            names.push(self.expect_ident()?);
        }
        self.expect(":")?;
        let ty = self.parse_type()?;
        self.eat_optional_semi();
        Ok(names
            .into_iter()
            .map(|name| VarDecl { name, ty: ty.clone(), loc })
            .collect())
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let loc = self.loc_here();
        match self.peek_text().map(|s| s.to_ascii_lowercase()) {
            Some(kw) if kw == "boolean" => {
                self.advance();
                Ok(Type::Boolean)
            }
            Some(kw) if kw == "scalarset" => {
                self.advance();
                self.expect("(")?;
                let n = self.parse_int_literal()?;
                self.expect(")")?;
                Ok(Type::Scalarset { n: n as u64 })
            }
            Some(kw) if kw == "enum" => {
                self.advance();
                self.expect("{")?;
                let mut members = vec![self.expect_ident()?];
                while self.is(",") {
                    self.advance();
                    members.push(self.expect_ident()?);
                }
                self.expect("}")?;
                Ok(Type::Enum { members })
            }
            Some(kw) if kw == "array" => {
                self.advance();
                self.expect("[")?;
                let index = self.parse_type()?;
                self.expect("]")?;
                self.expect_kw("of")?;
                let element = self.parse_type()?;
                Ok(Type::Array { index: Box::new(index), element: Box::new(element) })
            }
            Some(kw) if kw == "record" => {
                self.advance();
                let mut fields = Vec::new();
                while !self.is_kw("end") {
                    let group_names = {
                        let mut names = vec![self.expect_ident()?];
                        while self.is(",") {
                            self.advance();
                            names.push(self.expect_ident()?);
                        }
                        names
                    };
                    self.expect(":")?;
                    let ty = self.parse_type()?;
                    self.eat_optional_semi();
                    for name in group_names {
                        fields.push((name, ty.clone()));
                    }
                }
                self.expect_kw("end")?;
                Ok(Type::Record { fields })
            }
            Some(_) => {
                // Either a range "lo .. hi" or a type reference identifier.
                if self.looks_like_range_start() {
                    let lo = self.parse_expr()?;
                    self.expect("..")?;
                    let hi = self.parse_expr()?;
                    let lo_v = Self::expect_const_int(&lo, loc)?;
                    let hi_v = Self::expect_const_int(&hi, loc)?;
                    Ok(Type::Range { lo: lo_v, hi: hi_v })
                } else {
                    let name = self.expect_ident()?;
                    Ok(Type::TypeRef(name))
                }
            }
            None => Err(Diagnostic::parse("expected a type", loc)),
        }
    }

    fn expect_const_int(e: &Expr, loc: SourceLocation) -> PResult<i64> {
        match e {
            Expr::IntLit { value, .. } => Ok(*value),
            _ => Err(Diagnostic::const_eval("range bound must be a literal integer", loc)),
        }
    }

    /// Range bounds may themselves be arbitrary constant expressions
    /// (e.g. `0 .. N - 1`); we look ahead conservatively: if the next
    /// tokens before a top-level `..` don't hit `of`/`{`/`end` we treat
    /// it as a range.
    fn looks_like_range_start(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos;
        while let Some(t) = self.tokens.get(i) {
            match t.text.as_str() {
                "(" | "[" => depth += 1,
                ")" | "]" => depth -= 1,
                ".." if depth == 0 => return true,
                ";" if depth == 0 => return false,
                _ => {}
            }
            if depth < 0 {
                return false;
            }
            i += 1;
        }
        false
    }

    fn is_kw(&self, kw: &str) -> bool {
        self.peek_text().map(|t| t.eq_ignore_ascii_case(kw)).unwrap_or(false)
    }

    fn expect_kw(&mut self, kw: &str) -> PResult<()> {
        if self.is_kw(kw) {
            self.advance();
            Ok(())
        } else {
            let loc = self.loc_here();
            Err(Diagnostic::parse(format!("expected '{kw}'"), loc))
        }
    }

    fn parse_int_literal(&mut self) -> PResult<i64> {
        let loc = self.loc_here();
        let tok = self.advance().ok_or_else(|| Diagnostic::parse("expected an integer literal", loc))?;
        parse_int_text(&tok.text).ok_or_else(|| Diagnostic::parse(format!("'{}' is not an integer literal", tok.text), loc))
    }

    fn parse_callable(&mut self) -> PResult<Callable> {
        let loc = self.loc_here();
        let is_function = self.is_kw("function");
        self.advance(); // 'procedure' | 'function'
        let name = self.expect_ident()?;
        self.expect("(")?;
        let mut params = Vec::new();
        while !self.is(")") {
            let by_reference = self.is_kw("var");
            if by_reference {
                self.advance();
            }
            let mut names = vec![self.expect_ident()?];
            while self.is(",") {
                self.advance();
                names.push(self.expect_ident()?);
            }
            self.expect(":")?;
            let ty = self.parse_type()?;
            for n in names {
                params.push(Param { name: n, ty: ty.clone(), by_reference, loc });
            }
            if self.is(";") {
                self.advance();
            }
        }
        self.expect(")")?;
        let return_type = if is_function {
            self.expect(":")?;
            Some(self.parse_type()?)
        } else {
            None
        };
        self.eat_optional_semi();
        let mut decls = Vec::new();
        while self.is_kw("var") {
            self.advance();
            loop {
                decls.extend(self.parse_var_decl_group()?);
                if !self.peek_is_ident_decl_start() {
                    break;
                }
            }
        }
        self.expect_kw("begin")?;
        let body = self.parse_stmt_block(&["end"])?;
        self.expect_kw("end")?;
        self.eat_optional_semi();
        Ok(Callable { name, params, return_type, decls, body, loc })
    }

    fn parse_quantifier(&mut self) -> PResult<Quantifier> {
        let loc = self.loc_here();
        let name = self.expect_ident()?;
        if self.is(":") {
            self.advance();
            let ty = self.parse_type()?;
            Ok(Quantifier { name, kind: QuantifierKind::OverType(ty), loc })
        } else {
            self.expect(":=")?;
            let lo = self.parse_expr()?;
            self.expect_kw("to")?;
            let hi = self.parse_expr()?;
            let step = if self.is_kw("by") {
                self.advance();
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            Ok(Quantifier {
                name,
                kind: QuantifierKind::Range { lo: Box::new(lo), hi: Box::new(hi), step },
                loc,
            })
        }
    }

    fn parse_quantifier_list(&mut self) -> PResult<Vec<Quantifier>> {
        let mut qs = vec![self.parse_quantifier()?];
        while self.is(";") {
            self.advance();
            if self.peek_is_ident_decl_start() {
                qs.push(self.parse_quantifier()?);
            } else {
                break;
            }
        }
        Ok(qs)
    }

    fn parse_rule(&mut self) -> PResult<Rule> {
        let loc = self.loc_here();
        match self.peek_text().map(|s| s.to_ascii_lowercase()).unwrap().as_str() {
            "ruleset" => {
                self.advance();
                let quantifiers = self.parse_quantifier_list()?;
                self.expect_kw("do")?;
                let mut rules = Vec::new();
                while !self.is_kw("endruleset") {
                    rules.push(self.parse_rule()?);
                }
                self.expect_kw("endruleset")?;
                self.eat_optional_semi();
                Ok(Rule::RuleSet { quantifiers, rules, loc })
            }
            "alias" => {
                self.advance();
                let bindings = self.parse_alias_bindings()?;
                self.expect_kw("do")?;
                let mut rules = Vec::new();
                while !self.is_kw("endalias") {
                    rules.push(self.parse_rule()?);
                }
                self.expect_kw("endalias")?;
                self.eat_optional_semi();
                Ok(Rule::AliasRule { bindings, rules, loc })
            }
            "startstate" => {
                self.advance();
                let name = self.parse_rule_name()?;
                let mut decls = Vec::new();
                while self.is_kw("var") {
                    self.advance();
                    loop {
                        decls.extend(self.parse_var_decl_group()?);
                        if !self.peek_is_ident_decl_start() {
                            break;
                        }
                    }
                }
                self.expect_kw("begin")?;
                let body = self.parse_stmt_block(&["endstartstate", "end"])?;
                self.expect_kw_any(&["endstartstate", "end"])?;
                self.eat_optional_semi();
                Ok(Rule::Startstate { name, decls, body, loc })
            }
            "invariant" => {
                self.advance();
                let name = self.parse_rule_name()?;
                let predicate = self.parse_expr()?;
                self.eat_optional_semi();
                Ok(Rule::Invariant { name, predicate, loc })
            }
            "liveness" => {
                self.advance();
                let name = self.parse_rule_name()?;
                let predicate = self.parse_expr()?;
                self.eat_optional_semi();
                Ok(Rule::Liveness { name, predicate, loc })
            }
            "cover" => {
                self.advance();
                let name = self.parse_rule_name()?;
                let predicate = self.parse_expr()?;
                self.eat_optional_semi();
                Ok(Rule::Cover { name, predicate, loc })
            }
            "rule" => {
                self.advance();
                let name = self.parse_rule_name()?;
                let guard = if self.is_kw("begin") {
                    None
                } else {
                    let g = self.parse_expr()?;
                    self.expect("==>")?;
                    Some(g)
                };
                let mut decls = Vec::new();
                while self.is_kw("var") {
                    self.advance();
                    loop {
                        decls.extend(self.parse_var_decl_group()?);
                        if !self.peek_is_ident_decl_start() {
                            break;
                        }
                    }
                }
                self.expect_kw("begin")?;
                let body = self.parse_stmt_block(&["endrule", "end"])?;
                self.expect_kw_any(&["endrule", "end"])?;
                self.eat_optional_semi();
                Ok(Rule::Simple { name, guard, decls, body, loc })
            }
            other => Err(Diagnostic::parse(format!("expected a rule, found '{other}'"), loc)),
        }
    }

    fn parse_rule_name(&mut self) -> PResult<String> {
        let loc = self.loc_here();
        match self.advance() {
            Some(t) if t.text.starts_with('"') => Ok(t.text.trim_matches('"').to_string()),
            Some(t) => Ok(t.text),
            None => Err(Diagnostic::parse("expected a rule name", loc)),
        }
    }

    fn expect_kw_any(&mut self, kws: &[&str]) -> PResult<()> {
        for kw in kws {
            if self.is_kw(kw) {
                self.advance();
                return Ok(());
            }
        }
        let loc = self.loc_here();
        Err(Diagnostic::parse(format!("expected one of {kws:?}"), loc))
    }

    fn parse_alias_bindings(&mut self) -> PResult<Vec<(String, LValue)>> {
        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident()?;
            self.expect(":")?;
            let target = self.parse_lvalue()?;
            bindings.push((name, target));
            if self.is(";") {
                self.advance();
            } else {
                break;
            }
        }
        Ok(bindings)
    }

    fn parse_stmt_block(&mut self, terminators: &[&str]) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !terminators.iter().any(|t| self.is_kw(t)) && self.peek().is_some() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let loc = self.loc_here();
        match self.peek_text().map(|s| s.to_ascii_lowercase()) {
            Some(kw) if kw == "if" => self.parse_if(),
            Some(kw) if kw == "switch" => self.parse_switch(),
            Some(kw) if kw == "for" => self.parse_for(),
            Some(kw) if kw == "while" => self.parse_while(),
            Some(kw) if kw == "alias" => self.parse_alias_stmt(),
            Some(kw) if kw == "clear" => {
                self.advance();
                let target = self.parse_lvalue()?;
                self.eat_optional_semi();
                Ok(Stmt::Clear { target, loc })
            }
            Some(kw) if kw == "error" => {
                self.advance();
                let message = self.parse_string_literal()?;
                self.eat_optional_semi();
                Ok(Stmt::Error { message, loc })
            }
            Some(kw) if kw == "assert" => {
                self.advance();
                let cond = self.parse_expr()?;
                let message = if self.is(";") || self.peek().is_none() {
                    String::new()
                } else if self.peek().map(|t| t.text.starts_with('"')).unwrap_or(false) {
                    self.parse_string_literal()?
                } else {
                    String::new()
                };
                self.eat_optional_semi();
                Ok(Stmt::Assert { cond, message, loc })
            }
            Some(kw) if kw == "put" => {
                self.advance();
                if self.peek().map(|t| t.text.starts_with('"')).unwrap_or(false) {
                    let text = self.parse_string_literal()?;
                    self.eat_optional_semi();
                    Ok(Stmt::PutString { text, loc })
                } else {
                    let value = self.parse_expr()?;
                    self.eat_optional_semi();
                    Ok(Stmt::PutExpr { value, loc })
                }
            }
            Some(kw) if kw == "return" => {
                self.advance();
                let value = if self.is(";") || self.peek().is_none() || self.is_kw("end") {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.eat_optional_semi();
                Ok(Stmt::Return { value, loc })
            }
            _ => {
                // Either an assignment or a procedure call: look ahead
                // for ':=' before the next top-level ';'.
                if self.looks_like_assignment() {
                    let target = self.parse_lvalue()?;
                    self.expect(":=")?;
                    let value = self.parse_expr()?;
                    self.eat_optional_semi();
                    Ok(Stmt::Assign { target, value, loc })
                } else {
                    let name = self.expect_ident()?;
                    self.expect("(")?;
                    let mut args = Vec::new();
                    while !self.is(")") {
                        args.push(self.parse_expr()?);
                        if self.is(",") {
                            self.advance();
                        }
                    }
                    self.expect(")")?;
                    self.eat_optional_semi();
                    Ok(Stmt::ProcCall { name, args, loc })
                }
            }
        }
    }

    fn looks_like_assignment(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos;
        while let Some(t) = self.tokens.get(i) {
            match t.text.as_str() {
                "(" | "[" => depth += 1,
                ")" | "]" => depth -= 1,
                ":=" if depth == 0 => return true,
                ";" if depth == 0 => return false,
                _ => {}
            }
            if depth < 0 {
                return false;
            }
            i += 1;
        }
        false
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let loc = self.loc_here();
        self.advance(); // if
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        self.expect_kw("then")?;
        let body = self.parse_stmt_block(&["elsif", "else", "endif", "end"])?;
        branches.push((cond, body));
        while self.is_kw("elsif") {
            self.advance();
            let cond = self.parse_expr()?;
            self.expect_kw("then")?;
            let body = self.parse_stmt_block(&["elsif", "else", "endif", "end"])?;
            branches.push((cond, body));
        }
        let else_branch = if self.is_kw("else") {
            self.advance();
            self.parse_stmt_block(&["endif", "end"])?
        } else {
            Vec::new()
        };
        self.expect_kw_any(&["endif", "end"])?;
        self.eat_optional_semi();
        Ok(Stmt::IfChain { branches, else_branch, loc })
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let loc = self.loc_here();
        self.advance(); // switch
        let scrutinee = self.parse_expr()?;
        let mut cases = Vec::new();
        let mut default = Vec::new();
        while self.is_kw("case") {
            self.advance();
            let mut labels = vec![self.parse_expr()?];
            while self.is(",") {
                self.advance();
                labels.push(self.parse_expr()?);
            }
            self.expect(":")?;
            let body = self.parse_stmt_block(&["case", "else", "endswitch", "end"])?;
            cases.push((labels, body));
        }
        if self.is_kw("else") {
            self.advance();
            default = self.parse_stmt_block(&["endswitch", "end"])?;
        }
        self.expect_kw_any(&["endswitch", "end"])?;
        self.eat_optional_semi();
        Ok(Stmt::SwitchChain { scrutinee, cases, default, loc })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let loc = self.loc_here();
        self.advance(); // for
        let quantifier = self.parse_quantifier()?;
        self.expect_kw("do")?;
        let body = self.parse_stmt_block(&["endfor", "end"])?;
        self.expect_kw_any(&["endfor", "end"])?;
        self.eat_optional_semi();
        Ok(Stmt::For { quantifier, body, loc })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let loc = self.loc_here();
        self.advance(); // while
        let guard = self.parse_expr()?;
        self.expect_kw("do")?;
        let body = self.parse_stmt_block(&["endwhile", "end"])?;
        self.expect_kw_any(&["endwhile", "end"])?;
        self.eat_optional_semi();
        Ok(Stmt::While { guard, body, loc })
    }

    fn parse_alias_stmt(&mut self) -> PResult<Stmt> {
        let loc = self.loc_here();
        self.advance(); // alias
        let bindings = self.parse_alias_bindings()?;
        self.expect_kw("do")?;
        let body = self.parse_stmt_block(&["endalias", "end"])?;
        self.expect_kw_any(&["endalias", "end"])?;
        self.eat_optional_semi();
        Ok(Stmt::Alias { bindings, body, loc })
    }

    fn parse_string_literal(&mut self) -> PResult<String> {
        let loc = self.loc_here();
        match self.advance() {
            Some(t) if t.text.starts_with('"') => Ok(t.text.trim_matches('"').to_string()),
            _ => Err(Diagnostic::parse("expected a string literal", loc)),
        }
    }

    fn parse_lvalue(&mut self) -> PResult<LValue> {
        let loc = self.loc_here();
        let root = self.expect_ident()?;
        let mut steps = Vec::new();
        loop {
            if self.is(".") {
                self.advance();
                steps.push(LValueStep::Field(self.expect_ident()?));
            } else if self.is("[") {
                self.advance();
                let idx = self.parse_expr()?;
                self.expect("]")?;
                steps.push(LValueStep::Index(Box::new(idx)));
            } else {
                break;
            }
        }
        Ok(LValue { root, steps, loc })
    }

    // --- expressions, precedence-climbing -------------------------------

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_implies()
    }

    fn parse_implies(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_or()?;
        while self.is("->") {
            let loc = self.loc_here();
            self.advance();
            let rhs = self.parse_or()?;
            lhs = Expr::Bin { op: BinOp::Implies, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.is("|") {
            let loc = self.loc_here();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Bin { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.is("&") {
            let loc = self.loc_here();
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::Bin { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.is("!") {
            let loc = self.loc_here();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Not { operand: Box::new(operand), loc });
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> PResult<Expr> {
        let lhs = self.parse_add()?;
        let op = match self.peek_text() {
            Some("=") => Some(BinOp::Eq),
            Some("!=") => Some(BinOp::Neq),
            Some("<") => Some(BinOp::Lt),
            Some("<=") => Some(BinOp::Le),
            Some(">") => Some(BinOp::Gt),
            Some(">=") => Some(BinOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            let loc = self.loc_here();
            self.advance();
            let rhs = self.parse_add()?;
            return Ok(Expr::Bin { op, lhs: Box::new(lhs), rhs: Box::new(rhs), loc });
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_text() {
                Some("+") => BinOp::Add,
                Some("-") => BinOp::Sub,
                _ => break,
            };
            let loc = self.loc_here();
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Bin { op, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_text().map(|s| s.to_ascii_lowercase()) {
                Some(s) if s == "*" => BinOp::Mul,
                Some(s) if s == "/" => BinOp::Div,
                Some(s) if s == "%" => BinOp::Mod,
                _ => break,
            };
            let loc = self.loc_here();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Bin { op, lhs: Box::new(lhs), rhs: Box::new(rhs), loc };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.is("-") {
            let loc = self.loc_here();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Bin {
                op: BinOp::Sub,
                lhs: Box::new(Expr::IntLit { value: 0, loc }),
                rhs: Box::new(operand),
                loc,
            });
        }
        self.parse_ternary_or_quantifier_or_primary()
    }

    fn parse_ternary_or_quantifier_or_primary(&mut self) -> PResult<Expr> {
        let loc = self.loc_here();
        match self.peek_text().map(|s| s.to_ascii_lowercase()) {
            Some(kw) if kw == "forall" => {
                self.advance();
                let quantifier = self.parse_quantifier()?;
                self.expect_kw("do")?;
                let body = self.parse_expr()?;
                self.expect_kw_any(&["endforall", "end"])?;
                Ok(Expr::Forall { quantifier, body: Box::new(body), loc })
            }
            Some(kw) if kw == "exists" => {
                self.advance();
                let quantifier = self.parse_quantifier()?;
                self.expect_kw("do")?;
                let body = self.parse_expr()?;
                self.expect_kw_any(&["endexists", "end"])?;
                Ok(Expr::Exists { quantifier, body: Box::new(body), loc })
            }
            Some(kw) if kw == "isundefined" => {
                self.advance();
                self.expect("(")?;
                let target = self.parse_lvalue()?;
                self.expect(")")?;
                Ok(Expr::IsUndefined { target, loc })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let loc = self.loc_here();
        match self.peek_text().map(|s| s.to_ascii_lowercase()) {
            Some(kw) if kw == "true" => {
                self.advance();
                Ok(Expr::BoolLit { value: true, loc })
            }
            Some(kw) if kw == "false" => {
                self.advance();
                Ok(Expr::BoolLit { value: false, loc })
            }
            _ => {}
        }
        if self.is("(") {
            self.advance();
            let inner = self.parse_expr()?;
            self.expect(")")?;
            return Ok(inner);
        }
        match self.peek() {
            Some(t) if t.text.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) => {
                let tok = self.advance().unwrap();
                let value = parse_int_text(&tok.text)
                    .ok_or_else(|| Diagnostic::parse(format!("'{}' is not an integer literal", tok.text), loc))?;
                Ok(Expr::IntLit { value, loc })
            }
            _ => {
                let name = self.expect_ident()?;
                if self.is("(") {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.is(")") {
                        args.push(self.parse_expr()?);
                        if self.is(",") {
                            self.advance();
                        }
                    }
                    self.expect(")")?;
                    Ok(Expr::FuncCall { name, args, loc })
                } else {
                    let mut steps = Vec::new();
                    loop {
                        if self.is(".") {
                            self.advance();
                            steps.push(LValueStep::Field(self.expect_ident()?));
                        } else if self.is("[") {
                            self.advance();
                            let idx = self.parse_expr()?;
                            self.expect("]")?;
                            steps.push(LValueStep::Index(Box::new(idx)));
                        } else {
                            break;
                        }
                    }
                    if steps.is_empty() {
                        Ok(Expr::VarRead { path: LValue { root: name, steps, loc }, loc })
                    } else {
                        Ok(Expr::VarRead { path: LValue { root: name, steps, loc }, loc })
                    }
                }
            }
        }
    }
}

fn parse_int_text(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

pub fn parse(tokens: Vec<Token>, file: u32) -> PResult<Model> {
    Parser::new(tokens, file).parse_model()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> PResult<Model> {
        let (tokens, _) = tokenize(src, 0).unwrap();
        parse(tokens, 0)
    }

    #[test]
    fn parses_const_and_type_and_var_sections() {
        let model = parse_src(
            "const N: 3;\ntype t: 0..N-1;\nvar x: t;\n",
        )
        .unwrap();
        assert_eq!(model.consts.len(), 1);
        assert_eq!(model.types.len(), 1);
        assert_eq!(model.vars.len(), 1);
    }

    #[test]
    fn parses_a_simple_rule_with_guard() {
        let model = parse_src(
            "var x: boolean;\n\nrule \"flip\" x = false ==> begin x := true; end;\n",
        )
        .unwrap();
        assert_eq!(model.rules.len(), 1);
        match &model.rules[0] {
            Rule::Simple { name, guard, body, .. } => {
                assert_eq!(name, "flip");
                assert!(guard.is_some());
                assert_eq!(body.len(), 1);
            }
            _ => panic!("expected a simple rule"),
        }
    }

    #[test]
    fn parses_startstate_and_invariant() {
        let model = parse_src(
            "var x: boolean;\n\nstartstate begin x := false; end;\ninvariant \"never true\" x = false;\n",
        )
        .unwrap();
        assert_eq!(model.rules.len(), 2);
        assert!(matches!(model.rules[0], Rule::Startstate { .. }));
        assert!(matches!(model.rules[1], Rule::Invariant { .. }));
    }

    #[test]
    fn parses_ruleset_with_quantifier() {
        let model = parse_src(
            "var x: array [0..2] of boolean;\n\nruleset i: 0..2 do rule \"set\" begin x[i] := true; end; endruleset;\n",
        )
        .unwrap();
        match &model.rules[0] {
            Rule::RuleSet { quantifiers, rules, .. } => {
                assert_eq!(quantifiers.len(), 1);
                assert_eq!(rules.len(), 1);
            }
            _ => panic!("expected a ruleset"),
        }
    }

    #[test]
    fn parses_record_and_scalarset_types() {
        let model = parse_src(
            "type node: scalarset(3);\ntype msg: record src: node; dest: node; end;\nvar m: msg;\n",
        )
        .unwrap();
        assert_eq!(model.types.len(), 2);
        match &model.types[1].ty {
            Type::Record { fields } => assert_eq!(fields.len(), 2),
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn parse_error_reports_expected_token() {
        let err = parse_src("const N 3;").unwrap_err();
        assert!(matches!(err, Diagnostic::Parse { .. }));
    }
}
