//! The lexical scope stack.
//!
//! The bottom scope is always the state scope: declaring a variable
//! there assigns it a `StateSlot` and advances a running bit offset.
//! Every other scope (rule, procedure, `alias`, `for`, quantifier)
//! holds ordinary locals and may shadow an outer declaration, but not
//! one in the same scope.

use crate::ast::Type;
use crate::diagnostics::Diagnostic;
use rumur_core::SourceLocation;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Storage {
    StateSlot { bit_offset: u32, bit_width: u32 },
    Local,
    ByValueParam,
    ByReferenceParam,
}

#[derive(Debug, Clone)]
pub struct ValueSymbol {
    pub ty: Type,
    pub storage: Storage,
    pub writable: bool,
}

#[derive(Debug, Clone)]
pub enum Binding {
    Const { ty: Type },
    Var(ValueSymbol),
}

#[derive(Debug, Default)]
struct Scope {
    values: HashMap<String, Binding>,
    types: HashMap<String, Type>,
    /// Set only for the bottom (state) scope.
    is_state_scope: bool,
}

pub struct ScopeStack {
    scopes: Vec<Scope>,
    state_bit_offset: u32,
}

impl ScopeStack {
    pub fn new() -> Self {
        let mut stack = ScopeStack {
            scopes: Vec::new(),
            state_bit_offset: 0,
        };
        stack.scopes.push(Scope {
            is_state_scope: true,
            ..Scope::default()
        });
        stack
    }

    pub fn open(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn close(&mut self) {
        assert!(self.scopes.len() > 1, "cannot close the state scope");
        self.scopes.pop();
    }

    fn top_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    pub fn declare_const(
        &mut self,
        name: &str,
        ty: Type,
        loc: SourceLocation,
    ) -> Result<(), Diagnostic> {
        let scope = self.top_mut();
        if scope.values.contains_key(name) {
            return Err(Diagnostic::name(
                format!("'{name}' is already declared in this scope"),
                loc,
            ));
        }
        scope.values.insert(name.to_string(), Binding::Const { ty });
        Ok(())
    }

    pub fn declare_type(
        &mut self,
        name: &str,
        ty: Type,
        loc: SourceLocation,
    ) -> Result<(), Diagnostic> {
        let scope = self.top_mut();
        if scope.types.contains_key(name) {
            return Err(Diagnostic::name(
                format!("type '{name}' is already declared in this scope"),
                loc,
            ));
        }
        scope.types.insert(name.to_string(), ty);
        Ok(())
    }

    /// Declares a variable. In the state scope this assigns a
    /// `StateSlot` of `encoded_width` bits and advances the running
    /// state offset; elsewhere it is a `Local`.
    pub fn declare_var(
        &mut self,
        name: &str,
        ty: Type,
        encoded_width: u32,
        loc: SourceLocation,
    ) -> Result<(), Diagnostic> {
        let is_state_scope = self.top_mut().is_state_scope;
        let storage = if is_state_scope {
            let offset = self.state_bit_offset;
            self.state_bit_offset += encoded_width;
            Storage::StateSlot {
                bit_offset: offset,
                bit_width: encoded_width,
            }
        } else {
            Storage::Local
        };
        let scope = self.top_mut();
        if scope.values.contains_key(name) {
            return Err(Diagnostic::name(
                format!("'{name}' is already declared in this scope"),
                loc,
            ));
        }
        scope.values.insert(
            name.to_string(),
            Binding::Var(ValueSymbol {
                ty,
                storage,
                writable: true,
            }),
        );
        Ok(())
    }

    pub fn declare_param(
        &mut self,
        name: &str,
        ty: Type,
        by_reference: bool,
        loc: SourceLocation,
    ) -> Result<(), Diagnostic> {
        let scope = self.top_mut();
        if scope.values.contains_key(name) {
            return Err(Diagnostic::name(
                format!("'{name}' is already declared in this scope"),
                loc,
            ));
        }
        let storage = if by_reference {
            Storage::ByReferenceParam
        } else {
            Storage::ByValueParam
        };
        scope.values.insert(
            name.to_string(),
            Binding::Var(ValueSymbol {
                ty,
                storage,
                writable: true,
            }),
        );
        Ok(())
    }

    pub fn lookup_value(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.values.get(name))
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.types.get(name))
    }

    pub fn total_state_bits(&self) -> u32 {
        self.state_bit_offset
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::point(0, 1, 1)
    }

    #[test]
    fn state_scope_assigns_increasing_offsets() {
        let mut scopes = ScopeStack::new();
        scopes
            .declare_var("a", Type::Boolean, 1, loc())
            .unwrap();
        scopes
            .declare_var("b", Type::Range { lo: 0, hi: 7 }, 3, loc())
            .unwrap();
        match scopes.lookup_value("a").unwrap() {
            Binding::Var(sym) => match sym.storage {
                Storage::StateSlot { bit_offset, bit_width } => {
                    assert_eq!(bit_offset, 0);
                    assert_eq!(bit_width, 1);
                }
                _ => panic!("expected state slot"),
            },
            _ => panic!("expected var"),
        }
        match scopes.lookup_value("b").unwrap() {
            Binding::Var(sym) => match sym.storage {
                Storage::StateSlot { bit_offset, .. } => assert_eq!(bit_offset, 1),
                _ => panic!("expected state slot"),
            },
            _ => panic!("expected var"),
        }
        assert_eq!(scopes.total_state_bits(), 4);
    }

    #[test]
    fn inner_scope_variable_is_local_and_can_shadow() {
        let mut scopes = ScopeStack::new();
        scopes.declare_var("x", Type::Boolean, 1, loc()).unwrap();
        scopes.open();
        scopes
            .declare_var("x", Type::Range { lo: 0, hi: 3 }, 2, loc())
            .unwrap();
        match scopes.lookup_value("x").unwrap() {
            Binding::Var(sym) => assert!(matches!(sym.storage, Storage::Local)),
            _ => panic!("expected var"),
        }
        scopes.close();
        match scopes.lookup_value("x").unwrap() {
            Binding::Var(sym) => assert!(matches!(sym.storage, Storage::StateSlot { .. })),
            _ => panic!("expected var"),
        }
    }

    #[test]
    fn duplicate_declaration_in_same_scope_is_rejected() {
        let mut scopes = ScopeStack::new();
        scopes.declare_var("x", Type::Boolean, 1, loc()).unwrap();
        let err = scopes.declare_var("x", Type::Boolean, 1, loc()).unwrap_err();
        assert!(matches!(err, Diagnostic::Name { .. }));
    }

    #[test]
    #[should_panic(expected = "cannot close the state scope")]
    fn closing_the_state_scope_panics() {
        let mut scopes = ScopeStack::new();
        scopes.close();
    }
}
