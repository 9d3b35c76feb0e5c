use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{FunctionDecl, ProcedureDecl, VarType};
use crate::error::{runtime_error, Result};
use crate::runtime::Value;

/// Backing storage of one declared array. Procedures alias it, functions
/// receive a copy.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Handle into the scope arena. The root scope is created with the
/// environment and outlives every per-call scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    variables: HashMap<String, Value>,
    declared_types: HashMap<String, VarType>,
    constants: HashMap<String, Value>,
    arrays: HashMap<String, ArrayRef>,
}

/// Chained, mutable symbol table used only during evaluation. Scopes live in
/// an arena addressed by `ScopeId`; name resolution walks parent links from
/// the current scope to the root. Function and procedure declarations are
/// root-level and visible from every scope.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    functions: HashMap<String, Rc<FunctionDecl>>,
    procedures: HashMap<String, Rc<ProcedureDecl>>,
}

impl Default for Environment {
    fn default() -> Environment {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            scopes: vec![Scope::default()],
            functions: HashMap::new(),
            procedures: HashMap::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Opens a per-call scope chained to the root.
    pub fn enter_scope(&mut self) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(self.root()),
            ..Scope::default()
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Discards `scope` and everything opened after it. Calls nest strictly,
    /// so truncation is exact.
    pub fn exit_scope(&mut self, scope: ScopeId) {
        self.scopes.truncate(scope.0);
    }

    fn resolve(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = from;
        loop {
            let scope = &self.scopes[current.0];
            if scope.declared_types.contains_key(name)
                || scope.variables.contains_key(name)
                || scope.constants.contains_key(name)
                || scope.arrays.contains_key(name)
            {
                return Some(current);
            }
            current = scope.parent?;
        }
    }

    /// Declares a scalar, or an array when `length` is given. A name may be
    /// bound as exactly one of variable, constant or array per scope.
    pub fn declare_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        var_type: VarType,
        length: Option<usize>,
    ) -> Result<()> {
        let slot = &mut self.scopes[scope.0];
        if slot.declared_types.contains_key(name)
            || slot.constants.contains_key(name)
            || slot.arrays.contains_key(name)
        {
            return runtime_error(format!("Η μεταβλητή {name} έχει ήδη δηλωθεί"));
        }
        if let Some(length) = length {
            slot.arrays.insert(
                name.to_string(),
                Rc::new(RefCell::new(vec![Value::zero(var_type); length])),
            );
        }
        slot.declared_types.insert(name.to_string(), var_type);
        Ok(())
    }

    /// Constants are write-once: declared with their value, never assigned.
    pub fn declare_constant(&mut self, scope: ScopeId, name: &str, value: Value) -> Result<()> {
        let slot = &mut self.scopes[scope.0];
        if slot.declared_types.contains_key(name) || slot.constants.contains_key(name) {
            return runtime_error(format!("Η σταθερά {name} έχει ήδη δηλωθεί"));
        }
        slot.constants.insert(name.to_string(), value);
        Ok(())
    }

    pub fn declare_function(&mut self, name: &str, decl: Rc<FunctionDecl>) -> Result<()> {
        if self.functions.contains_key(name) {
            return runtime_error(format!("Η συνάρτηση {name} έχει ήδη οριστεί"));
        }
        self.functions.insert(name.to_string(), decl);
        Ok(())
    }

    pub fn declare_procedure(&mut self, name: &str, decl: Rc<ProcedureDecl>) -> Result<()> {
        if self.procedures.contains_key(name) {
            return runtime_error(format!("Η διαδικασία {name} έχει ήδη οριστεί"));
        }
        self.procedures.insert(name.to_string(), decl);
        Ok(())
    }

    pub fn look_up_function(&self, name: &str) -> Result<Rc<FunctionDecl>> {
        match self.functions.get(name) {
            Some(decl) => Ok(Rc::clone(decl)),
            None => runtime_error(format!("Δεν έχει οριστεί συνάρτηση {name}")),
        }
    }

    /// Procedure lookup may legitimately miss; the caller decides how to
    /// report it.
    pub fn look_up_procedure(&self, name: &str) -> Option<Rc<ProcedureDecl>> {
        self.procedures.get(name).map(Rc::clone)
    }

    /// Walks the chain for an array binding under `name`.
    pub fn array_lookup(&self, scope: ScopeId, name: &str) -> Option<ArrayRef> {
        let mut current = scope;
        loop {
            let slot = &self.scopes[current.0];
            if let Some(array) = slot.arrays.get(name) {
                return Some(Rc::clone(array));
            }
            current = slot.parent?;
        }
    }

    /// True when `scope` itself declares `name` as an array; parent scopes
    /// are not consulted. Call binding uses this to tell array parameters
    /// from scalars.
    pub fn has_local_array(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].arrays.contains_key(name)
    }

    /// Binds `name` directly to an existing backing sequence. With the
    /// caller's own `ArrayRef` this aliases; with a fresh one it copies.
    pub fn set_array_argument(&mut self, scope: ScopeId, name: &str, contents: ArrayRef) {
        self.scopes[scope.0].arrays.insert(name.to_string(), contents);
    }

    pub fn assign_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
        index: Option<i64>,
    ) -> Result<()> {
        if let Some(index) = index {
            let Some(array) = self.array_lookup(scope, name) else {
                return runtime_error(format!("Δεν έχει δηλωθεί πίνακας {name}"));
            };
            let cell_type = self.look_up_variable_type(scope, name)?;
            if !value.matches_array_cell(cell_type) {
                return runtime_error(format!(
                    "Type mismatch: cannot assign {} to {}[{}]",
                    value.type_name(),
                    name,
                    index
                ));
            }
            let mut cells = array.borrow_mut();
            let length = cells.len();
            if index < 1 || index as usize > length {
                return runtime_error(format!(
                    "Ο δείκτης {index} είναι εκτός των ορίων του πίνακα {name} (1..{length})"
                ));
            }
            cells[(index - 1) as usize] = value;
            return Ok(());
        }

        let Some(owner) = self.resolve(scope, name) else {
            return runtime_error(format!("Δεν έχει δηλωθεί η μεταβλητή {name}"));
        };
        let slot = &mut self.scopes[owner.0];
        if slot.constants.contains_key(name) {
            return runtime_error(format!("Δεν επιτρέπεται η εκχώρηση στην σταθερά {name}"));
        }
        if slot.arrays.contains_key(name) {
            return runtime_error(format!("Ο πίνακας {name} χρειάζεται δείκτη"));
        }
        let Some(declared) = slot.declared_types.get(name).copied() else {
            return runtime_error(format!("Δεν έχει δηλωθεί η μεταβλητή {name}"));
        };
        if !value.matches_declared(declared) {
            return runtime_error(format!(
                "Type mismatch: cannot assign {} to {}",
                value.type_name(),
                name
            ));
        }
        slot.variables.insert(name.to_string(), value);
        Ok(())
    }

    pub fn look_up_variable(&self, scope: ScopeId, name: &str, index: Option<i64>) -> Result<Value> {
        if let Some(index) = index {
            let Some(array) = self.array_lookup(scope, name) else {
                return runtime_error(format!("Δεν έχει δηλωθεί πίνακας {name}"));
            };
            let cells = array.borrow();
            let length = cells.len();
            if index < 1 || index as usize > length {
                return runtime_error(format!(
                    "Ο δείκτης {index} είναι εκτός των ορίων του πίνακα {name} (1..{length})"
                ));
            }
            return Ok(cells[(index - 1) as usize].clone());
        }

        let Some(owner) = self.resolve(scope, name) else {
            return runtime_error(format!("Δεν έχει δηλωθεί η μεταβλητή {name}"));
        };
        let slot = &self.scopes[owner.0];
        if let Some(value) = slot.variables.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = slot.constants.get(name) {
            return Ok(value.clone());
        }
        if let Some(array) = slot.arrays.get(name) {
            return Ok(Value::Array(Rc::clone(array)));
        }
        runtime_error(format!("Η μεταβλητή {name} δεν έχει τιμή"))
    }

    pub fn look_up_variable_type(&self, scope: ScopeId, name: &str) -> Result<VarType> {
        let mut current = scope;
        loop {
            let slot = &self.scopes[current.0];
            if let Some(var_type) = slot.declared_types.get(name) {
                return Ok(*var_type);
            }
            match slot.parent {
                Some(parent) => current = parent,
                None => return runtime_error(format!("Δεν έχει δηλωθεί η μεταβλητή {name}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_assign_look_up() -> Result<()> {
        let mut env = Environment::new();
        let root = env.root();
        env.declare_variable(root, "x", VarType::Integer, None)?;
        env.assign_variable(root, "x", Value::Integer(42), None)?;
        assert_eq!(env.look_up_variable(root, "x", None)?, Value::Integer(42));
        assert_eq!(env.look_up_variable_type(root, "x")?, VarType::Integer);
        Ok(())
    }

    #[test]
    fn test_type_discipline() -> Result<()> {
        let mut env = Environment::new();
        let root = env.root();
        env.declare_variable(root, "x", VarType::Integer, None)?;
        env.declare_variable(root, "r", VarType::Real, None)?;

        assert!(env
            .assign_variable(root, "x", Value::String("a".to_string()), None)
            .is_err());
        assert!(env.assign_variable(root, "x", Value::Real(2.5), None).is_err());
        // an integer is accepted where a real is declared
        env.assign_variable(root, "r", Value::Integer(3), None)?;
        env.assign_variable(root, "r", Value::Real(2.5), None)?;
        Ok(())
    }

    #[test]
    fn test_redeclaration_and_constants() -> Result<()> {
        let mut env = Environment::new();
        let root = env.root();
        env.declare_variable(root, "x", VarType::Integer, None)?;
        assert!(env.declare_variable(root, "x", VarType::Real, None).is_err());

        env.declare_constant(root, "π", Value::Real(3.14))?;
        assert!(env.declare_variable(root, "π", VarType::Real, None).is_err());
        assert!(env.assign_variable(root, "π", Value::Real(3.0), None).is_err());
        assert_eq!(env.look_up_variable(root, "π", None)?, Value::Real(3.14));
        Ok(())
    }

    #[test]
    fn test_arrays_are_presized_and_bounds_checked() -> Result<()> {
        let mut env = Environment::new();
        let root = env.root();
        env.declare_variable(root, "Α", VarType::Integer, Some(3))?;

        assert_eq!(env.look_up_variable(root, "Α", Some(1))?, Value::Integer(0));
        env.assign_variable(root, "Α", Value::Integer(7), Some(3))?;
        assert_eq!(env.look_up_variable(root, "Α", Some(3))?, Value::Integer(7));

        assert!(env.assign_variable(root, "Α", Value::Integer(1), Some(0)).is_err());
        assert!(env.assign_variable(root, "Α", Value::Integer(1), Some(4)).is_err());
        assert!(env.look_up_variable(root, "Α", Some(4)).is_err());

        // numeric leniency on cells, strictness otherwise
        env.assign_variable(root, "Α", Value::Real(2.5), Some(1))?;
        assert!(env
            .assign_variable(root, "Α", Value::Boolean(true), Some(1))
            .is_err());
        Ok(())
    }

    #[test]
    fn test_chain_resolution() -> Result<()> {
        let mut env = Environment::new();
        let root = env.root();
        env.declare_variable(root, "x", VarType::Integer, None)?;
        env.assign_variable(root, "x", Value::Integer(1), None)?;

        let child = env.enter_scope();
        env.declare_variable(child, "x", VarType::Integer, None)?;
        env.assign_variable(child, "x", Value::Integer(2), None)?;

        // the child's binding shadows the root's
        assert_eq!(env.look_up_variable(child, "x", None)?, Value::Integer(2));
        assert_eq!(env.look_up_variable(root, "x", None)?, Value::Integer(1));

        env.exit_scope(child);
        assert_eq!(env.look_up_variable(root, "x", None)?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_array_argument_aliasing() -> Result<()> {
        let mut env = Environment::new();
        let root = env.root();
        env.declare_variable(root, "Α", VarType::Integer, Some(2))?;
        env.assign_variable(root, "Α", Value::Integer(5), Some(1))?;

        let child = env.enter_scope();
        env.declare_variable(child, "Π", VarType::Integer, Some(2))?;
        let backing = env.array_lookup(root, "Α").ok_or_else(|| {
            crate::error::Error::Runtime {
                message: "missing array".to_string(),
            }
        })?;
        env.set_array_argument(child, "Π", backing);

        env.assign_variable(child, "Π", Value::Integer(9), Some(1))?;
        assert_eq!(env.look_up_variable(root, "Α", Some(1))?, Value::Integer(9));
        Ok(())
    }
}
