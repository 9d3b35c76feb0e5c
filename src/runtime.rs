use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use log::debug;

use crate::ast::{
    BinaryOp, ElseBranch, Expression, ForStatement, FunctionDecl, Identifier, IfStatement,
    NumberLiteral, ProcedureDecl, Program, Statement, UnaryOp, VarType,
};
use crate::environment::{Environment, ScopeId};
use crate::error::{runtime_error, Result};
use crate::io::InputSource;
use crate::parser::parse;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    String(String),
    Boolean(bool),
    Array(crate::environment::ArrayRef),
}

impl Value {
    pub fn zero(var_type: VarType) -> Value {
        match var_type {
            VarType::Integer => Value::Integer(0),
            VarType::Real => Value::Real(0.0),
            VarType::String => Value::String(String::new()),
            VarType::Boolean => Value::Boolean(false),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Real(_) => "Real",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Array(_) => "Array",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(x) => Some(*x),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        match self {
            Value::Integer(_) => true,
            Value::Real(x) => x.fract() == 0.0,
            _ => false,
        }
    }

    /// Scalar assignment discipline: tags must agree, except that an
    /// integer value is accepted where a real is declared.
    pub fn matches_declared(&self, declared: VarType) -> bool {
        matches!(
            (self, declared),
            (Value::Integer(_), VarType::Integer | VarType::Real)
                | (Value::Real(_), VarType::Real)
                | (Value::String(_), VarType::String)
                | (Value::Boolean(_), VarType::Boolean)
        )
    }

    /// Array cells take either numeric tag when the array is numeric.
    pub fn matches_array_cell(&self, declared: VarType) -> bool {
        matches!(
            (self, declared),
            (
                Value::Integer(_) | Value::Real(_),
                VarType::Integer | VarType::Real
            ) | (Value::String(_), VarType::String)
                | (Value::Boolean(_), VarType::Boolean)
        )
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Real(x) => {
                if x.fract() == 0.0 {
                    write!(f, "{}", *x as i64)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "ΑΛΗΘΗΣ" } else { "ΨΕΥΔΗΣ" }),
            Value::Array(cells) => {
                write!(f, "[")?;
                for (i, cell) in cells.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", cell)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Classifies a computed number by the integrality of its value, the same
/// way declared return types are checked.
fn number_value(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < 9.0e18 {
        Value::Integer(x as i64)
    } else {
        Value::Real(x)
    }
}

enum BindMode {
    Copy,
    Alias,
}

/// Tree-walking evaluator. Executes a parsed program against a fresh
/// environment, consuming the input channel for ΔΙΑΒΑΣΕ and buffering one
/// line per ΓΡΑΨΕ.
pub struct Interpreter {
    env: Environment,
    input: Box<dyn InputSource>,
    output: Vec<String>,
}

impl Interpreter {
    pub fn new(input: Box<dyn InputSource>) -> Interpreter {
        Interpreter {
            env: Environment::new(),
            input,
            output: Vec::new(),
        }
    }

    /// Output emitted so far. Preserved even when a later statement failed.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn run(&mut self, program: &Program) -> Result<Vec<String>> {
        for decl in program.functions.values() {
            self.env.declare_function(&decl.name, Rc::new(decl.clone()))?;
        }
        for decl in program.procedures.values() {
            self.env.declare_procedure(&decl.name, Rc::new(decl.clone()))?;
        }
        let root = self.env.root();
        for statement in &program.body {
            self.execute(statement, root)?;
        }
        Ok(self.output.clone())
    }

    fn execute(&mut self, statement: &Statement, scope: ScopeId) -> Result<()> {
        match statement {
            Statement::Start => Ok(()),
            Statement::Declaration { var_type, names } => {
                for declarator in names {
                    self.env
                        .declare_variable(scope, &declarator.name, *var_type, declarator.length)?;
                }
                Ok(())
            }
            Statement::Constants(defs) => {
                for def in defs {
                    let value = self.evaluate(&def.value, scope)?;
                    self.env.declare_constant(scope, &def.name, value)?;
                }
                Ok(())
            }
            Statement::Assignment { target, value } => {
                let value = self.evaluate(value, scope)?;
                let index = self.evaluate_index(&target.index, scope)?;
                self.env.assign_variable(scope, &target.name, value, index)
            }
            Statement::If(statement) => self.execute_if(statement, scope),
            Statement::For(statement) => self.execute_for(statement, scope),
            Statement::While(statement) => self.execute_while(statement, scope),
            Statement::DoWhile(statement) => self.execute_do_while(statement, scope),
            Statement::Print(items) => self.execute_print(items, scope),
            Statement::Read(targets) => self.execute_read(targets, scope),
            Statement::ProcedureCall { name, arguments } => {
                self.call_procedure(name, arguments, scope)
            }
            Statement::Expression(expression) => {
                self.evaluate(expression, scope)?;
                Ok(())
            }
        }
    }

    fn execute_all(&mut self, statements: &[Statement], scope: ScopeId) -> Result<()> {
        for statement in statements {
            self.execute(statement, scope)?;
        }
        Ok(())
    }

    fn execute_if(&mut self, statement: &IfStatement, scope: ScopeId) -> Result<()> {
        let condition = self.evaluate(&statement.condition, scope)?;
        let Value::Boolean(test) = condition else {
            return runtime_error("Η συνθήκη του ΑΝ πρέπει να είναι λογική τιμή");
        };
        if test {
            self.execute_all(&statement.consequent, scope)
        } else {
            match &statement.alternate {
                Some(ElseBranch::ElseIf(inner)) => self.execute_if(inner, scope),
                Some(ElseBranch::Else(statements)) => self.execute_all(statements, scope),
                None => Ok(()),
            }
        }
    }

    fn execute_for(&mut self, statement: &ForStatement, scope: ScopeId) -> Result<()> {
        let start = self.evaluate_numeric(
            &statement.start,
            scope,
            "Η αρχική τιμή του ΓΙΑ πρέπει να είναι αριθμός",
        )?;
        let end = self.evaluate_numeric(
            &statement.end,
            scope,
            "Η τελική τιμή του ΓΙΑ πρέπει να είναι αριθμός",
        )?;
        let step = self.evaluate_numeric(
            &statement.step,
            scope,
            "Το βήμα του ΓΙΑ πρέπει να είναι αριθμός",
        )?;
        if step == 0.0 {
            return runtime_error("Το βήμα του ΓΙΑ δεν μπορεί να είναι 0");
        }

        self.env
            .assign_variable(scope, &statement.variable, number_value(start), None)?;
        loop {
            let current = self.counter_value(&statement.variable, scope)?;
            if (step > 0.0 && current > end) || (step < 0.0 && current < end) {
                return Ok(());
            }
            self.execute_all(&statement.body, scope)?;
            // the loop variable may have been mutated in the body; its live
            // value drives the next step
            let next = self.counter_value(&statement.variable, scope)? + step;
            self.env
                .assign_variable(scope, &statement.variable, number_value(next), None)?;
        }
    }

    fn counter_value(&self, variable: &str, scope: ScopeId) -> Result<f64> {
        let value = self.env.look_up_variable(scope, variable, None)?;
        match value.as_number() {
            Some(number) => Ok(number),
            None => runtime_error("Η μεταβλητή του ΓΙΑ πρέπει να είναι αριθμός"),
        }
    }

    fn execute_while(&mut self, statement: &crate::ast::WhileStatement, scope: ScopeId) -> Result<()> {
        loop {
            match self.evaluate(&statement.condition, scope)? {
                Value::Boolean(true) => self.execute_all(&statement.body, scope)?,
                Value::Boolean(false) => return Ok(()),
                _ => return runtime_error("Η συνθήκη του ΟΣΟ πρέπει να είναι λογική τιμή"),
            }
        }
    }

    /// ΜΕΧΡΙΣ_ΟΤΟΥ repeats until the condition turns true.
    fn execute_do_while(
        &mut self,
        statement: &crate::ast::DoWhileStatement,
        scope: ScopeId,
    ) -> Result<()> {
        loop {
            self.execute_all(&statement.body, scope)?;
            match self.evaluate(&statement.condition, scope)? {
                Value::Boolean(true) => return Ok(()),
                Value::Boolean(false) => continue,
                _ => {
                    return runtime_error(
                        "Η συνθήκη του ΜΕΧΡΙΣ_ΟΤΟΥ πρέπει να είναι λογική τιμή",
                    )
                }
            }
        }
    }

    fn execute_print(&mut self, items: &[Expression], scope: ScopeId) -> Result<()> {
        let mut line = String::new();
        for item in items {
            let value = self.evaluate(item, scope)?;
            line.push_str(&value.to_string());
            line.push(' ');
        }
        self.output.push(line);
        Ok(())
    }

    fn execute_read(&mut self, targets: &[Identifier], scope: ScopeId) -> Result<()> {
        for target in targets {
            let Some(line) = self.input.next_line() else {
                return runtime_error(format!("Δεν υπάρχει είσοδος για το {}", target.name));
            };
            let line = line.trim();
            let value = match self.env.look_up_variable_type(scope, &target.name)? {
                VarType::Integer => match line.parse::<i64>() {
                    Ok(number) => Value::Integer(number),
                    Err(_) => {
                        return runtime_error(format!("Αναμενόταν ακέραιος για το {}", target.name))
                    }
                },
                VarType::Real => match line.parse::<f64>() {
                    Ok(number) => Value::Real(number),
                    Err(_) => {
                        return runtime_error(format!(
                            "Αναμενόταν πραγματικός για το {}",
                            target.name
                        ))
                    }
                },
                VarType::String => Value::String(line.to_string()),
                VarType::Boolean => {
                    return runtime_error("Δεν υποστηρίζεται η είσοδος λογικής τιμής")
                }
            };
            let index = self.evaluate_index(&target.index, scope)?;
            self.env.assign_variable(scope, &target.name, value, index)?;
        }
        Ok(())
    }

    fn evaluate(&mut self, expression: &Expression, scope: ScopeId) -> Result<Value> {
        match expression {
            Expression::Number(NumberLiteral::Integer(n)) => Ok(Value::Integer(*n)),
            Expression::Number(NumberLiteral::Real(x)) => Ok(Value::Real(*x)),
            Expression::StringLiteral(s) => Ok(Value::String(s.clone())),
            Expression::BooleanLiteral(b) => Ok(Value::Boolean(*b)),
            Expression::Identifier(identifier) => {
                let index = self.evaluate_index(&identifier.index, scope)?;
                self.env.look_up_variable(scope, &identifier.name, index)
            }
            Expression::Unary { operator, operand } => self.evaluate_unary(*operator, operand, scope),
            Expression::Binary {
                operator,
                left,
                right,
            } => self.evaluate_binary(*operator, left, right, scope),
            Expression::Call { name, arguments } => self.call_function(name, arguments, scope),
        }
    }

    fn evaluate_index(
        &mut self,
        index: &Option<Box<Expression>>,
        scope: ScopeId,
    ) -> Result<Option<i64>> {
        let Some(expression) = index else {
            return Ok(None);
        };
        match self.evaluate(expression, scope)? {
            Value::Integer(n) => Ok(Some(n)),
            Value::Real(x) if x.fract() == 0.0 => Ok(Some(x as i64)),
            _ => runtime_error("Ο δείκτης πίνακα πρέπει να είναι ακέραιος"),
        }
    }

    fn evaluate_numeric(
        &mut self,
        expression: &Expression,
        scope: ScopeId,
        message: &str,
    ) -> Result<f64> {
        let value = self.evaluate(expression, scope)?;
        match value.as_number() {
            Some(number) => Ok(number),
            None => runtime_error(message),
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: UnaryOp,
        operand: &Expression,
        scope: ScopeId,
    ) -> Result<Value> {
        let value = self.evaluate(operand, scope)?;
        match operator {
            UnaryOp::Negate => match value.as_number() {
                Some(number) => Ok(number_value(-number)),
                None => runtime_error(format!("Expected number, got {}", value.type_name())),
            },
            UnaryOp::Plus => match value.as_number() {
                Some(_) => Ok(value),
                None => runtime_error(format!("Expected number, got {}", value.type_name())),
            },
            UnaryOp::Not => match value {
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                _ => runtime_error(format!("Expected Boolean, got {}", value.type_name())),
            },
        }
    }

    fn evaluate_binary(
        &mut self,
        operator: BinaryOp,
        left: &Expression,
        right: &Expression,
        scope: ScopeId,
    ) -> Result<Value> {
        // the right operand is evaluated first; side-effecting calls
        // depend on this order
        let right = self.evaluate(right, scope)?;
        let left = self.evaluate(left, scope)?;

        match operator {
            BinaryOp::And | BinaryOp::Or => match (&left, &right) {
                (Value::Boolean(a), Value::Boolean(b)) => {
                    let result = if operator == BinaryOp::And {
                        *a && *b
                    } else {
                        *a || *b
                    };
                    Ok(Value::Boolean(result))
                }
                _ => runtime_error(format!(
                    "Expected Boolean, got {} and {}",
                    left.type_name(),
                    right.type_name()
                )),
            },
            BinaryOp::Equal => Ok(Value::Boolean(values_equal(&left, &right))),
            BinaryOp::NotEqual => Ok(Value::Boolean(!values_equal(&left, &right))),
            BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
                compare_values(operator, &left, &right)
            }
            _ => arithmetic(operator, &left, &right),
        }
    }

    fn call_function(
        &mut self,
        name: &str,
        arguments: &[Expression],
        caller: ScopeId,
    ) -> Result<Value> {
        let function = self.env.look_up_function(name)?;
        if function.params.len() != arguments.len() {
            return runtime_error(format!(
                "Η συνάρτηση {} δέχεται {} ορίσματα, δόθηκαν {}",
                name,
                function.params.len(),
                arguments.len()
            ));
        }
        if body_contains_io(&function.body) {
            return runtime_error("Δεν επιτρέπεται η χρήση ΔΙΑΒΑΣΕ/ΓΡΑΨΕ στην συνάρτηση");
        }
        debug!("calling function {name}");
        let callee = self.env.enter_scope();
        let result = self.run_function_body(&function, arguments, caller, callee);
        self.env.exit_scope(callee);
        result
    }

    fn run_function_body(
        &mut self,
        function: &FunctionDecl,
        arguments: &[Expression],
        caller: ScopeId,
        callee: ScopeId,
    ) -> Result<Value> {
        // the function's own name is its result slot
        self.env
            .declare_variable(callee, &function.name, function.return_type, None)?;
        for statement in &function.body {
            if matches!(statement, Statement::Start) {
                self.bind_arguments(&function.params, arguments, caller, callee, BindMode::Copy)?;
            }
            self.execute(statement, callee)?;
        }
        let Ok(value) = self.env.look_up_variable(callee, &function.name, None) else {
            return runtime_error(format!("Η συνάρτηση {} δεν επέστρεψε τιμή", function.name));
        };
        // the numeric shape of the result must match the declared type
        match function.return_type {
            VarType::Integer if value.as_number().is_some() && !value.is_integral() => {
                runtime_error(format!("Αναμενόταν ΑΚΕΡΑΙΑ τιμή από την {}", function.name))
            }
            VarType::Real if value.is_integral() => runtime_error(format!(
                "Αναμενόταν ΠΡΑΓΜΑΤΙΚΗ τιμή από την {}",
                function.name
            )),
            _ => Ok(value),
        }
    }

    fn call_procedure(
        &mut self,
        name: &str,
        arguments: &[Expression],
        caller: ScopeId,
    ) -> Result<()> {
        let Some(procedure) = self.env.look_up_procedure(name) else {
            return runtime_error(format!("Δεν έχει οριστεί διαδικασία {name}"));
        };
        if procedure.params.len() != arguments.len() {
            return runtime_error(format!(
                "Η διαδικασία {} δέχεται {} ορίσματα, δόθηκαν {}",
                name,
                procedure.params.len(),
                arguments.len()
            ));
        }
        debug!("calling procedure {name}");
        let callee = self.env.enter_scope();
        let result = self.run_procedure_body(&procedure, arguments, caller, callee);
        self.env.exit_scope(callee);
        result
    }

    fn run_procedure_body(
        &mut self,
        procedure: &ProcedureDecl,
        arguments: &[Expression],
        caller: ScopeId,
        callee: ScopeId,
    ) -> Result<()> {
        for statement in &procedure.body {
            if matches!(statement, Statement::Start) {
                self.bind_arguments(&procedure.params, arguments, caller, callee, BindMode::Alias)?;
            }
            self.execute(statement, callee)?;
        }
        // scalar parameters are written back into the caller's variables;
        // arrays already aliased the caller's storage
        for (param, argument) in procedure.params.iter().zip(arguments) {
            if self.env.has_local_array(callee, param) {
                continue;
            }
            let Expression::Identifier(target) = argument else {
                continue;
            };
            let value = self.env.look_up_variable(callee, param, None)?;
            let index = self.evaluate_index(&target.index, caller)?;
            self.env.assign_variable(caller, &target.name, value, index)?;
        }
        Ok(())
    }

    /// Binds call arguments into the callee scope at its ΑΡΧΗ marker, after
    /// the body's declarations have run. Array parameters take the caller's
    /// array contents per `mode`; scalars are evaluated in the caller scope.
    fn bind_arguments(
        &mut self,
        params: &[String],
        arguments: &[Expression],
        caller: ScopeId,
        callee: ScopeId,
        mode: BindMode,
    ) -> Result<()> {
        for (param, argument) in params.iter().zip(arguments) {
            let value = self.evaluate(argument, caller)?;
            if self.env.has_local_array(callee, param) {
                let Value::Array(contents) = value else {
                    return runtime_error(format!("Αναμενόταν πίνακας για την παράμετρο {param}"));
                };
                let contents = match mode {
                    BindMode::Copy => {
                        Rc::new(std::cell::RefCell::new(contents.borrow().clone()))
                    }
                    BindMode::Alias => contents,
                };
                self.env.set_array_argument(callee, param, contents);
            } else {
                self.env.assign_variable(callee, param, value, None)?;
            }
        }
        Ok(())
    }
}

/// Parses and runs a source program in one step.
pub fn run_program(source: &str, input: Box<dyn InputSource>) -> Result<Vec<String>> {
    let program = parse(source)?;
    let mut interpreter = Interpreter::new(input);
    interpreter.run(&program)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(a), Value::Real(b)) | (Value::Real(b), Value::Integer(a)) => {
            (*a as f64) == *b
        }
        _ => left == right,
    }
}

fn compare_values(operator: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        let result = match operator {
            BinaryOp::Less => a < b,
            BinaryOp::Greater => a > b,
            BinaryOp::LessEqual => a <= b,
            _ => a >= b,
        };
        return Ok(Value::Boolean(result));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        let result = match operator {
            BinaryOp::Less => a < b,
            BinaryOp::Greater => a > b,
            BinaryOp::LessEqual => a <= b,
            _ => a >= b,
        };
        return Ok(Value::Boolean(result));
    }
    runtime_error(format!(
        "Cannot compare {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn arithmetic(operator: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return runtime_error(format!(
            "Expected number, got {} and {}",
            left.type_name(),
            right.type_name()
        ));
    };
    let result = match operator {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Power => a.powf(b),
        BinaryOp::Divide | BinaryOp::Div | BinaryOp::Mod => {
            if b == 0.0 {
                return runtime_error(format!(
                    "Η διαίρεση με το μηδέν δεν επιτρέπεται ({} / {})",
                    number_value(a),
                    number_value(b)
                ));
            }
            match operator {
                BinaryOp::Divide => a / b,
                BinaryOp::Div => (a / b).floor(),
                _ => a % b,
            }
        }
        _ => unreachable!("non-arithmetic operator"),
    };
    Ok(number_value(result))
}

/// True when a ΓΡΑΨΕ or ΔΙΑΒΑΣΕ hides anywhere in the body, including
/// branches that would not have executed.
fn body_contains_io(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Print(_) | Statement::Read(_) => true,
        Statement::If(inner) => if_contains_io(inner),
        Statement::For(inner) => body_contains_io(&inner.body),
        Statement::While(inner) => body_contains_io(&inner.body),
        Statement::DoWhile(inner) => body_contains_io(&inner.body),
        _ => false,
    })
}

fn if_contains_io(statement: &IfStatement) -> bool {
    body_contains_io(&statement.consequent)
        || match &statement.alternate {
            Some(ElseBranch::ElseIf(inner)) => if_contains_io(inner),
            Some(ElseBranch::Else(statements)) => body_contains_io(statements),
            None => false,
        }
}
