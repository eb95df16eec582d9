//! Expression evaluation
//!
//! Values follow JavaScript semantics closely enough for binding authors:
//! truthiness, `String()` conversion, string concatenation with `+`, and
//! short-circuit `&&`/`||` returning an operand.

use serde_json::{Map, Number, Value};

use super::parser::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::ExprError;
use crate::value::{json_to_js_string, json_truthy, json_type_name, BindingValue};

/// Intermediate value during evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Undefined,
    Json(Value),
    /// The live view; only usable through member access and calls
    View,
    /// `view.name` where the view has a method `name`
    Method(String),
}

impl Operand {
    fn is_truthy(&self) -> bool {
        match self {
            Operand::Undefined => false,
            Operand::Json(value) => json_truthy(value),
            Operand::View | Operand::Method(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Operand::Undefined => "undefined",
            Operand::Json(value) => json_type_name(value),
            Operand::View => "view",
            Operand::Method(_) => "function",
        }
    }

    fn to_js_string(&self) -> String {
        match self {
            Operand::Undefined => "undefined".to_string(),
            Operand::Json(value) => json_to_js_string(value),
            Operand::View => "[object View]".to_string(),
            Operand::Method(name) => format!("function {name}()"),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Operand::Json(Value::Null) => 0.0,
            Operand::Json(Value::Bool(b)) => f64::from(u8::from(*b)),
            Operand::Json(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
            Operand::Json(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Operand::Json(Value::Array(items)) if items.is_empty() => 0.0,
            _ => f64::NAN,
        }
    }

    /// Operands that `+` treats as strings (strings, arrays, objects, functions)
    fn concatenates(&self) -> bool {
        matches!(
            self,
            Operand::Json(Value::String(_) | Value::Array(_) | Value::Object(_))
                | Operand::View
                | Operand::Method(_)
        )
    }
}

/// Names visible to a declaration
pub trait Environment {
    /// Resolve a top-level identifier; `None` is a reference error
    fn lookup(&self, name: &str) -> Option<Operand>;

    /// Resolve `view.name`: a property, a method reference, or undefined
    fn view_member(&self, name: &str) -> Operand;

    /// Call a view method; `None` when the view has no such method,
    /// `Some(Err(reason))` when the method itself failed
    fn call_view(&self, method: &str, args: &[Value]) -> Option<Result<Value, String>>;
}

/// Evaluate one expression
pub fn evaluate(expr: &Expr, env: &dyn Environment) -> Result<Operand, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(Operand::Json(value.clone())),
        Expr::Undefined => Ok(Operand::Undefined),
        Expr::Ident { name, pos } => env
            .lookup(name)
            .ok_or_else(|| ExprError::new(format!("{name} is not defined"), *pos)),
        Expr::Member {
            object,
            property,
            pos,
        } => {
            let target = evaluate(object, env)?;
            member(&target, property, *pos, env)
        }
        Expr::Index { object, index, pos } => {
            let target = evaluate(object, env)?;
            let key = evaluate(index, env)?;
            if let (Operand::Json(Value::Array(items)), Operand::Json(Value::Number(n))) =
                (&target, &key)
            {
                return Ok(n
                    .as_u64()
                    .and_then(|i| items.get(i as usize))
                    .cloned()
                    .map_or(Operand::Undefined, Operand::Json));
            }
            member(&target, &key.to_js_string(), *pos, env)
        }
        Expr::Call { callee, args, pos } => call(callee, args, *pos, env),
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), to_literal(evaluate(value, env)?, value)?);
            }
            Ok(Operand::Json(Value::Object(map)))
        }
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| to_literal(evaluate(item, env)?, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Operand::Json(Value::Array(values)))
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, env)?;
            Ok(match op {
                UnaryOp::Not => Operand::Json(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => number(-value.to_number()),
                UnaryOp::Plus => number(value.to_number()),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            Ok(binary(*op, &lhs, &rhs))
        }
        Expr::Logical { op, lhs, rhs } => {
            let left = evaluate(lhs, env)?;
            match (op, left.is_truthy()) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                _ => evaluate(rhs, env),
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, env)?.is_truthy() {
                evaluate(consequent, env)
            } else {
                evaluate(alternate, env)
            }
        }
    }
}

/// Evaluate the right-hand side of one binding
pub(crate) fn evaluate_binding(expr: &Expr, env: &dyn Environment) -> Result<BindingValue, ExprError> {
    match evaluate(expr, env)? {
        Operand::Undefined => Ok(BindingValue::Undefined),
        Operand::Json(value) => Ok(BindingValue::Json(value)),
        Operand::Method(name) => Ok(BindingValue::Method(name)),
        Operand::View => Err(ExprError::new(
            "the view itself cannot be bound; use view.<property>",
            expr_position(expr),
        )),
    }
}

fn member(target: &Operand, property: &str, pos: usize, env: &dyn Environment) -> Result<Operand, ExprError> {
    match target {
        Operand::View => Ok(env.view_member(property)),
        Operand::Undefined | Operand::Json(Value::Null) => Err(ExprError::new(
            format!(
                "cannot read property '{property}' of {}",
                target.type_name()
            ),
            pos,
        )),
        Operand::Json(Value::Object(map)) => Ok(map
            .get(property)
            .cloned()
            .map_or(Operand::Undefined, Operand::Json)),
        Operand::Json(Value::Array(items)) => Ok(match property {
            "length" => Operand::Json(Value::from(items.len())),
            index => index
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .map_or(Operand::Undefined, Operand::Json),
        }),
        Operand::Json(Value::String(s)) if property == "length" => {
            Ok(Operand::Json(Value::from(s.encode_utf16().count())))
        }
        _ => Ok(Operand::Undefined),
    }
}

fn call(callee: &Expr, args: &[Expr], pos: usize, env: &dyn Environment) -> Result<Operand, ExprError> {
    let Expr::Member {
        object, property, ..
    } = callee
    else {
        return Err(ExprError::new("only view methods can be called", pos));
    };
    if evaluate(object, env)? != Operand::View {
        return Err(ExprError::new(
            format!("{property} is not a function (only view methods can be called)"),
            pos,
        ));
    }

    let values = args
        .iter()
        .map(|arg| to_literal(evaluate(arg, env)?, arg))
        .collect::<Result<Vec<_>, _>>()?;

    match env.call_view(property, &values) {
        Some(Ok(value)) => Ok(Operand::Json(value)),
        Some(Err(reason)) => Err(ExprError::new(format!("view.{property} failed: {reason}"), pos)),
        None => Err(ExprError::new(format!("view.{property} is not a function"), pos)),
    }
}

/// Convert an operand to plain data for literals and call arguments
fn to_literal(operand: Operand, expr: &Expr) -> Result<Value, ExprError> {
    match operand {
        Operand::Undefined => Ok(Value::Null),
        Operand::Json(value) => Ok(value),
        Operand::View | Operand::Method(_) => Err(ExprError::new(
            format!("a {} cannot be used as data", operand.type_name()),
            expr_position(expr),
        )),
    }
}

fn binary(op: BinaryOp, lhs: &Operand, rhs: &Operand) -> Operand {
    match op {
        BinaryOp::Add if lhs.concatenates() || rhs.concatenates() => {
            Operand::Json(Value::String(lhs.to_js_string() + &rhs.to_js_string()))
        }
        BinaryOp::Add => number(lhs.to_number() + rhs.to_number()),
        BinaryOp::Sub => number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Rem => number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            Operand::Json(Value::Bool(compare(op, lhs, rhs)))
        }
        BinaryOp::Eq | BinaryOp::StrictEq => Operand::Json(Value::Bool(equals(op, lhs, rhs))),
        BinaryOp::NotEq => Operand::Json(Value::Bool(!equals(BinaryOp::Eq, lhs, rhs))),
        BinaryOp::StrictNotEq => {
            Operand::Json(Value::Bool(!equals(BinaryOp::StrictEq, lhs, rhs)))
        }
    }
}

fn compare(op: BinaryOp, lhs: &Operand, rhs: &Operand) -> bool {
    if let (Operand::Json(Value::String(a)), Operand::Json(Value::String(b))) = (lhs, rhs) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (lhs.to_number(), rhs.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

/// Strict equality; loose `==` additionally equates null and undefined
fn equals(op: BinaryOp, lhs: &Operand, rhs: &Operand) -> bool {
    match (lhs, rhs) {
        (Operand::Json(Value::Number(a)), Operand::Json(Value::Number(b))) => {
            a.as_f64() == b.as_f64()
        }
        (Operand::Undefined, Operand::Json(Value::Null))
        | (Operand::Json(Value::Null), Operand::Undefined) => op == BinaryOp::Eq,
        (a, b) => a == b,
    }
}

/// Wrap an arithmetic result; integral values stay JSON integers, NaN/Inf become null
fn number(value: f64) -> Operand {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Operand::Json(Value::from(value as i64));
    }
    Operand::Json(Number::from_f64(value).map_or(Value::Null, Value::Number))
}

fn expr_position(expr: &Expr) -> usize {
    match expr {
        Expr::Ident { pos, .. }
        | Expr::Member { pos, .. }
        | Expr::Index { pos, .. }
        | Expr::Call { pos, .. } => *pos,
        Expr::Unary { operand, .. } => expr_position(operand),
        Expr::Binary { lhs, .. } | Expr::Logical { lhs, .. } => expr_position(lhs),
        Expr::Conditional { test, .. } => expr_position(test),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::super::{evaluate_declaration, parse_expression};
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct TestEnv {
        model: Value,
        state: Option<Value>,
    }

    impl Environment for TestEnv {
        fn lookup(&self, name: &str) -> Option<Operand> {
            match name {
                "model" => Some(Operand::Json(self.model.clone())),
                "view" => Some(Operand::View),
                "state" => Some(
                    self.state
                        .clone()
                        .map_or(Operand::Undefined, Operand::Json),
                ),
                _ => None,
            }
        }

        fn view_member(&self, name: &str) -> Operand {
            match name {
                "title" => Operand::Json(json!("My View")),
                "shout" | "save" => Operand::Method(name.to_string()),
                _ => Operand::Undefined,
            }
        }

        fn call_view(&self, method: &str, args: &[Value]) -> Option<Result<Value, String>> {
            match method {
                "shout" => {
                    let text = args.first().and_then(Value::as_str).unwrap_or_default();
                    Some(Ok(json!(text.to_uppercase())))
                }
                "broken" => Some(Err("boom".to_string())),
                _ => None,
            }
        }
    }

    fn env() -> TestEnv {
        TestEnv {
            model: json!({
                "title": "Hello",
                "count": 3,
                "price": 2.5,
                "tags": ["a", "b"],
                "nested": {"deep": {"value": true}},
                "empty": "",
                "nothing": null
            }),
            state: None,
        }
    }

    fn eval(source: &str) -> Result<Operand, ExprError> {
        evaluate(&parse_expression(source).unwrap(), &env())
    }

    fn json_of(source: &str) -> Value {
        match eval(source).unwrap() {
            Operand::Json(value) => value,
            other => panic!("expected JSON for `{source}`, got {other:?}"),
        }
    }

    #[test]
    fn member_paths() {
        assert_eq!(json_of("model.title"), json!("Hello"));
        assert_eq!(json_of("model.nested.deep.value"), json!(true));
        assert_eq!(json_of("model['count']"), json!(3));
        assert_eq!(json_of("model.tags[1]"), json!("b"));
        assert_eq!(json_of("model.tags.length"), json!(2));
        assert_eq!(json_of("model.title.length"), json!(5));
        assert_eq!(eval("model.missing").unwrap(), Operand::Undefined);
        assert_eq!(eval("model.tags[9]").unwrap(), Operand::Undefined);
    }

    #[test]
    fn member_of_undefined_is_an_error() {
        let err = eval("model.missing.deeper").unwrap_err();
        assert!(err.message.contains("of undefined"), "{}", err.message);
        let err = eval("model.nothing.x").unwrap_err();
        assert!(err.message.contains("of null"), "{}", err.message);
    }

    #[test]
    fn unknown_identifier_is_a_reference_error() {
        let err = eval("window.location").unwrap_err();
        assert_eq!(err.message, "window is not defined");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn absent_state_fails_on_member_access() {
        let err = eval("state.open").unwrap_err();
        assert!(err.message.contains("'open' of undefined"));
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(json_of("model.count + 1"), json!(4));
        assert_eq!(json_of("model.count * model.price"), json!(7.5));
        assert_eq!(json_of("model.count / 2"), json!(1.5));
        assert_eq!(json_of("7 % 4"), json!(3));
        assert_eq!(json_of("'n=' + model.count"), json!("n=3"));
        assert_eq!(json_of("model.title + ' ' + model.tags"), json!("Hello a,b"));
        assert_eq!(json_of("-model.count"), json!(-3));
        assert_eq!(json_of("+'42'"), json!(42));
        assert_eq!(json_of("1 / 0"), json!(null));
        assert_eq!(json_of("1e400"), json!(null));
        assert_eq!(json_of("1e400 === 1 / 0"), json!(true));
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(json_of("model.count > 2"), json!(true));
        assert_eq!(json_of("model.count <= 2"), json!(false));
        assert_eq!(json_of("'a' < 'b'"), json!(true));
        assert_eq!(json_of("model.title === 'Hello'"), json!(true));
        assert_eq!(json_of("model.count == 3.0"), json!(true));
        assert_eq!(json_of("model.count !== 3"), json!(false));
        assert_eq!(json_of("model.nothing == undefined"), json!(true));
        assert_eq!(json_of("model.nothing === undefined"), json!(false));
        assert_eq!(json_of("model.missing === undefined"), json!(true));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(json_of("model.empty || 'fallback'"), json!("fallback"));
        assert_eq!(json_of("model.title && model.count"), json!(3));
        assert_eq!(json_of("!model.empty"), json!(true));
        assert_eq!(json_of("model.count > 5 ? 'big' : 'small'"), json!("small"));
        // short-circuit skips the failing right-hand side
        assert_eq!(json_of("false && model.missing.x"), json!(false));
    }

    #[test]
    fn view_members_and_calls() {
        assert_eq!(json_of("view.title"), json!("My View"));
        assert_eq!(eval("view.save").unwrap(), Operand::Method("save".to_string()));
        assert_eq!(eval("view.other").unwrap(), Operand::Undefined);
        assert_eq!(json_of("view.shout(model.title)"), json!("HELLO"));

        let err = eval("view.save()").unwrap_err();
        assert!(err.message.contains("view.save is not a function"));
        let err = eval("view.broken()").unwrap_err();
        assert_eq!(err.message, "view.broken failed: boom");
        let err = eval("model.title()").unwrap_err();
        assert!(err.message.contains("only view methods"));
    }

    #[test]
    fn literals_turn_undefined_into_null() {
        assert_eq!(
            json_of("{a: model.missing, b: [1, model.title]}"),
            json!({"a": null, "b": [1, "Hello"]})
        );
        assert!(eval("{handler: view.save}").is_err());
    }

    #[test]
    fn declaration_evaluates_in_order() {
        let bindings = evaluate_declaration(
            "text: model.title, css: {active: model.count > 1}, click: view.save, missing: model.nope",
            &env(),
        )
        .unwrap();
        assert_eq!(
            bindings,
            vec![
                ("text".to_string(), BindingValue::Json(json!("Hello"))),
                ("css".to_string(), BindingValue::Json(json!({"active": true}))),
                ("click".to_string(), BindingValue::Method("save".to_string())),
                ("missing".to_string(), BindingValue::Undefined),
            ]
        );
    }

    #[test]
    fn bare_view_cannot_be_bound() {
        let err = evaluate_declaration("x: view", &env()).unwrap_err();
        assert!(err.message.contains("view itself"));
    }

    #[test]
    fn declaration_with_state() {
        let env = TestEnv {
            model: json!({}),
            state: Some(json!({"open": true})),
        };
        let bindings = evaluate_declaration("visible: state.open", &env).unwrap();
        assert_eq!(bindings[0].1, BindingValue::Json(json!(true)));
    }
}
