//! Built-in function registry (§4.H).
//!
//! Built-ins are a compile-time perfect hash map for O(1), zero-allocation
//! lookup, mirroring the upstream registry's `phf_map!` of `FunctionMetadata`
//! keyed by name. `RegisterFunction` extends this with a runtime overlay
//! guarded by a mutex, since unlike the closed built-in set, user functions
//! can arrive from any thread at any point before evaluation.
//!
//! `if(...)` is deliberately absent here: the lexer folds both keyword and
//! call-style spellings into the same reserved `If` token (§9), so a
//! conditional never reaches this registry as a named function call.

use crate::error::{Error, Result};
use crate::value::Value;
use phf::phf_map;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    Min(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(lo, hi) => count >= lo && count <= hi,
            Arity::Min(lo) => count >= lo,
        }
    }

    pub fn describe(self) -> String {
        match self {
            Arity::Exact(n) => format!("exactly {n} argument(s)"),
            Arity::Range(lo, hi) => format!("between {lo} and {hi} arguments"),
            Arity::Min(lo) => format!("at least {lo} argument(s)"),
        }
    }
}

pub type BuiltinImpl = fn(&str, &[Value]) -> Result<Value>;

#[derive(Debug, Clone, Copy)]
pub struct BuiltinSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub implementation: BuiltinImpl,
}

fn number_arg(name: &str, args: &[Value], index: usize) -> Result<f64> {
    args[index].as_number().ok_or_else(|| Error::TypeMismatch {
        message: format!(
            "{name}: argument {} must be a number, got {}",
            index + 1,
            args[index].type_name()
        ),
    })
}

fn call_abs(name: &str, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number_arg(name, args, 0)?.abs()))
}

fn call_sqrt(name: &str, args: &[Value]) -> Result<Value> {
    let x = number_arg(name, args, 0)?;
    if x < 0.0 {
        return Err(Error::DomainError {
            message: format!("SQRT of negative number {x}"),
        });
    }
    Ok(Value::Number(x.sqrt()))
}

fn call_round(name: &str, args: &[Value]) -> Result<Value> {
    let x = number_arg(name, args, 0)?;
    let digits = if args.len() > 1 {
        number_arg(name, args, 1)? as i32
    } else {
        0
    };
    let factor = 10f64.powi(digits);
    Ok(Value::Number((x * factor).round() / factor))
}

fn call_min(name: &str, args: &[Value]) -> Result<Value> {
    let mut best = number_arg(name, args, 0)?;
    for i in 1..args.len() {
        best = best.min(number_arg(name, args, i)?);
    }
    Ok(Value::Number(best))
}

fn call_max(name: &str, args: &[Value]) -> Result<Value> {
    let mut best = number_arg(name, args, 0)?;
    for i in 1..args.len() {
        best = best.max(number_arg(name, args, i)?);
    }
    Ok(Value::Number(best))
}

fn call_sum(name: &str, args: &[Value]) -> Result<Value> {
    let mut total = 0.0;
    for i in 0..args.len() {
        total += number_arg(name, args, i)?;
    }
    Ok(Value::Number(total))
}

fn call_avg(name: &str, args: &[Value]) -> Result<Value> {
    let mut total = 0.0;
    for i in 0..args.len() {
        total += number_arg(name, args, i)?;
    }
    Ok(Value::Number(total / args.len() as f64))
}

fn call_pow(name: &str, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(
        number_arg(name, args, 0)?.powf(number_arg(name, args, 1)?),
    ))
}

fn call_log(name: &str, args: &[Value]) -> Result<Value> {
    let x = number_arg(name, args, 0)?;
    if x <= 0.0 {
        return Err(Error::DomainError {
            message: format!("LOG of non-positive number {x}"),
        });
    }
    Ok(Value::Number(x.ln()))
}

fn call_log10(name: &str, args: &[Value]) -> Result<Value> {
    let x = number_arg(name, args, 0)?;
    if x <= 0.0 {
        return Err(Error::DomainError {
            message: format!("LOG10 of non-positive number {x}"),
        });
    }
    Ok(Value::Number(x.log10()))
}

fn call_exp(name: &str, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number_arg(name, args, 0)?.exp()))
}

macro_rules! trig_builtin {
    ($fn_name:ident, $method:ident) => {
        fn $fn_name(name: &str, args: &[Value]) -> Result<Value> {
            Ok(Value::Number(number_arg(name, args, 0)?.$method()))
        }
    };
}

trig_builtin!(call_sin, sin);
trig_builtin!(call_cos, cos);
trig_builtin!(call_tan, tan);
trig_builtin!(call_asin, asin);
trig_builtin!(call_acos, acos);
trig_builtin!(call_atan, atan);

fn call_atan2(name: &str, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(
        number_arg(name, args, 0)?.atan2(number_arg(name, args, 1)?),
    ))
}

fn call_floor(name: &str, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number_arg(name, args, 0)?.floor()))
}

fn call_ceil(name: &str, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number_arg(name, args, 0)?.ceil()))
}

fn call_trunc(name: &str, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(number_arg(name, args, 0)?.trunc()))
}

fn call_sign(name: &str, args: &[Value]) -> Result<Value> {
    let x = number_arg(name, args, 0)?;
    Ok(Value::Number(if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }))
}

fn call_mod(name: &str, args: &[Value]) -> Result<Value> {
    let a = number_arg(name, args, 0)?;
    let b = number_arg(name, args, 1)?;
    if b == 0.0 {
        return Err(Error::DivisionByZero);
    }
    Ok(Value::Number(a % b))
}

fn integer_arg(name: &str, args: &[Value], index: usize) -> Result<i64> {
    let x = number_arg(name, args, index)?;
    if x.fract() != 0.0 {
        return Err(Error::DomainError {
            message: format!("{name}: argument {} must be an integer, got {x}", index + 1),
        });
    }
    Ok(x as i64)
}

fn call_gcd(name: &str, args: &[Value]) -> Result<Value> {
    let mut a = integer_arg(name, args, 0)?.abs();
    let mut b = integer_arg(name, args, 1)?.abs();
    while b != 0 {
        (a, b) = (b, a % b);
    }
    Ok(Value::Number(a as f64))
}

fn call_lcm(name: &str, args: &[Value]) -> Result<Value> {
    let a = integer_arg(name, args, 0)?.abs();
    let b = integer_arg(name, args, 1)?.abs();
    if a == 0 || b == 0 {
        return Ok(Value::Number(0.0));
    }
    let (mut x, mut y) = (a, b);
    while y != 0 {
        (x, y) = (y, x % y);
    }
    Ok(Value::Number((a / x * b) as f64))
}

fn call_factorial(name: &str, args: &[Value]) -> Result<Value> {
    let n = integer_arg(name, args, 0)?;
    if n < 0 {
        return Err(Error::DomainError {
            message: format!("FACTORIAL of negative number {n}"),
        });
    }
    if n > 170 {
        return Err(Error::DomainError {
            message: format!("FACTORIAL({n}) overflows a 64-bit float"),
        });
    }
    let result = (1..=n).fold(1.0f64, |acc, i| acc * i as f64);
    Ok(Value::Number(result))
}

fn call_pi(_name: &str, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(std::f64::consts::PI))
}

fn call_e(_name: &str, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(std::f64::consts::E))
}

static BUILTINS: phf::Map<&'static str, BuiltinSpec> = phf_map! {
    "ABS" => BuiltinSpec { name: "ABS", arity: Arity::Exact(1), implementation: call_abs },
    "SQRT" => BuiltinSpec { name: "SQRT", arity: Arity::Exact(1), implementation: call_sqrt },
    "ROUND" => BuiltinSpec { name: "ROUND", arity: Arity::Range(1, 2), implementation: call_round },
    "MIN" => BuiltinSpec { name: "MIN", arity: Arity::Min(1), implementation: call_min },
    "MAX" => BuiltinSpec { name: "MAX", arity: Arity::Min(1), implementation: call_max },
    "SUM" => BuiltinSpec { name: "SUM", arity: Arity::Min(1), implementation: call_sum },
    "AVG" => BuiltinSpec { name: "AVG", arity: Arity::Min(1), implementation: call_avg },
    "POW" => BuiltinSpec { name: "POW", arity: Arity::Exact(2), implementation: call_pow },
    "LOG" => BuiltinSpec { name: "LOG", arity: Arity::Exact(1), implementation: call_log },
    "LOG10" => BuiltinSpec { name: "LOG10", arity: Arity::Exact(1), implementation: call_log10 },
    "EXP" => BuiltinSpec { name: "EXP", arity: Arity::Exact(1), implementation: call_exp },
    "SIN" => BuiltinSpec { name: "SIN", arity: Arity::Exact(1), implementation: call_sin },
    "COS" => BuiltinSpec { name: "COS", arity: Arity::Exact(1), implementation: call_cos },
    "TAN" => BuiltinSpec { name: "TAN", arity: Arity::Exact(1), implementation: call_tan },
    "ASIN" => BuiltinSpec { name: "ASIN", arity: Arity::Exact(1), implementation: call_asin },
    "ACOS" => BuiltinSpec { name: "ACOS", arity: Arity::Exact(1), implementation: call_acos },
    "ATAN" => BuiltinSpec { name: "ATAN", arity: Arity::Exact(1), implementation: call_atan },
    "ATAN2" => BuiltinSpec { name: "ATAN2", arity: Arity::Exact(2), implementation: call_atan2 },
    "FLOOR" => BuiltinSpec { name: "FLOOR", arity: Arity::Exact(1), implementation: call_floor },
    "CEIL" => BuiltinSpec { name: "CEIL", arity: Arity::Exact(1), implementation: call_ceil },
    "TRUNC" => BuiltinSpec { name: "TRUNC", arity: Arity::Exact(1), implementation: call_trunc },
    "SIGN" => BuiltinSpec { name: "SIGN", arity: Arity::Exact(1), implementation: call_sign },
    "MOD" => BuiltinSpec { name: "MOD", arity: Arity::Exact(2), implementation: call_mod },
    "GCD" => BuiltinSpec { name: "GCD", arity: Arity::Exact(2), implementation: call_gcd },
    "LCM" => BuiltinSpec { name: "LCM", arity: Arity::Exact(2), implementation: call_lcm },
    "FACTORIAL" => BuiltinSpec { name: "FACTORIAL", arity: Arity::Exact(1), implementation: call_factorial },
    "PI" => BuiltinSpec { name: "PI", arity: Arity::Exact(0), implementation: call_pi },
    "E" => BuiltinSpec { name: "E", arity: Arity::Exact(0), implementation: call_e },
};

/// Reserved names a caller may never bind as a variable or register as a
/// user function (§4.H security validator).
pub const RESERVED_NAMES: &[&str] = &[
    "EVAL", "EXEC", "SYSTEM", "RUNTIME", "PROCESS", "FILE", "IO", "SHELL", "SCRIPT", "IMPORT",
    "REQUIRE", "LOAD",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name.to_ascii_uppercase().as_str())
}

#[derive(Clone)]
struct UserFunction {
    arity: Arity,
    implementation: Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>,
}

/// The function registry consulted by the evaluator: built-ins are a
/// static perfect-hash map; user functions registered via `RegisterFunction`
/// live in a mutex-guarded overlay so registration is safe from any thread
/// at any point before the name is first evaluated.
pub struct FunctionRegistry {
    user_defined: Mutex<HashMap<String, UserFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            user_defined: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a user-defined function (§6 `RegisterFunction`). Rejects
    /// reserved names and names that collide with a built-in.
    pub fn register(
        &self,
        name: &str,
        arity: Arity,
        implementation: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<()> {
        let key = name.to_ascii_uppercase();
        if is_reserved(&key) {
            return Err(Error::SecurityViolation { name: key });
        }
        if BUILTINS.contains_key(key.as_str()) {
            return Err(Error::DomainError {
                message: format!("'{name}' is a built-in function and cannot be overridden"),
            });
        }
        self.user_defined.lock().unwrap().insert(
            key,
            UserFunction {
                arity,
                implementation: Arc::new(implementation),
            },
        );
        Ok(())
    }

    /// Looks up and invokes a function by name (case-insensitive), checking
    /// arity before dispatch.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let key = name.to_ascii_uppercase();
        if is_reserved(&key) {
            return Err(Error::SecurityViolation { name: key });
        }
        if let Some(spec) = BUILTINS.get(key.as_str()) {
            if !spec.arity.accepts(args.len()) {
                return Err(Error::ArityMismatch {
                    name: spec.name.to_string(),
                    expected: spec.arity.describe(),
                    actual: args.len(),
                });
            }
            return (spec.implementation)(spec.name, args);
        }
        let user_defined = self.user_defined.lock().unwrap();
        if let Some(user_fn) = user_defined.get(&key) {
            if !user_fn.arity.accepts(args.len()) {
                return Err(Error::ArityMismatch {
                    name: key,
                    expected: user_fn.arity.describe(),
                    actual: args.len(),
                });
            }
            return (user_fn.implementation)(args);
        }
        Err(Error::UnknownFunction { name: name.to_string() })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        let key = name.to_ascii_uppercase();
        BUILTINS.contains_key(key.as_str()) || self.user_defined.lock().unwrap().contains_key(&key)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_dispatch_is_case_insensitive() {
        let registry = FunctionRegistry::new();
        let args = [Value::Number(-4.0)];
        assert_eq!(registry.call("abs", &args).unwrap(), Value::Number(4.0));
        assert_eq!(registry.call("ABS", &args).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let registry = FunctionRegistry::new();
        let err = registry.call("ABS", &[]).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
    }

    #[test]
    fn unknown_function_errors() {
        let registry = FunctionRegistry::new();
        let err = registry.call("NOPE", &[Value::Number(1.0)]).unwrap_err();
        assert!(matches!(err, Error::UnknownFunction { .. }));
    }

    #[test]
    fn reserved_names_are_rejected_for_call_and_register() {
        let registry = FunctionRegistry::new();
        assert!(matches!(
            registry.call("EVAL", &[]),
            Err(Error::SecurityViolation { .. })
        ));
        assert!(matches!(
            registry.register("system", Arity::Exact(0), |_| Ok(Value::Null)),
            Err(Error::SecurityViolation { .. })
        ));
    }

    #[test]
    fn user_function_round_trips() {
        let registry = FunctionRegistry::new();
        registry
            .register("DOUBLE", Arity::Exact(1), |args| {
                Ok(Value::Number(args[0].as_number().unwrap() * 2.0))
            })
            .unwrap();
        assert_eq!(
            registry.call("double", &[Value::Number(3.0)]).unwrap(),
            Value::Number(6.0)
        );
    }

    #[test]
    fn cannot_override_builtin() {
        let registry = FunctionRegistry::new();
        let err = registry
            .register("abs", Arity::Exact(1), |_| Ok(Value::Null))
            .unwrap_err();
        assert!(matches!(err, Error::DomainError { .. }));
    }

    #[test]
    fn gcd_and_lcm() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            registry
                .call("GCD", &[Value::Number(12.0), Value::Number(18.0)])
                .unwrap(),
            Value::Number(6.0)
        );
        assert_eq!(
            registry
                .call("LCM", &[Value::Number(4.0), Value::Number(6.0)])
                .unwrap(),
            Value::Number(12.0)
        );
    }

    #[test]
    fn factorial_rejects_negative_and_overflow() {
        let registry = FunctionRegistry::new();
        assert!(registry
            .call("FACTORIAL", &[Value::Number(-1.0)])
            .is_err());
        assert_eq!(
            registry.call("FACTORIAL", &[Value::Number(5.0)]).unwrap(),
            Value::Number(120.0)
        );
    }
}
