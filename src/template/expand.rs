use std::sync::OnceLock;

use log::warn;
use regex::{Captures, Regex};

use crate::request::params::ParameterSet;
use crate::template::functions::{FunctionError, FunctionNamespace};
use crate::template::MapSpec;

/// `-X $name`: a single flag character followed by a variable
fn flag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-(.) \$(\w+)").expect("Valid flag pattern"))
}

/// `$name`
fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$(\w+)").expect("Valid variable pattern"))
}

/// `!name(arguments)`, arguments end at the first closing parenthesis
fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"!(\w+)\((.*?)\)").expect("Valid call pattern"))
}

/// Expand every value of `map` against `params`
///
/// The input map is left untouched. Function failures are embedded in the affected value and
/// never stop the other keys from expanding.
pub fn evaluate_map(map: &MapSpec, params: &ParameterSet, functions: &FunctionNamespace) -> MapSpec {
    map.iter()
        .map(|(key, value)| (key.clone(), evaluate_value(value, params, functions)))
        .collect()
}

/// Run the three passes over a single map expression
pub fn evaluate_value(value: &str, params: &ParameterSet, functions: &FunctionNamespace) -> String {
    let value = replace_flags(value, params);
    let value = replace_variables(&value, params);
    call_functions(&value, functions)
}

fn replace_flags(value: &str, params: &ParameterSet) -> String {
    flag_pattern()
        .replace_all(value, |caps: &Captures| match params.get(&caps[2]) {
            Some(v) if !v.is_empty() => format!("-{} {}", &caps[1], v),
            _ => String::new(),
        })
        .into_owned()
}

fn replace_variables(value: &str, params: &ParameterSet) -> String {
    variable_pattern()
        .replace_all(value, |caps: &Captures| params.get(&caps[1]).unwrap_or_default().to_string())
        .into_owned()
}

/// Replace each call with its result
///
/// Every occurrence of an identical call text is replaced by the first result. A call to a
/// function that can't be found replaces the whole value with the lookup error.
fn call_functions(value: &str, functions: &FunctionNamespace) -> String {
    let mut expanded = value.to_string();

    for caps in call_pattern().captures_iter(value) {
        let name = &caps[1];
        let arguments = split_arguments(&caps[2]);

        let result = match functions.invoke(name, &arguments) {
            Ok(result) => result,
            Err(err @ FunctionError::NotFound(_)) => {
                warn!("{err}");
                return err.to_string();
            }
            Err(err) => {
                warn!("Function {name} failed: {err}");
                format!("Error: {err}")
            }
        };
        expanded = expanded.replace(&caps[0], &result);
    }

    expanded
}

/// Comma separated and trimmed; an empty list means no arguments at all
fn split_arguments(raw: &str) -> Vec<&str> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(',').map(str::trim).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::functions::FunctionRegistry;

    fn params(pairs: &[(&str, &str)]) -> ParameterSet {
        pairs.iter().copied().collect()
    }

    fn evaluate(expr: &str, params: &ParameterSet, registry: &FunctionRegistry) -> String {
        evaluate_value(expr, params, &FunctionNamespace::new(registry, None))
    }

    #[test]
    fn flag_with_value() {
        let registry = FunctionRegistry::new();
        assert_eq!(evaluate("-n $cores", &params(&[("cores", "4")]), &registry), "-n 4");
    }

    #[test]
    fn flag_without_value_disappears() {
        let registry = FunctionRegistry::new();
        assert_eq!(evaluate("-n $cores", &params(&[]), &registry), "");
        assert_eq!(evaluate("-n $cores", &params(&[("cores", "")]), &registry), "");
    }

    #[test]
    fn missing_variable_is_empty() {
        let registry = FunctionRegistry::new();
        assert_eq!(evaluate("$missing", &params(&[]), &registry), "");
        assert_eq!(evaluate("a$missing-b", &params(&[]), &registry), "a-b");
    }

    #[test]
    fn flag_and_variable_passes_mix() {
        let registry = FunctionRegistry::new();
        let p = params(&[("cores", "8"), ("walltime", "01:00")]);
        assert_eq!(
            evaluate("-n $cores -W $walltime -M $memory --dir=$walltime", &p, &registry),
            "-n 8 -W 01:00  --dir=01:00"
        );
    }

    #[test]
    fn function_arguments_are_substituted_first() {
        let mut registry = FunctionRegistry::new();
        registry.register("join", |args| Ok(args.join("+")));
        let p = params(&[("a", "1"), ("b", "2")]);
        assert_eq!(evaluate("x=!join($a, $b )", &p, &registry), "x=1+2");
    }

    #[test]
    fn empty_argument_list_means_zero_arguments() {
        let mut registry = FunctionRegistry::new();
        registry.register("count", |args| Ok(args.len().to_string()));
        assert_eq!(evaluate("!count()", &params(&[]), &registry), "0");
        assert_eq!(evaluate("!count(,)", &params(&[]), &registry), "2");
    }

    #[test]
    fn failing_function_is_embedded() {
        let mut registry = FunctionRegistry::new();
        registry.register("boom", |_| Err(FunctionError::Failed("disk full".to_string())));
        assert_eq!(evaluate("before !boom() after", &params(&[]), &registry), "before Error: disk full after");
    }

    #[test]
    fn unknown_function_replaces_whole_value() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            evaluate("module load !nope(x)", &params(&[]), &registry),
            "Function nope not found or not callable."
        );
    }

    #[test]
    fn every_key_is_expanded_independently() {
        let registry = FunctionRegistry::new();
        let map: MapSpec = [
            ("cores".to_string(), "-n $cores".to_string()),
            ("broken".to_string(), "!nope()".to_string()),
        ]
        .into_iter()
        .collect();

        let evaluated = evaluate_map(&map, &params(&[("cores", "2")]), &FunctionNamespace::new(&registry, None));
        assert_eq!(evaluated["cores"], "-n 2");
        assert_eq!(evaluated["broken"], "Function nope not found or not callable.");
        assert_eq!(map["cores"], "-n $cores");
    }
}
