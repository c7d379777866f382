use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

/// Why a function call in a map expression did not produce a value
///
/// None of these abort an expansion. The rendered message is embedded into the expanded value so
/// a broken function shows up in the preview instead of hiding the rest of the script.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("Function {0} not found or not callable.")]
    NotFound(String),
    #[error("{name}() takes {expected} arguments but {given} were given")]
    Arity {
        name: String,
        expected: String,
        given: usize,
    },
    #[error("{0}")]
    Failed(String),
    #[error("can't run {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type FunctionResult = Result<String, FunctionError>;

type Callable = Arc<dyn Fn(&[&str]) -> FunctionResult + Send + Sync + 'static>;

/// A set of named functions taking string arguments and returning a string
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Callable>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry { functions: HashMap::new() }
    }

    /// Register a function, replacing any previous one of the same name
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[&str]) -> FunctionResult + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn call(&self, name: &str, args: &[&str]) -> FunctionResult {
        match self.functions.get(name) {
            Some(f) => f(args),
            None => Err(FunctionError::NotFound(name.to_string())),
        }
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Function lookup for one expansion pass
///
/// The environment's own functions shadow the built-ins.
#[derive(Clone, Copy, Debug)]
pub struct FunctionNamespace<'a> {
    environment: Option<&'a FunctionRegistry>,
    builtins: &'a FunctionRegistry,
}

impl<'a> FunctionNamespace<'a> {
    pub fn new(builtins: &'a FunctionRegistry, environment: Option<&'a FunctionRegistry>) -> Self {
        FunctionNamespace { environment, builtins }
    }

    pub fn invoke(&self, name: &str, args: &[&str]) -> FunctionResult {
        if let Some(registry) = self.environment.filter(|r| r.contains(name)) {
            debug!("Calling environment function {name}({})", args.join(", "));
            return registry.call(name, args);
        }
        debug!("Calling built-in function {name}({})", args.join(", "));
        self.builtins.call(name, args)
    }
}

/// Check a fixed argument count and hand back the arguments as an array
pub fn exact_args<'a, const N: usize>(name: &str, args: &[&'a str]) -> Result<[&'a str; N], FunctionError> {
    args.try_into().map_err(|_| FunctionError::Arity {
        name: name.to_string(),
        expected: N.to_string(),
        given: args.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(name: &str, result: &'static str) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register(name, move |_| Ok(result.to_string()));
        registry
    }

    #[test]
    fn unknown_function_is_not_found() {
        let registry = FunctionRegistry::new();
        let err = registry.call("missing", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Function missing not found or not callable.");
    }

    #[test]
    fn environment_shadows_builtins() {
        let builtins = registry_with("pick", "builtin");
        let environment = registry_with("pick", "environment");
        let namespace = FunctionNamespace::new(&builtins, Some(&environment));
        assert_eq!(namespace.invoke("pick", &[]).unwrap(), "environment");
    }

    #[test]
    fn builtins_are_the_fallback() {
        let builtins = registry_with("only_builtin", "builtin");
        let environment = registry_with("other", "environment");
        let namespace = FunctionNamespace::new(&builtins, Some(&environment));
        assert_eq!(namespace.invoke("only_builtin", &[]).unwrap(), "builtin");
        assert!(matches!(
            namespace.invoke("nowhere", &[]),
            Err(FunctionError::NotFound(_))
        ));
    }

    #[test]
    fn arity_is_checked() {
        let [a, b] = exact_args::<2>("f", &["x", "y"]).unwrap();
        assert_eq!((a, b), ("x", "y"));

        let err = exact_args::<2>("f", &["x"]).unwrap_err();
        assert_eq!(err.to_string(), "f() takes 2 arguments but 1 were given");
    }
}
