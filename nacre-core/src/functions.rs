//! Management of functions registered within a shell instance.

use std::collections::HashMap;
use std::sync::Arc;

use nacre_parser::ast;

/// An environment of defined, named functions.
#[derive(Clone, Debug, Default)]
pub struct FunctionEnv {
    functions: HashMap<String, FunctionRegistration>,
}

impl FunctionEnv {
    /// Tries to retrieve the registration for a function by name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the function to retrieve.
    pub fn get(&self, name: &str) -> Option<&FunctionRegistration> {
        self.functions.get(name)
    }

    /// Unregisters a function from the environment; returns whether a
    /// function of that name was removed.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the function to remove.
    pub fn remove(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    /// Registers a function, replacing any existing function of the same name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the function.
    /// * `registration` - The registration for the function.
    pub fn update(&mut self, name: String, registration: FunctionRegistration) {
        self.functions.insert(name, registration);
    }

    /// Iterates over the functions in the environment.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FunctionRegistration)> {
        self.functions.iter()
    }
}

/// A registered function.
#[derive(Clone, Debug)]
pub struct FunctionRegistration {
    /// The definition of the function. Shared ownership lets the registry
    /// keep the body alive independently of the program tree it came from.
    pub(crate) definition: Arc<ast::FunctionDefinition>,
}

impl From<ast::FunctionDefinition> for FunctionRegistration {
    fn from(definition: ast::FunctionDefinition) -> Self {
        Self {
            definition: Arc::new(definition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redefinition_replaces() {
        let mut env = FunctionEnv::default();

        let first = ast::FunctionDefinition {
            fname: "f".into(),
            body: ast::FunctionBody(
                ast::CompoundCommand::BraceGroup(ast::BraceGroupCommand(ast::CompoundList(
                    vec![],
                ))),
                None,
            ),
        };
        let second = first.clone();

        env.update("f".into(), FunctionRegistration::from(first));
        let original = Arc::as_ptr(&env.get("f").unwrap().definition);

        env.update("f".into(), FunctionRegistration::from(second));
        assert_ne!(original, Arc::as_ptr(&env.get("f").unwrap().definition));

        assert!(env.remove("f"));
        assert!(env.get("f").is_none());
    }
}
