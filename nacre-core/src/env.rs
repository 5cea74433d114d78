//! Shell environment: a stack of scoped variable maps.

use indexmap::IndexMap;

use crate::error;
use crate::variables::ShellVariable;

/// The scope of a variable map on the environment stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnvironmentScope {
    /// Scope local to a function instance.
    Local,
    /// Globally scoped.
    Global,
    /// Transient scope for a single command instance; holds the exported
    /// assignment-prefix overlay of `VAR=value cmd`.
    Command,
}

/// The shell environment: an ordered stack of scopes, innermost last.
#[derive(Clone, Debug)]
pub struct ShellEnvironment {
    /// Stack of scopes, with the outermost scope first.
    scopes: Vec<(EnvironmentScope, ShellVariableMap)>,
}

impl Default for ShellEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellEnvironment {
    /// Returns a new shell environment with an empty global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![(EnvironmentScope::Global, ShellVariableMap::default())],
        }
    }

    //
    // Scope management
    //

    /// Pushes a new scope of the given type onto the environment's scope stack.
    ///
    /// # Arguments
    ///
    /// * `scope_type` - The type of scope to push.
    pub fn push_scope(&mut self, scope_type: EnvironmentScope) {
        self.scopes.push((scope_type, ShellVariableMap::default()));
    }

    /// Pops the top-most scope off the environment's scope stack; fails if the
    /// top-most scope is not of the expected type.
    ///
    /// # Arguments
    ///
    /// * `expected_scope_type` - The expected type of the top-most scope.
    pub fn pop_scope(&mut self, expected_scope_type: EnvironmentScope) -> Result<(), error::Error> {
        match self.scopes.pop() {
            Some((actual_scope_type, _)) if actual_scope_type == expected_scope_type => Ok(()),
            _ => Err(error::Error::MissingScope),
        }
    }

    //
    // Lookup
    //

    /// Tries to retrieve the variable with the given name, searching scopes
    /// innermost first.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable to retrieve.
    pub fn get<S: AsRef<str>>(&self, name: S) -> Option<(EnvironmentScope, &ShellVariable)> {
        for (scope_type, map) in self.scopes.iter().rev() {
            if let Some(var) = map.get(name.as_ref()) {
                return Some((*scope_type, var));
            }
        }

        None
    }

    /// Tries to retrieve a mutable reference to the variable with the given
    /// name, searching scopes innermost first.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable to retrieve.
    pub fn get_mut<S: AsRef<str>>(
        &mut self,
        name: S,
    ) -> Option<(EnvironmentScope, &mut ShellVariable)> {
        for (scope_type, map) in self.scopes.iter_mut().rev() {
            if let Some(var) = map.get_mut(name.as_ref()) {
                return Some((*scope_type, var));
            }
        }

        None
    }

    /// Returns the string value of the given variable, if set.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable to retrieve.
    pub fn get_str<S: AsRef<str>>(&self, name: S) -> Option<&str> {
        self.get(name).map(|(_, var)| var.value())
    }

    /// Checks whether a variable of the given name is set.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable to check.
    pub fn is_set<S: AsRef<str>>(&self, name: S) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over all visible variables, innermost definitions shadowing
    /// outer ones.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ShellVariable)> {
        let mut visible: IndexMap<&String, &ShellVariable> = IndexMap::new();

        for (_, map) in &self.scopes {
            for (name, var) in map.iter() {
                visible.insert(name, var);
            }
        }

        visible.into_iter()
    }

    /// Iterates over all visible exported variables. Inner scopes shadow
    /// outer scopes, so a command-scope overlay wins over the global value.
    pub fn iter_exported(&self) -> impl Iterator<Item = (&String, &ShellVariable)> {
        self.iter().filter(|(_, var)| var.is_exported())
    }

    //
    // Mutation
    //

    /// Unsets the variable with the given name from the innermost scope that
    /// defines it; returns whether a variable was removed.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable to unset.
    pub fn unset(&mut self, name: &str) -> Result<bool, error::Error> {
        for (_, map) in self.scopes.iter_mut().rev() {
            if let Some(var) = map.get(name) {
                if var.is_readonly() {
                    return Err(error::Error::ReadonlyVariable(name.to_owned()));
                }

                map.unset(name);
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Updates the innermost definition of the given variable, or adds it to
    /// the given scope if not yet set.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable.
    /// * `value` - The value to assign.
    /// * `creation_scope` - The scope to create the variable in when unset.
    pub fn update_or_add<N: AsRef<str>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
        creation_scope: EnvironmentScope,
    ) -> Result<(), error::Error> {
        if self.is_set(name.as_ref()) {
            if let Some((_, var)) = self.get_mut(name.as_ref()) {
                return var.assign(name.as_ref(), value);
            }
        }

        self.add(name.as_ref(), ShellVariable::new(value), creation_scope)
    }

    /// Adds a variable to the given scope, replacing any same-named variable
    /// already in that scope.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable.
    /// * `var` - The variable to add.
    /// * `target_scope` - The scope to add the variable to.
    pub fn add<N: Into<String>>(
        &mut self,
        name: N,
        var: ShellVariable,
        target_scope: EnvironmentScope,
    ) -> Result<(), error::Error> {
        for (scope_type, map) in self.scopes.iter_mut().rev() {
            if *scope_type == target_scope {
                map.set(name, var);
                return Ok(());
            }
        }

        Err(error::Error::MissingScope)
    }

    /// Sets a global variable with the given literal value.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the variable.
    /// * `value` - The value.
    pub fn set_global<N: Into<String>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
    ) -> Result<(), error::Error> {
        self.add(name, ShellVariable::new(value), EnvironmentScope::Global)
    }
}

/// A single map of names to variables.
#[derive(Clone, Debug, Default)]
pub struct ShellVariableMap {
    variables: IndexMap<String, ShellVariable>,
}

impl ShellVariableMap {
    /// Iterates over the variables in the map.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ShellVariable)> {
        self.variables.iter()
    }

    /// Tries to retrieve the variable with the given name.
    pub fn get(&self, name: &str) -> Option<&ShellVariable> {
        self.variables.get(name)
    }

    /// Tries to retrieve a mutable reference to the variable with the given name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ShellVariable> {
        self.variables.get_mut(name)
    }

    /// Unsets the variable with the given name, returning it if it was set.
    pub fn unset(&mut self, name: &str) -> Option<ShellVariable> {
        self.variables.shift_remove(name)
    }

    /// Sets the variable with the given name.
    pub fn set<N: Into<String>>(&mut self, name: N, var: ShellVariable) -> Option<ShellVariable> {
        self.variables.insert(name.into(), var)
    }
}

/// Checks whether the given string is a valid variable name.
///
/// # Arguments
///
/// * `s` - The string to check.
pub fn valid_variable_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_searches_innermost_scope_first() {
        let mut env = ShellEnvironment::new();
        env.set_global("X", "global").unwrap();

        env.push_scope(EnvironmentScope::Command);
        env.add("X", ShellVariable::new("overlay"), EnvironmentScope::Command)
            .unwrap();

        assert_eq!(env.get_str("X"), Some("overlay"));

        env.pop_scope(EnvironmentScope::Command).unwrap();
        assert_eq!(env.get_str("X"), Some("global"));
    }

    #[test]
    fn command_scope_overlay_does_not_leak() {
        let mut env = ShellEnvironment::new();

        env.push_scope(EnvironmentScope::Command);
        env.add("ONLY", ShellVariable::new("here"), EnvironmentScope::Command)
            .unwrap();
        env.pop_scope(EnvironmentScope::Command).unwrap();

        assert!(!env.is_set("ONLY"));
    }

    #[test]
    fn pop_scope_validates_scope_type() {
        let mut env = ShellEnvironment::new();
        env.push_scope(EnvironmentScope::Local);
        assert!(env.pop_scope(EnvironmentScope::Command).is_err());
    }

    #[test]
    fn set_then_unset_restores_original_state() {
        let mut env = ShellEnvironment::new();
        assert!(!env.is_set("TMP"));

        env.set_global("TMP", "x").unwrap();
        assert!(env.is_set("TMP"));

        assert!(env.unset("TMP").unwrap());
        assert!(!env.is_set("TMP"));
        assert!(!env.unset("TMP").unwrap());
    }

    #[test]
    fn exported_iteration_prefers_inner_scopes() {
        let mut env = ShellEnvironment::new();
        let mut outer = ShellVariable::new("outer");
        outer.export();
        env.add("A", outer, EnvironmentScope::Global).unwrap();

        env.push_scope(EnvironmentScope::Command);
        let mut inner = ShellVariable::new("inner");
        inner.export();
        env.add("A", inner, EnvironmentScope::Command).unwrap();

        let exported: Vec<_> = env
            .iter_exported()
            .map(|(name, var)| (name.clone(), var.value().to_owned()))
            .collect();
        assert_eq!(exported, [("A".to_owned(), "inner".to_owned())]);
    }

    #[test]
    fn variable_name_validation() {
        assert!(valid_variable_name("_x"));
        assert!(valid_variable_name("PATH"));
        assert!(valid_variable_name("var2"));
        assert!(!valid_variable_name("2var"));
        assert!(!valid_variable_name(""));
        assert!(!valid_variable_name("a-b"));
    }
}
