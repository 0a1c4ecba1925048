//! Named formulas that refer to each other with `@name`.
//!
//! Cycles are rejected when a formula is stored, so [FormulaSet::calculation_order] always
//! finds an order in which every formula comes after the formulas it references.

use crate::error::CompileError;
use crate::eval::{evaluate_in, Environment, FormulaLookup};
use crate::ir::Expr;
use crate::location::Location;
use crate::value::TimeResult;
use chrono::NaiveDate;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reference cycle: {}", .chain.join(" -> "))]
pub struct CycleError {
    /// Names along the cycle; the first name is repeated at the end.
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaSetError {
    #[error("formula `{name}`: {source}")]
    Compile {
        name: String,
        #[source]
        source: CompileError,
    },
    #[error("`{0}` is not a valid formula name")]
    InvalidName(String),
    #[error("formula `{0}` refers to itself")]
    SelfReference(String),
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

#[derive(Clone, Debug, Default)]
pub struct FormulaSet {
    formulas: BTreeMap<String, Expr>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FormulaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `text` and store it under `name`, replacing any earlier formula of that name.
    pub fn insert(&mut self, name: &str, text: &str) -> Result<(), FormulaSetError> {
        let tree = crate::compile(text).map_err(|source| FormulaSetError::Compile {
            name: name.to_string(),
            source,
        })?;
        self.insert_compiled(name, tree)
    }

    pub fn insert_compiled(&mut self, name: &str, tree: Expr) -> Result<(), FormulaSetError> {
        if !valid_name(name) {
            return Err(FormulaSetError::InvalidName(name.to_string()));
        }
        let refs = tree.references();
        if refs.contains(name) {
            return Err(FormulaSetError::SelfReference(name.to_string()));
        }
        for r in &refs {
            if let Some(mut path) = self.path(r, name) {
                path.insert(0, name.to_string());
                return Err(CycleError { chain: path }.into());
            }
        }
        log::debug!("stored formula `{name}` = {tree}");
        self.formulas.insert(name.to_string(), tree);
        Ok(())
    }

    /// Chain of references leading from `from` to `to`, both included.
    fn path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut chain = Vec::new();
        self.walk(from, to, &mut visited, &mut chain).then_some(chain)
    }

    fn walk<'s>(
        &'s self,
        at: &'s str,
        to: &str,
        visited: &mut BTreeSet<&'s str>,
        chain: &mut Vec<String>,
    ) -> bool {
        chain.push(at.to_string());
        if at == to {
            return true;
        }
        if visited.insert(at) {
            if let Some(tree) = self.formulas.get(at) {
                for next in tree.references() {
                    let Some((key, _)) = self.formulas.get_key_value(next.as_str()) else {
                        if next == to {
                            chain.push(next);
                            return true;
                        }
                        continue;
                    };
                    if self.walk(key, to, visited, chain) {
                        return true;
                    }
                }
            }
        }
        chain.pop();
        false
    }

    pub fn remove(&mut self, name: &str) -> Option<Expr> {
        self.formulas.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.formulas.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formulas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Names referenced by `name`, whether or not they are stored.
    pub fn references(&self, name: &str) -> Option<BTreeSet<String>> {
        self.formulas.get(name).map(Expr::references)
    }

    /// Stored formulas that reference `name` directly.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.formulas
            .iter()
            .filter(|(_, tree)| tree.references().contains(name))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Every stored name, each after the stored names it references (Kahn's algorithm, ties
    /// broken alphabetically). References to names outside the set are ignored.
    pub fn calculation_order(&self) -> Result<Vec<String>, CycleError> {
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
        let mut users: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, tree) in &self.formulas {
            let deps: Vec<String> = tree
                .references()
                .into_iter()
                .filter(|r| self.formulas.contains_key(r))
                .collect();
            pending.insert(name, deps.len());
            for dep in deps {
                if let Some((key, _)) = self.formulas.get_key_value(dep.as_str()) {
                    users.entry(key.as_str()).or_default().push(name);
                }
            }
        }

        let mut ready: VecDeque<&str> = pending
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(&name, _)| name)
            .collect();
        let mut order = Vec::with_capacity(self.formulas.len());
        while let Some(name) = ready.pop_front() {
            order.push(name.to_string());
            for &user in users.get(name).map(Vec::as_slice).unwrap_or_default() {
                if let Some(n) = pending.get_mut(user) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push_back(user);
                    }
                }
            }
        }

        if order.len() < self.formulas.len() {
            let chain = pending
                .into_iter()
                .filter(|(_, n)| *n > 0)
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(CycleError { chain });
        }
        Ok(order)
    }

    /// Evaluate every formula in calculation order with the built-in bases and solver.
    pub fn evaluate_all(
        &self,
        date: NaiveDate,
        location: &Location,
    ) -> Result<Vec<(String, TimeResult)>, CycleError> {
        self.evaluate_all_in(Environment::new(date, location, self))
    }

    /// Like [FormulaSet::evaluate_all] but with the solver and bases of `env`; references
    /// always resolve against this set.
    pub fn evaluate_all_in(
        &self,
        env: Environment<'_>,
    ) -> Result<Vec<(String, TimeResult)>, CycleError> {
        let env = Environment {
            formulas: self,
            ..env
        };
        let order = self.calculation_order()?;
        Ok(order
            .into_iter()
            .filter_map(|name| {
                let result = evaluate_in(self.formulas.get(&name)?, &env);
                Some((name, result))
            })
            .collect())
    }
}

impl FormulaLookup for FormulaSet {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Expr>> {
        self.formulas.get(name).map(Cow::Borrowed)
    }
}
