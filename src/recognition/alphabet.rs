use std::collections::HashMap;

use crate::error::EvalError;

/// Symbols a product code may contain.
pub const DEFAULT_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Ordered set of recognizable characters. Class `i < len()` maps to the
/// `i`-th symbol; class `len()` is the CTC blank.
///
/// The same alphabet must be used for training, inference and evaluation,
/// otherwise class indices decode to the wrong characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
    index: HashMap<char, usize>,
}

impl Alphabet {
    pub fn new(symbols: &str) -> Result<Self, EvalError> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(EvalError::invalid_input("alphabet must not be empty"));
        }

        let mut index = HashMap::with_capacity(symbols.len());
        for (i, &c) in symbols.iter().enumerate() {
            if index.insert(c, i).is_some() {
                return Err(EvalError::invalid_input(format!(
                    "alphabet contains duplicate symbol {c:?}"
                )));
            }
        }

        Ok(Self { symbols, index })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn blank_index(&self) -> usize {
        self.symbols.len()
    }

    /// Number of output classes a model must emit, blank included.
    pub fn class_count(&self) -> usize {
        self.symbols.len() + 1
    }

    pub fn contains(&self, c: char) -> bool {
        self.index.contains_key(&c)
    }

    pub fn index_of(&self, c: char) -> Option<usize> {
        self.index.get(&c).copied()
    }

    pub fn symbol(&self, class: usize) -> Option<char> {
        self.symbols.get(class).copied()
    }

    /// Drops every character the model cannot emit.
    pub fn filter(&self, text: &str) -> String {
        text.chars().filter(|c| self.contains(*c)).collect()
    }

    /// Class labels for `text`, skipping characters outside the alphabet.
    pub fn to_labels(&self, text: &str) -> Vec<usize> {
        text.chars().filter_map(|c| self.index_of(c)).collect()
    }

    pub fn symbols(&self) -> String {
        self.symbols.iter().collect()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_ALPHABET.chars().collect(),
            index: DEFAULT_ALPHABET
                .chars()
                .enumerate()
                .map(|(i, c)| (c, i))
                .collect(),
        }
    }
}
