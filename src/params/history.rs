//! Shareable location state.
//!
//! A [`History`] is where list state lives between interactions: a browser
//! location bar, a deep link, or a plain in-memory stack. Filter tweaks
//! replace the current entry by default so back-navigation is not flooded
//! with every keystroke.

/// A stack of query strings with a current position.
pub trait History {
  /// Query string of the current entry, without the leading `?`.
  fn location(&self) -> String;

  /// Overwrite the current entry.
  fn replace(&mut self, query: String);

  /// Add a new entry after the current one, dropping any forward entries.
  fn push(&mut self, query: String);
}

/// How a state change is written to the history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigationMode {
  #[default]
  Replace,
  Push,
}

impl NavigationMode {
  /// Write `query`, unless it is already the current location.
  pub fn apply<H: History + ?Sized>(self, history: &mut H, query: String) {
    if history.location() == query {
      return;
    }
    match self {
      NavigationMode::Replace => history.replace(query),
      NavigationMode::Push => history.push(query),
    }
  }
}

/// In-memory history, used by the command-line client and in tests.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
  entries: Vec<String>,
  index: usize,
}

impl Default for MemoryHistory {
  fn default() -> Self {
    Self::new("")
  }
}

impl MemoryHistory {
  pub fn new(initial: impl Into<String>) -> Self {
    let initial: String = initial.into();
    Self {
      entries: vec![initial.trim_start_matches('?').to_string()],
      index: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn back(&mut self) -> bool {
    if self.index == 0 {
      return false;
    }
    self.index -= 1;
    true
  }

  pub fn forward(&mut self) -> bool {
    if self.index + 1 >= self.entries.len() {
      return false;
    }
    self.index += 1;
    true
  }
}

impl History for MemoryHistory {
  fn location(&self) -> String {
    self.entries[self.index].clone()
  }

  fn replace(&mut self, query: String) {
    self.entries[self.index] = query;
  }

  fn push(&mut self, query: String) {
    self.entries.truncate(self.index + 1);
    self.entries.push(query);
    self.index += 1;
  }
}
