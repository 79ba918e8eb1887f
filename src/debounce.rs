//! Trailing-edge debouncing for search input.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::config::SearchSettings;

/// Emits a pushed value once no newer value arrived for `delay`.
///
/// Each push restarts the timer, so a burst of values produces a single
/// emission carrying the last one. Dropping the debouncer cancels any
/// pending emission.
pub struct Debouncer<T> {
  delay: Duration,
  timer: Option<JoinHandle<()>>,
  tx: mpsc::UnboundedSender<T>,
  rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Send + 'static> Debouncer<T> {
  pub fn new(delay: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      delay,
      timer: None,
      tx,
      rx,
    }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// Replace the pending value and restart the timer.
  pub fn push(&mut self, value: T) {
    self.cancel();
    let tx = self.tx.clone();
    let delay = self.delay;
    self.timer = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(value);
    }));
  }

  /// Drop the pending value, if any. Returns whether one was pending.
  pub fn cancel(&mut self) -> bool {
    match self.timer.take() {
      Some(timer) => {
        let pending = !timer.is_finished();
        timer.abort();
        pending
      }
      None => false,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.timer.as_ref().is_some_and(|t| !t.is_finished())
  }

  /// Wait for the next emission.
  pub async fn next(&mut self) -> Option<T> {
    self.rx.recv().await
  }

  /// An emission that already happened, without waiting.
  pub fn try_next(&mut self) -> Option<T> {
    self.rx.try_recv().ok()
  }
}

impl<T> Drop for Debouncer<T> {
  fn drop(&mut self) {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
  }
}

/// Debounced search box.
///
/// Terms are trimmed; a term shorter than `min_length` characters emits an
/// empty string, which clears the search filter.
pub struct DebouncedSearch {
  debouncer: Debouncer<String>,
  min_length: usize,
}

impl DebouncedSearch {
  pub fn new(delay: Duration, min_length: usize) -> Self {
    Self {
      debouncer: Debouncer::new(delay),
      min_length,
    }
  }

  pub fn from_settings(settings: &SearchSettings) -> Self {
    Self::new(settings.debounce(), settings.min_length)
  }

  /// Feed the current contents of the search box.
  pub fn input(&mut self, raw: &str) {
    let term = raw.trim();
    let term = if term.chars().count() < self.min_length {
      String::new()
    } else {
      term.to_string()
    };
    trace!(term = %term, "search input");
    self.debouncer.push(term);
  }

  pub fn cancel(&mut self) -> bool {
    self.debouncer.cancel()
  }

  pub fn is_pending(&self) -> bool {
    self.debouncer.is_pending()
  }

  /// Wait for the next settled term.
  pub async fn next(&mut self) -> Option<String> {
    self.debouncer.next().await
  }

  pub fn try_next(&mut self) -> Option<String> {
    self.debouncer.try_next()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::time::sleep;

  const DELAY: Duration = Duration::from_millis(400);

  #[tokio::test(start_paused = true)]
  async fn test_burst_emits_last_value_once() {
    let mut search = DebouncedSearch::new(DELAY, 2);
    search.input("a");
    sleep(Duration::from_millis(100)).await;
    search.input("ab");
    sleep(Duration::from_millis(100)).await;
    search.input("abc");

    assert_eq!(search.next().await.as_deref(), Some("abc"));
    sleep(Duration::from_secs(2)).await;
    assert_eq!(search.try_next(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_pause_longer_than_delay_emits_each_value() {
    let mut debouncer = Debouncer::new(DELAY);
    debouncer.push("a");
    sleep(Duration::from_millis(500)).await;
    debouncer.push("ab");

    assert_eq!(debouncer.next().await, Some("a"));
    assert_eq!(debouncer.next().await, Some("ab"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_short_terms_clear_the_filter() {
    let mut search = DebouncedSearch::new(DELAY, 2);
    search.input(" x ");
    assert_eq!(search.next().await.as_deref(), Some(""));

    search.input("  acme ");
    assert_eq!(search.next().await.as_deref(), Some("acme"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_drops_pending_value() {
    let mut debouncer = Debouncer::new(DELAY);
    debouncer.push(1);
    assert!(debouncer.is_pending());
    assert!(debouncer.cancel());
    assert!(!debouncer.is_pending());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(debouncer.try_next(), None);
    assert!(!debouncer.cancel());
  }

  #[tokio::test(start_paused = true)]
  async fn test_fired_term_is_kept_after_timer_finishes() {
    let mut search = DebouncedSearch::new(DELAY, 2);
    search.input("acme");
    sleep(Duration::from_millis(500)).await;

    assert!(!search.is_pending());
    assert_eq!(search.try_next().as_deref(), Some("acme"));
    assert_eq!(search.try_next(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_timer_restarts_on_push() {
    let mut debouncer = Debouncer::new(DELAY);
    debouncer.push("a");
    sleep(Duration::from_millis(300)).await;
    debouncer.push("b");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(debouncer.try_next(), None);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(debouncer.try_next(), Some("b"));
  }
}
