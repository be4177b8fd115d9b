//! Message logging with pattern-based filtering and in-memory storage
//!
//! [`ActionLoggerMiddleware`] is an observer middleware: it logs every message
//! whose type string passes an include/exclude glob filter through `tracing`,
//! and can keep the most recent ones in a shared ring buffer ([`ActionLog`]).
//!
//! # Example
//!
//! ```ignore
//! use cofx_dispatch::logger::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
//!
//! // Everything except the todo namespace, tracing only
//! let logger = ActionLoggerMiddleware::new(ActionLoggerConfig::new(None, Some("todo/*")));
//!
//! // Keep the last 50 messages around for inspection
//! let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::with_capacity(50));
//! let log = logger.log_handle();
//! let store = CofxStore::builder(state, reducer).middleware(logger).build();
//!
//! for entry in log.lock().recent(10) {
//!     println!("#{} {}", entry.sequence, entry.summary);
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::action::{Action, Msg};
use crate::store::Middleware;

/// Include/exclude filter over message type strings.
///
/// Patterns support `*` (any run of characters) and `?` (one character).
/// `todo/*` matches every type in the `todo/` namespace, `@@cofx/*` matches
/// the middleware's own markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionLoggerConfig {
    /// If non-empty, only names matching one of these are logged
    pub include_patterns: Vec<String>,
    /// Names matching one of these are never logged
    pub exclude_patterns: Vec<String>,
}

impl ActionLoggerConfig {
    /// Build a filter from comma-separated pattern lists.
    ///
    /// With neither list every message is logged.
    ///
    /// ```
    /// use cofx_dispatch_core::logger::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("todo/*"), Some("todo/TICK"));
    /// assert!(config.should_log("todo/ADD"));
    /// assert!(!config.should_log("todo/TICK"));
    /// assert!(!config.should_log("user/LOGIN"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    /// Whether a message named `name` passes the filter.
    pub fn should_log(&self, name: &str) -> bool {
        let included = self.include_patterns.is_empty()
            || self.include_patterns.iter().any(|p| glob_match(p, name));
        included && !self.exclude_patterns.iter().any(|p| glob_match(p, name))
    }
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// One logged message.
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    /// Type string of the message
    pub name: &'static str,
    /// One-line rendering of the message
    pub summary: String,
    /// Position in the stream of logged messages
    pub sequence: u64,
    /// Set once the reducer has run
    pub state_changed: Option<bool>,
}

impl ActionLogEntry {
    pub fn new(name: &'static str, summary: String, sequence: u64) -> Self {
        Self {
            name,
            summary,
            sequence,
            state_changed: None,
        }
    }
}

/// Ring buffer settings.
#[derive(Debug, Clone)]
pub struct ActionLogConfig {
    /// Maximum number of entries kept
    pub capacity: usize,
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: ActionLoggerConfig::default(),
        }
    }
}

impl ActionLogConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }
}

/// Bounded log of recent messages; the oldest entry is dropped when full.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Record `msg` if it passes the filter.
    pub fn log<A: Action>(&mut self, msg: &Msg<A>) -> Option<&ActionLogEntry> {
        let name = msg.name();
        if !self.config.filter.should_log(name) || self.config.capacity == 0 {
            return None;
        }

        let entry = ActionLogEntry::new(name, summarize(msg), self.next_sequence);
        self.next_sequence += 1;

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.entries.back()
    }

    /// Fill in `state_changed` on the newest entry.
    pub fn update_last_state_changed(&mut self, changed: bool) {
        if let Some(entry) = self.entries.back_mut() {
            entry.state_changed = Some(changed);
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Newest first, at most `count`.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Log shared between the middleware and whoever reads it.
pub type SharedActionLog = Arc<Mutex<ActionLog>>;

/// Observer middleware logging filtered messages.
///
/// Logs to `tracing` at debug level; with [`ActionLoggerMiddleware::with_log`]
/// it also fills a [`SharedActionLog`].
#[derive(Debug, Clone)]
pub struct ActionLoggerMiddleware {
    config: ActionLoggerConfig,
    log: Option<SharedActionLog>,
    // Whether `before` recorded the current message.
    last_logged: bool,
    active: bool,
}

impl Default for ActionLoggerMiddleware {
    fn default() -> Self {
        Self::new(ActionLoggerConfig::default())
    }
}

impl ActionLoggerMiddleware {
    /// Tracing only.
    pub fn new(config: ActionLoggerConfig) -> Self {
        Self {
            config,
            log: None,
            last_logged: false,
            active: true,
        }
    }

    /// Tracing plus an in-memory log.
    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            config: config.filter.clone(),
            log: Some(Arc::new(Mutex::new(ActionLog::new(config)))),
            last_logged: false,
            active: true,
        }
    }

    /// Turn the middleware into a no-op when `active` is false.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Handle on the in-memory log, if enabled.
    pub fn log_handle(&self) -> Option<SharedActionLog> {
        self.log.clone()
    }
}

impl<A: Action> Middleware<A> for ActionLoggerMiddleware {
    fn before(&mut self, msg: &Msg<A>) {
        if !self.active {
            return;
        }

        let name = msg.name();
        if self.config.should_log(name) {
            match msg {
                Msg::Error(err) => tracing::debug!(action = %name, error = %err, "action"),
                Msg::Batch(inner) | Msg::BatchActions(inner) => {
                    tracing::debug!(action = %name, size = inner.len(), "action")
                }
                Msg::Action(_) => tracing::debug!(action = %name, "action"),
            }
        }

        self.last_logged = match &self.log {
            Some(log) => log.lock().log(msg).is_some(),
            None => false,
        };
    }

    fn after(&mut self, _msg: &Msg<A>, state_changed: bool) {
        if !self.active || !self.last_logged {
            return;
        }
        if let Some(log) = &self.log {
            log.lock().update_last_state_changed(state_changed);
        }
    }
}

fn summarize<A: Action>(msg: &Msg<A>) -> String {
    match msg {
        Msg::Action(action) => format!("{action:?}"),
        Msg::Batch(inner) | Msg::BatchActions(inner) => {
            let names: Vec<_> = inner.iter().map(Msg::name).collect();
            format!("{} [{}]", msg.name(), names.join(", "))
        }
        Msg::Error(err) => format!("{}: {err}", msg.name()),
    }
}

/// Glob match supporting `*` and `?`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Last `*` seen and the text position it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{BATCH_ACTIONS, ERROR};
    use crate::batch::batch_actions;
    use crate::error::EffectError;

    #[derive(Clone, Debug)]
    enum TestAction {
        Tick,
        Add,
        Remove,
    }

    impl Action for TestAction {
        fn name(&self) -> &'static str {
            match self {
                TestAction::Tick => "todo/TICK",
                TestAction::Add => "todo/ADD",
                TestAction::Remove => "todo/REMOVE",
            }
        }
    }

    fn tick() -> Msg<TestAction> {
        Msg::Action(TestAction::Tick)
    }

    fn add() -> Msg<TestAction> {
        Msg::Action(TestAction::Add)
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("todo/ADD", "todo/ADD"));
        assert!(!glob_match("todo/ADD", "todo/ADDED"));
        assert!(glob_match("todo/*", "todo/ADD"));
        assert!(glob_match("todo/*", "todo/"));
        assert!(!glob_match("todo/*", "user/ADD"));
        assert!(glob_match("*/ADD", "user/ADD"));
        assert!(glob_match("@@cofx/*", BATCH_ACTIONS));
        assert!(glob_match("*BATCH*", BATCH_ACTIONS));
        assert!(glob_match("todo/?DD", "todo/ADD"));
        assert!(!glob_match("todo/?", "todo/"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_config_logs_everything_by_default() {
        let config = ActionLoggerConfig::new(None, None);
        assert!(config.should_log("todo/TICK"));
        assert!(config.should_log(ERROR));
    }

    #[test]
    fn test_config_include_and_exclude() {
        let config = ActionLoggerConfig::new(Some("todo/*, @@cofx/*"), Some("todo/TICK"));
        assert!(config.should_log("todo/ADD"));
        assert!(config.should_log(ERROR));
        assert!(!config.should_log("todo/TICK"));
        assert!(!config.should_log("user/LOGIN"));
    }

    #[test]
    fn test_log_capacity_drops_oldest() {
        let mut log = ActionLog::new(ActionLogConfig::with_capacity(2));

        log.log(&add());
        log.log(&tick());
        log.log(&Msg::Action(TestAction::Remove));

        let sequences: Vec<_> = log.entries().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(log.recent(1).next().map(|e| e.summary.as_str()), Some("Remove"));
    }

    #[test]
    fn test_log_summaries() {
        let mut log = ActionLog::default();

        log.log(&batch_actions([TestAction::Add, TestAction::Tick]));
        log.log::<TestAction>(&Msg::Error(EffectError::message("boom")));

        let summaries: Vec<_> = log.entries().map(|e| e.summary.clone()).collect();
        assert_eq!(
            summaries,
            vec![
                format!("{BATCH_ACTIONS} [todo/ADD, todo/TICK]"),
                format!("{ERROR}: boom"),
            ]
        );
    }

    #[test]
    fn test_middleware_skips_state_changed_for_filtered() {
        let mut middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::new(
            10,
            ActionLoggerConfig::new(None, Some("todo/TICK")),
        ));
        let log = middleware.log_handle().unwrap();

        middleware.before(&add());
        middleware.after(&add(), true);
        middleware.before(&tick());
        middleware.after(&tick(), false);

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries().next().unwrap().state_changed, Some(true));
    }

    #[test]
    fn test_inactive_middleware_is_noop() {
        let mut middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::default()).active(false);
        let log = middleware.log_handle().unwrap();

        middleware.before(&add());
        middleware.after(&add(), true);

        assert!(log.lock().is_empty());
    }
}
