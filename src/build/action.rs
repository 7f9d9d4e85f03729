//! Named actions.
//!
//! Callers run operations by name: a single name, a comma or whitespace
//! separated string, or a list. Names are resolved against an explicit
//! registry before anything runs, so a typo never half-runs a bundle.
//!
//! ```ignore
//! fn load<'a>(site: &'a Site, options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
//!     Box::pin(async move { site.load(options).await })
//! }
//!
//! let mut registry = ActionRegistry::new();
//! registry.register("load", load)?;
//! let runner = ActionRunner::new(registry, GroupPolicy::Sequential);
//! runner.action(&site, "load, render", &ActionOptions::default()).await?;
//! ```

use std::collections::BTreeMap;
use std::fmt;

use futures_util::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Error returned by an action body.
pub type ActionFailure = Box<dyn std::error::Error + Send + Sync>;

/// An action bound to its target type.
pub type ActionFn<T> = for<'a> fn(&'a T, &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>>;

/// Called with the outcome of a bundle.
pub type Completion<'c> = Box<dyn for<'r> FnOnce(Result<&'r [ActionResult], &'r ActionError>) + 'c>;

#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    #[error("no action was given")]
    Empty,

    #[error("unknown action '{name}'")]
    Unknown { name: String },

    #[error("action '{name}' is already registered")]
    Duplicate { name: String },

    #[error("'{name}' is not a valid action name")]
    InvalidName { name: String },

    #[error("action '{action}' failed: {source}")]
    Failed { action: String, source: ActionFailure },
}

/// How the actions of a multi-action bundle are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// One after the other, stopping at the first failure.
    #[default]
    Sequential,
    /// All at once on the current task.
    Parallel,
}

/// Arguments shared by every action of a bundle.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// Relative paths the action is limited to, where it supports that.
    pub paths: Vec<String>,
    pub dry_run: bool,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub value: Value,
}

/// Anything that names one or more actions.
pub trait IntoActionNames {
    fn into_action_names(self) -> Vec<String>;
}

impl IntoActionNames for &str {
    fn into_action_names(self) -> Vec<String> {
        split_names([self])
    }
}

impl IntoActionNames for String {
    fn into_action_names(self) -> Vec<String> {
        split_names([self.as_str()])
    }
}

impl IntoActionNames for &String {
    fn into_action_names(self) -> Vec<String> {
        split_names([self.as_str()])
    }
}

impl<S: AsRef<str>> IntoActionNames for Vec<S> {
    fn into_action_names(self) -> Vec<String> {
        split_names(self.iter().map(AsRef::as_ref))
    }
}

impl<S: AsRef<str>> IntoActionNames for &[S] {
    fn into_action_names(self) -> Vec<String> {
        split_names(self.iter().map(AsRef::as_ref))
    }
}

impl<S: AsRef<str>, const N: usize> IntoActionNames for [S; N] {
    fn into_action_names(self) -> Vec<String> {
        split_names(self.iter().map(AsRef::as_ref))
    }
}

/// Split on commas and whitespace, keeping the first occurrence of each name.
fn split_names<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for part in parts {
        for name in part.split(|c: char| c == ',' || c.is_whitespace()) {
            if !name.is_empty() && !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub struct ActionRegistry<T> {
    actions: BTreeMap<String, ActionFn<T>>,
}

impl<T> Default for ActionRegistry<T> {
    fn default() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }
}

impl<T> ActionRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, action: ActionFn<T>) -> Result<&mut Self, ActionError> {
        if !is_valid_name(name) {
            return Err(ActionError::InvalidName { name: name.to_string() });
        }
        if self.actions.contains_key(name) {
            return Err(ActionError::Duplicate { name: name.to_string() });
        }
        self.actions.insert(name.to_string(), action);
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Resolve every name up front, failing on the first unknown one.
    fn resolve(&self, names: Vec<String>) -> Result<Vec<(String, ActionFn<T>)>, ActionError> {
        if names.is_empty() {
            return Err(ActionError::Empty);
        }
        names
            .into_iter()
            .map(|name| match self.actions.get(&name) {
                Some(action) => Ok((name, *action)),
                None => Err(ActionError::Unknown { name }),
            })
            .collect()
    }
}

impl<T> fmt::Debug for ActionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}

/// Runs bundles of actions against a target.
#[derive(Debug)]
pub struct ActionRunner<T> {
    registry: ActionRegistry<T>,
    policy: GroupPolicy,
}

impl<T: Sync> ActionRunner<T> {
    pub fn new(registry: ActionRegistry<T>, policy: GroupPolicy) -> Self {
        Self { registry, policy }
    }

    /// Run one bundle, returning the result of each action in name order.
    pub async fn action(
        &self,
        target: &T,
        names: impl IntoActionNames,
        options: &ActionOptions,
    ) -> Result<Vec<ActionResult>, ActionError> {
        let actions = self.registry.resolve(names.into_action_names())?;

        if actions.len() == 1 || self.policy == GroupPolicy::Sequential {
            let mut results = Vec::with_capacity(actions.len());
            for (name, action) in actions {
                debug!(action = %name, "running action");
                let value = action(target, options)
                    .await
                    .map_err(|source| ActionError::Failed { action: name.clone(), source })?;
                results.push(ActionResult { action: name, value });
            }
            return Ok(results);
        }

        debug!(actions = actions.len(), "running actions in parallel");
        let outcomes = join_all(actions.iter().map(|(_, action)| action(target, options))).await;
        actions
            .into_iter()
            .zip(outcomes)
            .map(|((name, _), outcome)| match outcome {
                Ok(value) => Ok(ActionResult { action: name, value }),
                Err(source) => Err(ActionError::Failed { action: name, source }),
            })
            .collect()
    }

    /// Run one bundle and hand its outcome to `next`.
    ///
    /// Returns whether the bundle succeeded; `next` always runs first.
    pub async fn action_with<F>(&self, target: &T, names: impl IntoActionNames, options: &ActionOptions, next: F) -> bool
    where
        F: for<'r> FnOnce(Result<&'r [ActionResult], &'r ActionError>),
    {
        match self.action(target, names, options).await {
            Ok(results) => {
                next(Ok(&results));
                true
            }
            Err(err) => {
                next(Err(&err));
                false
            }
        }
    }

    /// Run every queued bundle in order, returning how many failed.
    ///
    /// A failed bundle does not stop the queue.
    pub async fn run_queue(&self, target: &T, queue: ActionQueue<'_>) -> usize {
        let mut failed = 0;
        for bundle in queue.bundles {
            if !self
                .action_with(target, bundle.names, &bundle.options, bundle.next)
                .await
            {
                failed += 1;
            }
        }
        failed
    }
}

struct Bundle<'c> {
    names: Vec<String>,
    options: ActionOptions,
    next: Completion<'c>,
}

/// Bundles waiting to be run by [`ActionRunner::run_queue`].
#[derive(Default)]
pub struct ActionQueue<'c> {
    bundles: Vec<Bundle<'c>>,
}

impl<'c> ActionQueue<'c> {
    pub fn new() -> Self {
        Self { bundles: Vec::new() }
    }

    pub fn push<F>(&mut self, names: impl IntoActionNames, options: ActionOptions, next: F) -> &mut Self
    where
        F: for<'r> FnOnce(Result<&'r [ActionResult], &'r ActionError>) + 'c,
    {
        self.bundles.push(Bundle {
            names: names.into_action_names(),
            options,
            next: Box::new(next),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Site {
        log: Mutex<Vec<String>>,
    }

    impl Site {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    fn load<'a>(site: &'a Site, _options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            site.log.lock().unwrap().push("load".into());
            Ok(Value::from(1))
        })
    }

    fn render<'a>(site: &'a Site, options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
        Box::pin(async move {
            site.log.lock().unwrap().push("render".into());
            Ok(Value::from(options.paths.len()))
        })
    }

    fn explode<'a>(site: &'a Site, _options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
        Box::pin(async move {
            site.log.lock().unwrap().push("explode".into());
            Err("boom".into())
        })
    }

    fn runner(policy: GroupPolicy) -> ActionRunner<Site> {
        let mut registry = ActionRegistry::new();
        registry
            .register("load", load)
            .unwrap()
            .register("render", render)
            .unwrap()
            .register("explode", explode)
            .unwrap();
        ActionRunner::new(registry, policy)
    }

    #[test]
    fn test_name_splitting() {
        assert_eq!("load".into_action_names(), vec!["load"]);
        assert_eq!("load, render  load".into_action_names(), vec!["load", "render"]);
        assert_eq!(vec!["load render", "", "write"].into_action_names(), vec!["load", "render", "write"]);
        assert_eq!(["a", "b", "a"].into_action_names(), vec!["a", "b"]);
        assert!(" , \t".into_action_names().is_empty());
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let mut registry: ActionRegistry<Site> = ActionRegistry::new();
        registry.register("load", load).unwrap();

        assert!(matches!(
            registry.register("load", render),
            Err(ActionError::Duplicate { name }) if name == "load"
        ));
        assert!(matches!(registry.register("", render), Err(ActionError::InvalidName { .. })));
        assert!(matches!(registry.register("two words", render), Err(ActionError::InvalidName { .. })));
        assert!(matches!(registry.register("a,b", render), Err(ActionError::InvalidName { .. })));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["load"]);
    }

    #[tokio::test]
    async fn test_empty_and_unknown_run_nothing() {
        let site = Site::default();
        let runner = runner(GroupPolicy::Sequential);

        let err = runner.action(&site, "  ", &ActionOptions::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::Empty));

        let err = runner
            .action(&site, "load, nope", &ActionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unknown { name } if name == "nope"));
        assert!(site.log().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_stops_at_first_failure() {
        let site = Site::default();
        let runner = runner(GroupPolicy::Sequential);

        let options = ActionOptions {
            paths: vec!["a.md".into()],
            ..Default::default()
        };
        let results = runner.action(&site, "load render", &options).await.unwrap();
        assert_eq!(
            results,
            vec![
                ActionResult { action: "load".into(), value: Value::from(1) },
                ActionResult { action: "render".into(), value: Value::from(1) },
            ]
        );

        let err = runner
            .action(&site, ["explode", "render"], &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Failed { ref action, .. } if action == "explode"));
        assert_eq!(site.log(), vec!["load", "render", "explode"]);
    }

    #[tokio::test]
    async fn test_parallel_runs_everything() {
        let site = Site::default();
        let runner = runner(GroupPolicy::Parallel);

        let err = runner
            .action(&site, "load explode render", &ActionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Failed { ref action, .. } if action == "explode"));

        let mut log = site.log();
        log.sort();
        assert_eq!(log, vec!["explode", "load", "render"]);
    }

    #[tokio::test]
    async fn test_queue_continues_after_failures() {
        let site = Site::default();
        let runner = runner(GroupPolicy::Sequential);
        let outcomes = RefCell::new(Vec::new());

        let mut queue = ActionQueue::new();
        queue
            .push("load", ActionOptions::default(), |result| {
                outcomes.borrow_mut().push(result.map(|r| r.len()).map_err(|e| e.to_string()));
            })
            .push("missing", ActionOptions::default(), |result| {
                outcomes.borrow_mut().push(result.map(|r| r.len()).map_err(|e| e.to_string()));
            })
            .push("render", ActionOptions::default(), |result| {
                outcomes.borrow_mut().push(result.map(|r| r.len()).map_err(|e| e.to_string()));
            });
        assert_eq!(queue.len(), 3);

        let failed = runner.run_queue(&site, queue).await;
        assert_eq!(failed, 1);
        assert_eq!(
            outcomes.into_inner(),
            vec![Ok(1), Err("unknown action 'missing'".to_string()), Ok(1)]
        );
        assert_eq!(site.log(), vec!["load", "render"]);
    }

    #[test]
    fn test_group_policy_names() {
        let policy: GroupPolicy = serde_json::from_str("\"parallel\"").unwrap();
        assert_eq!(policy, GroupPolicy::Parallel);
        assert_eq!(GroupPolicy::default(), GroupPolicy::Sequential);
    }
}
