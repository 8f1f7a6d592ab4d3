//! Task lifecycle
//!
//! Two ways to turn a dispatch into an awaitable outcome:
//!
//! - Commands sent through `baritone.execute` get a task id and the
//!   counterpart pushes `task.*` events for it; [`Session::wait_for_task`]
//!   follows those events to a terminal one.
//! - Typed dispatches have no task id. [`TypedTaskHandle::wait`] polls the
//!   pathing behavior until it goes idle again, with a startup grace period
//!   so a task that has not started yet is not mistaken for a finished one.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use tokio::time::Instant;
use uuid::Uuid;

use tether_protocol::EventEnvelope;
use tether_utils::{Result, TetherError};

use crate::config::ClientConfig;
use crate::connection::{invoke_handler, EventHandler, Session};
use crate::events::bounded;
use crate::typed::{GoalRef, PathingBehaviorRef};

impl Session {
    /// Wait for a terminal `task.*` event for `task_id`
    ///
    /// Events for other tasks, and events whose data is not an object, are
    /// skipped. Non-terminal events for this task go to `on_update`; an error
    /// from it aborts the wait.
    pub async fn wait_for_task(
        &self,
        task_id: &str,
        on_update: Option<&dyn EventHandler>,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope> {
        if task_id.is_empty() {
            return Err(TetherError::bad_response(
                "task_id must be a non-empty string",
                json!({ "task_id": task_id }),
            ));
        }

        bounded(timeout, || format!("task {}", task_id), async {
            loop {
                let event = self.next_event(None).await?;
                if event.task_id() != Some(task_id) {
                    continue;
                }
                if event.is_terminal() {
                    tracing::debug!(task_id, event = %event.event, "Task finished");
                    return Ok(event);
                }
                if let Some(handler) = on_update {
                    invoke_handler(handler, event).await?;
                }
            }
        })
        .await
    }
}

// ==================== Polling state machine ====================

/// What the poller should do after one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    Continue,
    /// Idle after the task ran, or idle past the startup grace
    Finished { started: bool },
}

/// Tracks whether a typed task has been seen running
#[derive(Debug, Clone)]
pub struct PollState {
    started: bool,
    startup_grace: Duration,
}

impl PollState {
    pub fn new(startup_grace: Duration) -> Self {
        Self {
            started: false,
            startup_grace,
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Feed one observation taken `elapsed` after the wait began
    pub fn observe(&mut self, busy: bool, elapsed: Duration) -> PollStep {
        if busy {
            self.started = true;
            PollStep::Continue
        } else if self.started || elapsed >= self.startup_grace {
            PollStep::Finished {
                started: self.started,
            }
        } else {
            PollStep::Continue
        }
    }
}

/// Pathing activity at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathingActivity {
    /// `isPathing()`
    pub pathing: bool,
    /// `getInProgress() != null`
    pub calculating: bool,
}

impl PathingActivity {
    pub fn busy(&self) -> bool {
        self.pathing || self.calculating
    }
}

/// Source of pathing state for the poller
pub trait PathingSource: Send + Sync {
    fn activity(&self) -> BoxFuture<'_, Result<PathingActivity>>;

    /// `hasPath()` and `getGoal()` once idle
    fn outcome(&self) -> BoxFuture<'_, Result<(bool, Option<GoalRef>)>>;
}

impl PathingSource for PathingBehaviorRef {
    fn activity(&self) -> BoxFuture<'_, Result<PathingActivity>> {
        async move {
            let pathing = self.is_pathing().await?;
            let calculating = self.in_progress().await?.is_some();
            Ok(PathingActivity {
                pathing,
                calculating,
            })
        }
        .boxed()
    }

    fn outcome(&self) -> BoxFuture<'_, Result<(bool, Option<GoalRef>)>> {
        async move {
            let has_path = self.has_path().await?;
            let goal = self.goal().await?;
            Ok((has_path, goal))
        }
        .boxed()
    }
}

/// Timing of a typed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Overall bound; `None` or zero waits indefinitely
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub startup_grace: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl WaitOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            timeout: None,
            poll_interval: config.poll_interval(),
            startup_grace: config.startup_grace(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_startup_grace(mut self, startup_grace: Duration) -> Self {
        self.startup_grace = startup_grace;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(TetherError::invalid_argument("poll_interval must be > 0"));
        }
        Ok(())
    }
}

/// Snapshot taken when a typed task is considered finished
#[derive(Debug, Clone)]
pub struct TypedTaskResult {
    pub handle_id: String,
    pub action: String,
    /// Whether the task was ever observed busy
    pub started: bool,
    pub pathing: bool,
    pub calculating: bool,
    pub has_path: bool,
    /// Goal the pathing behavior still holds, if any
    pub goal: Option<GoalRef>,
}

impl TypedTaskResult {
    pub fn busy(&self) -> bool {
        self.pathing || self.calculating
    }
}

/// Poll `source` until the pathing behavior is idle
pub async fn poll_until_idle(
    source: &dyn PathingSource,
    handle_id: &str,
    action: &str,
    options: &WaitOptions,
) -> Result<TypedTaskResult> {
    options.validate()?;

    let start = Instant::now();
    let timeout = options.timeout.filter(|t| !t.is_zero());
    let mut state = PollState::new(options.startup_grace);

    loop {
        if let Some(after) = timeout {
            if start.elapsed() >= after {
                return Err(TetherError::timeout(format!("typed task {}", action), after));
            }
        }

        let activity = source.activity().await?;
        match state.observe(activity.busy(), start.elapsed()) {
            PollStep::Finished { started } => {
                let (has_path, goal) = source.outcome().await?;
                tracing::debug!(handle = handle_id, action, started, has_path, "Typed task idle");
                return Ok(TypedTaskResult {
                    handle_id: handle_id.to_string(),
                    action: action.to_string(),
                    started,
                    pathing: false,
                    calculating: false,
                    has_path,
                    goal,
                });
            }
            PollStep::Continue => tokio::time::sleep(options.poll_interval).await,
        }
    }
}

/// Awaitable handle for a typed dispatch
#[derive(Debug, Clone)]
pub struct TypedTaskHandle {
    id: String,
    action: String,
    session: Session,
}

impl TypedTaskHandle {
    pub fn new(session: Session, action: impl Into<String>) -> Self {
        Self {
            id: format!("typed-{}", Uuid::new_v4().simple()),
            action: action.into(),
            session,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remote call that started the task (e.g. `IMineProcess.mineByName`)
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Wait with the session's configured poll interval and grace
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<TypedTaskResult> {
        let options = WaitOptions::from_config(self.session.config()).with_timeout(timeout);
        self.wait_with(options).await
    }

    pub async fn wait_with(&self, options: WaitOptions) -> Result<TypedTaskResult> {
        options.validate()?;
        let behavior = self.session.automation().pathing_behavior().await?;
        poll_until_idle(&behavior, &self.id, &self.action, &options).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::connection::{async_handler_fn, handler_fn};
    use crate::testing::{connect_pair, connect_pair_with, ok, serve, test_config};

    // ==================== State Machine Tests ====================

    #[test]
    fn test_poll_state_busy_then_idle() {
        let grace = Duration::from_secs(1);
        let mut state = PollState::new(grace);
        assert_eq!(state.observe(false, Duration::ZERO), PollStep::Continue);
        assert_eq!(state.observe(true, Duration::from_millis(100)), PollStep::Continue);
        assert!(state.started());
        assert_eq!(
            state.observe(false, Duration::from_millis(200)),
            PollStep::Finished { started: true }
        );
    }

    #[test]
    fn test_poll_state_never_started() {
        let mut state = PollState::new(Duration::from_secs(1));
        assert_eq!(state.observe(false, Duration::from_millis(999)), PollStep::Continue);
        assert_eq!(
            state.observe(false, Duration::from_secs(1)),
            PollStep::Finished { started: false }
        );
    }

    #[test]
    fn test_poll_state_busy_past_grace_keeps_polling() {
        let mut state = PollState::new(Duration::ZERO);
        assert_eq!(state.observe(true, Duration::from_secs(5)), PollStep::Continue);
    }

    #[test]
    fn test_wait_options_validation() {
        let options = WaitOptions::default().with_poll_interval(Duration::ZERO);
        assert!(matches!(
            options.validate().unwrap_err(),
            TetherError::InvalidArgument(_)
        ));
        assert_eq!(WaitOptions::default().poll_interval, Duration::from_millis(100));
        assert_eq!(WaitOptions::default().startup_grace, Duration::from_secs(1));
    }

    // ==================== Polling Driver Tests ====================

    struct ScriptedPathing {
        script: Mutex<VecDeque<bool>>,
        polls: AtomicUsize,
    }

    impl ScriptedPathing {
        fn new(script: &[bool]) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                polls: AtomicUsize::new(0),
            }
        }

        /// Replays the script, then repeats its last entry
        fn next_busy(&self) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop_front().unwrap_or(false)
            } else {
                script.front().copied().unwrap_or(false)
            }
        }
    }

    impl PathingSource for ScriptedPathing {
        fn activity(&self) -> BoxFuture<'_, Result<PathingActivity>> {
            let busy = self.next_busy();
            futures::future::ready(Ok(PathingActivity {
                pathing: busy,
                calculating: false,
            }))
            .boxed()
        }

        fn outcome(&self) -> BoxFuture<'_, Result<(bool, Option<GoalRef>)>> {
            futures::future::ready(Ok((true, None))).boxed()
        }
    }

    fn options() -> WaitOptions {
        WaitOptions::default()
            .with_poll_interval(Duration::from_millis(100))
            .with_startup_grace(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_finishes_after_task_runs() {
        let pathing = ScriptedPathing::new(&[false, true, true, false]);
        let result = poll_until_idle(&pathing, "typed-1", "ICustomGoalProcess.path", &options())
            .await
            .unwrap();

        assert!(result.started);
        assert!(!result.busy());
        assert!(result.has_path);
        assert!(result.goal.is_none());
        assert_eq!(pathing.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_finishes_after_grace_when_never_busy() {
        let pathing = ScriptedPathing::new(&[false]);
        let start = Instant::now();
        let result = poll_until_idle(&pathing, "typed-2", "IMineProcess.mineByName", &options())
            .await
            .unwrap();

        assert!(!result.started);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(pathing.polls.load(Ordering::SeqCst) >= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_deadline_is_timeout() {
        let pathing = ScriptedPathing::new(&[true]);
        let options = options().with_timeout(Some(Duration::from_millis(500)));
        let err = poll_until_idle(&pathing, "typed-3", "IExploreProcess.explore", &options)
            .await
            .unwrap_err();

        match err {
            TetherError::Timeout { operation, after } => {
                assert!(operation.contains("IExploreProcess.explore"));
                assert_eq!(after, Duration::from_millis(500));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_rejects_zero_interval() {
        let pathing = ScriptedPathing::new(&[false]);
        let options = options().with_poll_interval(Duration::ZERO);
        let err = poll_until_idle(&pathing, "typed-4", "x", &options).await.unwrap_err();
        assert!(matches!(err, TetherError::InvalidArgument(_)));
        assert_eq!(pathing.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_typed_handle_wait_against_counterpart() {
        let mut config = test_config();
        config.poll_interval_ms = 10;
        config.startup_grace_ms = 200;
        let (session, peer) = connect_pair_with(config).await;

        let pathing_polls = Arc::new(AtomicUsize::new(0));
        let polls = pathing_polls.clone();
        let _server = serve(peer, move |request| {
            let value = match request.params["method"].as_str().unwrap_or_default() {
                "getPathingBehavior" => json!({"$pyritone_ref": "ref-pb"}),
                "isPathing" => json!(polls.fetch_add(1, Ordering::SeqCst) < 2),
                "getInProgress" => json!(null),
                "hasPath" => json!(false),
                "getGoal" => json!({"$pyritone_ref": "ref-goal", "java_type": "baritone.api.pathing.goals.GoalBlock"}),
                _ => json!(null),
            };
            vec![ok(request, json!({ "value": value }))]
        });

        let handle = TypedTaskHandle::new(session.clone(), "ICustomGoalProcess.path");
        let result = handle.wait(Some(Duration::from_secs(5))).await.unwrap();

        assert!(result.started);
        assert_eq!(result.handle_id, handle.id());
        assert_eq!(result.action, "ICustomGoalProcess.path");
        assert!(!result.has_path);
        let goal = result.goal.as_ref().unwrap();
        assert_eq!(goal.remote_ref().id(), "ref-goal");
        assert_eq!(goal.session().session_id(), session.session_id());
        assert_eq!(pathing_polls.load(Ordering::SeqCst), 3);
    }

    // ==================== Event Wait Tests ====================

    #[tokio::test]
    async fn test_wait_for_task_follows_events() {
        let (session, mut peer) = connect_pair().await;
        peer.push("task.started", json!({"task_id": "t1"})).await;
        peer.push("task.progress", json!({"task_id": "t2"})).await;
        peer.push("minecraft.chat_message", json!("not an object")).await;
        peer.push("task.progress", json!({"task_id": "t1", "detail": "half"})).await;
        peer.push("task.failed", json!({"task_id": "t1", "error": "stuck"})).await;

        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();
        let handler = handler_fn(move |event| {
            sink.lock().push(event.event.clone());
            Ok(())
        });

        let terminal = session
            .wait_for_task("t1", Some(handler.as_ref()), Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(terminal.event, "task.failed");
        assert_eq!(*updates.lock(), vec!["task.started", "task.progress"]);
    }

    #[tokio::test]
    async fn test_wait_for_task_update_error_propagates() {
        let (session, mut peer) = connect_pair().await;
        peer.push("task.progress", json!({"task_id": "t1"})).await;

        let handler = async_handler_fn(|_event| async { Err(TetherError::internal("update rejected")) });
        let err = session
            .wait_for_task("t1", Some(handler.as_ref()), Some(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, TetherError::Internal(_)));
    }

    #[tokio::test]
    async fn test_wait_for_task_empty_id() {
        let (session, _peer) = connect_pair().await;
        let err = session.wait_for_task("", None, None).await.unwrap_err();
        assert_eq!(err.code(), Some(tether_utils::BAD_RESPONSE));
    }

    #[tokio::test]
    async fn test_wait_for_task_timeout() {
        let (session, mut peer) = connect_pair().await;
        peer.push("task.progress", json!({"task_id": "t1"})).await;

        let err = session
            .wait_for_task("t1", None, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_for_task_connection_closed() {
        let (session, peer) = connect_pair().await;
        drop(peer);

        let err = session
            .wait_for_task("t1", None, Some(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(err.is_closed());
    }
}
