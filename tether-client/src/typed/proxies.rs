//! Client-side proxies for remote objects
//!
//! Each proxy is a session plus a handle; methods forward to `api.invoke`
//! with explicit parameter types and check the shape of what comes back.

use std::path::Path;
use std::time::Duration;

use tether_protocol::{RemoteRef, RemoteValue};
use tether_utils::{Result, TetherError};

use super::automation::{types, Automation, BlockSpec};
use super::{
    optional_remote_ref, require_bool, require_f64, require_i64, require_remote_ref,
    require_string,
};
use crate::connection::Session;
use crate::tasks::{TypedTaskHandle, TypedTaskResult};

macro_rules! remote_proxy {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            session: Session,
            reference: RemoteRef,
        }

        impl $name {
            pub fn new(session: Session, reference: RemoteRef) -> Self {
                Self { session, reference }
            }

            pub fn remote_ref(&self) -> &RemoteRef {
                &self.reference
            }

            pub fn session(&self) -> &Session {
                &self.session
            }

            async fn invoke(
                &self,
                method: &str,
                args: Vec<RemoteValue>,
                parameter_types: &[&str],
            ) -> Result<RemoteValue> {
                self.session
                    .api_invoke(&self.reference, method, args, Some(parameter_types))
                    .await
            }
        }

        impl From<$name> for RemoteValue {
            fn from(proxy: $name) -> Self {
                RemoteValue::Ref(proxy.reference)
            }
        }

        impl From<&$name> for RemoteValue {
            fn from(proxy: &$name) -> Self {
                RemoteValue::Ref(proxy.reference.clone())
            }
        }
    };
}

/// Methods shared by every `IBaritoneProcess`
macro_rules! process_methods {
    ($interface:literal) => {
        pub async fn is_active(&self) -> Result<bool> {
            let value = self.invoke("isActive", Vec::new(), &[]).await?;
            require_bool(value, concat!($interface, ".isActive"))
        }

        pub async fn is_temporary(&self) -> Result<bool> {
            let value = self.invoke("isTemporary", Vec::new(), &[]).await?;
            require_bool(value, concat!($interface, ".isTemporary"))
        }

        pub async fn priority(&self) -> Result<f64> {
            let value = self.invoke("priority", Vec::new(), &[]).await?;
            require_f64(value, concat!($interface, ".priority"))
        }

        pub async fn display_name(&self) -> Result<String> {
            let value = self.invoke("displayName", Vec::new(), &[]).await?;
            require_string(value, "IBaritoneProcess.displayName")
        }

        fn task_handle(&self, action: &str) -> TypedTaskHandle {
            TypedTaskHandle::new(self.session.clone(), action)
        }
    };
}

// ==================== Goals and paths ====================

remote_proxy!(
    /// `baritone.api.pathing.goals.Goal`
    GoalRef
);

impl GoalRef {
    pub async fn is_in_goal(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        let value = self
            .invoke("isInGoal", vec![x.into(), y.into(), z.into()], &["int", "int", "int"])
            .await?;
        require_bool(value, "Goal.isInGoal")
    }

    pub async fn heuristic(&self, x: i32, y: i32, z: i32) -> Result<f64> {
        let value = self
            .invoke("heuristic", vec![x.into(), y.into(), z.into()], &["int", "int", "int"])
            .await?;
        require_f64(value, "Goal.heuristic")
    }

    /// Heuristic from the player's current position
    pub async fn heuristic_current(&self) -> Result<f64> {
        let value = self.invoke("heuristic", Vec::new(), &[]).await?;
        require_f64(value, "Goal.heuristic")
    }
}

remote_proxy!(
    /// `baritone.api.pathing.calc.IPath`
    PathRef
);

impl PathRef {
    pub async fn length(&self) -> Result<i64> {
        let value = self.invoke("length", Vec::new(), &[]).await?;
        require_i64(value, "IPath.length")
    }

    pub async fn goal(&self) -> Result<GoalRef> {
        let value = self.invoke("getGoal", Vec::new(), &[]).await?;
        let reference = require_remote_ref(value, "IPath.getGoal", Some(types::GOAL))?;
        Ok(GoalRef::new(self.session.clone(), reference))
    }

    pub async fn num_nodes_considered(&self) -> Result<i64> {
        let value = self.invoke("getNumNodesConsidered", Vec::new(), &[]).await?;
        require_i64(value, "IPath.getNumNodesConsidered")
    }
}

remote_proxy!(
    /// `baritone.api.utils.PathCalculationResult`
    PathCalculationResultRef
);

impl PathCalculationResultRef {
    /// Result type enum name (`SUCCESS_TO_GOAL`, `FAILURE`, ...)
    pub async fn result_type(&self) -> Result<String> {
        let value = self.invoke("getType", Vec::new(), &[]).await?;
        match value {
            RemoteValue::String(name) => Ok(name),
            other => Err(TetherError::bad_response(
                "Expected enum string from PathCalculationResult.getType",
                serde_json::json!({ "value": other.encode() }),
            )),
        }
    }

    pub async fn path(&self) -> Result<Option<PathRef>> {
        let value = self.invoke("getPath", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(value, "PathCalculationResult.getPath", None)?;
        Ok(reference.map(|reference| PathRef::new(self.session.clone(), reference)))
    }
}

remote_proxy!(
    /// `baritone.api.pathing.calc.IPathFinder`
    PathFinderRef
);

impl PathFinderRef {
    pub async fn goal(&self) -> Result<GoalRef> {
        let value = self.invoke("getGoal", Vec::new(), &[]).await?;
        let reference = require_remote_ref(value, "IPathFinder.getGoal", Some(types::GOAL))?;
        Ok(GoalRef::new(self.session.clone(), reference))
    }

    /// Run the search with primary and failure timeouts in milliseconds
    pub async fn calculate(
        &self,
        primary_timeout_ms: i64,
        failure_timeout_ms: i64,
    ) -> Result<PathCalculationResultRef> {
        let value = self
            .invoke(
                "calculate",
                vec![primary_timeout_ms.into(), failure_timeout_ms.into()],
                &["long", "long"],
            )
            .await?;
        let reference = require_remote_ref(
            value,
            "IPathFinder.calculate",
            Some(types::PATH_CALCULATION_RESULT),
        )?;
        Ok(PathCalculationResultRef::new(self.session.clone(), reference))
    }

    pub async fn is_finished(&self) -> Result<bool> {
        let value = self.invoke("isFinished", Vec::new(), &[]).await?;
        require_bool(value, "IPathFinder.isFinished")
    }

    pub async fn best_path_so_far(&self) -> Result<Option<PathRef>> {
        let value = self.invoke("bestPathSoFar", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(value, "IPathFinder.bestPathSoFar", None)?;
        Ok(reference.map(|reference| PathRef::new(self.session.clone(), reference)))
    }
}

remote_proxy!(
    /// `baritone.api.pathing.path.IPathExecutor`
    PathExecutorRef
);

impl PathExecutorRef {
    pub async fn path(&self) -> Result<PathRef> {
        let value = self.invoke("getPath", Vec::new(), &[]).await?;
        let reference = require_remote_ref(value, "IPathExecutor.getPath", None)?;
        Ok(PathRef::new(self.session.clone(), reference))
    }

    pub async fn position(&self) -> Result<i64> {
        let value = self.invoke("getPosition", Vec::new(), &[]).await?;
        require_i64(value, "IPathExecutor.getPosition")
    }
}

remote_proxy!(
    /// `baritone.api.behavior.IPathingBehavior`
    PathingBehaviorRef
);

impl PathingBehaviorRef {
    pub async fn is_pathing(&self) -> Result<bool> {
        let value = self.invoke("isPathing", Vec::new(), &[]).await?;
        require_bool(value, "IPathingBehavior.isPathing")
    }

    pub async fn has_path(&self) -> Result<bool> {
        let value = self.invoke("hasPath", Vec::new(), &[]).await?;
        require_bool(value, "IPathingBehavior.hasPath")
    }

    pub async fn cancel_everything(&self) -> Result<bool> {
        let value = self.invoke("cancelEverything", Vec::new(), &[]).await?;
        require_bool(value, "IPathingBehavior.cancelEverything")
    }

    pub async fn force_cancel(&self) -> Result<()> {
        self.invoke("forceCancel", Vec::new(), &[]).await?;
        Ok(())
    }

    pub async fn goal(&self) -> Result<Option<GoalRef>> {
        let value = self.invoke("getGoal", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(value, "IPathingBehavior.getGoal", Some(types::GOAL))?;
        Ok(reference.map(|reference| GoalRef::new(self.session.clone(), reference)))
    }

    pub async fn path(&self) -> Result<Option<PathRef>> {
        let value = self.invoke("getPath", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(value, "IPathingBehavior.getPath", None)?;
        Ok(reference.map(|reference| PathRef::new(self.session.clone(), reference)))
    }

    /// Search currently running, if any
    pub async fn in_progress(&self) -> Result<Option<PathFinderRef>> {
        let value = self.invoke("getInProgress", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(value, "IPathingBehavior.getInProgress", None)?;
        Ok(reference.map(|reference| PathFinderRef::new(self.session.clone(), reference)))
    }

    pub async fn current(&self) -> Result<Option<PathExecutorRef>> {
        let value = self.invoke("getCurrent", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(value, "IPathingBehavior.getCurrent", None)?;
        Ok(reference.map(|reference| PathExecutorRef::new(self.session.clone(), reference)))
    }

    pub async fn next(&self) -> Result<Option<PathExecutorRef>> {
        let value = self.invoke("getNext", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(value, "IPathingBehavior.getNext", None)?;
        Ok(reference.map(|reference| PathExecutorRef::new(self.session.clone(), reference)))
    }
}

// ==================== Processes ====================

remote_proxy!(
    /// `baritone.api.process.ICustomGoalProcess`
    CustomGoalProcessRef
);

impl CustomGoalProcessRef {
    process_methods!("ICustomGoalProcess");

    pub async fn set_goal(&self, goal: &GoalRef) -> Result<()> {
        self.invoke("setGoal", vec![goal.into()], &[types::GOAL]).await?;
        Ok(())
    }

    pub async fn goal(&self) -> Result<Option<GoalRef>> {
        let value = self.invoke("getGoal", Vec::new(), &[]).await?;
        let reference =
            optional_remote_ref(value, "ICustomGoalProcess.getGoal", Some(types::GOAL))?;
        Ok(reference.map(|reference| GoalRef::new(self.session.clone(), reference)))
    }

    /// Start pathing to the current goal
    pub async fn path_dispatch(&self) -> Result<TypedTaskHandle> {
        self.invoke("path", Vec::new(), &[]).await?;
        Ok(self.task_handle("ICustomGoalProcess.path"))
    }

    pub async fn path(&self, timeout: Option<Duration>) -> Result<TypedTaskResult> {
        self.path_dispatch().await?.wait(timeout).await
    }

    pub async fn set_goal_and_path_dispatch(&self, goal: &GoalRef) -> Result<TypedTaskHandle> {
        self.invoke("setGoalAndPath", vec![goal.into()], &[types::GOAL])
            .await?;
        Ok(self.task_handle("ICustomGoalProcess.setGoalAndPath"))
    }

    pub async fn set_goal_and_path(
        &self,
        goal: &GoalRef,
        timeout: Option<Duration>,
    ) -> Result<TypedTaskResult> {
        self.set_goal_and_path_dispatch(goal).await?.wait(timeout).await
    }
}

remote_proxy!(
    /// `baritone.api.process.IGetToBlockProcess`
    GetToBlockProcessRef
);

impl GetToBlockProcessRef {
    process_methods!("IGetToBlockProcess");

    pub async fn get_to_block_dispatch(&self, block: impl Into<BlockSpec>) -> Result<TypedTaskHandle> {
        let block = Automation::new(self.session.clone())
            .block_spec(block.into())
            .await?;
        self.invoke("getToBlock", vec![block.into()], &[types::BLOCK_OPTIONAL_META])
            .await?;
        Ok(self.task_handle("IGetToBlockProcess.getToBlock"))
    }

    pub async fn get_to_block(
        &self,
        block: impl Into<BlockSpec>,
        timeout: Option<Duration>,
    ) -> Result<TypedTaskResult> {
        self.get_to_block_dispatch(block).await?.wait(timeout).await
    }
}

remote_proxy!(
    /// `baritone.api.process.IMineProcess`
    MineProcessRef
);

impl MineProcessRef {
    process_methods!("IMineProcess");

    /// Mine blocks by id; a `quantity` of 0 or less means unlimited
    pub async fn mine_by_name_dispatch(
        &self,
        quantity: i32,
        block_names: &[&str],
    ) -> Result<TypedTaskHandle> {
        if block_names.is_empty() {
            return Err(TetherError::invalid_argument(
                "mine_by_name requires at least one block name",
            ));
        }
        let names: Vec<RemoteValue> = block_names.iter().map(|name| RemoteValue::from(*name)).collect();
        self.invoke(
            "mineByName",
            vec![quantity.into(), RemoteValue::Array(names)],
            &["int", types::STRING_ARRAY],
        )
        .await?;
        Ok(self.task_handle("IMineProcess.mineByName"))
    }

    pub async fn mine_by_name(
        &self,
        quantity: i32,
        block_names: &[&str],
        timeout: Option<Duration>,
    ) -> Result<TypedTaskResult> {
        self.mine_by_name_dispatch(quantity, block_names)
            .await?
            .wait(timeout)
            .await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.invoke("cancel", Vec::new(), &[]).await?;
        Ok(())
    }
}

remote_proxy!(
    /// `baritone.api.process.IExploreProcess`
    ExploreProcessRef
);

impl ExploreProcessRef {
    process_methods!("IExploreProcess");

    pub async fn explore_dispatch(&self, x: i32, z: i32) -> Result<TypedTaskHandle> {
        self.invoke("explore", vec![x.into(), z.into()], &["int", "int"])
            .await?;
        Ok(self.task_handle("IExploreProcess.explore"))
    }

    pub async fn explore(&self, x: i32, z: i32, timeout: Option<Duration>) -> Result<TypedTaskResult> {
        self.explore_dispatch(x, z).await?.wait(timeout).await
    }

    /// Restrict exploration with a JSON chunk filter on the counterpart's disk
    pub async fn apply_json_filter(&self, path: &Path, invert: bool) -> Result<()> {
        let path = Automation::new(self.session.clone()).java_path(path).await?;
        self.invoke(
            "applyJsonFilter",
            vec![path.into(), invert.into()],
            &[types::JAVA_PATH, "boolean"],
        )
        .await?;
        Ok(())
    }
}

remote_proxy!(
    /// `baritone.api.process.IBuilderProcess`
    BuilderProcessRef
);

impl BuilderProcessRef {
    process_methods!("IBuilderProcess");

    pub async fn build_open_schematic_dispatch(&self) -> Result<TypedTaskHandle> {
        self.invoke("buildOpenSchematic", Vec::new(), &[]).await?;
        Ok(self.task_handle("IBuilderProcess.buildOpenSchematic"))
    }

    pub async fn build_open_schematic(&self, timeout: Option<Duration>) -> Result<TypedTaskResult> {
        self.build_open_schematic_dispatch().await?.wait(timeout).await
    }

    pub async fn build_open_litematic_dispatch(&self, index: i32) -> Result<TypedTaskHandle> {
        self.invoke("buildOpenLitematic", vec![index.into()], &["int"])
            .await?;
        Ok(self.task_handle("IBuilderProcess.buildOpenLitematic"))
    }

    pub async fn build_open_litematic(
        &self,
        index: i32,
        timeout: Option<Duration>,
    ) -> Result<TypedTaskResult> {
        self.build_open_litematic_dispatch(index)
            .await?
            .wait(timeout)
            .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.invoke("pause", Vec::new(), &[]).await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.invoke("resume", Vec::new(), &[]).await?;
        Ok(())
    }

    pub async fn is_paused(&self) -> Result<bool> {
        let value = self.invoke("isPaused", Vec::new(), &[]).await?;
        require_bool(value, "IBuilderProcess.isPaused")
    }
}

remote_proxy!(
    /// `baritone.api.process.IFollowProcess`
    FollowProcessRef
);

impl FollowProcessRef {
    process_methods!("IFollowProcess");

    /// Follow entities accepted by a remote predicate
    pub async fn follow_dispatch(&self, entity_filter: &RemoteRef) -> Result<TypedTaskHandle> {
        self.invoke("follow", vec![entity_filter.into()], &[types::PREDICATE])
            .await?;
        Ok(self.task_handle("IFollowProcess.follow"))
    }

    pub async fn follow(
        &self,
        entity_filter: &RemoteRef,
        timeout: Option<Duration>,
    ) -> Result<TypedTaskResult> {
        self.follow_dispatch(entity_filter).await?.wait(timeout).await
    }

    /// Pick up items accepted by a remote predicate
    pub async fn pickup_dispatch(&self, item_filter: &RemoteRef) -> Result<TypedTaskHandle> {
        self.invoke("pickup", vec![item_filter.into()], &[types::PREDICATE])
            .await?;
        Ok(self.task_handle("IFollowProcess.pickup"))
    }

    pub async fn pickup(
        &self,
        item_filter: &RemoteRef,
        timeout: Option<Duration>,
    ) -> Result<TypedTaskResult> {
        self.pickup_dispatch(item_filter).await?.wait(timeout).await
    }

    pub async fn current_filter(&self) -> Result<Option<RemoteRef>> {
        let value = self.invoke("currentFilter", Vec::new(), &[]).await?;
        optional_remote_ref(value, "IFollowProcess.currentFilter", None)
    }

    pub async fn cancel(&self) -> Result<()> {
        self.invoke("cancel", Vec::new(), &[]).await?;
        Ok(())
    }
}
