//! Goal constructors

use tether_protocol::RemoteValue;
use tether_utils::{Result, TetherError};

use super::automation::{types, Automation};
use super::proxies::GoalRef;

const GOAL_AXIS: &str = "baritone.api.pathing.goals.GoalAxis";
const GOAL_BLOCK: &str = "baritone.api.pathing.goals.GoalBlock";
const GOAL_XZ: &str = "baritone.api.pathing.goals.GoalXZ";
const GOAL_Y_LEVEL: &str = "baritone.api.pathing.goals.GoalYLevel";
const GOAL_NEAR: &str = "baritone.api.pathing.goals.GoalNear";
const GOAL_COMPOSITE: &str = "baritone.api.pathing.goals.GoalComposite";
const GOAL_INVERTED: &str = "baritone.api.pathing.goals.GoalInverted";
const GOAL_RUN_AWAY: &str = "baritone.api.pathing.goals.GoalRunAway";

/// Builds goal objects inside the counterpart
#[derive(Debug, Clone)]
pub struct GoalFactory {
    automation: Automation,
}

impl GoalFactory {
    pub fn new(automation: Automation) -> Self {
        Self { automation }
    }

    async fn construct(
        &self,
        type_name: &str,
        args: Vec<RemoteValue>,
        parameter_types: &[&str],
        context: &str,
    ) -> Result<GoalRef> {
        let reference = self
            .automation
            .construct_ref(type_name, args, parameter_types, context)
            .await?;
        Ok(GoalRef::new(self.automation.session().clone(), reference))
    }

    pub async fn axis(&self) -> Result<GoalRef> {
        self.construct(GOAL_AXIS, Vec::new(), &[], "GoalAxis").await
    }

    pub async fn block(&self, x: i32, y: i32, z: i32) -> Result<GoalRef> {
        self.construct(
            GOAL_BLOCK,
            vec![x.into(), y.into(), z.into()],
            &["int", "int", "int"],
            "GoalBlock",
        )
        .await
    }

    pub async fn xz(&self, x: i32, z: i32) -> Result<GoalRef> {
        self.construct(GOAL_XZ, vec![x.into(), z.into()], &["int", "int"], "GoalXZ")
            .await
    }

    pub async fn y_level(&self, y: i32) -> Result<GoalRef> {
        self.construct(GOAL_Y_LEVEL, vec![y.into()], &["int"], "GoalYLevel")
            .await
    }

    /// Within `range` blocks of a position
    pub async fn near(&self, x: i32, y: i32, z: i32, range: i32) -> Result<GoalRef> {
        let position = self.automation.block_pos(x, y, z).await?;
        self.construct(
            GOAL_NEAR,
            vec![position.into(), range.into()],
            &[types::BLOCK_POS, "int"],
            "GoalNear",
        )
        .await
    }

    /// Satisfied when any of `goals` is
    pub async fn composite(&self, goals: &[GoalRef]) -> Result<GoalRef> {
        if goals.is_empty() {
            return Err(TetherError::invalid_argument(
                "composite requires at least one goal",
            ));
        }
        let goals: Vec<RemoteValue> = goals.iter().map(RemoteValue::from).collect();
        self.construct(
            GOAL_COMPOSITE,
            vec![RemoteValue::Array(goals)],
            &[types::GOAL_ARRAY],
            "GoalComposite",
        )
        .await
    }

    pub async fn inverted(&self, goal: &GoalRef) -> Result<GoalRef> {
        self.construct(
            GOAL_INVERTED,
            vec![goal.into()],
            &[types::GOAL],
            "GoalInverted",
        )
        .await
    }

    /// Get at least `distance` away from every position
    pub async fn run_away(
        &self,
        distance: f64,
        positions: &[(i32, i32, i32)],
        maintain_y: Option<i32>,
    ) -> Result<GoalRef> {
        if positions.is_empty() {
            return Err(TetherError::invalid_argument(
                "run_away requires at least one position",
            ));
        }

        let mut references = Vec::with_capacity(positions.len());
        for &(x, y, z) in positions {
            references.push(RemoteValue::from(self.automation.block_pos(x, y, z).await?));
        }
        let positions = RemoteValue::Array(references);

        match maintain_y {
            None => {
                self.construct(
                    GOAL_RUN_AWAY,
                    vec![distance.into(), positions],
                    &["double", types::BLOCK_POS_ARRAY],
                    "GoalRunAway(distance,positions)",
                )
                .await
            }
            Some(y) => {
                self.construct(
                    GOAL_RUN_AWAY,
                    vec![distance.into(), y.into(), positions],
                    &["double", "java.lang.Integer", types::BLOCK_POS_ARRAY],
                    "GoalRunAway(distance,maintainY,positions)",
                )
                .await
            }
        }
    }
}
