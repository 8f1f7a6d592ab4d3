//! Root namespace of the automation engine

use std::path::Path;

use serde_json::{Map, Value};

use tether_protocol::{InvokeTarget, RemoteRef, RemoteValue};
use tether_utils::{Result, TetherError};

use super::goals::GoalFactory;
use super::proxies::{
    BuilderProcessRef, CustomGoalProcessRef, ExploreProcessRef, FollowProcessRef,
    GetToBlockProcessRef, MineProcessRef, PathingBehaviorRef,
};
use super::require_remote_ref;
use super::world::{PlayerContextRef, SelectionManagerRef, WorldProviderRef};
use crate::connection::Session;

/// Name of the root object exposed by the counterpart
pub const ROOT: &str = "baritone";

/// Remote type names used by the typed proxies
pub mod types {
    pub const PROVIDER: &str = "baritone.api.IBaritoneProvider";
    pub const API: &str = "baritone.api.BaritoneAPI";
    pub const GOAL: &str = "baritone.api.pathing.goals.Goal";
    pub const GOAL_ARRAY: &str = "baritone.api.pathing.goals.Goal[]";
    pub const PATHING_BEHAVIOR: &str = "baritone.api.behavior.IPathingBehavior";
    pub const PATH_CALCULATION_RESULT: &str = "baritone.api.utils.PathCalculationResult";
    pub const CUSTOM_GOAL_PROCESS: &str = "baritone.api.process.ICustomGoalProcess";
    pub const GET_TO_BLOCK_PROCESS: &str = "baritone.api.process.IGetToBlockProcess";
    pub const MINE_PROCESS: &str = "baritone.api.process.IMineProcess";
    pub const EXPLORE_PROCESS: &str = "baritone.api.process.IExploreProcess";
    pub const BUILDER_PROCESS: &str = "baritone.api.process.IBuilderProcess";
    pub const FOLLOW_PROCESS: &str = "baritone.api.process.IFollowProcess";
    pub const BLOCK_POS: &str = "net.minecraft.class_2338";
    pub const BLOCK_POS_ARRAY: &str = "net.minecraft.class_2338[]";
    pub const BETTER_BLOCK_POS: &str = "baritone.api.utils.BetterBlockPos";
    pub const BLOCK_OPTIONAL_META: &str = "baritone.api.utils.BlockOptionalMeta";
    pub const WORLD_PROVIDER: &str = "baritone.api.cache.IWorldProvider";
    pub const WORLD_DATA: &str = "baritone.api.cache.IWorldData";
    pub const CACHED_WORLD: &str = "baritone.api.cache.ICachedWorld";
    pub const WAYPOINT_COLLECTION: &str = "baritone.api.cache.IWaypointCollection";
    pub const WAYPOINT: &str = "baritone.api.cache.IWaypoint";
    pub const WAYPOINT_TAG: &str = "baritone.api.cache.IWaypoint$Tag";
    pub const SELECTION_MANAGER: &str = "baritone.api.selection.ISelectionManager";
    pub const SELECTION: &str = "baritone.api.selection.ISelection";
    pub const PLAYER_CONTEXT: &str = "baritone.api.utils.IPlayerContext";
    pub const DIRECTION: &str = "net.minecraft.class_2350";
    pub const JAVA_PATH: &str = "java.nio.file.Path";
    pub const PREDICATE: &str = "java.util.function.Predicate";
    pub const STRING: &str = "java.lang.String";
    pub const STRING_ARRAY: &str = "java.lang.String[]";
}

/// A block given either by id or as an existing `BlockOptionalMeta` handle
#[derive(Debug, Clone, PartialEq)]
pub enum BlockSpec {
    Name(String),
    Ref(RemoteRef),
}

impl From<&str> for BlockSpec {
    fn from(name: &str) -> Self {
        BlockSpec::Name(name.to_string())
    }
}

impl From<String> for BlockSpec {
    fn from(name: String) -> Self {
        BlockSpec::Name(name)
    }
}

impl From<RemoteRef> for BlockSpec {
    fn from(reference: RemoteRef) -> Self {
        BlockSpec::Ref(reference)
    }
}

/// Entry point for typed calls against the `baritone` root
#[derive(Debug, Clone)]
pub struct Automation {
    session: Session,
}

impl Automation {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Goal constructors
    pub fn goals(&self) -> GoalFactory {
        GoalFactory::new(self.clone())
    }

    pub async fn metadata(&self) -> Result<Map<String, Value>> {
        self.session
            .api_metadata(Some(&InvokeTarget::root(ROOT)))
            .await
    }

    async fn invoke_root_ref(&self, method: &str, expected_type: &str) -> Result<RemoteRef> {
        let value = self
            .session
            .api_invoke(InvokeTarget::root(ROOT), method, Vec::new(), Some(&[]))
            .await?;
        require_remote_ref(value, &format!("IBaritone.{}", method), Some(expected_type))
    }

    /// Construct `type_name` and require a handle back
    pub(crate) async fn construct_ref(
        &self,
        type_name: &str,
        args: Vec<RemoteValue>,
        parameter_types: &[&str],
        context: &str,
    ) -> Result<RemoteRef> {
        let value = self
            .session
            .api_construct(type_name, args, Some(parameter_types))
            .await?;
        require_remote_ref(value, context, Some(type_name))
    }

    async fn invoke_type(
        &self,
        type_name: &str,
        method: &str,
        args: Vec<RemoteValue>,
        parameter_types: &[&str],
    ) -> Result<RemoteValue> {
        self.session
            .api_invoke(
                InvokeTarget::type_name(type_name),
                method,
                args,
                Some(parameter_types),
            )
            .await
    }

    // ==================== Behaviors and processes ====================

    pub async fn pathing_behavior(&self) -> Result<PathingBehaviorRef> {
        let reference = self
            .invoke_root_ref("getPathingBehavior", types::PATHING_BEHAVIOR)
            .await?;
        Ok(PathingBehaviorRef::new(self.session.clone(), reference))
    }

    pub async fn custom_goal_process(&self) -> Result<CustomGoalProcessRef> {
        let reference = self
            .invoke_root_ref("getCustomGoalProcess", types::CUSTOM_GOAL_PROCESS)
            .await?;
        Ok(CustomGoalProcessRef::new(self.session.clone(), reference))
    }

    pub async fn get_to_block_process(&self) -> Result<GetToBlockProcessRef> {
        let reference = self
            .invoke_root_ref("getGetToBlockProcess", types::GET_TO_BLOCK_PROCESS)
            .await?;
        Ok(GetToBlockProcessRef::new(self.session.clone(), reference))
    }

    pub async fn mine_process(&self) -> Result<MineProcessRef> {
        let reference = self
            .invoke_root_ref("getMineProcess", types::MINE_PROCESS)
            .await?;
        Ok(MineProcessRef::new(self.session.clone(), reference))
    }

    pub async fn explore_process(&self) -> Result<ExploreProcessRef> {
        let reference = self
            .invoke_root_ref("getExploreProcess", types::EXPLORE_PROCESS)
            .await?;
        Ok(ExploreProcessRef::new(self.session.clone(), reference))
    }

    pub async fn builder_process(&self) -> Result<BuilderProcessRef> {
        let reference = self
            .invoke_root_ref("getBuilderProcess", types::BUILDER_PROCESS)
            .await?;
        Ok(BuilderProcessRef::new(self.session.clone(), reference))
    }

    pub async fn follow_process(&self) -> Result<FollowProcessRef> {
        let reference = self
            .invoke_root_ref("getFollowProcess", types::FOLLOW_PROCESS)
            .await?;
        Ok(FollowProcessRef::new(self.session.clone(), reference))
    }

    // ==================== World and player ====================

    pub async fn world_provider(&self) -> Result<WorldProviderRef> {
        let reference = self
            .invoke_root_ref("getWorldProvider", types::WORLD_PROVIDER)
            .await?;
        Ok(WorldProviderRef::new(self.session.clone(), reference))
    }

    pub async fn selection_manager(&self) -> Result<SelectionManagerRef> {
        let reference = self
            .invoke_root_ref("getSelectionManager", types::SELECTION_MANAGER)
            .await?;
        Ok(SelectionManagerRef::new(self.session.clone(), reference))
    }

    pub async fn player_context(&self) -> Result<PlayerContextRef> {
        let reference = self
            .invoke_root_ref("getPlayerContext", types::PLAYER_CONTEXT)
            .await?;
        Ok(PlayerContextRef::new(self.session.clone(), reference))
    }

    /// `BaritoneAPI.getProvider()`
    pub async fn provider(&self) -> Result<RemoteRef> {
        let value = self
            .invoke_type(types::API, "getProvider", Vec::new(), &[])
            .await?;
        require_remote_ref(value, "BaritoneAPI.getProvider", Some(types::PROVIDER))
    }

    pub async fn open_click(&self) -> Result<()> {
        self.session
            .api_invoke(InvokeTarget::root(ROOT), "openClick", Vec::new(), Some(&[]))
            .await?;
        Ok(())
    }

    // ==================== Value constructors ====================

    pub async fn block_pos(&self, x: i32, y: i32, z: i32) -> Result<RemoteRef> {
        self.construct_ref(
            types::BLOCK_POS,
            vec![x.into(), y.into(), z.into()],
            &["int", "int", "int"],
            types::BLOCK_POS,
        )
        .await
    }

    pub async fn better_block_pos(&self, x: i32, y: i32, z: i32) -> Result<RemoteRef> {
        self.construct_ref(
            types::BETTER_BLOCK_POS,
            vec![x.into(), y.into(), z.into()],
            &["int", "int", "int"],
            types::BETTER_BLOCK_POS,
        )
        .await
    }

    pub async fn block_optional_meta(&self, block: &str) -> Result<RemoteRef> {
        let block = block.trim();
        if block.is_empty() {
            return Err(TetherError::invalid_argument("block id must not be empty"));
        }
        self.construct_ref(
            types::BLOCK_OPTIONAL_META,
            vec![block.into()],
            &[types::STRING],
            types::BLOCK_OPTIONAL_META,
        )
        .await
    }

    /// Java enum constant `type_name.valueOf(NAME)`, name upper-cased
    async fn enum_ref(&self, type_name: &str, name: &str, context: &str) -> Result<RemoteRef> {
        let name = name.trim().to_uppercase();
        if name.is_empty() {
            return Err(TetherError::invalid_argument(format!(
                "{} requires a non-empty enum name",
                context
            )));
        }
        let value = self
            .invoke_type(type_name, "valueOf", vec![name.into()], &[types::STRING])
            .await?;
        require_remote_ref(value, context, Some(type_name))
    }

    /// Block face direction (`up`, `down`, `north`, ...)
    pub async fn direction(&self, name: &str) -> Result<RemoteRef> {
        self.enum_ref(types::DIRECTION, name, "Direction").await
    }

    /// Waypoint tag (`home`, `death`, `bed`, `user`)
    pub async fn waypoint_tag(&self, name: &str) -> Result<RemoteRef> {
        self.enum_ref(types::WAYPOINT_TAG, name, "IWaypoint.Tag").await
    }

    /// Resolve a [`BlockSpec`] to a handle, constructing it when named
    pub(crate) async fn block_spec(&self, block: BlockSpec) -> Result<RemoteRef> {
        match block {
            BlockSpec::Name(name) => self.block_optional_meta(&name).await,
            BlockSpec::Ref(reference) => Ok(reference),
        }
    }

    /// `Path.of(path)` inside the counterpart
    pub async fn java_path(&self, path: &Path) -> Result<RemoteRef> {
        let text = path.to_string_lossy().into_owned();
        let value = self
            .invoke_type(
                types::JAVA_PATH,
                "of",
                vec![text.into(), RemoteValue::Array(Vec::new())],
                &[types::STRING, types::STRING_ARRAY],
            )
            .await?;
        require_remote_ref(value, "java.nio.file.Path.of", Some(types::JAVA_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{connect_pair, ok, serve};
    use serde_json::json;

    fn handle(id: &str, type_name: &str) -> Value {
        json!({"$pyritone_ref": id, "java_type": type_name})
    }

    #[tokio::test]
    async fn test_process_getters_invoke_root() {
        let (session, peer) = connect_pair().await;
        let server = serve(peer, |request| {
            let method = request.params["method"].as_str().unwrap_or_default();
            let value = match method {
                "getMineProcess" => handle("ref-1", types::MINE_PROCESS),
                _ => json!(null),
            };
            vec![ok(request, json!({"value": value}))]
        });

        let automation = session.automation();
        let mine = automation.mine_process().await.unwrap();
        assert_eq!(mine.remote_ref().id(), "ref-1");

        let err = automation.builder_process().await.unwrap_err();
        match err {
            TetherError::BadResponse { message, payload } => {
                assert_eq!(message, "Expected remote reference for IBaritone.getBuilderProcess");
                assert_eq!(payload["expected_type"], json!(types::BUILDER_PROCESS));
            }
            other => panic!("unexpected: {:?}", other),
        }

        session.close().await;
        let requests = server.await.unwrap();
        assert_eq!(
            requests[0].params["target"],
            json!({"kind": "root", "name": "baritone"})
        );
        assert_eq!(requests[0].params["parameter_types"], json!([]));
    }

    #[tokio::test]
    async fn test_provider_uses_static_call() {
        let (session, peer) = connect_pair().await;
        let server = serve(peer, |request| {
            vec![ok(request, json!({"value": handle("ref-p", types::PROVIDER)}))]
        });

        let provider = session.automation().provider().await.unwrap();
        assert_eq!(provider.type_name(), Some(types::PROVIDER));

        session.close().await;
        let requests = server.await.unwrap();
        assert_eq!(
            requests[0].params["target"],
            json!({"kind": "type", "name": "baritone.api.BaritoneAPI"})
        );
        assert_eq!(requests[0].params["method"], json!("getProvider"));
    }

    #[tokio::test]
    async fn test_block_constructors() {
        let (session, peer) = connect_pair().await;
        let server = serve(peer, |request| {
            let type_name = request.params["type"].as_str().unwrap_or_default().to_string();
            vec![ok(request, json!({"value": handle("ref-b", &type_name)}))]
        });

        let automation = session.automation();
        automation.block_pos(1, 64, -3).await.unwrap();
        automation.block_spec("minecraft:stone".into()).await.unwrap();
        let existing = RemoteRef::new("ref-existing");
        let resolved = automation.block_spec(existing.clone().into()).await.unwrap();
        assert_eq!(resolved, existing);
        assert!(automation.block_optional_meta("  ").await.is_err());

        session.close().await;
        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].params["type"], json!("net.minecraft.class_2338"));
        assert_eq!(requests[0].params["args"], json!([1, 64, -3]));
        assert_eq!(requests[1].params["type"], json!(types::BLOCK_OPTIONAL_META));
        assert_eq!(requests[1].params["args"], json!(["minecraft:stone"]));
        assert_eq!(requests[1].params["parameter_types"], json!(["java.lang.String"]));
    }

    #[tokio::test]
    async fn test_enum_constants() {
        let (session, peer) = connect_pair().await;
        let server = serve(peer, |request| {
            let type_name = request.params["target"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            vec![ok(request, json!({"value": handle("ref-e", &type_name)}))]
        });

        let automation = session.automation();
        let north = automation.direction(" north ").await.unwrap();
        assert_eq!(north.type_name(), Some(types::DIRECTION));
        automation.waypoint_tag("bed").await.unwrap();
        match automation.direction("").await.unwrap_err() {
            TetherError::InvalidArgument(message) => {
                assert_eq!(message, "Direction requires a non-empty enum name")
            }
            other => panic!("unexpected: {:?}", other),
        }

        session.close().await;
        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].params["method"], json!("valueOf"));
        assert_eq!(requests[0].params["args"], json!(["NORTH"]));
        assert_eq!(
            requests[1].params["target"],
            json!({"kind": "type", "name": types::WAYPOINT_TAG})
        );
    }

    #[tokio::test]
    async fn test_java_path_static_call() {
        let (session, peer) = connect_pair().await;
        let server = serve(peer, |request| {
            vec![ok(request, json!({"value": handle("ref-path", types::JAVA_PATH)}))]
        });

        session
            .automation()
            .java_path(Path::new("filters/ores.json"))
            .await
            .unwrap();

        session.close().await;
        let requests = server.await.unwrap();
        assert_eq!(requests[0].params["method"], json!("of"));
        assert_eq!(requests[0].params["args"], json!(["filters/ores.json", []]));
    }
}
