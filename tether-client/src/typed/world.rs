//! Proxies for world data, waypoints, selections and the player context

use tether_protocol::{RemoteRef, RemoteValue};
use tether_utils::Result;

use super::automation::types;
use super::{
    optional_remote_ref, require_bool, require_i64, require_remote_ref, require_remote_ref_list,
    require_string,
};
use crate::connection::Session;

// ==================== World cache ====================

remote_proxy!(
    /// `baritone.api.cache.IWorldProvider`
    WorldProviderRef
);

impl WorldProviderRef {
    /// Data of the loaded world; `None` outside a world
    pub async fn current_world(&self) -> Result<Option<WorldDataRef>> {
        let value = self.invoke("getCurrentWorld", Vec::new(), &[]).await?;
        let reference =
            optional_remote_ref(value, "IWorldProvider.getCurrentWorld", Some(types::WORLD_DATA))?;
        Ok(reference.map(|reference| WorldDataRef::new(self.session.clone(), reference)))
    }
}

remote_proxy!(
    /// `baritone.api.cache.IWorldData`
    WorldDataRef
);

impl WorldDataRef {
    pub async fn cached_world(&self) -> Result<CachedWorldRef> {
        let value = self.invoke("getCachedWorld", Vec::new(), &[]).await?;
        let reference =
            require_remote_ref(value, "IWorldData.getCachedWorld", Some(types::CACHED_WORLD))?;
        Ok(CachedWorldRef::new(self.session.clone(), reference))
    }

    pub async fn waypoints(&self) -> Result<WaypointCollectionRef> {
        let value = self.invoke("getWaypoints", Vec::new(), &[]).await?;
        let reference = require_remote_ref(
            value,
            "IWorldData.getWaypoints",
            Some(types::WAYPOINT_COLLECTION),
        )?;
        Ok(WaypointCollectionRef::new(self.session.clone(), reference))
    }
}

remote_proxy!(
    /// `baritone.api.cache.ICachedWorld`
    CachedWorldRef
);

impl CachedWorldRef {
    /// Cached region at region coordinates, if loaded
    pub async fn region(&self, region_x: i32, region_z: i32) -> Result<Option<RemoteRef>> {
        let value = self
            .invoke("getRegion", vec![region_x.into(), region_z.into()], &["int", "int"])
            .await?;
        optional_remote_ref(value, "ICachedWorld.getRegion", None)
    }

    pub async fn is_cached(&self, x: i32, z: i32) -> Result<bool> {
        let value = self
            .invoke("isCached", vec![x.into(), z.into()], &["int", "int"])
            .await?;
        require_bool(value, "ICachedWorld.isCached")
    }

    /// Cached positions of `block` around a center column
    pub async fn locations_of(
        &self,
        block: &str,
        maximum: i32,
        center_x: i32,
        center_z: i32,
        max_region_distance_sq: i32,
    ) -> Result<Vec<RemoteRef>> {
        let value = self
            .invoke(
                "getLocationsOf",
                vec![
                    block.into(),
                    maximum.into(),
                    center_x.into(),
                    center_z.into(),
                    max_region_distance_sq.into(),
                ],
                &[types::STRING, "int", "int", "int", "int"],
            )
            .await?;
        require_remote_ref_list(value, "ICachedWorld.getLocationsOf", Some(types::BLOCK_POS))
    }

    pub async fn reload_all_from_disk(&self) -> Result<()> {
        self.invoke("reloadAllFromDisk", Vec::new(), &[]).await?;
        Ok(())
    }

    pub async fn save(&self) -> Result<()> {
        self.invoke("save", Vec::new(), &[]).await?;
        Ok(())
    }
}

// ==================== Waypoints ====================

remote_proxy!(
    /// `baritone.api.cache.IWaypoint`
    WaypointRef
);

impl WaypointRef {
    pub async fn name(&self) -> Result<String> {
        let value = self.invoke("getName", Vec::new(), &[]).await?;
        require_string(value, "IWaypoint.getName")
    }

    /// Tag enum name (`HOME`, `DEATH`, `BED`, `USER`)
    pub async fn tag(&self) -> Result<String> {
        let value = self.invoke("getTag", Vec::new(), &[]).await?;
        require_string(value, "IWaypoint.getTag")
    }

    /// Milliseconds since the epoch
    pub async fn creation_timestamp(&self) -> Result<i64> {
        let value = self.invoke("getCreationTimestamp", Vec::new(), &[]).await?;
        require_i64(value, "IWaypoint.getCreationTimestamp")
    }

    pub async fn location(&self) -> Result<RemoteRef> {
        let value = self.invoke("getLocation", Vec::new(), &[]).await?;
        require_remote_ref(value, "IWaypoint.getLocation", Some(types::BETTER_BLOCK_POS))
    }
}

remote_proxy!(
    /// `baritone.api.cache.IWaypointCollection`
    WaypointCollectionRef
);

impl WaypointCollectionRef {
    pub async fn add_waypoint(&self, waypoint: &WaypointRef) -> Result<()> {
        self.invoke("addWaypoint", vec![waypoint.into()], &[types::WAYPOINT])
            .await?;
        Ok(())
    }

    pub async fn remove_waypoint(&self, waypoint: &WaypointRef) -> Result<()> {
        self.invoke("removeWaypoint", vec![waypoint.into()], &[types::WAYPOINT])
            .await?;
        Ok(())
    }

    pub async fn most_recent_by_tag(&self, tag: &str) -> Result<Option<WaypointRef>> {
        let tag = self.session.automation().waypoint_tag(tag).await?;
        let value = self
            .invoke("getMostRecentByTag", vec![tag.into()], &[types::WAYPOINT_TAG])
            .await?;
        let reference = optional_remote_ref(
            value,
            "IWaypointCollection.getMostRecentByTag",
            Some(types::WAYPOINT),
        )?;
        Ok(reference.map(|reference| WaypointRef::new(self.session.clone(), reference)))
    }

    pub async fn by_tag(&self, tag: &str) -> Result<Vec<WaypointRef>> {
        let tag = self.session.automation().waypoint_tag(tag).await?;
        let value = self
            .invoke("getByTag", vec![tag.into()], &[types::WAYPOINT_TAG])
            .await?;
        self.waypoints(value, "IWaypointCollection.getByTag")
    }

    pub async fn all(&self) -> Result<Vec<WaypointRef>> {
        let value = self.invoke("getAllWaypoints", Vec::new(), &[]).await?;
        self.waypoints(value, "IWaypointCollection.getAllWaypoints")
    }

    fn waypoints(&self, value: RemoteValue, context: &str) -> Result<Vec<WaypointRef>> {
        let references = require_remote_ref_list(value, context, Some(types::WAYPOINT))?;
        Ok(references
            .into_iter()
            .map(|reference| WaypointRef::new(self.session.clone(), reference))
            .collect())
    }
}

// ==================== Selections ====================

remote_proxy!(
    /// `baritone.api.selection.ISelection`
    SelectionRef
);

impl SelectionRef {
    pub async fn pos1(&self) -> Result<RemoteRef> {
        self.corner("pos1").await
    }

    pub async fn pos2(&self) -> Result<RemoteRef> {
        self.corner("pos2").await
    }

    pub async fn min(&self) -> Result<RemoteRef> {
        self.corner("min").await
    }

    pub async fn max(&self) -> Result<RemoteRef> {
        self.corner("max").await
    }

    async fn corner(&self, method: &str) -> Result<RemoteRef> {
        let value = self.invoke(method, Vec::new(), &[]).await?;
        require_remote_ref(
            value,
            &format!("ISelection.{}", method),
            Some(types::BETTER_BLOCK_POS),
        )
    }

    /// New selection grown by `blocks` towards `direction` (`up`, `north`, ...)
    pub async fn expand(&self, direction: &str, blocks: i32) -> Result<SelectionRef> {
        self.reshape("expand", direction, blocks).await
    }

    pub async fn contract(&self, direction: &str, blocks: i32) -> Result<SelectionRef> {
        self.reshape("contract", direction, blocks).await
    }

    pub async fn shift(&self, direction: &str, blocks: i32) -> Result<SelectionRef> {
        self.reshape("shift", direction, blocks).await
    }

    async fn reshape(&self, method: &str, direction: &str, blocks: i32) -> Result<SelectionRef> {
        let direction = self.session.automation().direction(direction).await?;
        let value = self
            .invoke(
                method,
                vec![direction.into(), blocks.into()],
                &[types::DIRECTION, "int"],
            )
            .await?;
        let reference = require_remote_ref(
            value,
            &format!("ISelection.{}", method),
            Some(types::SELECTION),
        )?;
        Ok(SelectionRef::new(self.session.clone(), reference))
    }
}

remote_proxy!(
    /// `baritone.api.selection.ISelectionManager`
    SelectionManagerRef
);

impl SelectionManagerRef {
    pub async fn add_selection(&self, selection: &SelectionRef) -> Result<SelectionRef> {
        let value = self
            .invoke("addSelection", vec![selection.into()], &[types::SELECTION])
            .await?;
        self.selection(value, "ISelectionManager.addSelection")
    }

    /// Select the box between two `BetterBlockPos` handles
    pub async fn add_selection_points(
        &self,
        pos1: &RemoteRef,
        pos2: &RemoteRef,
    ) -> Result<SelectionRef> {
        let value = self
            .invoke(
                "addSelection",
                vec![pos1.into(), pos2.into()],
                &[types::BETTER_BLOCK_POS, types::BETTER_BLOCK_POS],
            )
            .await?;
        self.selection(value, "ISelectionManager.addSelection")
    }

    pub async fn remove_selection(&self, selection: &SelectionRef) -> Result<Option<SelectionRef>> {
        let value = self
            .invoke("removeSelection", vec![selection.into()], &[types::SELECTION])
            .await?;
        let reference = optional_remote_ref(
            value,
            "ISelectionManager.removeSelection",
            Some(types::SELECTION),
        )?;
        Ok(reference.map(|reference| SelectionRef::new(self.session.clone(), reference)))
    }

    /// Clear every selection, returning the removed ones
    pub async fn remove_all(&self) -> Result<Vec<SelectionRef>> {
        let value = self.invoke("removeAllSelections", Vec::new(), &[]).await?;
        self.selections_from(value, "ISelectionManager.removeAllSelections")
    }

    pub async fn selections(&self) -> Result<Vec<SelectionRef>> {
        let value = self.invoke("getSelections", Vec::new(), &[]).await?;
        self.selections_from(value, "ISelectionManager.getSelections")
    }

    pub async fn only_selection(&self) -> Result<Option<SelectionRef>> {
        let value = self.invoke("getOnlySelection", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(
            value,
            "ISelectionManager.getOnlySelection",
            Some(types::SELECTION),
        )?;
        Ok(reference.map(|reference| SelectionRef::new(self.session.clone(), reference)))
    }

    pub async fn last_selection(&self) -> Result<Option<SelectionRef>> {
        let value = self.invoke("getLastSelection", Vec::new(), &[]).await?;
        let reference = optional_remote_ref(
            value,
            "ISelectionManager.getLastSelection",
            Some(types::SELECTION),
        )?;
        Ok(reference.map(|reference| SelectionRef::new(self.session.clone(), reference)))
    }

    fn selection(&self, value: RemoteValue, context: &str) -> Result<SelectionRef> {
        let reference = require_remote_ref(value, context, Some(types::SELECTION))?;
        Ok(SelectionRef::new(self.session.clone(), reference))
    }

    fn selections_from(&self, value: RemoteValue, context: &str) -> Result<Vec<SelectionRef>> {
        let references = require_remote_ref_list(value, context, Some(types::SELECTION))?;
        Ok(references
            .into_iter()
            .map(|reference| SelectionRef::new(self.session.clone(), reference))
            .collect())
    }
}

// ==================== Player ====================

remote_proxy!(
    /// `baritone.api.utils.IPlayerContext`
    PlayerContextRef
);

impl PlayerContextRef {
    pub async fn world_data(&self) -> Result<WorldDataRef> {
        let value = self.invoke("worldData", Vec::new(), &[]).await?;
        let reference =
            require_remote_ref(value, "IPlayerContext.worldData", Some(types::WORLD_DATA))?;
        Ok(WorldDataRef::new(self.session.clone(), reference))
    }

    /// Client player entity; `None` outside a world
    pub async fn player(&self) -> Result<Option<RemoteRef>> {
        let value = self.invoke("player", Vec::new(), &[]).await?;
        optional_remote_ref(value, "IPlayerContext.player", None)
    }

    pub async fn world(&self) -> Result<Option<RemoteRef>> {
        let value = self.invoke("world", Vec::new(), &[]).await?;
        optional_remote_ref(value, "IPlayerContext.world", None)
    }

    pub async fn player_feet(&self) -> Result<RemoteRef> {
        let value = self.invoke("playerFeet", Vec::new(), &[]).await?;
        require_remote_ref(value, "IPlayerContext.playerFeet", Some(types::BETTER_BLOCK_POS))
    }

    pub async fn viewer_pos(&self) -> Result<RemoteRef> {
        let value = self.invoke("viewerPos", Vec::new(), &[]).await?;
        require_remote_ref(value, "IPlayerContext.viewerPos", Some(types::BETTER_BLOCK_POS))
    }

    /// Block under the crosshair, if any
    pub async fn selected_block(&self) -> Result<Option<RemoteRef>> {
        let value = self.invoke("getSelectedBlock", Vec::new(), &[]).await?;
        optional_remote_ref(value, "IPlayerContext.getSelectedBlock", Some(types::BLOCK_POS))
    }

    pub async fn is_looking_at(&self, block_pos: &RemoteRef) -> Result<bool> {
        let value = self
            .invoke("isLookingAt", vec![block_pos.into()], &[types::BLOCK_POS])
            .await?;
        require_bool(value, "IPlayerContext.isLookingAt")
    }
}
