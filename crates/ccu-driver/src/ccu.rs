//! Registration: static chip tables become live nodes.

use crate::error::Result;
use crate::node::ClockNode;
use crate::reset::{ResetController, ResetMapEntry};
use crate::space::RegisterSpace;
use ccu_model::ClockDescriptor;
use std::sync::Arc;
use tracing::info;

/// One registered clock-control unit.
///
/// Owns the register space, one live node per descriptor (each a shallow
/// copy, so runtime state can never corrupt the shared chip table), and the
/// reset controller. Nodes keep their registration order as a stable id.
///
/// There is deliberately no `is_enabled` query: the generic framework above
/// would use it to garbage-collect "unused" clocks at init, and gating a
/// clock some firmware left running is how boards lose their console.
#[derive(Debug)]
pub struct Ccu {
    space: Arc<RegisterSpace>,
    nodes: Vec<ClockNode>,
    resets: ResetController,
}

impl Ccu {
    /// Validate every descriptor and bring up the controller.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid descriptor; a chip table that cannot
    /// validate should never reach hardware.
    pub fn new(
        space: RegisterSpace,
        clocks: &[&'static ClockDescriptor],
        reset_map: &'static [ResetMapEntry],
    ) -> Result<Self> {
        let space = Arc::new(space);

        let mut nodes = Vec::with_capacity(clocks.len());
        for desc in clocks {
            nodes.push(ClockNode::new(desc, Arc::clone(&space))?);
        }

        info!(
            clocks = nodes.len(),
            resets = reset_map.len(),
            "clock controller registered"
        );

        Ok(Self {
            resets: ResetController::new(reset_map, Arc::clone(&space)),
            space,
            nodes,
        })
    }

    /// Node by stable id (registration order).
    pub fn node(&self, id: usize) -> Option<&ClockNode> {
        self.nodes.get(id)
    }

    /// Node by clock name.
    pub fn node_by_name(&self, name: &str) -> Option<&ClockNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// All registered nodes.
    pub fn nodes(&self) -> &[ClockNode] {
        &self.nodes
    }

    /// The reset-line controller.
    pub fn resets(&self) -> &ResetController {
        &self.resets
    }

    /// The shared register space.
    pub fn register_space(&self) -> &Arc<RegisterSpace> {
        &self.space
    }
}
