//! Bridge session
//!
//! 一个场景运行期间的全部发布状态 (publisher 列表、静态坐标变换、运行标志)。
//! `start_scenario` 每次构建新的 session 并整体替换，不做原地修改。

use std::sync::{Arc, PoisonError, RwLock};

use contracts::StaticMountTransform;

use crate::publisher::Publisher;

/// Publish state of one scenario run
#[derive(Debug, Default)]
pub struct BridgeSession {
    scenario_name: Option<String>,
    static_transforms: Vec<StaticMountTransform>,
    publishers: Vec<Publisher>,
    running: bool,
}

impl BridgeSession {
    /// Session with nothing to publish
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        scenario_name: impl Into<String>,
        static_transforms: Vec<StaticMountTransform>,
        publishers: Vec<Publisher>,
        running: bool,
    ) -> Self {
        Self {
            scenario_name: Some(scenario_name.into()),
            static_transforms,
            publishers,
            running,
        }
    }

    pub fn scenario_name(&self) -> Option<&str> {
        self.scenario_name.as_deref()
    }

    pub fn static_transforms(&self) -> &[StaticMountTransform] {
        &self.static_transforms
    }

    pub fn publishers(&self) -> &[Publisher] {
        &self.publishers
    }

    /// Publish loop is active for this session
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn topics(&self) -> Vec<&str> {
        self.publishers.iter().map(Publisher::topic).collect()
    }
}

/// Shared slot holding the current session
///
/// Readers clone the `Arc` and never observe a half-built session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: RwLock<Arc<BridgeSession>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<BridgeSession> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new session, returning the previous one
    pub fn replace(&self, session: BridgeSession) -> Arc<BridgeSession> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(session))
    }
}
