use std::sync::Arc;

use dashmap::DashMap;
use spark_transport::UnresolvedAddress;

use crate::connection::Connection;

/// 按远端地址索引的连接注册表。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 运维在下线某个服务节点或关闭进程时，需要一次性停止该地址（或全部地址）的自动重连；
/// - 注册表只做索引与批量开关，不参与选路。
///
/// ## 契约说明（What）
/// - `manage` 首次插入某地址时并发安全地创建列表，竞争中只有一份列表存活；
/// - `cancel_reconnect` 原子地摘除整份列表，再逐个调用 `set_reconnect(false)`；重复调用或未知地址为空操作；
/// - 所有操作都不会失败。
///
/// ## 风险提示（Trade-offs）
/// - `cancel_all_reconnect` 先收集键再逐个摘除，期间新 `manage` 的地址可能不在本轮范围内。
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<UnresolvedAddress, Vec<Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// 空注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记连接。
    pub fn manage(&self, connection: Arc<Connection>) {
        self.connections
            .entry(connection.address().clone())
            .or_default()
            .push(connection);
    }

    /// 停止某地址下所有连接的自动重连，返回受影响的连接数。
    pub fn cancel_reconnect(&self, address: &UnresolvedAddress) -> usize {
        let Some((_, connections)) = self.connections.remove(address) else {
            return 0;
        };
        for connection in &connections {
            connection.set_reconnect(false);
        }
        tracing::debug!(
            target: "spark.connector.registry",
            %address,
            count = connections.len(),
            "reconnect cancelled"
        );
        connections.len()
    }

    /// 停止所有地址的自动重连，返回受影响的连接数。
    pub fn cancel_all_reconnect(&self) -> usize {
        let addresses: Vec<UnresolvedAddress> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        addresses
            .iter()
            .map(|address| self.cancel_reconnect(address))
            .sum()
    }

    /// 某地址下连接的快照。
    pub fn connections(&self, address: &UnresolvedAddress) -> Vec<Arc<Connection>> {
        self.connections
            .get(address)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// 已登记的地址数。
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// 是否没有任何登记。
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("addresses", &self.connections.len())
            .finish()
    }
}
