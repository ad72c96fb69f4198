use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use spark_codec_frame::ProtoFrame;
use spark_transport::{Bootstrap, ChannelHandler, ChannelRef, Timer, TransportError, UnresolvedAddress};

use crate::clock::Clock;
use crate::config::ConnectorConfig;
use crate::connection::Connection;
use crate::error::ConnectorError;
use crate::pool::ConnectionPool;
use crate::registry::ConnectionRegistry;
use crate::watchdog::{ReconnectWatchdog, listener_fn};

/// 出站连接器：把连接池、看门狗与注册表装配在一起。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 调用方只关心“连到某地址”和“从某地址取一条连接”，不应手工拼装看门狗与连接池；
/// - 定时器、时钟、引导器都以服务形式注入，测试可以整体替换。
///
/// ## 契约说明（What）
/// - 每个地址对应唯一的 [`ConnectionPool`]，首次使用时按配置创建；
/// - 每次 `connect` 都创建新的 [`Connection`] 与 [`ReconnectWatchdog`]；
/// - `connect` 等待首次建连：成功后登记到注册表，失败时停止该看门狗并返回 [`ConnectorError::ConnectFailed`]；
/// - `connect_async` 立即登记并返回，首次建连与后续重连都交给看门狗；
/// - `shutdown_gracefully` 停止所有重连、关闭所有池内通道并关闭定时器，此后 `connect` 返回 [`ConnectorError::Shutdown`]。
pub struct Connector {
    config: ConnectorConfig,
    bootstrap: Arc<dyn Bootstrap>,
    timer: Arc<dyn Timer>,
    clock: Arc<dyn Clock>,
    handler: Option<Arc<dyn ChannelHandler>>,
    registry: ConnectionRegistry,
    groups: DashMap<UnresolvedAddress, ConnectionPool>,
    shutdown: AtomicBool,
}

impl Connector {
    /// 构造连接器。
    pub fn new(
        config: ConnectorConfig,
        bootstrap: Arc<dyn Bootstrap>,
        timer: Arc<dyn Timer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            bootstrap,
            timer,
            clock,
            handler: None,
            registry: ConnectionRegistry::new(),
            groups: DashMap::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// 设置应用层处理器，接收所有通道的读事件与生命周期事件。
    pub fn with_handler(mut self, handler: Arc<dyn ChannelHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// 配置。
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// 注册表。
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// 取得（必要时创建）某地址的连接池。
    pub fn group(&self, address: &UnresolvedAddress) -> ConnectionPool {
        if let Some(pool) = self.groups.get(address) {
            return pool.value().clone();
        }
        self.groups
            .entry(address.clone())
            .or_insert_with(|| {
                ConnectionPool::with_config(address.clone(), Arc::clone(&self.clock), &self.config.pool)
            })
            .value()
            .clone()
    }

    /// 所有连接池的快照。
    pub fn groups(&self) -> Vec<ConnectionPool> {
        self.groups.iter().map(|entry| entry.value().clone()).collect()
    }

    /// 某地址当前是否有可用连接。
    pub fn is_connection_available(&self, address: &UnresolvedAddress) -> bool {
        self.groups
            .get(address)
            .is_some_and(|pool| pool.is_available())
    }

    /// 连接到 `address` 并等待首次建连结果。
    pub async fn connect(&self, address: UnresolvedAddress) -> Result<Arc<Connection>, ConnectorError> {
        let (connection, watchdog) = self.prepare(address.clone())?;
        match watchdog.connect_now().await {
            Ok(channel) => {
                tracing::debug!(
                    target: "spark.connector",
                    %address,
                    channel = %channel.id(),
                    "connected"
                );
                connection.set_complete();
                self.registry.manage(Arc::clone(&connection));
                Ok(connection)
            }
            Err(source) => {
                watchdog.stop();
                Err(ConnectorError::ConnectFailed { address, source })
            }
        }
    }

    /// 连接到 `address`，不等待建连结果。
    pub fn connect_async(&self, address: UnresolvedAddress) -> Result<Arc<Connection>, ConnectorError> {
        let (connection, watchdog) = self.prepare(address.clone())?;
        if let Err(error) = watchdog.schedule_reconnect(Duration::ZERO) {
            watchdog.stop();
            return Err(ConnectorError::ConnectFailed {
                address,
                source: error,
            });
        }
        self.registry.manage(Arc::clone(&connection));
        Ok(connection)
    }

    /// 登记外部创建的连接。
    pub fn manage(&self, connection: Arc<Connection>) {
        self.registry.manage(connection);
    }

    /// 停止某地址的所有重连。
    pub fn cancel_reconnect(&self, address: &UnresolvedAddress) -> usize {
        self.registry.cancel_reconnect(address)
    }

    /// 停止所有地址的重连。
    pub fn cancel_all_reconnect(&self) -> usize {
        self.registry.cancel_all_reconnect()
    }

    /// 停止所有重连，关闭连接池中的全部通道，再关闭定时器。
    pub fn shutdown_gracefully(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let cancelled = self.registry.cancel_all_reconnect();
        let mut closed = 0usize;
        for pool in self.groups() {
            for channel in pool.channels() {
                channel.close();
                closed += 1;
            }
        }
        self.timer.stop();
        tracing::info!(target: "spark.connector", cancelled, closed, "connector shut down");
    }

    fn prepare(
        &self,
        address: UnresolvedAddress,
    ) -> Result<(Arc<Connection>, Arc<ReconnectWatchdog>), ConnectorError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(ConnectorError::Shutdown);
        }
        let connection = Arc::new(Connection::new(address.clone()));
        let tracker = Arc::new(ConnectionTracker {
            connection: Arc::downgrade(&connection),
            next: self.handler.clone(),
        });
        let watchdog = ReconnectWatchdog::builder(
            Arc::clone(&self.bootstrap),
            Arc::clone(&self.timer),
            address.clone(),
        )
        .pool(self.group(&address))
        .backoff(self.config.watchdog.backoff())
        .notify_capacity(self.config.watchdog.notify_queue_capacity)
        .next_handler(tracker)
        .build();

        let observed = Arc::downgrade(&connection);
        watchdog.add_reconnect_listener(listener_fn(move |success, _attempts, _watchdog: &ReconnectWatchdog| {
            if success {
                if let Some(connection) = observed.upgrade() {
                    connection.set_complete();
                }
            }
            Ok(())
        }));
        connection.bind_reconnect(watchdog.clone());
        Ok((connection, watchdog))
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("groups", &self.groups.len())
            .field("registry", &self.registry)
            .finish()
    }
}

/// 把通道生命周期同步到 [`Connection`]，再转发给应用处理器。
struct ConnectionTracker {
    connection: Weak<Connection>,
    next: Option<Arc<dyn ChannelHandler>>,
}

impl ChannelHandler for ConnectionTracker {
    fn channel_active(&self, channel: &ChannelRef) {
        if let Some(connection) = self.connection.upgrade() {
            connection.set_connected(true);
        }
        if let Some(next) = &self.next {
            next.channel_active(channel);
        }
    }

    fn channel_inactive(&self, channel: &ChannelRef) {
        if let Some(connection) = self.connection.upgrade() {
            connection.set_connected(false);
        }
        if let Some(next) = &self.next {
            next.channel_inactive(channel);
        }
    }

    fn channel_read(&self, channel: &ChannelRef, frame: ProtoFrame) {
        if let Some(next) = &self.next {
            next.channel_read(channel, frame);
        }
    }

    fn exception_caught(&self, channel: &ChannelRef, error: &TransportError) {
        if let Some(next) = &self.next {
            next.exception_caught(channel, error);
        }
    }
}
