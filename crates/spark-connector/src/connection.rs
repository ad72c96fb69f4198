use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use spark_transport::UnresolvedAddress;

/// 能够开启或停止自动重连的对象，通常是 [`crate::ReconnectWatchdog`]。
pub trait ReconnectSwitch: Send + Sync + 'static {
    /// `true` 开启自动重连，`false` 停止。
    fn set_reconnect(&self, enabled: bool);
}

type CompleteListener = Box<dyn FnOnce(&Connection) + Send + 'static>;

struct Completion {
    done: bool,
    listeners: Vec<CompleteListener>,
}

/// 面向应用层的逻辑连接句柄。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 应用持有的是“到某个地址的连接意图”，底层通道可能尚未建立，也可能被看门狗替换多次；
/// - 注册表以它为单位批量停止重连。
///
/// ## 契约说明（What）
/// - 完成状态只会从“未完成”变为“已完成”一次，监听器按注册顺序各执行一次；
/// - 完成后注册的监听器在注册线程上立即执行；
/// - [`Connection::set_reconnect`] 转发给绑定的 [`ReconnectSwitch`]，未绑定时为空操作。
pub struct Connection {
    address: UnresolvedAddress,
    connected: AtomicBool,
    completion: Mutex<Completion>,
    reconnect: OnceLock<Arc<dyn ReconnectSwitch>>,
}

impl Connection {
    /// 构造尚未完成的连接句柄。
    pub fn new(address: UnresolvedAddress) -> Self {
        Self {
            address,
            connected: AtomicBool::new(false),
            completion: Mutex::new(Completion {
                done: false,
                listeners: Vec::new(),
            }),
            reconnect: OnceLock::new(),
        }
    }

    /// 远端地址。
    pub fn address(&self) -> &UnresolvedAddress {
        &self.address
    }

    /// 底层通道当前是否处于连接状态。
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// 更新连接状态。
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// 是否已完成。
    pub fn is_complete(&self) -> bool {
        self.completion.lock().done
    }

    /// 标记完成并执行监听器；仅首次调用返回 `true`。
    pub fn set_complete(&self) -> bool {
        let listeners = {
            let mut completion = self.completion.lock();
            if completion.done {
                return false;
            }
            completion.done = true;
            std::mem::take(&mut completion.listeners)
        };
        for listener in listeners {
            listener(self);
        }
        true
    }

    /// 注册完成监听器。
    pub fn add_complete_listener<F>(&self, listener: F)
    where
        F: FnOnce(&Connection) + Send + 'static,
    {
        let mut completion = self.completion.lock();
        if completion.done {
            drop(completion);
            listener(self);
        } else {
            completion.listeners.push(Box::new(listener));
        }
    }

    /// 绑定重连开关；只能绑定一次，重复绑定返回 `false`。
    pub fn bind_reconnect(&self, switch: Arc<dyn ReconnectSwitch>) -> bool {
        self.reconnect.set(switch).is_ok()
    }

    /// 开启或停止自动重连。
    pub fn set_reconnect(&self, enabled: bool) {
        match self.reconnect.get() {
            Some(switch) => switch.set_reconnect(enabled),
            None => tracing::trace!(
                target: "spark.connector.registry",
                address = %self.address,
                "connection has no reconnect switch bound"
            ),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("connected", &self.is_connected())
            .field("complete", &self.is_complete())
            .finish()
    }
}
