#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future;
use parking_lot::Mutex;
use spark_codec_frame::ProtoFrame;
use spark_transport::{
    Bootstrap, Channel, ChannelHandler, ChannelId, ChannelRef, CloseFuture, ConnectFuture,
    Timeout, Timer, TimerTask, TransportError, UnresolvedAddress,
};

pub fn address(port: u16) -> UnresolvedAddress {
    UnresolvedAddress::new("10.0.0.1", port)
}

/// 内存通道：关闭时先完成关闭通知，再向处理器投递 `channel_inactive`。
pub struct MockChannel {
    id: ChannelId,
    address: UnresolvedAddress,
    active: AtomicBool,
    close_future: CloseFuture,
    handler: Mutex<Option<Arc<dyn ChannelHandler>>>,
    written: Mutex<Vec<ProtoFrame>>,
    self_ref: Weak<MockChannel>,
}

impl MockChannel {
    pub fn new(address: UnresolvedAddress) -> Arc<Self> {
        Self::build(address, None)
    }

    pub fn with_handler(address: UnresolvedAddress, handler: Arc<dyn ChannelHandler>) -> Arc<Self> {
        Self::build(address, Some(handler))
    }

    fn build(address: UnresolvedAddress, handler: Option<Arc<dyn ChannelHandler>>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| MockChannel {
            id: ChannelId::next(),
            address,
            active: AtomicBool::new(true),
            close_future: CloseFuture::new(),
            handler: Mutex::new(handler),
            written: Mutex::new(Vec::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn as_channel(self: &Arc<Self>) -> ChannelRef {
        Arc::clone(self) as ChannelRef
    }

    pub fn written(&self) -> Vec<ProtoFrame> {
        self.written.lock().clone()
    }
}

impl Channel for MockChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn remote_address(&self) -> &UnresolvedAddress {
        &self.address
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn close(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        self.close_future.complete();
        let handler = self.handler.lock().take();
        if let (Some(handler), Some(me)) = (handler, self.self_ref.upgrade()) {
            let channel: ChannelRef = me;
            handler.channel_inactive(&channel);
        }
    }

    fn close_future(&self) -> &CloseFuture {
        &self.close_future
    }

    fn write(&self, frame: ProtoFrame) -> Result<(), TransportError> {
        if !self.is_active() {
            return Err(TransportError::ChannelClosed { id: self.id });
        }
        self.written.lock().push(frame);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Fail,
}

/// 按脚本返回建连结果的引导器；成功时同步投递 `channel_active`。
pub struct MockBootstrap {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    attempts: AtomicUsize,
    channels: Mutex<Vec<Arc<MockChannel>>>,
}

impl MockBootstrap {
    pub fn always(outcome: Outcome) -> Arc<Self> {
        Self::scripted(Vec::new(), outcome)
    }

    pub fn scripted(script: Vec<Outcome>, fallback: Outcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            attempts: AtomicUsize::new(0),
            channels: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn channels(&self) -> Vec<Arc<MockChannel>> {
        self.channels.lock().clone()
    }

    pub fn last_channel(&self) -> Option<Arc<MockChannel>> {
        self.channels.lock().last().cloned()
    }
}

impl Bootstrap for MockBootstrap {
    fn connect(&self, address: &UnresolvedAddress, handler: Arc<dyn ChannelHandler>) -> ConnectFuture {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().pop_front().unwrap_or(self.fallback);
        match outcome {
            Outcome::Succeed => {
                let channel = MockChannel::with_handler(address.clone(), Arc::clone(&handler));
                self.channels.lock().push(Arc::clone(&channel));
                let channel_ref = channel.as_channel();
                handler.channel_active(&channel_ref);
                Box::pin(future::ready(Ok(channel_ref)))
            }
            Outcome::Fail => Box::pin(future::ready(Err(TransportError::ConnectFailed {
                address: address.to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }))),
        }
    }
}

/// 手动驱动的定时器：记录每次登记的延迟，`fire_next` 按登记顺序执行。
#[derive(Default)]
pub struct ManualTimer {
    entries: Mutex<VecDeque<(Duration, Timeout, TimerTask)>>,
    delays: Mutex<Vec<Duration>>,
    stopped: AtomicBool,
}

impl ManualTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 执行最早登记的任务；任务被取消或队列为空时返回 `false`。
    pub fn fire_next(&self) -> bool {
        let entry = self.entries.lock().pop_front();
        match entry {
            Some((_, timeout, task)) => {
                if timeout.mark_fired() {
                    futures::executor::block_on(task);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> Result<Timeout, TransportError> {
        if self.is_stopped() {
            return Err(TransportError::TimerStopped);
        }
        let timeout = Timeout::new();
        self.delays.lock().push(delay);
        self.entries.lock().push_back((delay, timeout.clone(), task));
        Ok(timeout)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        for (_, timeout, _) in self.entries.lock().drain(..) {
            timeout.cancel();
        }
    }
}

/// 记录所有事件的处理器。
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Mutex<Vec<&'static str>>,
}

impl ChannelHandler for RecordingHandler {
    fn channel_active(&self, _channel: &ChannelRef) {
        self.events.lock().push("active");
    }

    fn channel_inactive(&self, _channel: &ChannelRef) {
        self.events.lock().push("inactive");
    }

    fn channel_read(&self, _channel: &ChannelRef, _frame: ProtoFrame) {
        self.events.lock().push("read");
    }
}
