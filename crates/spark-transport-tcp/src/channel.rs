use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::BytesMut;
use spark_codec_frame::{FrameCodec, FrameError, ProtoFrame};
use spark_transport::{
    Channel, ChannelHandler, ChannelId, ChannelRef, CloseFuture, SocketOptions, TransportError,
    UnresolvedAddress,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Notify, mpsc};

use crate::error::{self, is_peer_disconnect, map_io_error};

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// 一条出站 TCP 连接。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 为连接池提供可共享、可关闭、能以整帧为单位写入的通道句柄；
/// - 读写细节由后台驱动任务承担，句柄上的方法都不阻塞也不需要 `.await`。
///
/// ## 逻辑 (How)
/// - `write` 把帧放入无界队列，由驱动任务编码后写出；同时累计待写字节数，
///   超过高水位线后 `is_writable` 返回 `false`，回落到低水位线以下再恢复，两次翻转各记录一条 `debug` 日志；
/// - `close` 通过 `Notify` 通知驱动任务退出，驱动任务负责完成关闭通知并投递 `channel_inactive`。
///
/// ## 契约 (What)
/// - `close` 幂等；关闭后 `write` 返回 [`TransportError::ChannelClosed`]；
/// - 超过帧长上限的帧在 `write` 时即被拒绝，不会影响通道状态。
///
/// ## 注意事项 (Trade-offs)
/// - 队列无界，写入方需参考 `is_writable` 自行限流。
pub struct TcpChannel {
    id: ChannelId,
    remote_address: UnresolvedAddress,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    active: AtomicBool,
    writable: AtomicBool,
    pending_bytes: AtomicUsize,
    low_water_mark: usize,
    high_water_mark: usize,
    max_frame_length: usize,
    outbound: mpsc::UnboundedSender<ProtoFrame>,
    shutdown: Notify,
    close_future: CloseFuture,
}

/// 驱动任务持有的另一半资源。
pub(crate) struct ChannelDriver {
    channel: Arc<TcpChannel>,
    handler: Arc<dyn ChannelHandler>,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    outbound: mpsc::UnboundedReceiver<ProtoFrame>,
    codec: FrameCodec,
    allow_half_closure: bool,
}

impl TcpChannel {
    pub(crate) fn open(
        remote_address: UnresolvedAddress,
        stream: TcpStream,
        handler: Arc<dyn ChannelHandler>,
        options: &SocketOptions,
        codec: FrameCodec,
    ) -> Result<(Arc<Self>, ChannelDriver), TransportError> {
        let peer_addr = stream
            .peer_addr()
            .map_err(|err| map_io_error(error::CONFIGURE, err))?;
        let local_addr = stream
            .local_addr()
            .map_err(|err| map_io_error(error::CONFIGURE, err))?;
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Arc::new(Self {
            id: ChannelId::next(),
            remote_address,
            peer_addr,
            local_addr,
            active: AtomicBool::new(true),
            writable: AtomicBool::new(true),
            pending_bytes: AtomicUsize::new(0),
            low_water_mark: options.write_buffer_low_water_mark(),
            high_water_mark: options.write_buffer_high_water_mark(),
            max_frame_length: codec.max_frame_length(),
            outbound: tx,
            shutdown: Notify::new(),
            close_future: CloseFuture::new(),
        });
        let driver = ChannelDriver {
            channel: Arc::clone(&channel),
            handler,
            reader,
            writer,
            outbound: rx,
            codec,
            allow_half_closure: options.allow_half_closure(),
        };
        Ok((channel, driver))
    }

    /// 对端套接字地址。
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// 本端套接字地址。
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 待写字节是否低于水位线。
    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire)
    }

    fn on_flushed(&self, len: usize) {
        let before = self.pending_bytes.fetch_sub(len, Ordering::AcqRel);
        let pending = before.saturating_sub(len);
        if pending <= self.low_water_mark && !self.writable.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                target: "spark.transport.tcp",
                channel = %self.id,
                pending,
                low_water_mark = self.low_water_mark,
                "channel writable again"
            );
        }
    }
}

impl Channel for TcpChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn remote_address(&self) -> &UnresolvedAddress {
        &self.remote_address
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.is_active() {
            self.shutdown.notify_one();
        }
    }

    fn close_future(&self) -> &CloseFuture {
        &self.close_future
    }

    fn write(&self, frame: ProtoFrame) -> Result<(), TransportError> {
        if !self.is_active() {
            return Err(TransportError::ChannelClosed { id: self.id });
        }
        let len = frame.encoded_len();
        if len > self.max_frame_length {
            return Err(FrameError::FrameTooLarge {
                length: len,
                max: self.max_frame_length,
            }
            .into());
        }
        let pending = self.pending_bytes.fetch_add(len, Ordering::AcqRel) + len;
        if pending > self.high_water_mark && self.writable.swap(false, Ordering::AcqRel) {
            tracing::debug!(
                target: "spark.transport.tcp",
                channel = %self.id,
                pending,
                high_water_mark = self.high_water_mark,
                "channel unwritable"
            );
        }
        self.outbound.send(frame).map_err(|_| {
            self.on_flushed(len);
            TransportError::ChannelClosed { id: self.id }
        })
    }
}

impl fmt::Debug for TcpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpChannel")
            .field("id", &self.id)
            .field("remote_address", &self.remote_address)
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .field("active", &self.is_active())
            .finish()
    }
}

impl ChannelDriver {
    /// 推进通道直到关闭，并按顺序完成关闭通知与 `channel_inactive`。
    pub(crate) async fn run(self) {
        let ChannelDriver {
            channel,
            handler,
            mut reader,
            mut writer,
            mut outbound,
            codec,
            allow_half_closure,
        } = self;
        let channel_ref: ChannelRef = channel.clone();

        let outcome = tokio::select! {
            result = read_loop(&channel_ref, handler.as_ref(), &mut reader, codec, allow_half_closure) => result,
            result = write_loop(&channel, &mut writer, &mut outbound, codec) => result,
            _ = channel.shutdown.notified() => Ok(()),
        };

        if let Err(error) = &outcome {
            if is_peer_disconnect(error) {
                tracing::debug!(
                    target: "spark.transport.tcp",
                    channel = %channel.id,
                    address = %channel.remote_address,
                    %error,
                    "peer disconnected"
                );
            } else {
                tracing::warn!(
                    target: "spark.transport.tcp",
                    channel = %channel.id,
                    address = %channel.remote_address,
                    code = error.code(),
                    %error,
                    "channel failed"
                );
            }
            handler.exception_caught(&channel_ref, error);
        }

        let _ = writer.shutdown().await;
        channel.active.store(false, Ordering::Release);
        outbound.close();
        channel.close_future.complete();
        tracing::debug!(
            target: "spark.transport.tcp",
            channel = %channel.id,
            address = %channel.remote_address,
            "channel closed"
        );
        handler.channel_inactive(&channel_ref);
    }
}

async fn read_loop(
    channel: &ChannelRef,
    handler: &dyn ChannelHandler,
    reader: &mut OwnedReadHalf,
    codec: FrameCodec,
    allow_half_closure: bool,
) -> Result<(), TransportError> {
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    loop {
        while let Some(frame) = codec.decode(&mut buffer)? {
            if frame.is_heartbeat() {
                tracing::trace!(target: "spark.transport.tcp", channel = %channel.id(), "heartbeat received");
            }
            handler.channel_read(channel, frame);
        }
        let read = reader
            .read_buf(&mut buffer)
            .await
            .map_err(|err| map_io_error(error::READ, err))?;
        if read == 0 {
            if allow_half_closure {
                // 对端只关闭了写方向，本端继续保留写方向直到显式关闭。
                std::future::pending::<()>().await;
            }
            return Ok(());
        }
    }
}

async fn write_loop(
    channel: &TcpChannel,
    writer: &mut OwnedWriteHalf,
    outbound: &mut mpsc::UnboundedReceiver<ProtoFrame>,
    codec: FrameCodec,
) -> Result<(), TransportError> {
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    while let Some(frame) = outbound.recv().await {
        let len = frame.encoded_len();
        buffer.clear();
        codec.encode(&frame, &mut buffer)?;
        let written = writer
            .write_all(&buffer)
            .await
            .map_err(|err| map_io_error(error::WRITE, err));
        channel.on_flushed(len);
        written?;
    }
    Ok(())
}
