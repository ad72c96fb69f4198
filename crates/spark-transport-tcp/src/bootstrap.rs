use std::sync::Arc;

use socket2::SockRef;
use spark_codec_frame::FrameCodec;
use spark_transport::{
    Bootstrap, Channel, ChannelHandler, ChannelRef, ConnectFuture, SocketOptions, TransportError,
    UnresolvedAddress,
};
use tokio::net::{TcpSocket, TcpStream};
use tokio::runtime::Handle;

use crate::channel::TcpChannel;
use crate::error::{self, map_io_error};

/// 基于 Tokio 的出站 TCP 引导器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 看门狗在定时器线程或任意执行器上发起重连，建连过程本身却需要 Tokio 的 IO 与时间驱动；
/// - 因此建连任务整体投递到注入的运行时句柄上执行，返回的 Future 只等待结果。
///
/// ## 逻辑 (How)
/// 1. `lookup_host` 解析地址，取第一个结果；
/// 2. 建连前设置 `SO_REUSEADDR`、`SO_KEEPALIVE`、收发缓冲与 `IP_TOS`；
/// 3. 在建连超时内完成连接，随后设置 `TCP_NODELAY` 与 `SO_LINGER`；
/// 4. 构造 [`TcpChannel`]，投递 `channel_active`，再派生驱动任务。
///
/// ## 契约 (What)
/// - 返回成功时处理器已收到 `channel_active`；
/// - 解析失败返回 [`TransportError::InvalidAddress`]，拒绝连接返回 [`TransportError::ConnectFailed`]，
///   超时返回 [`TransportError::ConnectTimeout`]，三者都不会产生任何通道事件。
#[derive(Clone, Debug)]
pub struct TcpBootstrap {
    handle: Handle,
    options: Arc<SocketOptions>,
    codec: FrameCodec,
}

impl TcpBootstrap {
    /// 构造引导器。
    pub fn new(handle: Handle, options: SocketOptions, codec: FrameCodec) -> Self {
        Self {
            handle,
            options: Arc::new(options),
            codec,
        }
    }

    /// 使用当前 Tokio 运行时与默认选项构造。
    ///
    /// 必须在 Tokio 运行时内调用。
    pub fn with_defaults() -> Result<Self, TransportError> {
        let handle = Handle::try_current().map_err(|err| TransportError::Io {
            operation: "tokio runtime lookup",
            source: std::io::Error::other(err),
        })?;
        Ok(Self::new(handle, SocketOptions::default(), FrameCodec::new()))
    }

    /// 套接字选项。
    pub fn options(&self) -> &SocketOptions {
        &self.options
    }

    /// 分帧编解码器。
    pub fn codec(&self) -> FrameCodec {
        self.codec
    }
}

impl Bootstrap for TcpBootstrap {
    fn connect(&self, address: &UnresolvedAddress, handler: Arc<dyn ChannelHandler>) -> ConnectFuture {
        let address = address.clone();
        let options = Arc::clone(&self.options);
        let codec = self.codec;
        let handle = self.handle.clone();
        let task = self.handle.spawn(async move {
            let stream = establish(&address, &options).await?;
            let (channel, driver) = TcpChannel::open(address.clone(), stream, Arc::clone(&handler), &options, codec)?;
            let channel_ref: ChannelRef = channel.clone();
            tracing::debug!(
                target: "spark.transport.tcp",
                channel = %channel_ref.id(),
                %address,
                peer = %channel.peer_addr(),
                local = %channel.local_addr(),
                "channel established"
            );
            handler.channel_active(&channel_ref);
            handle.spawn(driver.run());
            Ok(channel_ref)
        });
        Box::pin(async move {
            task.await
                .map_err(|err| map_io_error(error::SPAWN, std::io::Error::other(err)))?
        })
    }
}

async fn establish(address: &UnresolvedAddress, options: &SocketOptions) -> Result<TcpStream, TransportError> {
    let invalid = || TransportError::InvalidAddress {
        address: address.to_string(),
    };
    let target = tokio::net::lookup_host((address.host(), address.port()))
        .await
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)?;

    let socket = if target.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|err| map_io_error(error::CONFIGURE, err))?;
    configure_socket(&socket, options).map_err(|err| map_io_error(error::CONFIGURE, err))?;

    let timeout = options.connect_timeout();
    let stream = match tokio::time::timeout(timeout, socket.connect(target)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(TransportError::ConnectFailed {
                address: address.to_string(),
                source,
            });
        }
        Err(_) => {
            return Err(TransportError::ConnectTimeout {
                address: address.to_string(),
                timeout,
            });
        }
    };
    configure_stream(&stream, options).map_err(|err| map_io_error(error::CONFIGURE, err))?;
    Ok(stream)
}

fn configure_socket(socket: &TcpSocket, options: &SocketOptions) -> std::io::Result<()> {
    socket.set_reuseaddr(options.reuse_address())?;
    socket.set_keepalive(options.keep_alive())?;
    if let Some(size) = options.send_buffer_size() {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = options.recv_buffer_size() {
        socket.set_recv_buffer_size(size)?;
    }
    if let Some(tos) = options.ip_tos() {
        set_ip_tos(socket, tos)?;
    }
    Ok(())
}

fn configure_stream(stream: &TcpStream, options: &SocketOptions) -> std::io::Result<()> {
    stream.set_nodelay(options.tcp_nodelay())?;
    if let Some(linger) = options.linger() {
        SockRef::from(stream).set_linger(Some(linger))?;
    }
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
fn set_ip_tos(socket: &TcpSocket, tos: u32) -> std::io::Result<()> {
    SockRef::from(socket).set_tos_v4(tos)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
fn set_ip_tos(_socket: &TcpSocket, tos: u32) -> std::io::Result<()> {
    tracing::debug!(target: "spark.transport.tcp", tos, "IP_TOS is not supported on this platform");
    Ok(())
}
