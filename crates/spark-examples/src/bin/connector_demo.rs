//! 出站连接器示例：建连、取连接、发送 JSON 帧并观察断线重连。
//!
//! # 使用方法
//! ```bash
//! RUST_LOG=spark=debug cargo run --bin connector_demo -- --config connector.toml --address 10.0.0.8:9000
//! ```
//! - `--config`：可选，TOML 格式的 [`ConnectorConfig`]，缺省时使用默认值；
//! - `--address`：可选，目标地址；缺省时在本机启动一个回显服务作为对端。
//!
//! # 流程（How）
//! 1. 初始化 `fmt + EnvFilter` 订阅器；
//! 2. 按配置构造 [`TcpBootstrap`] 与 [`TokioTimer`]，装配 [`Connector`]；
//! 3. 同步建连后从连接池取出通道，写入一个 JSON 帧并等待回包；
//! 4. 打印连接池状态，最后 `shutdown_gracefully`。

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spark_codecs::{JSON_TYPE, MarshalRegistry};
use spark_connector::{Connector, ConnectorConfig, SystemClock};
use spark_transport::{ChannelHandler, ChannelRef, FrameCodec, FrameHeader, ProtoFrame, UnresolvedAddress};
use spark_transport_tcp::{TcpBootstrap, TokioTimer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    from: String,
    seq: u32,
}

/// 把读到的帧转交给主流程。
struct Inbox(mpsc::UnboundedSender<ProtoFrame>);

impl ChannelHandler for Inbox {
    fn channel_read(&self, _channel: &ChannelRef, frame: ProtoFrame) {
        let _ = self.0.send(frame);
    }
}

struct Args {
    config: Option<String>,
    address: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(error) = run() {
        eprintln!("连接器示例失败: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|error| format!("读取 {path} 失败: {error}"))?;
            ConnectorConfig::from_toml_str(&text).map_err(|error| format!("[{}] {error}", error.code()))?
        }
        None => ConnectorConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("创建运行时失败: {error}"))?;
    runtime.block_on(drive(config, args.address))
}

fn parse_args() -> Result<Args, String> {
    let mut parsed = Args {
        config: None,
        address: None,
    };
    let mut args = env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--config" => parsed.config = Some(args.next().ok_or("--config 之后必须提供文件路径")?),
            "--address" => parsed.address = Some(args.next().ok_or("--address 之后必须提供 host:port")?),
            other => return Err(format!("未知参数 `{other}`；用法: connector_demo [--config <path>] [--address <host:port>]")),
        }
    }
    Ok(parsed)
}

async fn drive(config: ConnectorConfig, address: Option<String>) -> Result<(), String> {
    let address: UnresolvedAddress = match address {
        Some(text) => text.parse().map_err(|error: spark_transport::TransportError| error.to_string())?,
        None => spawn_echo_peer().await?,
    };

    let handle = Handle::current();
    let codec = FrameCodec::with_max_frame_length(config.frame.max_frame_length);
    let bootstrap = TcpBootstrap::new(handle.clone(), config.socket.clone(), codec);
    let (inbox, mut replies) = mpsc::unbounded_channel();
    let connector = Connector::new(
        config,
        Arc::new(bootstrap),
        Arc::new(TokioTimer::new(handle)),
        Arc::new(SystemClock),
    )
    .with_handler(Arc::new(Inbox(inbox)));

    let connection = connector
        .connect(address.clone())
        .await
        .map_err(|error| format!("[{}] {error}", error.code()))?;
    tracing::info!(%address, complete = connection.is_complete(), "connection established");

    let pool = connector.group(&address);
    let channel = pool.try_next().ok_or("连接池为空")?;
    let marshals = MarshalRegistry::with_defaults();
    let greeting = Greeting {
        from: "connector_demo".into(),
        seq: 1,
    };
    let frame = marshals
        .to_frame(FrameHeader::new(1, 1), JSON_TYPE, &greeting)
        .map_err(|error| error.to_string())?;
    channel.write(frame).map_err(|error| error.to_string())?;

    match tokio::time::timeout(Duration::from_secs(3), replies.recv()).await {
        Ok(Some(reply)) => {
            let decoded: Greeting = marshals.from_frame(&reply).map_err(|error| error.to_string())?;
            tracing::info!(from = %decoded.from, seq = decoded.seq, "reply received");
        }
        _ => tracing::warn!("no reply within 3s"),
    }

    println!(
        "pool {}: size={} available={} warm_up_complete={}",
        pool.remote_address(),
        pool.size(),
        pool.is_available(),
        pool.is_warm_up_complete()
    );

    connector.shutdown_gracefully();
    channel.close_future().closed().await;
    Ok(())
}

/// 在本机启动回显服务，原样返回收到的字节。
async fn spawn_echo_peer() -> Result<UnresolvedAddress, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|error| format!("绑定回显服务失败: {error}"))?;
    let local = listener.local_addr().map_err(|error| error.to_string())?;
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 || socket.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    Ok(UnresolvedAddress::from(local))
}
