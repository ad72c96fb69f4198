#![doc = r#"
# spark-transport-tcp

## 设计动机（Why）
- **定位**：为出站连接核心提供真实的 TCP 实现：按地址建连、收发整帧、关闭通知与延时调度；
- **架构角色**：实现 `spark-transport` 的 [`Bootstrap`](spark_transport::Bootstrap)、
  [`Channel`](spark_transport::Channel) 与 [`Timer`](spark_transport::Timer) 契约，
  连接池与看门狗无需感知 Tokio。

## 核心契约（What）
- **建连**：[`TcpBootstrap`] 解析地址、按 [`SocketOptions`](spark_transport::SocketOptions) 配置套接字，
  在建连超时内完成连接；失败时不向处理器投递任何事件；
- **事件顺序**：同一通道的事件在一个 Tokio 任务上按
  `channel_active → (channel_read | exception_caught)* → channel_inactive` 顺序投递；
- **关闭顺序**：关闭通知（连接池据此移除成员）先于 `channel_inactive` 完成；
- **调度**：[`TokioTimer`] 在指定延迟后驱动任务，`stop` 后拒绝新任务并丢弃未到期任务。

## 实现策略（How）
- 建连与驱动都在注入的 [`tokio::runtime::Handle`] 上执行，调用方可以在任意执行器中等待返回的 Future；
- 每条通道拆分为读写两半，由一个驱动任务通过 `tokio::select!` 同时推进读循环、写循环与关闭信号。

## 风险与考量（Trade-offs）
- 写路径使用无界队列，水位线只提供可写性提示，不会阻塞写入方；
- IP_TOS 仅在 Linux、Android 与 macOS 上生效。
"#]

mod bootstrap;
mod channel;
mod error;
mod timer;

pub use bootstrap::TcpBootstrap;
pub use channel::TcpChannel;
pub use timer::TokioTimer;
