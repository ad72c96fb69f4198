#![warn(missing_docs)]

//! `spark-codec-frame` 提供出站连接核心使用的二进制分帧编解码。
//!
//! # 教案背景（Why）
//! - 连接池与重连看门狗只关心“完整的一帧”，不应该感知半包、粘包等字节流细节；
//! - 分帧规则固定为 16 字节头部 + 变长负载，头部第 8..12 字节记录负载长度；
//! - 超长帧在解码阶段即被拒绝，并以独立的 [`FrameError::FrameTooLarge`] 暴露给传输层，
//!   传输层据此关闭通道。
//!
//! # 线上格式（What）
//!
//! ```text
//! |---------+---------+---------+---------+----------+--------+--------+-----------|
//! | 4 bytes | 4 bytes | 4 bytes | 1 byte  | 1 byte   | 1 byte | 1 byte | N byte(s) |
//! |---------+---------+---------+---------+----------+--------+--------+-----------|
//! | cmd_id  | seq_id  | body_len| cmd_type| body_type| code   | ttl    | body      |
//! |---------+---------+---------+---------+----------+--------+--------+-----------|
//! ```
//!
//! - 整数字段一律使用网络字节序（大端）；
//! - 帧长上限作用于“头部 + 负载”的总长度，默认 65 535 字节。
//!
//! # 使用概览（How）
//! - 解码端：把套接字读到的字节追加进 `BytesMut`，循环调用 [`FrameCodec::decode`] 直到返回 `Ok(None)`；
//! - 编码端：调用 [`FrameCodec::encode`] 把 [`ProtoFrame`] 写入发送缓冲。

mod codec;
mod frame;

pub use crate::codec::{DEFAULT_MAX_FRAME_LENGTH, FrameCodec, FrameError};
pub use crate::frame::{FrameHeader, HEADER_LENGTH, ProtoFrame};
