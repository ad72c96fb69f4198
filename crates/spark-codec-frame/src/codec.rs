use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frame::{FrameHeader, HEADER_LENGTH, ProtoFrame};

/// 默认帧长上限（头部 + 负载）。
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 65_535;

/// 负载长度字段在头部中的偏移。
const BODY_LEN_OFFSET: usize = 8;

/// 分帧编解码错误。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FrameError {
    /// 帧总长超过上限。
    #[error("frame length {length} exceeds limit {max}")]
    FrameTooLarge {
        /// 头部声明的帧总长。
        length: usize,
        /// 当前上限。
        max: usize,
    },
}

impl FrameError {
    /// 稳定错误码，便于日志与告警聚合。
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::FrameTooLarge { .. } => "spark.codec.frame.too_large",
        }
    }
}

/// 长度前缀分帧编解码器。
///
/// # 设计动机（Why）
/// - 套接字读到的字节可能只含半帧，也可能同时含多帧，解码器需要在字节流上恢复帧边界；
/// - 把帧长校验放在解码入口，恶意或损坏的长度字段不会触发大块内存预留。
///
/// # 行为概览（How）
/// - `decode`：头部不足 16 字节或负载未到齐时返回 `Ok(None)`，并为剩余字节预留容量；
///   到齐后一次性切出整帧，余下字节保留在缓冲中供下一轮使用；
/// - `encode`：写入头部与负载，总长超限时拒绝并保持缓冲不变。
///
/// # 契约说明（What）
/// - 实例无内部状态，可在多个连接之间共享；
/// - 返回 `Err` 后缓冲内容未被消费，调用方应关闭连接而非继续解码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_frame_length: usize,
}

impl FrameCodec {
    /// 使用默认帧长上限构造。
    pub const fn new() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// 指定帧长上限构造；上限小于头部长度时按头部长度处理。
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: max_frame_length.max(HEADER_LENGTH),
        }
    }

    /// 当前帧长上限。
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    /// 尝试从缓冲中切出一帧。
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<ProtoFrame>, FrameError> {
        if src.len() < HEADER_LENGTH {
            src.reserve(HEADER_LENGTH - src.len());
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&src[BODY_LEN_OFFSET..BODY_LEN_OFFSET + 4]);
        let body_len = u32::from_be_bytes(len_bytes) as usize;
        let total = HEADER_LENGTH.saturating_add(body_len);
        if total > self.max_frame_length {
            return Err(FrameError::FrameTooLarge {
                length: total,
                max: self.max_frame_length,
            });
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        let header = FrameHeader {
            cmd_id: frame.get_u32(),
            seq_id: frame.get_u32(),
            body_len: frame.get_u32(),
            cmd_type: frame.get_u8(),
            body_type: frame.get_u8(),
            code: frame.get_u8(),
            ttl: frame.get_u8(),
        };
        let body: Bytes = frame.freeze();
        Ok(Some(ProtoFrame::from_wire(header, body)))
    }

    /// 把一帧写入发送缓冲。
    pub fn encode(&self, frame: &ProtoFrame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let total = frame.encoded_len();
        if total > self.max_frame_length {
            return Err(FrameError::FrameTooLarge {
                length: total,
                max: self.max_frame_length,
            });
        }
        let header = frame.header();
        dst.reserve(total);
        dst.put_u32(header.cmd_id);
        dst.put_u32(header.seq_id);
        dst.put_u32(header.body_len);
        dst.put_u8(header.cmd_type);
        dst.put_u8(header.body_type);
        dst.put_u8(header.code);
        dst.put_u8(header.ttl);
        dst.put_slice(frame.body());
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(body: &'static [u8]) -> ProtoFrame {
        let mut header = FrameHeader::new(0x0102_0304, 42);
        header.cmd_type = 1;
        header.body_type = 1;
        header.code = 3;
        header.ttl = 8;
        ProtoFrame::new(header, body)
    }

    #[test]
    fn header_layout_is_big_endian() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(&sample(b"ab"), &mut buf).expect("encode");
        assert_eq!(
            &buf[..],
            &[1, 2, 3, 4, 0, 0, 0, 42, 0, 0, 0, 2, 1, 1, 3, 8, b'a', b'b'][..]
        );
    }

    #[test]
    fn partial_input_waits_for_more_bytes() {
        let codec = FrameCodec::new();
        let mut wire = BytesMut::new();
        codec.encode(&sample(b"payload"), &mut wire).expect("encode");

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire[..10]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), None, "头部未到齐");
        buf.extend_from_slice(&wire[10..20]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), None, "负载未到齐");
        buf.extend_from_slice(&wire[20..]);
        let frame = codec.decode(&mut buf).expect("decode").expect("一帧");
        assert_eq!(frame, sample(b"payload"));
        assert!(buf.is_empty());
    }

    #[test]
    fn coalesced_frames_are_split_in_order() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(&sample(b"first"), &mut buf).expect("encode");
        codec.encode(&ProtoFrame::heartbeat(), &mut buf).expect("encode");
        codec.encode(&sample(b"third"), &mut buf).expect("encode");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample(b"first")));
        let heartbeat = codec.decode(&mut buf).unwrap().expect("心跳帧");
        assert!(heartbeat.is_heartbeat());
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample(b"third")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn oversized_length_is_rejected_before_buffering() {
        let codec = FrameCodec::with_max_frame_length(32);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 17, 0, 0, 0, 0]);
        let err = codec.decode(&mut buf).expect_err("帧总长 33 超过上限 32");
        assert_eq!(err, FrameError::FrameTooLarge { length: 33, max: 32 });
        assert_eq!(err.code(), "spark.codec.frame.too_large");
        assert_eq!(buf.len(), HEADER_LENGTH, "失败时不得消费缓冲");
    }

    #[test]
    fn frame_at_exact_limit_is_accepted() {
        let codec = FrameCodec::with_max_frame_length(HEADER_LENGTH + 4);
        let mut buf = BytesMut::new();
        codec.encode(&sample(b"1234"), &mut buf).expect("恰好等于上限");
        assert!(codec.encode(&sample(b"12345"), &mut buf).is_err());
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample(b"1234")));
    }
}
