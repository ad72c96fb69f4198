use bytes::Bytes;

/// 帧头部的固定长度（字节）。
pub const HEADER_LENGTH: usize = 16;

/// 帧头部字段。
///
/// `body_len` 由 [`ProtoFrame`] 在构造时根据负载自动填写，调用方无需手动维护。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// 命令号。
    pub cmd_id: u32,
    /// 请求序列号，用于匹配请求与响应。
    pub seq_id: u32,
    /// 负载长度。
    pub body_len: u32,
    /// 命令类型。
    pub cmd_type: u8,
    /// 负载类型标签，对应 marshal 注册表中的类型号。
    pub body_type: u8,
    /// 状态码。
    pub code: u8,
    /// 存活跳数。
    pub ttl: u8,
}

impl FrameHeader {
    /// 以命令号与序列号构造头部，其余字段置零。
    pub const fn new(cmd_id: u32, seq_id: u32) -> Self {
        Self {
            cmd_id,
            seq_id,
            body_len: 0,
            cmd_type: 0,
            body_type: 0,
            code: 0,
            ttl: 0,
        }
    }
}

/// 一帧完整的协议消息：头部 + 负载。
///
/// # 教案式说明
/// - **契约 (What)**：`header().body_len` 恒等于 `body().len()`；
/// - **心跳帧**：所有头部字段为零且负载为空，见 [`ProtoFrame::heartbeat`]。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtoFrame {
    header: FrameHeader,
    body: Bytes,
}

impl ProtoFrame {
    /// 构造帧，并以负载长度覆盖头部中的 `body_len`。
    ///
    /// 负载长度超过 `u32::MAX` 时截断为 `u32::MAX`，编码阶段会因超过帧长上限被拒绝。
    pub fn new(mut header: FrameHeader, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        header.body_len = u32::try_from(body.len()).unwrap_or(u32::MAX);
        Self { header, body }
    }

    /// 心跳帧。
    pub fn heartbeat() -> Self {
        Self {
            header: FrameHeader::default(),
            body: Bytes::new(),
        }
    }

    /// 判断是否为心跳帧。
    pub fn is_heartbeat(&self) -> bool {
        self.header == FrameHeader::default() && self.body.is_empty()
    }

    /// 头部。
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// 负载。
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 编码后的总长度。
    pub fn encoded_len(&self) -> usize {
        HEADER_LENGTH + self.body.len()
    }

    /// 拆解为头部与负载。
    pub fn into_parts(self) -> (FrameHeader, Bytes) {
        (self.header, self.body)
    }

    pub(crate) fn from_wire(header: FrameHeader, body: Bytes) -> Self {
        Self { header, body }
    }
}
