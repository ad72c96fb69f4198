use thiserror::Error;

/// 序列化错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarshalError {
    /// 标签未注册。
    #[error("no marshal registered for body type {type_tag}")]
    UnknownType {
        /// 负载类型标签。
        type_tag: u8,
    },
    /// 编码失败。
    #[error("marshal with body type {type_tag} failed: {source}")]
    Encode {
        /// 负载类型标签。
        type_tag: u8,
        /// 底层错误。
        #[source]
        source: serde_json::Error,
    },
    /// 解码失败。
    #[error("unmarshal with body type {type_tag} failed: {source}")]
    Decode {
        /// 负载类型标签。
        type_tag: u8,
        /// 底层错误。
        #[source]
        source: serde_json::Error,
    },
}

impl MarshalError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            MarshalError::UnknownType { .. } => "spark.codecs.marshal.unknown_type",
            MarshalError::Encode { .. } => "spark.codecs.marshal.encode_failed",
            MarshalError::Decode { .. } => "spark.codecs.marshal.decode_failed",
        }
    }
}
