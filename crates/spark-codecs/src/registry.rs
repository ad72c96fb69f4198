use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use spark_codec_frame::{FrameHeader, ProtoFrame};

use crate::error::MarshalError;
use crate::json::JsonMarshal;
use crate::marshal::Marshal;

/// 按负载类型标签索引的序列化注册表。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 连接的读写路径在多个线程上并发查找序列化实现，注册通常只发生在启动阶段；
/// - `DashMap` 分片锁让查找互不阻塞，注册替换也无需停机。
///
/// ## 契约说明（What）
/// - `register` 返回被替换的旧实现（若有），并输出 `warn` 日志；
/// - `get` 对未知标签返回 [`MarshalError::UnknownType`]。
#[derive(Default)]
pub struct MarshalRegistry {
    marshals: DashMap<u8, Arc<dyn Marshal>>,
}

impl MarshalRegistry {
    /// 空注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置 JSON 实现的注册表。
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(JsonMarshal));
        registry
    }

    /// 注册实现。
    pub fn register(&self, marshal: Arc<dyn Marshal>) -> Option<Arc<dyn Marshal>> {
        let tag = marshal.type_tag();
        let previous = self.marshals.insert(tag, marshal);
        if previous.is_some() {
            tracing::warn!(
                target: "spark.codecs.marshal",
                body_type = tag,
                "marshal for body type replaced"
            );
        }
        previous
    }

    /// 按标签查找。
    pub fn get(&self, type_tag: u8) -> Result<Arc<dyn Marshal>, MarshalError> {
        self.marshals
            .get(&type_tag)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(MarshalError::UnknownType { type_tag })
    }

    /// 是否已注册。
    pub fn contains(&self, type_tag: u8) -> bool {
        self.marshals.contains_key(&type_tag)
    }

    /// 把任意可序列化的值编码为字节。
    pub fn marshal_as<T: Serialize>(&self, type_tag: u8, value: &T) -> Result<Vec<u8>, MarshalError> {
        let marshal = self.get(type_tag)?;
        let value = serde_json::to_value(value)
            .map_err(|source| MarshalError::Encode { type_tag, source })?;
        marshal.marshal(&value)
    }

    /// 把字节解码为目标类型。
    pub fn unmarshal_as<T: DeserializeOwned>(
        &self,
        type_tag: u8,
        bytes: &[u8],
    ) -> Result<T, MarshalError> {
        let marshal = self.get(type_tag)?;
        let value = marshal.unmarshal(bytes)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(decoded),
            // 形如 "123" 的原始文本会先被解析成数字，目标为字符串时按原文重试。
            Err(source) => match std::str::from_utf8(bytes) {
                Ok(text) => serde_json::from_value(Value::String(text.to_owned()))
                    .map_err(|_| MarshalError::Decode { type_tag, source }),
                Err(_) => Err(MarshalError::Decode { type_tag, source }),
            },
        }
    }

    /// 以 `header` 为模板构造帧，`body_type` 写为 `type_tag`。
    pub fn to_frame<T: Serialize>(
        &self,
        mut header: FrameHeader,
        type_tag: u8,
        value: &T,
    ) -> Result<ProtoFrame, MarshalError> {
        let body = self.marshal_as(type_tag, value)?;
        header.body_type = type_tag;
        Ok(ProtoFrame::new(header, body))
    }

    /// 按帧头部的 `body_type` 解码负载。
    pub fn from_frame<T: DeserializeOwned>(&self, frame: &ProtoFrame) -> Result<T, MarshalError> {
        self.unmarshal_as(frame.header().body_type, frame.body())
    }
}

impl std::fmt::Debug for MarshalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<u8> = self.marshals.iter().map(|entry| *entry.key()).collect();
        tags.sort_unstable();
        f.debug_struct("MarshalRegistry").field("types", &tags).finish()
    }
}
