use serde_json::Value;

use crate::error::MarshalError;
use crate::marshal::Marshal;

/// JSON 负载的类型标签。
pub const JSON_TYPE: u8 = 1;

/// JSON 序列化。
///
/// 字符串值按原始 UTF-8 字节写出而不加引号，`Null` 写为空负载；
/// 解码时无法按 JSON 解析的 UTF-8 文本还原为字符串。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshal;

impl Marshal for JsonMarshal {
    fn type_tag(&self) -> u8 {
        JSON_TYPE
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, MarshalError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(text) => Ok(text.as_bytes().to_vec()),
            other => serde_json::to_vec(other).map_err(|source| MarshalError::Encode {
                type_tag: JSON_TYPE,
                source,
            }),
        }
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, MarshalError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_slice(bytes) {
            Ok(value) => Ok(value),
            Err(source) => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Value::String(text.to_owned())),
                Err(_) => Err(MarshalError::Decode {
                    type_tag: JSON_TYPE,
                    source,
                }),
            },
        }
    }
}
