use serde_json::Value;

use crate::error::MarshalError;

/// 单一序列化格式。
///
/// # 契约说明（What）
/// - `type_tag` 对应帧头部的 `body_type` 字段，在注册表内唯一；
/// - `marshal` 与 `unmarshal` 需互为逆运算，空负载约定表示 `Value::Null`。
pub trait Marshal: Send + Sync + 'static {
    /// 负载类型标签。
    fn type_tag(&self) -> u8;

    /// 把值编码为字节。
    fn marshal(&self, value: &Value) -> Result<Vec<u8>, MarshalError>;

    /// 把字节解码为值。
    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, MarshalError>;
}
