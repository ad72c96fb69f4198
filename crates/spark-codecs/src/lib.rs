#![warn(missing_docs)]

//! # spark-codecs
//!
//! ## 教案意图（Why）
//! - **职责定位**：帧头部的 `body_type` 字段只是一个字节标签，真正的序列化方式由注册表按标签查找；
//! - **扩展方式**：新增序列化格式只需实现 [`Marshal`] 并注册，分帧与连接层无需改动。
//!
//! ## 使用方式（How）
//! - [`MarshalRegistry::with_defaults`] 预置 [`JsonMarshal`]（标签 1）；
//! - [`MarshalRegistry::to_frame`] / [`MarshalRegistry::from_frame`] 在业务值与 [`ProtoFrame`] 之间转换。
//!
//! ## 契约说明（What）
//! - 同一标签重复注册时后者覆盖前者，并输出 `warn` 日志；
//! - 查找未注册的标签返回 [`MarshalError::UnknownType`]。
//!
//! [`ProtoFrame`]: spark_codec_frame::ProtoFrame

mod error;
mod json;
mod marshal;
mod registry;

pub use crate::error::MarshalError;
pub use crate::json::{JSON_TYPE, JsonMarshal};
pub use crate::marshal::Marshal;
pub use crate::registry::MarshalRegistry;
