use spark_transport::TransportError;
use std::io;

/// 描述一次底层操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy)]
pub(crate) struct OperationKind {
    pub code: &'static str,
    pub message: &'static str,
}

pub(crate) const CONFIGURE: OperationKind = OperationKind {
    code: "spark.transport.tcp.configure_failed",
    message: "tcp configure",
};
pub(crate) const READ: OperationKind = OperationKind {
    code: "spark.transport.tcp.read_failed",
    message: "tcp read",
};
pub(crate) const WRITE: OperationKind = OperationKind {
    code: "spark.transport.tcp.write_failed",
    message: "tcp write",
};
pub(crate) const SPAWN: OperationKind = OperationKind {
    code: "spark.transport.tcp.spawn_failed",
    message: "tcp connect task",
};

/// 将 IO 错误映射为传输层错误。
pub(crate) fn map_io_error(kind: OperationKind, error: io::Error) -> TransportError {
    tracing::trace!(
        target: "spark.transport.tcp",
        code = kind.code,
        kind = ?error.kind(),
        "io error"
    );
    TransportError::Io {
        operation: kind.message,
        source: error,
    }
}

/// 对端正常断开类错误：连接池视角下与 EOF 等价，只需 `debug` 级别记录。
pub(crate) fn is_peer_disconnect(error: &TransportError) -> bool {
    let TransportError::Io { source, .. } = error else {
        return false;
    };
    matches!(
        source.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resets_are_classified_as_peer_disconnects() {
        let reset = map_io_error(READ, io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(is_peer_disconnect(&reset));
        assert!(reset.is_retryable());

        let denied = map_io_error(WRITE, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!is_peer_disconnect(&denied));
        assert_eq!(denied.to_string(), "tcp write failed: permission denied");
    }
}
