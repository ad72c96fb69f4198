mod support;

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use futures::executor::block_on;
use spark_connector::{Connector, ConnectorConfig, ConnectorError, MockClock};
use spark_transport::Channel;
use support::{ManualTimer, MockBootstrap, Outcome, RecordingHandler, address};

fn connector(bootstrap: Arc<MockBootstrap>, timer: Arc<ManualTimer>) -> Connector {
    Connector::new(ConnectorConfig::default(), bootstrap, timer, Arc::new(MockClock::new()))
}

#[test]
fn sync_connect_populates_pool_and_registry() {
    let bootstrap = MockBootstrap::always(Outcome::Succeed);
    let timer = ManualTimer::new();
    let connector = connector(bootstrap, timer);

    let connection = block_on(connector.connect(address(6001))).expect("建连成功");
    assert!(connection.is_connected());
    assert!(connection.is_complete());
    assert!(connector.is_connection_available(&address(6001)));
    assert_eq!(connector.group(&address(6001)).size(), 1);
    assert_eq!(connector.registry().connections(&address(6001)).len(), 1);
    assert_eq!(connector.groups().len(), 1);
}

#[test]
fn sync_connect_failure_stops_the_watchdog() {
    let bootstrap = MockBootstrap::always(Outcome::Fail);
    let timer = ManualTimer::new();
    let connector = connector(bootstrap.clone(), timer.clone());

    let err = block_on(connector.connect(address(6002))).expect_err("建连失败");
    assert_eq!(err.code(), "spark.connector.connect_failed");
    let ConnectorError::ConnectFailed { address: addr, source } = &err else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(addr, &address(6002));
    assert!(source.is_retryable());
    assert_eq!(timer.pending(), 0, "同步建连失败不应继续重连");
    assert!(connector.registry().is_empty());
    assert!(!connector.is_connection_available(&address(6002)));
}

#[test]
fn async_connect_completes_through_the_watchdog() {
    let bootstrap = MockBootstrap::scripted(vec![Outcome::Fail], Outcome::Succeed);
    let timer = ManualTimer::new();
    let connector = connector(bootstrap.clone(), timer.clone());

    let connection = connector.connect_async(address(6003)).expect("登记成功");
    let (tx, rx) = mpsc::channel();
    connection.add_complete_listener(move |_| {
        let _ = tx.send(());
    });
    assert!(!connection.is_complete());
    assert_eq!(connector.registry().connections(&address(6003)).len(), 1);

    assert!(timer.fire_next(), "首次建连失败");
    assert!(!connector.is_connection_available(&address(6003)));
    assert_eq!(timer.delays(), vec![Duration::ZERO, Duration::from_millis(200)]);

    assert!(timer.fire_next(), "重连成功");
    rx.recv_timeout(Duration::from_secs(5)).expect("完成监听器应被调用");
    assert!(connection.is_complete());
    assert!(connection.is_connected());
    assert!(connector.is_connection_available(&address(6003)));
}

#[test]
fn dropped_channel_is_replaced() {
    let bootstrap = MockBootstrap::always(Outcome::Succeed);
    let timer = ManualTimer::new();
    let handler = Arc::new(RecordingHandler::default());
    let connector = connector(bootstrap.clone(), timer.clone()).with_handler(handler.clone());

    let connection = block_on(connector.connect(address(6004))).unwrap();
    let first = bootstrap.last_channel().expect("已建立通道");
    first.close();
    assert!(!connection.is_connected());
    assert!(!connector.is_connection_available(&address(6004)));
    assert_eq!(timer.delays(), vec![Duration::from_millis(200)]);

    assert!(timer.fire_next());
    assert!(connection.is_connected());
    let pool = connector.group(&address(6004));
    assert_eq!(pool.size(), 1);
    assert_ne!(pool.channels()[0].id(), first.id());
    assert_eq!(*handler.events.lock(), vec!["active", "inactive", "active"]);
}

#[test]
fn shutdown_cancels_reconnects_and_rejects_new_connects() {
    let bootstrap = MockBootstrap::always(Outcome::Succeed);
    let timer = ManualTimer::new();
    let connector = connector(bootstrap.clone(), timer.clone());

    block_on(connector.connect(address(6005))).unwrap();
    let channel = bootstrap.last_channel().unwrap();
    assert!(channel.is_active());

    connector.shutdown_gracefully();
    assert!(timer.is_stopped());
    assert!(connector.registry().is_empty());
    assert!(!channel.is_active());
    assert_eq!(connector.group(&address(6005)).size(), 0);
    assert!(!connector.is_connection_available(&address(6005)));
    assert_eq!(timer.pending(), 0);
    assert!(matches!(
        block_on(connector.connect(address(6005))),
        Err(ConnectorError::Shutdown)
    ));
}

#[test]
fn cancel_reconnect_only_affects_the_given_address() {
    let bootstrap = MockBootstrap::always(Outcome::Succeed);
    let timer = ManualTimer::new();
    let connector = connector(bootstrap.clone(), timer.clone());

    block_on(connector.connect(address(6006))).unwrap();
    block_on(connector.connect(address(6007))).unwrap();
    assert_eq!(connector.cancel_reconnect(&address(6006)), 1);

    for channel in bootstrap.channels() {
        channel.close();
    }
    assert_eq!(timer.pending(), 1, "只有未取消的地址继续重连");
    assert_eq!(connector.cancel_all_reconnect(), 1);
}

#[test]
fn group_is_shared_per_address() {
    let connector = connector(MockBootstrap::always(Outcome::Succeed), ManualTimer::new());
    let a = connector.group(&address(6008));
    let b = connector.group(&address(6008));
    a.set_capacity(3);
    assert_eq!(b.capacity(), 3);
    assert_eq!(connector.groups().len(), 1);
    assert_eq!(a.warm_up(), Duration::from_secs(600));
}
