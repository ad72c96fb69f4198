mod support;

use std::sync::Arc;
use std::thread;

use futures::executor::block_on;
use spark_connector::{Connection, ConnectionRegistry, ReconnectWatchdog};
use spark_transport::Channel;
use support::{ManualTimer, MockBootstrap, Outcome, address};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn cancelled_address_does_not_reconnect_after_drop() {
    let registry = ConnectionRegistry::new();
    let bootstrap = MockBootstrap::always(Outcome::Succeed);
    let timer = ManualTimer::new();
    let watchdog = ReconnectWatchdog::builder(bootstrap.clone(), timer.clone(), address(9001)).build();

    let connection = Arc::new(Connection::new(address(9001)));
    assert!(connection.bind_reconnect(watchdog.clone()));
    registry.manage(Arc::clone(&connection));

    let channel = block_on(watchdog.connect_now()).expect("建连成功");
    assert_eq!(registry.cancel_reconnect(&address(9001)), 1);
    assert!(!watchdog.is_started());
    assert!(logs_contain("reconnect cancelled"));

    channel.close();
    assert_eq!(timer.pending(), 0, "取消后断开不应登记重连");
    assert!(timer.delays().is_empty());
    assert_eq!(bootstrap.attempts(), 1);
}

#[test]
fn cancel_is_idempotent_and_ignores_unknown_addresses() {
    let registry = ConnectionRegistry::new();
    registry.manage(Arc::new(Connection::new(address(9002))));
    assert_eq!(registry.cancel_reconnect(&address(9002)), 1);
    assert_eq!(registry.cancel_reconnect(&address(9002)), 0);
    assert_eq!(registry.cancel_reconnect(&address(9999)), 0);
    assert!(registry.is_empty());
}

#[test]
fn cancel_all_covers_every_address() {
    let registry = ConnectionRegistry::new();
    let timer = ManualTimer::new();
    let bootstrap = MockBootstrap::always(Outcome::Fail);
    let mut watchdogs = Vec::new();
    for port in [9003, 9004, 9004] {
        let watchdog = ReconnectWatchdog::builder(bootstrap.clone(), timer.clone(), address(port)).build();
        let connection = Arc::new(Connection::new(address(port)));
        connection.bind_reconnect(watchdog.clone());
        registry.manage(connection);
        watchdogs.push(watchdog);
    }
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.connections(&address(9004)).len(), 2);

    assert_eq!(registry.cancel_all_reconnect(), 3);
    assert!(registry.is_empty());
    assert!(watchdogs.iter().all(|w| !w.is_started()));
}

#[test]
fn concurrent_manage_keeps_a_single_list_per_address() {
    let registry = Arc::new(ConnectionRegistry::new());
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..50 {
                    registry.manage(Arc::new(Connection::new(address(9005))));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.connections(&address(9005)).len(), 400);
}
