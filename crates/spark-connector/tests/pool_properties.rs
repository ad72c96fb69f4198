mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use spark_connector::{ConnectionPool, SystemClock};
use spark_transport::Channel;
use support::{MockChannel, address};

#[derive(Clone, Debug)]
enum Op {
    Add(usize),
    Remove(usize),
    Close(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6).prop_map(Op::Add),
        (0usize..6).prop_map(Op::Remove),
        (0usize..6).prop_map(Op::Close),
    ]
}

proptest! {
    #[test]
    fn membership_matches_shadow_set(ops in proptest::collection::vec(op(), 0..64)) {
        let pool = ConnectionPool::new(address(7100), Arc::new(SystemClock));
        let channels: Vec<_> = (0..6).map(|_| MockChannel::new(address(7100))).collect();
        let mut shadow = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(i) => {
                    let added = pool.add(channels[i].as_channel());
                    let fresh = channels[i].is_active() && shadow.insert(i);
                    // 已关闭的通道会被接纳后立即移除。
                    if channels[i].is_active() {
                        prop_assert_eq!(added, fresh);
                    }
                }
                Op::Remove(i) => {
                    let removed = pool.remove(&channels[i].as_channel());
                    prop_assert_eq!(removed, shadow.remove(&i));
                }
                Op::Close(i) => {
                    channels[i].close();
                    shadow.remove(&i);
                }
            }

            prop_assert_eq!(pool.size(), shadow.len());
            let ids: BTreeSet<_> = pool.channels().iter().map(|c| c.id()).collect();
            prop_assert_eq!(ids.len(), pool.size(), "不得出现重复成员");
            prop_assert_eq!(pool.is_available(), !shadow.is_empty());
        }
    }
}
