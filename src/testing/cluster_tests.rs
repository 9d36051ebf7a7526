//! End-to-end tests across several members talking over loopback TCP.

#[cfg(test)]
mod tests {
    use crate::cache::{BytesSink, Getter, GetterFn, StringSink};
    use crate::error::{Error, Result};
    use crate::testing::{spawn_cluster, spawn_member, unreachable_addr, TestMember};
    use crate::types::CallContext;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Getter that tags values with the member that loaded them.
    fn tagging_getter(owner: &str, calls: Arc<AtomicUsize>) -> Arc<dyn Getter> {
        let owner = owner.to_string();
        Arc::new(GetterFn(move |key: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(format!("{}:{}", owner, key)))
        }))
    }

    /// A key that `member` routes to some other member, with that owner's index.
    fn remote_key(members: &[TestMember], from: usize) -> (String, usize) {
        for i in 0..10_000 {
            let key = format!("key-{}", i);
            if let Some(peer) = members[from].pool.pick_peer(&key) {
                let owner = members
                    .iter()
                    .position(|m| m.addr == peer.address())
                    .unwrap();
                return (key, owner);
            }
        }
        panic!("no remotely owned key found");
    }

    struct SlowGetter(Duration);

    #[async_trait]
    impl Getter for SlowGetter {
        async fn load(&self, _ctx: CallContext, key: &str) -> Result<Bytes> {
            tokio::time::sleep(self.0).await;
            Ok(Bytes::from(key.to_string()))
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_owner_loads_and_serves_value() {
        let members = spawn_cluster(3).await;
        let calls: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let groups: Vec<_> = members
            .iter()
            .zip(&calls)
            .map(|(m, c)| m.add_group("users", tagging_getter(&m.addr, c.clone())))
            .collect();

        let (key, owner) = remote_key(&members, 0);

        let mut sink = StringSink::new();
        groups[0]
            .get(CallContext::background(), &key, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.value(), Some(format!("{}:{}", members[owner].addr, key).as_str()));
        assert_eq!(calls[0].load(Ordering::SeqCst), 0);
        assert_eq!(calls[owner].load(Ordering::SeqCst), 1);
        assert!(groups[owner].contains_local(&key));
        assert!(!groups[0].contains_local(&key));
        assert_eq!(groups[0].stats().peer_loads, 1);
        assert_eq!(groups[owner].stats().server_requests, 1);

        // A second fetch is served from the owner's cache.
        let mut sink = BytesSink::new();
        groups[0]
            .get(CallContext::background(), &key, &mut sink)
            .await
            .unwrap();
        assert_eq!(calls[owner].load(Ordering::SeqCst), 1);
        assert_eq!(groups[owner].stats().cache_hits, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_every_member_agrees_on_owner() {
        let members = spawn_cluster(3).await;

        for i in 0..200 {
            let key = format!("k{}", i);
            let owners: Vec<String> = members
                .iter()
                .map(|m| match m.pool.pick_peer(&key) {
                    Some(peer) => peer.address().to_string(),
                    None => m.addr.clone(),
                })
                .collect();
            assert!(owners.iter().all(|o| o == &owners[0]), "split ownership for {}", key);
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_remove_reaches_owner() {
        let members = spawn_cluster(2).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let groups: Vec<_> = members
            .iter()
            .map(|m| m.add_group("g", tagging_getter(&m.addr, calls.clone())))
            .collect();

        let (key, owner) = remote_key(&members, 0);
        let mut sink = BytesSink::new();
        groups[0]
            .get(CallContext::background(), &key, &mut sink)
            .await
            .unwrap();
        assert!(groups[owner].contains_local(&key));

        groups[0].remove(CallContext::background(), &key).await.unwrap();
        assert!(!groups[owner].contains_local(&key));
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_remote_group_falls_back_locally() {
        let members = spawn_cluster(2).await;
        let calls = Arc::new(AtomicUsize::new(0));
        // Only member 0 knows the group.
        let group =
            members[0].add_group("only-here", tagging_getter(&members[0].addr, calls.clone()));

        let (key, _) = remote_key(&members, 0);
        let mut sink = StringSink::new();
        group
            .get(CallContext::background(), &key, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.value(), Some(format!("{}:{}", members[0].addr, key).as_str()));
        let stats = group.stats();
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_deadline_crosses_the_wire() {
        let members = spawn_cluster(2).await;
        for m in &members {
            let getter = Arc::new(SlowGetter(Duration::from_secs(5)));
            m.registry
                .register(
                    crate::cache::Group::new("slow", 1 << 20, getter).with_picker(m.pool.clone()),
                )
                .unwrap();
        }
        let (key, _) = remote_key(&members, 0);
        let group = members[0].registry.get_group("slow").unwrap();

        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let mut sink = BytesSink::new();
        let err = group.get(ctx, &key, &mut sink).await.unwrap_err();
        assert!(matches!(err, Error::Timeout), "got {:?}", err);
    }

    #[test_log::test(tokio::test)]
    async fn test_membership_push_over_the_wire() {
        let members = spawn_cluster(2).await;
        let newcomer = spawn_member().await;
        let target = &members[1];

        let conn = members[0]
            .pool
            .all_peers()
            .into_iter()
            .find(|c| c.address() == target.addr)
            .unwrap();

        conn.add_peers(CallContext::background(), &[newcomer.addr.clone()])
            .await
            .unwrap();
        assert!(target.pool.contains_peer(&newcomer.addr));
        assert_eq!(target.pool.peer_count(), 3);

        conn.remove_peers(CallContext::background(), &[newcomer.addr.clone()])
            .await
            .unwrap();
        assert!(!target.pool.contains_peer(&newcomer.addr));

        // Unreachable peers are skipped but the push itself succeeds.
        let dead = unreachable_addr().await;
        conn.set_peers(CallContext::background(), &[target.addr.clone(), dead.clone()])
            .await
            .unwrap();
        assert_eq!(target.pool.members(), vec![target.addr.clone()]);
        assert_eq!(target.pool.peer_count(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_stopped_member_keeps_existing_connections_usable() {
        let members = spawn_cluster(2).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let groups: Vec<_> = members
            .iter()
            .map(|m| m.add_group("g", tagging_getter(&m.addr, calls.clone())))
            .collect();
        let (key, owner) = remote_key(&members, 0);

        members[owner].stop().await;

        let mut sink = BytesSink::new();
        groups[0]
            .get(CallContext::background(), &key, &mut sink)
            .await
            .unwrap();
        assert_eq!(groups[0].stats().peer_loads, 1);
    }
}
