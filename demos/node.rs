//! A three-member cache cluster on localhost.
//!
//! Run this in three terminals with:
//!   RUST_LOG=info cargo run --example node -- 1
//!   RUST_LOG=info cargo run --example node -- 2
//!   RUST_LOG=info cargo run --example node -- 3

use bytes::Bytes;
use peercache::cache::{GetterFn, GroupRegistry, StringSink};
use peercache::network::NetworkServer;
use peercache::{CallContext, PeerPool, PoolConfig};
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "peercache=info".to_string()))
        .init();

    let node: usize = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    let members = ["127.0.0.1:9001", "127.0.0.1:9002", "127.0.0.1:9003"];
    let my_addr = members[(node.clamp(1, members.len())) - 1];
    println!("Starting member {} at {}", node, my_addr);

    let (server, shutdown) = NetworkServer::bind(my_addr.parse()?).await?;
    let pool = PeerPool::construct(my_addr, &server, PoolConfig::default())?;
    let server_handle = tokio::spawn(server.run());

    let source = my_addr.to_string();
    let scores = GroupRegistry::global().new_group(
        "scores",
        64 << 20,
        Arc::new(GetterFn(move |key: &str| {
            println!("  [{}] loading {} from the database", source, key);
            Ok(Bytes::from(format!("{}-score", key)))
        })),
    )?;

    // Give the other members a moment to come up, then join them. Members
    // that are not listening yet are skipped and can be added later.
    tokio::time::sleep(Duration::from_secs(3)).await;
    pool.set_peers(members).await;
    println!("Connected to {} peers", pool.peer_count());

    for key in ["tom", "jack", "sam", "alice", "bob"] {
        let mut sink = StringSink::new();
        let ctx = CallContext::with_timeout(Duration::from_secs(2));
        match scores.get(ctx, key, &mut sink).await {
            Ok(()) => println!("{} = {}", key, sink.value().unwrap_or_default()),
            Err(e) => println!("{} failed: {}", key, e),
        }
    }
    println!("Stats: {:?}", scores.stats());

    println!("Serving requests, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    pool.shutdown().await;
    let _ = shutdown.send(()).await;
    let _ = server_handle.await;
    Ok(())
}
