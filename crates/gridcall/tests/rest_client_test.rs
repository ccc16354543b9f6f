//! REST clients against a local relay.

use gridcall::relay;
use gridcall::{AgentInviter, AppConfig, RoomClient};
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn start_relay(config: AppConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(relay::serve_on(listener, config));
    addr
}

#[tokio::test]
async fn room_client_allocates_distinct_rooms() {
    let config = AppConfig::default().with_auth_token(Some("tok".into()));
    let addr = start_relay(config).await;
    let client = RoomClient::new(format!("http://{addr}/"), Some("tok".into()));

    let first = client.create_room().await.unwrap();
    let second = client.create_room().await.unwrap();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[tokio::test]
async fn room_client_surfaces_rejection() {
    let config = AppConfig::default().with_auth_token(Some("tok".into()));
    let addr = start_relay(config).await;
    let client = RoomClient::new(format!("http://{addr}"), Some("wrong".into()));

    let err = client.create_room().await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn room_client_reports_unreachable_api() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = RoomClient::new(format!("http://{addr}"), None)
        .create_room()
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to reach room API"));
}

#[tokio::test]
async fn inviter_joins_once_then_conflicts() {
    let addr = start_relay(AppConfig::default()).await;
    let inviter = AgentInviter::new(format!("http://{addr}/join-player"));

    assert_eq!(inviter.invite("room9", "").await.unwrap(), "AI agent joined");
    let err = inviter.invite("room9", "").await.unwrap_err();
    assert!(err.to_string().contains("409"));
}
