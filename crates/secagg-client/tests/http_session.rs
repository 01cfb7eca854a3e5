//! Sessions run over real HTTP against the coordinator service

use futures_util::future::join_all;
use secagg_client::HttpTransport;
use secagg_coordinator::{Coordinator, Phase, SharedCoordinator};
use secagg_core::{run_session, Configuration, Error, Participant, SaInt, Transport};
use std::time::Duration;
use tokio::net::TcpListener;

/// Start a server on an ephemeral port and return its URL
async fn serve(users: usize, threshold: usize) -> String {
    let config = Configuration::new(users, threshold, 1 << 32, b"over http".to_vec()).unwrap();
    let state = SharedCoordinator::new(Coordinator::<SaInt>::new(config).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, secagg_server::router(state))
            .await
            .unwrap();
    });

    format!("http://{}", address)
}

fn transport(url: &str) -> HttpTransport {
    HttpTransport::new(url).with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_sum_over_http() {
    let url = serve(3, 2).await;
    let values = [10u64, 20, 12];

    let handles: Vec<_> = values
        .iter()
        .map(|&value| {
            let transport = transport(&url);
            tokio::spawn(async move {
                let mut participant = Participant::new(SaInt(value));
                run_session(&mut participant, &transport).await
            })
        })
        .collect();

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().unwrap(), SaInt(42));
    }

    let status = transport(&url).status::<SaInt>().await.unwrap();
    assert_eq!(status.phase, Phase::Finished);
    assert_eq!(status.result, Some(SaInt(42)));
}

#[tokio::test]
async fn test_operator_closes_login_early() {
    let url = serve(5, 2).await;
    let values = [7u64, 8, 9];

    let handles: Vec<_> = values
        .iter()
        .map(|&value| {
            let transport = transport(&url);
            tokio::spawn(async move {
                let mut participant = Participant::new(SaInt(value));
                run_session(&mut participant, &transport).await
            })
        })
        .collect();

    let operator = transport(&url);
    loop {
        let status = operator.status::<SaInt>().await.unwrap();
        if status.registered_users == values.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(operator.finish().await.unwrap(), Phase::Round0);

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().unwrap(), SaInt(24));
    }
}

#[tokio::test]
async fn test_fetch_times_out_while_phase_open() {
    let url = serve(2, 1).await;
    let transport = transport(&url).with_poll_attempts(3);

    Transport::<SaInt>::login(&transport).await.unwrap();
    let err = Transport::<SaInt>::setup(&transport).await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
}

#[tokio::test]
async fn test_late_login_is_transport_error() {
    let url = serve(2, 1).await;
    let transport = transport(&url);

    for _ in 0..2 {
        Transport::<SaInt>::login(&transport).await.unwrap();
    }
    let err = Transport::<SaInt>::login(&transport).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
